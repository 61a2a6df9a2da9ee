//! Reduce a synthetic cross-country track and resolve it against the
//! built-in gazetteer, without any network access.
//!
//! Run with: cargo run --example offline_trip

use chrono::{Duration, TimeZone, Utc};
use route_cities::{
    CityFinder, Coordinate, FinderConfig, Gazetteer, GeocodeCache, LongitudeTable, Strategy,
};

/// Straight-line legs between waypoints, one point every ~0.01 degree.
fn synthetic_track(waypoints: &[(f64, f64)]) -> Vec<Coordinate> {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut track = Vec::new();

    for (leg, pair) in waypoints.windows(2).enumerate() {
        let (lat1, lon1) = pair[0];
        let (lat2, lon2) = pair[1];
        let steps = ((lat2 - lat1).abs().max((lon2 - lon1).abs()) / 0.01).ceil() as usize;
        for s in 0..steps {
            let f = s as f64 / steps as f64;
            let t = start + Duration::seconds((track.len() * 30) as i64);
            track.push(
                Coordinate::new(lat1 + (lat2 - lat1) * f, lon1 + (lon2 - lon1) * f)
                    .with_timestamp(t)
                    .with_source(format!("leg-{}.gpx", leg + 1)),
            );
        }
    }
    track
}

#[tokio::main]
async fn main() {
    // Los Angeles -> Flagstaff -> Albuquerque -> Santa Fe -> Tulsa -> Nashville
    let track = synthetic_track(&[
        (34.0522, -118.2437),
        (35.1983, -111.6513),
        (35.0844, -106.6504),
        (35.6869, -105.9378),
        (36.1540, -95.9928),
        (36.1627, -86.7816),
    ]);

    let config = FinderConfig {
        strategy: Strategy::OfflineOnly,
        ..FinderConfig::default()
    };
    let finder = CityFinder::new(config, Gazetteer::builtin());
    let report = finder.run(&track, GeocodeCache::in_memory()).await;

    println!("Offline Trip\n");
    println!(
        "{} points -> {} samples, {} offline hits, {} unresolved\n",
        report.input_points, report.sampled_points, report.stats.offline_hits, report.unresolved
    );

    println!("Chronological:");
    for entry in report.chronological() {
        println!("  {:2}. {}", entry.index, entry.name);
    }

    println!("\nWest to east:");
    for entry in report.west_to_east(&LongitudeTable::builtin()) {
        println!("  {:2}. {:<20} {:>9.4}", entry.index, entry.name, entry.longitude);
    }
}
