//! Resolve a short track with the gazetteer first and Nominatim for the
//! rest, keeping a persistent cache next to the working directory.
//!
//! Run with: cargo run --example hybrid_trip --features http -- [cache.json]
//!
//! A second run with the same cache file makes no API calls.

use std::sync::Arc;

use route_cities::{
    CityFinder, Coordinate, FinderConfig, Gazetteer, GeocodeCache, LongitudeTable,
    NominatimClient, NominatimConfig, ProgressCallback, Strategy,
};

#[tokio::main]
async fn main() {
    let cache_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "geocode_cache.json".to_string());

    // Route 66 between Gallup and Holbrook: mostly outside the gazetteer
    let track = vec![
        Coordinate::new(35.5281, -108.7426),
        Coordinate::new(35.3320, -109.0490),
        Coordinate::new(35.0960, -109.5380),
        Coordinate::new(35.0245, -110.0300),
        Coordinate::new(34.9022, -110.1582),
        Coordinate::new(35.0242, -110.6974),
    ];

    let client = match NominatimClient::new(NominatimConfig::default()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create Nominatim client: {}", e);
            std::process::exit(1);
        }
    };

    let config = FinderConfig {
        strategy: Strategy::Hybrid,
        workers: 1,
        ..FinderConfig::default()
    };
    let finder = CityFinder::new(config, Gazetteer::builtin()).with_geocoder(Arc::new(client));

    let progress: ProgressCallback = Arc::new(|done, total| {
        println!("  resolved {}/{}", done, total);
    });

    println!("Hybrid Trip (cache: {})\n", cache_path);
    let report = finder
        .run_with_progress(&track, GeocodeCache::load(&cache_path), Some(progress))
        .await;

    println!(
        "\nAPI calls: {} ({} failed), cache hits: {}, offline hits: {}, rejected: {}",
        report.stats.api_calls,
        report.stats.api_failures,
        report.stats.cache_hits,
        report.stats.offline_hits,
        report.rejected
    );
    if let Some(err) = &report.flush_error {
        println!("Cache was not saved: {}", err);
    }

    println!("\nWest to east:");
    for entry in report.west_to_east(&LongitudeTable::builtin()) {
        println!("  {:2}. {}", entry.index, entry.name);
    }
}
