//! # Track Reduction
//!
//! Shrinks a full trip track (often hundreds of thousands of points) to a
//! bounded sample that still covers the whole route, so that each sampled
//! point can afford a place lookup.
//!
//! ## Strategies
//! 1. **Radius clustering** ([`cluster_by_radius`]): one left-to-right pass;
//!    each unclaimed point becomes a representative and claims every later
//!    point within `cluster_radius_km`.
//! 2. **Farthest-point sampling** ([`farthest_point_sample`]): seeded with the
//!    first and last points, repeatedly adds the point farthest from its
//!    nearest selected point.
//! 3. **Segment-stratified sampling** ([`segment_sample`]): equal index
//!    chunks, a uniform stride inside each chunk.
//!
//! [`reduce`] composes them: short inputs pass through, otherwise radius
//! clustering and then, if still too many, farthest-point sampling.
//! [`SamplingMode::Segmented`] replaces that composition with segment sampling.
//!
//! Every strategy is deterministic and returns an ordered subsequence of its
//! input.

use log::{debug, info};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance_km, radius_bounds};
use crate::Coordinate;


/// Configuration for track reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerConfig {
    /// Upper bound on the number of sampled coordinates.
    /// Default: 150
    pub max_samples: usize,

    /// Points closer than this to a cluster representative are dropped.
    /// Default: 2.0 km
    pub cluster_radius_km: f64,

    /// Number of index chunks for segment-stratified sampling.
    /// Default: 25
    pub num_segments: usize,

    /// Samples taken from each chunk in segment-stratified sampling.
    /// Default: 8
    pub samples_per_segment: usize,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            max_samples: 150,
            cluster_radius_km: 2.0,
            num_segments: 25,
            samples_per_segment: 8,
        }
    }
}

/// Top-level reduction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Radius clustering, then farthest-point sampling if still too long
    #[default]
    Composite,
    /// Segment-stratified sampling
    Segmented,
}

// =============================================================================
// Composition
// =============================================================================

/// Reduce a track to at most `config.max_samples` coordinates.
///
/// Inputs already within the bound are returned unchanged in either mode.
/// In segmented mode the segment count and per-segment sample count are
/// capped so their product never exceeds `max_samples`.
///
/// # Example
/// ```
/// use route_cities::{reduce, Coordinate, ReducerConfig, SamplingMode};
///
/// // ~1,100 km due north in 1,000 steps of ~1.1 km
/// let track: Vec<Coordinate> = (0..1000)
///     .map(|i| Coordinate::new(30.0 + i as f64 * 0.01, -100.0))
///     .collect();
///
/// let config = ReducerConfig { max_samples: 50, ..ReducerConfig::default() };
/// let sample = reduce(&track, &config, SamplingMode::Composite);
/// assert!(sample.len() <= 50);
/// assert_eq!(sample.first(), track.first());
/// ```
pub fn reduce(points: &[Coordinate], config: &ReducerConfig, mode: SamplingMode) -> Vec<Coordinate> {
    if points.len() <= config.max_samples {
        debug!("[Reducer] {} points within bound of {}, no reduction", points.len(), config.max_samples);
        return points.to_vec();
    }
    if config.max_samples == 0 {
        return vec![];
    }

    let sampled = match mode {
        SamplingMode::Composite => {
            let clustered = cluster_by_radius(points, config.cluster_radius_km);
            if clustered.len() <= config.max_samples {
                clustered
            } else {
                farthest_point_sample(&clustered, config.max_samples)
            }
        }
        SamplingMode::Segmented => {
            let segments = config.num_segments.min(config.max_samples).max(1);
            let per_segment = config
                .samples_per_segment
                .min(config.max_samples / segments)
                .max(1);
            segment_sample(points, segments, per_segment)
        }
    };

    info!(
        "[Reducer] {:?}: {} points -> {} samples (max {})",
        mode,
        points.len(),
        sampled.len(),
        config.max_samples
    );
    sampled
}

// =============================================================================
// Radius Clustering
// =============================================================================

/// A track point with its input index, for R-tree queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// Collapse nearby points into cluster representatives.
///
/// Walks the input in order. Each unclaimed point is emitted and claims every
/// later unclaimed point within `radius_km` of it. Candidates come from an
/// R-tree envelope query and are confirmed with the haversine distance, so
/// the result equals the plain quadratic scan, including near the poles and
/// across the antimeridian (see [`radius_bounds`]).
pub fn cluster_by_radius(points: &[Coordinate], radius_km: f64) -> Vec<Coordinate> {
    if points.is_empty() {
        return vec![];
    }

    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(idx, p)| IndexedPoint { idx, lat: p.latitude, lng: p.longitude })
        .collect();
    let tree = RTree::bulk_load(indexed);

    let mut claimed = vec![false; points.len()];
    let mut representatives = Vec::new();

    for (i, rep) in points.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;
        representatives.push(rep.clone());

        for (lo, hi) in radius_bounds(rep, radius_km) {
            for candidate in tree.locate_in_envelope(&AABB::from_corners(lo, hi)) {
                let j = candidate.idx;
                if j <= i || claimed[j] {
                    continue;
                }
                if haversine_distance_km(rep, &points[j]) <= radius_km {
                    claimed[j] = true;
                }
            }
        }
    }

    debug!(
        "[Reducer] Clustered {} points into {} clusters ({} km radius)",
        points.len(),
        representatives.len(),
        radius_km
    );
    representatives
}

// =============================================================================
// Farthest-Point Sampling
// =============================================================================

/// Greedy farthest-point sampling, returned in input order.
///
/// Seeds the selection with the first and last points, then repeatedly adds
/// the unselected point whose distance to its nearest selected point is
/// largest (earliest index on ties). Stops at `max_samples` or when every
/// remaining point coincides with a selected one. O(max_samples × n).
///
/// `max_samples == 1` keeps only the first point; `0` returns nothing.
pub fn farthest_point_sample(points: &[Coordinate], max_samples: usize) -> Vec<Coordinate> {
    if points.len() <= max_samples {
        return points.to_vec();
    }
    if max_samples == 0 {
        return vec![];
    }
    if max_samples == 1 {
        return vec![points[0].clone()];
    }

    let n = points.len();
    let mut selected = vec![false; n];
    let mut nearest = vec![f64::INFINITY; n];

    for seed in [0, n - 1] {
        selected[seed] = true;
        update_nearest(&mut nearest, points, &points[seed]);
    }
    let mut count = 2;

    while count < max_samples {
        let mut best: Option<(usize, f64)> = None;
        for (i, &d) in nearest.iter().enumerate() {
            if selected[i] {
                continue;
            }
            if best.map_or(true, |(_, best_d)| d > best_d) {
                best = Some((i, d));
            }
        }

        match best {
            Some((i, d)) if d > 0.0 => {
                selected[i] = true;
                count += 1;
                update_nearest(&mut nearest, points, &points[i]);
            }
            _ => break,
        }
    }

    points
        .iter()
        .zip(&selected)
        .filter(|(_, &keep)| keep)
        .map(|(p, _)| p.clone())
        .collect()
}

/// Lower each point's nearest-selected distance against a newly chosen point.
#[cfg(not(feature = "parallel"))]
fn update_nearest(nearest: &mut [f64], points: &[Coordinate], chosen: &Coordinate) {
    for (d, p) in nearest.iter_mut().zip(points) {
        let candidate = haversine_distance_km(p, chosen);
        if candidate < *d {
            *d = candidate;
        }
    }
}

#[cfg(feature = "parallel")]
fn update_nearest(nearest: &mut [f64], points: &[Coordinate], chosen: &Coordinate) {
    use rayon::prelude::*;

    nearest
        .par_iter_mut()
        .zip(points.par_iter())
        .for_each(|(d, p)| {
            let candidate = haversine_distance_km(p, chosen);
            if candidate < *d {
                *d = candidate;
            }
        });
}

// =============================================================================
// Segment-Stratified Sampling
// =============================================================================

/// Sample every leg of a multi-stage trip regardless of point density.
///
/// Splits the input into `num_segments` contiguous chunks of
/// `len / num_segments` points (the last chunk absorbs the remainder) and
/// takes up to `samples_per_segment` points from each at a uniform stride.
/// Inputs shorter than `num_segments` are returned whole.
pub fn segment_sample(
    points: &[Coordinate],
    num_segments: usize,
    samples_per_segment: usize,
) -> Vec<Coordinate> {
    if num_segments == 0 || samples_per_segment == 0 {
        return vec![];
    }
    if points.len() <= num_segments {
        return points.to_vec();
    }

    let segment_size = points.len() / num_segments;
    let mut sampled = Vec::with_capacity(num_segments * samples_per_segment);

    for s in 0..num_segments {
        let start = s * segment_size;
        let end = if s == num_segments - 1 { points.len() } else { start + segment_size };
        let segment = &points[start..end];

        if segment.len() <= samples_per_segment {
            sampled.extend_from_slice(segment);
            continue;
        }

        let step = segment.len() / samples_per_segment;
        sampled.extend(segment.iter().step_by(step).take(samples_per_segment).cloned());
    }

    debug!(
        "[Reducer] Segment sampling: {} segments x {} -> {} samples",
        num_segments,
        samples_per_segment,
        sampled.len()
    );
    sampled
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight line due north, `step_deg` apart (0.01 deg ~ 1.1 km).
    fn line(n: usize, step_deg: f64) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(30.0 + i as f64 * step_deg, -100.0))
            .collect()
    }

    fn is_ordered_subsequence(sample: &[Coordinate], input: &[Coordinate]) -> bool {
        let mut it = input.iter();
        sample.iter().all(|s| it.any(|p| p == s))
    }

    #[test]
    fn test_reduce_short_input_unchanged() {
        let track = line(10, 0.01);
        let config = ReducerConfig { max_samples: 10, ..ReducerConfig::default() };
        assert_eq!(reduce(&track, &config, SamplingMode::Composite), track);
        assert_eq!(reduce(&track, &config, SamplingMode::Segmented), track);
    }

    #[test]
    fn test_reduce_respects_max_samples() {
        let track = line(2000, 0.005);
        for max in [0, 1, 2, 3, 17, 100] {
            let config = ReducerConfig {
                max_samples: max,
                num_segments: 40,
                samples_per_segment: 9,
                ..ReducerConfig::default()
            };
            for mode in [SamplingMode::Composite, SamplingMode::Segmented] {
                let sample = reduce(&track, &config, mode);
                assert!(sample.len() <= max, "{mode:?} with max {max} gave {}", sample.len());
                assert!(is_ordered_subsequence(&sample, &track));
            }
        }
    }

    #[test]
    fn test_cluster_claims_points_within_radius() {
        // 0.001 deg ~ 111 m apart: everything within 0.5 km of a representative collapses
        let track = line(20, 0.001);
        let clustered = cluster_by_radius(&track, 0.5);
        assert_eq!(clustered[0], track[0]);
        // Representatives are 5 steps (~556 m) apart
        assert_eq!(clustered.len(), 4);
        assert_eq!(clustered[1], track[5]);
    }

    fn quadratic_clusters(track: &[Coordinate], radius_km: f64) -> Vec<Coordinate> {
        let mut claimed = vec![false; track.len()];
        let mut expected = Vec::new();
        for i in 0..track.len() {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;
            expected.push(track[i].clone());
            for j in i + 1..track.len() {
                if !claimed[j] && haversine_distance_km(&track[i], &track[j]) <= radius_km {
                    claimed[j] = true;
                }
            }
        }
        expected
    }

    #[test]
    fn test_cluster_matches_quadratic_scan() {
        let wiggle = |lat0: f64, lon0: f64, lon_step: f64| -> Vec<Coordinate> {
            (0..300)
                .map(|i| {
                    let t = i as f64;
                    Coordinate::new(lat0 + (t * 0.37).sin() * 0.2, lon0 + t * lon_step)
                })
                .collect()
        };

        let cases = [
            (wiggle(35.0, -106.0, 0.004), 3.0),
            // Near the pole a few km span several degrees of longitude
            (wiggle(89.3, -20.0, 0.15), 5.0),
            (wiggle(-88.0, 100.0, 0.05), 3.0),
        ];
        for (track, radius) in &cases {
            assert_eq!(cluster_by_radius(track, *radius), quadratic_clusters(track, *radius));
        }
    }

    #[test]
    fn test_cluster_high_latitude_neighbours() {
        // ~4.85 km apart at 89N
        let track = vec![Coordinate::new(89.0, 0.0), Coordinate::new(89.0, 2.5)];
        assert_eq!(cluster_by_radius(&track, 5.0), vec![track[0].clone()]);
    }

    #[test]
    fn test_cluster_across_antimeridian() {
        let track: Vec<Coordinate> = (0..40)
            .map(|i| {
                let lon = 179.9 + i as f64 * 0.005;
                let lon = if lon > 180.0 { lon - 360.0 } else { lon };
                Coordinate::new(-16.5, lon)
            })
            .collect();
        let clustered = cluster_by_radius(&track, 2.0);
        assert_eq!(clustered, quadratic_clusters(&track, 2.0));
        // ~21 km of track at ~0.53 km spacing, clusters every ~4 steps
        assert!(clustered.len() < 15);
    }

    #[test]
    fn test_cluster_empty() {
        assert!(cluster_by_radius(&[], 2.0).is_empty());
    }

    #[test]
    fn test_farthest_point_keeps_endpoints() {
        let track = line(500, 0.01);
        let sample = farthest_point_sample(&track, 10);
        assert_eq!(sample.len(), 10);
        assert_eq!(sample.first(), track.first());
        assert_eq!(sample.last(), track.last());
        assert!(is_ordered_subsequence(&sample, &track));
    }

    #[test]
    fn test_farthest_point_picks_midpoint_first() {
        let track = line(101, 0.01);
        let sample = farthest_point_sample(&track, 3);
        assert_eq!(sample, vec![track[0].clone(), track[50].clone(), track[100].clone()]);
    }

    #[test]
    fn test_farthest_point_breaks_ties_by_earliest_index() {
        // Points 1 and 2 coincide, so they tie exactly
        let track = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(0.0, 4.0),
        ];
        let sample = farthest_point_sample(&track, 3);
        assert_eq!(sample, vec![track[0].clone(), track[1].clone(), track[3].clone()]);
    }

    #[test]
    fn test_farthest_point_stops_on_duplicates() {
        let p = Coordinate::new(36.0, -96.0);
        let q = Coordinate::new(37.0, -96.0);
        let track = vec![p.clone(), p.clone(), p.clone(), q.clone()];
        let sample = farthest_point_sample(&track, 3);
        assert_eq!(sample, vec![p, q]);
    }

    #[test]
    fn test_farthest_point_degenerate_bounds() {
        let track = line(10, 0.01);
        assert!(farthest_point_sample(&track, 0).is_empty());
        assert_eq!(farthest_point_sample(&track, 1), vec![track[0].clone()]);
    }

    #[test]
    fn test_segment_sample_covers_every_segment() {
        let track = line(1000, 0.01);
        let sample = segment_sample(&track, 10, 3);
        assert_eq!(sample.len(), 30);
        // One sample per segment start
        for s in 0..10 {
            assert!(sample.contains(&track[s * 100]));
        }
    }

    #[test]
    fn test_segment_sample_last_segment_absorbs_remainder() {
        let track = line(105, 0.01);
        let sample = segment_sample(&track, 10, 100);
        // Segments of 10, last one 15 points long; all taken
        assert_eq!(sample.len(), 105);
    }

    #[test]
    fn test_segment_sample_stride_takes_at_most_k() {
        let track = line(11, 0.01);
        // One segment of 11 points, stride 2 would yield 6 without the cap
        let sample = segment_sample(&track, 1, 5);
        assert_eq!(sample.len(), 5);
        assert_eq!(sample[1], track[2]);
    }

    #[test]
    fn test_segment_sample_short_input() {
        let track = line(5, 0.01);
        assert_eq!(segment_sample(&track, 20, 8), track);
        assert!(segment_sample(&track, 0, 8).is_empty());
    }
}
