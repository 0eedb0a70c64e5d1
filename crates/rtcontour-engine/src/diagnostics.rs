//! Round-trip diagnostics: timing and counts for each engine stage.
//!
//! [`round_trip_with_diagnostics`] runs mask → trace → smooth/merge →
//! fill, plus the flood-fill cross-check, and records how long each stage
//! took and how far each result is from the input. The engine never reads
//! wall time itself; callers supply a [`Clock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fill::{fill, fill_all, flood_fill_holes};
use crate::grid::Grid;
use crate::smooth::{pixel_outline, smooth_and_merge_all};
use crate::trace::trace_with_config;
use crate::types::{ContourConfig, ContourError, NestedContour, SmoothedPolygon};

/// A monotonic time source.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripDiagnostics {
    /// Boundary tracing.
    pub trace: StageDiagnostics,
    /// Smoothing and hole merging.
    pub smooth: StageDiagnostics,
    /// Rasterizing the merged polygons.
    pub fill: StageDiagnostics,
    /// Flood filling holes and comparing with the filled outer rims.
    pub flood_fill: StageDiagnostics,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: RoundTripSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Boundary tracing metrics.
    Trace {
        /// Top-level structures.
        component_count: usize,
        /// Rims below the top level.
        nested_rim_count: usize,
        /// Rim points across every level.
        rim_point_count: usize,
        /// Deepest nesting level found.
        max_nesting_level: u32,
    },
    /// Smoothing and merging metrics.
    Smooth {
        /// Smoothing strategy used.
        smoothing: String,
        /// Merged polygons, one per structure.
        polygon_count: usize,
        /// Points across all merged polygons.
        point_count: usize,
    },
    /// Rasterization metrics.
    Fill {
        /// Pixels written.
        filled_pixels: u64,
        /// Pixels that differ from the input mask.
        mismatched_pixels: u64,
    },
    /// Flood-fill cross-check metrics.
    FloodFill {
        /// Background pixels turned into foreground.
        filled_pixels: u64,
        /// Pixels that differ from filling the outer rims only.
        mismatched_pixels: u64,
    },
}

/// High-level summary counts for the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripSummary {
    /// Mask width in pixels.
    pub width: usize,
    /// Mask height in pixels.
    pub height: usize,
    /// Foreground pixels in the input.
    pub foreground_pixels: u64,
    /// `TotalPixels` summed over every structure.
    pub traced_pixels: u64,
    /// Whether the rendered mask equals the input.
    pub round_trip_exact: bool,
    /// Whether flood filling agreed with the filled outer rims.
    pub flood_fill_consistent: bool,
}

/// Everything a round trip produces besides its diagnostics.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    /// Merged polygons, one per traced structure.
    pub polygons: Vec<SmoothedPolygon>,
    /// The polygons rasterized into a mask the size of the input.
    pub rendered: Grid<u8>,
}

impl RoundTripDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Round Trip Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Mask: {}x{} ({} foreground pixels)",
            self.summary.width, self.summary.height, self.summary.foreground_pixels,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Trace", &self.trace),
            ("Smooth + Merge", &self.smooth),
            ("Fill", &self.fill),
            ("Flood Fill", &self.flood_fill),
        ];
        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Traced pixels: {}  |  Round trip exact: {}  |  Flood fill consistent: {}",
            self.summary.traced_pixels,
            yes_no(self.summary.round_trip_exact),
            yes_no(self.summary.flood_fill_consistent),
        ));

        lines.join("\n")
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Trace {
            component_count,
            nested_rim_count,
            rim_point_count,
            max_nesting_level,
        } => format!(
            "{component_count} structures, {nested_rim_count} nested rims, {rim_point_count} pts, depth {max_nesting_level}",
        ),
        StageMetrics::Smooth {
            smoothing,
            polygon_count,
            point_count,
        } => format!("{smoothing} {polygon_count} polygons, {point_count} pts"),
        StageMetrics::Fill {
            filled_pixels,
            mismatched_pixels,
        } => format!("filled={filled_pixels} mismatched={mismatched_pixels}"),
        StageMetrics::FloodFill {
            filled_pixels,
            mismatched_pixels,
        } => format!("holes filled={filled_pixels} mismatched={mismatched_pixels}"),
    }
}

/// Pixels whose values differ between two grids of the same extents.
pub(crate) fn count_mismatches(a: &Grid<u8>, b: &Grid<u8>) -> u64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| u64::from(x != y))
        .sum()
}

/// Fill only the outer rim of every structure, holes included.
pub(crate) fn fill_outer_rims(contours: &[NestedContour], grid: &mut Grid<u8>) {
    for contour in contours {
        let outline = pixel_outline(&contour.outer.points, false);
        fill(&outline, grid, 0.0, 0.0, 1);
    }
}

/// Run the full round trip on slice 0 of `mask`, timing each stage.
///
/// # Errors
///
/// Returns any error from tracing (invalid configuration, non-binary
/// mask) or merging.
pub fn round_trip_with_diagnostics<C: Clock>(
    mask: &Grid<u8>,
    config: &ContourConfig,
    clock: &C,
) -> Result<(RoundTrip, RoundTripDiagnostics), ContourError> {
    let total_start = clock.now();
    let plane = mask.slice(0).unwrap_or_else(|| mask.clone());

    let start = clock.now();
    let contours = trace_with_config(&plane, config)?;
    let (mut nested, mut rim_points, mut depth) = (0, 0, 0);
    for node in contours.iter().flat_map(NestedContour::iter_depth_first) {
        rim_points += node.outer.len();
        depth = depth.max(node.outer.nesting_level);
        if node.outer.nesting_level > config.starting_nesting_level {
            nested += 1;
        }
    }
    let trace = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Trace {
            component_count: contours.len(),
            nested_rim_count: nested,
            rim_point_count: rim_points,
            max_nesting_level: depth,
        },
    };

    let start = clock.now();
    let polygons = smooth_and_merge_all(&contours, config.smoothing)?;
    let smooth = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Smooth {
            smoothing: format!("{:?}", config.smoothing),
            polygon_count: polygons.len(),
            point_count: polygons.iter().map(SmoothedPolygon::len).sum(),
        },
    };

    let start = clock.now();
    let mut rendered = plane.create_same_size::<u8>();
    fill_all(&polygons, &mut rendered, 1);
    let render_mismatches = count_mismatches(&rendered, &plane);
    let fill = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Fill {
            filled_pixels: rendered.count(1) as u64,
            mismatched_pixels: render_mismatches,
        },
    };

    let start = clock.now();
    let mut flooded = plane.clone();
    flood_fill_holes(&mut flooded);
    let mut outer_only = plane.create_same_size::<u8>();
    fill_outer_rims(&contours, &mut outer_only);
    let flood_mismatches = count_mismatches(&flooded, &outer_only);
    let flood_fill = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::FloodFill {
            filled_pixels: (flooded.count(1) - plane.count(1)) as u64,
            mismatched_pixels: flood_mismatches,
        },
    };

    let summary = RoundTripSummary {
        width: plane.dim_x(),
        height: plane.dim_y(),
        foreground_pixels: plane.count(1) as u64,
        traced_pixels: polygons.iter().map(|p| p.total_pixels).sum(),
        round_trip_exact: render_mismatches == 0,
        flood_fill_consistent: flood_mismatches == 0,
    };

    let diagnostics = RoundTripDiagnostics {
        trace,
        smooth,
        fill,
        flood_fill,
        total_duration: clock.elapsed(&total_start),
        summary,
    };
    Ok((RoundTrip { polygons, rendered }, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::grid::Dims;
    use crate::smooth::SmoothingKind;

    /// Clock that advances one millisecond per reading.
    struct StepClock(std::cell::Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn ring_with_island() -> Grid<u8> {
        Grid::from_vec(
            Dims::new_2d(7, 7),
            vec![
                0, 0, 0, 0, 0, 0, 0, //
                0, 1, 1, 1, 1, 1, 0, //
                0, 1, 0, 0, 0, 1, 0, //
                0, 1, 0, 1, 0, 1, 0, //
                0, 1, 0, 0, 0, 1, 0, //
                0, 1, 1, 1, 1, 1, 0, //
                0, 0, 0, 0, 0, 0, 0, //
            ],
        )
        .unwrap()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn count_mismatches_counts_differences() {
        let a = Grid::from_vec(Dims::new_2d(3, 1), vec![0, 1, 1]).unwrap();
        let b = Grid::from_vec(Dims::new_2d(3, 1), vec![1, 1, 0]).unwrap();
        assert_eq!(count_mismatches(&a, &b), 2);
        assert_eq!(count_mismatches(&a, &a), 0);
    }

    #[test]
    fn round_trip_is_exact_and_consistent() {
        let mask = ring_with_island();
        let clock = StepClock(std::cell::Cell::new(0));
        let (result, diag) =
            round_trip_with_diagnostics(&mask, &ContourConfig::default(), &clock).unwrap();

        assert_eq!(result.rendered, mask);
        assert_eq!(result.polygons.len(), 2);
        assert!(diag.summary.round_trip_exact);
        assert!(diag.summary.flood_fill_consistent);
        assert_eq!(diag.summary.foreground_pixels, 17);
        assert_eq!(diag.summary.traced_pixels, 17);

        match diag.trace.metrics {
            StageMetrics::Trace {
                component_count,
                nested_rim_count,
                ..
            } => {
                assert_eq!(component_count, 2);
                assert_eq!(nested_rim_count, 1);
            }
            ref other => panic!("unexpected metrics {other:?}"),
        }
        match diag.flood_fill.metrics {
            StageMetrics::FloodFill {
                filled_pixels,
                mismatched_pixels,
            } => {
                assert_eq!(filled_pixels, 8);
                assert_eq!(mismatched_pixels, 0);
            }
            ref other => panic!("unexpected metrics {other:?}"),
        }
        assert!(diag.total_duration >= diag.trace.duration);
    }

    #[test]
    fn filled_trace_reports_mismatch() {
        let mask = ring_with_island();
        let config = ContourConfig {
            max_nesting_level: 0,
            smoothing: SmoothingKind::Small,
            ..ContourConfig::default()
        };
        let clock = StepClock(std::cell::Cell::new(0));
        let (result, diag) = round_trip_with_diagnostics(&mask, &config, &clock).unwrap();
        assert!(result.rendered.as_slice().iter().all(|&v| v <= 1));
        assert_eq!(result.rendered.count(1), 25);
        assert!(!diag.summary.round_trip_exact);
        assert!(diag.summary.flood_fill_consistent);
    }

    #[test]
    fn report_produces_nonempty_string() {
        let mask = ring_with_island();
        let clock = StepClock(std::cell::Cell::new(0));
        let (_, diag) =
            round_trip_with_diagnostics(&mask, &ContourConfig::default(), &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Round Trip Diagnostics Report"));
        assert!(report.contains("Flood Fill"));
        assert!(report.contains("Round trip exact: yes"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let mask = ring_with_island();
        let clock = StepClock(std::cell::Cell::new(0));
        let (_, diag) =
            round_trip_with_diagnostics(&mask, &ContourConfig::default(), &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["total_duration"].as_f64().unwrap() > 0.0);
        assert!(json["trace"]["metrics"]["Trace"]["component_count"].is_u64());
    }
}
