//! Shared types for the contour engine.

use serde::{Deserialize, Serialize};

use crate::geometry::{FloatPoint, IntPoint, signed_area};
use crate::smooth::{SmoothingKind, pixel_outline};

/// Pixel counts attributed to one traced rim.
///
/// `foreground` counts enclosed pixels of the rim's own polarity (mask
/// value 1 for an outer rim, 0 for a hole rim). `other` counts every
/// other enclosed pixel, including everything nested deeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelCounts {
    /// Enclosed pixels matching the rim's polarity.
    pub foreground: u64,
    /// All other enclosed pixels.
    pub other: u64,
    /// `foreground + other`.
    pub total: u64,
}

impl VoxelCounts {
    /// Build counts, deriving `total`.
    #[must_use]
    pub const fn new(foreground: u64, other: u64) -> Self {
        Self {
            foreground,
            other,
            total: foreground + other,
        }
    }
}

/// Which side of a rim holds the traced region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// The region is foreground (mask value 1). Its rim runs clockwise.
    Foreground,
    /// The region is enclosed background. Its rim runs counterclockwise.
    Hole,
}

impl Polarity {
    /// The polarity one nesting level deeper.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Foreground => Self::Hole,
            Self::Hole => Self::Foreground,
        }
    }

    /// Mask value of the pixels that make up a region of this polarity.
    #[must_use]
    pub const fn region_value(self) -> u8 {
        match self {
            Self::Foreground => 1,
            Self::Hole => 0,
        }
    }
}

/// One traced boundary: the ordered boundary pixels of a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContourRim {
    /// Boundary pixels in walk order. Outer rims are clockwise, hole
    /// rims counterclockwise (image coordinates).
    pub points: Vec<IntPoint>,
    /// Pixel counts inside the rim.
    pub voxel_counts: VoxelCounts,
    /// Sequence number of the rim this one lies inside, 0 when no rim
    /// encloses it.
    pub inside_of_polygon: u32,
    /// Number of pixels in the traced region itself.
    pub region_area_pixels: u64,
    /// Absolute nesting level the rim was traced at.
    pub nesting_level: u32,
    /// Whether this rim bounds foreground or a hole.
    pub polarity: Polarity,
}

impl ContourRim {
    /// Signed area of the pixel-edge outline this rim describes.
    ///
    /// Positive for outer rims, negative for hole rims.
    #[must_use]
    pub fn outline_area(&self) -> f64 {
        signed_area(&pixel_outline(
            &self.points,
            self.polarity == Polarity::Hole,
        ))
    }

    /// Whether the rim runs clockwise in image coordinates.
    #[must_use]
    pub fn is_clockwise(&self) -> bool {
        self.outline_area() > 0.0
    }

    /// Number of boundary points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the rim has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A traced region together with the regions nested directly inside it.
///
/// Top-level entries are foreground components; their `inner` entries
/// are holes; a hole's `inner` entries are foreground islands, and so on
/// down to the requested nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedContour {
    /// The region's own rim.
    pub outer: ContourRim,
    /// Regions nested directly inside, in scan order.
    pub inner: Vec<Self>,
    /// Enclosed pixel count minus everything the traced children enclose.
    pub total_pixels: u64,
}

impl NestedContour {
    /// Number of direct children.
    #[must_use]
    pub fn hole_count(&self) -> usize {
        self.inner.len()
    }

    /// Every node in the subtree, parents before children.
    pub fn iter_depth_first(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.inner.iter().rev());
            Some(node)
        })
    }
}

/// A single closed path ready for rasterization.
///
/// Holes of the source structure have already been spliced in through
/// connector bridges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedPolygon {
    /// Path vertices; the closing edge back to the first point is implied.
    pub contour_points: Vec<FloatPoint>,
    /// `total_pixels` of the structure the path was built from.
    pub total_pixels: u64,
}

impl SmoothedPolygon {
    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.contour_points.len()
    }

    /// Whether the path has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.contour_points.is_empty()
    }

    /// Shoelace area of the path. Bridges contribute nothing, so for a
    /// merged structure this is the outer area minus the hole areas.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.contour_points)
    }
}

impl From<&SmoothedPolygon> for geo::LineString<f64> {
    fn from(polygon: &SmoothedPolygon) -> Self {
        let mut coords: Vec<geo::Coord<f64>> = polygon
            .contour_points
            .iter()
            .map(|&p| p.into())
            .collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        Self::new(coords)
    }
}

/// Result of classifying a point against a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointPosition {
    /// Outside the polygon.
    Outside,
    /// Within floating tolerance of an edge.
    Boundary,
    /// Strictly inside.
    Inside,
}

impl PointPosition {
    /// Integer encoding: -1, 0, 1.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Outside => -1,
            Self::Boundary => 0,
            Self::Inside => 1,
        }
    }
}

/// Configuration for mask-to-polygon conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Nesting level assigned to top-level components.
    pub starting_nesting_level: u32,
    /// How many levels below the starting level to trace. 0 traces
    /// outer boundaries only, with every hole filled.
    pub max_nesting_level: u32,
    /// Rim smoothing strategy.
    pub smoothing: SmoothingKind,
}

impl ContourConfig {
    /// Default starting nesting level.
    pub const DEFAULT_STARTING_NESTING_LEVEL: u32 = 0;

    /// Default maximum nesting depth: outer boundaries plus direct holes.
    pub const DEFAULT_MAX_NESTING_LEVEL: u32 = 1;

    /// Check that the configuration can be traced.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::InvalidConfig`] if the starting level is
    /// so large that nested levels would overflow.
    pub fn validate(&self) -> Result<(), ContourError> {
        if self
            .starting_nesting_level
            .checked_add(self.max_nesting_level)
            .is_none()
        {
            return Err(ContourError::InvalidConfig(format!(
                "starting level {} plus depth {} overflows",
                self.starting_nesting_level, self.max_nesting_level,
            )));
        }
        Ok(())
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            starting_nesting_level: Self::DEFAULT_STARTING_NESTING_LEVEL,
            max_nesting_level: Self::DEFAULT_MAX_NESTING_LEVEL,
            smoothing: SmoothingKind::default(),
        }
    }
}

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or contradictory geometric input.
    Geometry,
    /// A numeric operation outside its domain.
    Domain,
    /// Input of the wrong shape or configuration.
    Input,
}

/// Errors that can occur in the contour engine.
///
/// Out-of-grid points are never errors; they are skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContourError {
    /// A mask required to be binary holds some other value.
    #[error("mask value {value} at index {index} is not 0 or 1")]
    NonBinaryMask {
        /// Linear index of the offending pixel.
        index: usize,
        /// The value found there.
        value: u8,
    },

    /// No contour edge crosses the vertical line through a point.
    #[error("no contour edge crosses x = {x} on the searched side of y = {y}")]
    NoIntersectingEdge {
        /// Search line.
        x: f64,
        /// Search origin.
        y: f64,
    },

    /// A segment was intersected with a vertical line it does not reach.
    #[error("segment does not span x = {x}")]
    SegmentDoesNotSpan {
        /// Requested x.
        x: f64,
    },

    /// A zero-length vector has no direction.
    #[error("cannot normalize a zero-length vector")]
    ZeroLengthVector,

    /// A contour operation received no points.
    #[error("contour has no points")]
    EmptyContour,

    /// Grid data does not match the declared dimensions.
    #[error("grid data has {actual} values but dimensions require {expected}")]
    DimensionMismatch {
        /// `x * y * z` of the declared dimensions.
        expected: usize,
        /// Length of the supplied data.
        actual: usize,
    },

    /// Configuration is invalid.
    #[error("invalid contour configuration: {0}")]
    InvalidConfig(String),
}

impl ContourError {
    /// The family this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoIntersectingEdge { .. } | Self::SegmentDoesNotSpan { .. } | Self::EmptyContour => {
                ErrorKind::Geometry
            }
            Self::ZeroLengthVector => ErrorKind::Domain,
            Self::NonBinaryMask { .. } | Self::DimensionMismatch { .. } | Self::InvalidConfig(_) => {
                ErrorKind::Input
            }
        }
    }
}
