//! Per-slice processing of 3D volumes.
//!
//! Each Z slice is an independent 2D problem: slices are traced, merged
//! and rasterized in parallel, and each task writes only its own slice.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fill::fill_all;
use crate::grid::{Dims, Grid};
use crate::smooth::smooth_and_merge_all;
use crate::trace::trace_with_config;
use crate::types::{ContourConfig, ContourError, SmoothedPolygon};

/// The merged polygons of one Z slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceContours {
    /// Slice index.
    pub z: usize,
    /// One path per top-level structure, in scan order.
    pub polygons: Vec<SmoothedPolygon>,
}

fn slice_polygons(
    volume: &Grid<u8>,
    z: usize,
    config: &ContourConfig,
) -> Result<Vec<SmoothedPolygon>, ContourError> {
    let Some(slice) = volume.slice(z) else {
        return Ok(Vec::new());
    };
    let contours = trace_with_config(&slice, config)?;
    smooth_and_merge_all(&contours, config.smoothing)
}

/// Trace and merge every slice of a volume.
///
/// Slices without foreground are omitted; the rest come back ordered by
/// `z`.
///
/// # Errors
///
/// Returns the first error any slice produced: an invalid configuration,
/// a non-binary slice, or a merge failure.
pub fn extract_slice_contours(
    volume: &Grid<u8>,
    config: &ContourConfig,
) -> Result<Vec<SliceContours>, ContourError> {
    config.validate()?;
    let slices: Vec<SliceContours> = (0..volume.dim_z())
        .into_par_iter()
        .map(|z| {
            slice_polygons(volume, z, config).map(|polygons| SliceContours { z, polygons })
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|s| !s.polygons.is_empty())
        .collect();
    debug!(
        slices = volume.dim_z(),
        non_empty = slices.len(),
        "extracted slice contours"
    );
    Ok(slices)
}

/// Rasterize per-slice polygons into a new volume of the given extents.
///
/// Entries whose `z` is past the last slice are skipped.
#[must_use]
pub fn slice_contours_to_volume(slices: &[SliceContours], dims: Dims) -> Grid<u8> {
    let skipped = slices.iter().filter(|s| s.z >= dims.z).count();
    if skipped > 0 {
        warn!(skipped, depth = dims.z, "slice contours outside volume");
    }
    let mut volume = Grid::new(dims);
    if dims.is_empty() {
        return volume;
    }
    volume
        .as_mut_slice()
        .par_chunks_mut(dims.slice_len())
        .enumerate()
        .for_each(|(z, out)| {
            let mut plane = Grid::new(dims.slice_dims());
            for entry in slices.iter().filter(|s| s.z == z) {
                fill_all(&entry.polygons, &mut plane, 1);
            }
            out.copy_from_slice(plane.as_slice());
        });
    volume
}

/// A volume with `depth` copies of a 2D mask stacked along Z.
///
/// # Errors
///
/// Returns [`ContourError::DimensionMismatch`] if the mask has more than
/// one slice.
pub fn extrude(slice: &Grid<u8>, depth: usize) -> Result<Grid<u8>, ContourError> {
    let dims = slice.dims();
    if dims.z != 1 {
        return Err(ContourError::DimensionMismatch {
            expected: dims.slice_len(),
            actual: dims.len(),
        });
    }
    let mut data = Vec::with_capacity(dims.slice_len() * depth);
    for _ in 0..depth {
        data.extend_from_slice(slice.as_slice());
    }
    Grid::from_vec(Dims::new_3d(dims.x, dims.y, depth), data)
}
