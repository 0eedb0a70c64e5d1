//! Contour tracing: extract nested boundary rims from a binary mask.
//!
//! Regions of either polarity are 8-connected. A region encloses every
//! pixel that cannot reach the outside through 4-neighbours without
//! crossing it, so a hole is an 8-connected run of background inside its
//! parent, and the foreground that hole encloses comes back as islands
//! even where an island touches the parent at a corner.
//!
//! Each region is walked with Moore-neighbour tracing, keeping the
//! opposite region on the left: outer rims come out clockwise and hole
//! rims counterclockwise. A hole is walked through the pixels around what
//! it encloses, which is the polarity flip at each nesting level. When the
//! enclosed pixels only meet at corners the walk closes around the first
//! piece alone.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::geometry::IntPoint;
use crate::grid::{Dims, Grid};
use crate::types::{ContourConfig, ContourError, ContourRim, NestedContour, Polarity, VoxelCounts};

/// The eight neighbour offsets in clockwise order (image coordinates),
/// starting at north.
pub(crate) const RING: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

pub(crate) const NORTH: usize = 0;
pub(crate) const EAST: usize = 2;
pub(crate) const SOUTH: usize = 4;
pub(crate) const WEST: usize = 6;

const FOUR: [(i32, i32); 4] = [RING[NORTH], RING[EAST], RING[SOUTH], RING[WEST]];

/// Ring index of a unit offset, `None` if it is not a neighbour offset.
pub(crate) fn ring_direction(dx: i32, dy: i32) -> Option<usize> {
    RING.iter().position(|&d| d == (dx, dy))
}

/// Trace every foreground component of `mask` with its nested holes and
/// islands.
///
/// Top-level components get nesting level `starting_nesting_level`.
/// Children are traced while their depth below the top level is at most
/// `max_nesting_level`; a component whose holes fall beyond that depth is
/// traced as if its holes were filled. Islands inside a hole that is
/// traced but whose islands are not come back as further top-level
/// components, inside the polygon numbered after that hole.
///
/// Only slice 0 of the grid is read.
///
/// # Errors
///
/// Returns [`ContourError::NonBinaryMask`] if slice 0 holds a value other
/// than 0 or 1.
pub fn trace(
    mask: &Grid<u8>,
    starting_nesting_level: u32,
    max_nesting_level: u32,
) -> Result<Vec<NestedContour>, ContourError> {
    let dims = mask.dims().slice_dims();
    let data = &mask.as_slice()[..dims.len()];
    if let Some(index) = data.iter().position(|&v| v > 1) {
        return Err(ContourError::NonBinaryMask {
            index,
            value: data[index],
        });
    }

    let mut tracer = Tracer::new(data, dims, starting_nesting_level, max_nesting_level);
    let mut contours = Vec::new();
    for index in 0..data.len() {
        if data[index] == 1 && !tracer.claimed[index] {
            let region = tracer.region_from(index, Polarity::Foreground, None);
            let inside_of = tracer.island_parent[index];
            contours.push(tracer.trace_node(&region, 0, inside_of));
        }
    }

    debug!(
        components = contours.len(),
        rims = tracer.next_polygon,
        width = dims.x,
        height = dims.y,
        "traced mask"
    );
    Ok(contours)
}

/// Trace with levels taken from a [`ContourConfig`].
///
/// # Errors
///
/// Returns [`ContourError::InvalidConfig`] for an invalid configuration
/// and [`ContourError::NonBinaryMask`] for a non-binary mask.
pub fn trace_with_config(
    mask: &Grid<u8>,
    config: &ContourConfig,
) -> Result<Vec<NestedContour>, ContourError> {
    config.validate()?;
    trace(
        mask,
        config.starting_nesting_level,
        config.max_nesting_level,
    )
}

/// Outer boundaries with their direct holes: ready to fill.
///
/// # Errors
///
/// Returns [`ContourError::NonBinaryMask`] for a non-binary mask.
pub fn contours_with_holes(mask: &Grid<u8>) -> Result<Vec<NestedContour>, ContourError> {
    trace(mask, 0, 1)
}

/// Outer boundaries only, with every hole treated as filled.
///
/// The voxel counts describe the filled region: `other` is zero and
/// `foreground` equals the enclosed area.
///
/// # Errors
///
/// Returns [`ContourError::NonBinaryMask`] for a non-binary mask.
pub fn contours_filled(mask: &Grid<u8>) -> Result<Vec<NestedContour>, ContourError> {
    let mut contours = trace(mask, 0, 0)?;
    for contour in &mut contours {
        let total = contour.outer.voxel_counts.total;
        contour.outer.voxel_counts = VoxelCounts::new(total, 0);
        contour.total_pixels = total;
    }
    Ok(contours)
}

/// A region plus its surroundings, held in a window one pixel larger than
/// the region's bounding box on every side.
struct Region {
    polarity: Polarity,
    /// Global coordinate of window cell 0.
    x0: i64,
    y0: i64,
    width: usize,
    height: usize,
    /// Cells belonging to the region.
    object: Vec<bool>,
    /// Cells the region encloses, itself included.
    enclosed: Vec<bool>,
    /// First region pixel in raster order.
    start: IntPoint,
    area: u64,
}

impl Region {
    fn local(&self, x: i64, y: i64) -> Option<usize> {
        let lx = usize::try_from(x - self.x0).ok()?;
        let ly = usize::try_from(y - self.y0).ok()?;
        (lx < self.width && ly < self.height).then_some(lx + ly * self.width)
    }

    fn contains(&self, p: IntPoint) -> bool {
        self.local(i64::from(p.x), i64::from(p.y))
            .is_some_and(|i| self.object[i])
    }

    fn encloses(&self, x: i64, y: i64) -> bool {
        self.local(x, y).is_some_and(|i| self.enclosed[i])
    }

    #[allow(clippy::cast_possible_wrap)]
    fn global(&self, local: usize) -> (i64, i64) {
        (
            self.x0 + (local % self.width) as i64,
            self.y0 + (local / self.width) as i64,
        )
    }

    fn len(&self) -> usize {
        self.width * self.height
    }

    /// Mask indices of the window cells flagged in `cells`.
    fn indices<'r>(&'r self, cells: &'r [bool], dims: Dims) -> impl Iterator<Item = usize> + 'r {
        (0..self.len()).filter(move |&l| cells[l]).filter_map(move |l| {
            let (x, y) = self.global(l);
            dims.to_index(x, y)
        })
    }
}

/// Per-call tracing state. Scratch buffers are indexed like the mask.
struct Tracer<'a> {
    mask: &'a [u8],
    dims: Dims,
    /// Foreground pixels already accounted for by an emitted rim.
    claimed: Vec<bool>,
    /// Number of the hole around pixels left for the top-level scan.
    island_parent: Vec<u32>,
    /// BFS visit stamps, compared against `epoch`.
    stamp: Vec<u32>,
    epoch: u32,
    next_polygon: u32,
    starting_level: u32,
    max_depth: u32,
}

impl<'a> Tracer<'a> {
    fn new(mask: &'a [u8], dims: Dims, starting_level: u32, max_depth: u32) -> Self {
        Self {
            mask,
            dims,
            claimed: vec![false; mask.len()],
            island_parent: vec![0; mask.len()],
            stamp: vec![0; mask.len()],
            epoch: 0,
            next_polygon: 0,
            starting_level,
            max_depth,
        }
    }

    fn next_epoch(&mut self) -> u32 {
        if self.epoch == u32::MAX {
            self.stamp.fill(0);
            self.epoch = 0;
        }
        self.epoch += 1;
        self.epoch
    }

    /// Collect the region containing `start_index` and work out what it
    /// encloses.
    ///
    /// The region grows through unclaimed pixels of its polarity and, given
    /// a parent, only through pixels the parent encloses.
    fn region_from(&mut self, start_index: usize, polarity: Polarity, within: Option<&Region>) -> Region {
        let value = polarity.region_value();
        let epoch = self.next_epoch();
        let mut pixels = vec![start_index];
        self.stamp[start_index] = epoch;
        let (sx, sy) = self.dims.position(start_index);
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);
        let mut head = 0;
        while head < pixels.len() {
            let (x, y) = self.dims.position(pixels[head]);
            head += 1;
            for &(dx, dy) in &RING {
                let (nx, ny) = (x + i64::from(dx), y + i64::from(dy));
                let Some(n) = self.dims.to_index(nx, ny) else {
                    continue;
                };
                if self.stamp[n] == epoch
                    || self.mask[n] != value
                    || self.claimed[n]
                    || within.is_some_and(|w| !w.encloses(nx, ny))
                {
                    continue;
                }
                self.stamp[n] = epoch;
                pixels.push(n);
                min_x = min_x.min(nx);
                min_y = min_y.min(ny);
                max_x = max_x.max(nx);
                max_y = max_y.max(ny);
            }
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (width, height) = ((max_x - min_x + 3) as usize, (max_y - min_y + 3) as usize);
        let mut region = Region {
            polarity,
            x0: min_x - 1,
            y0: min_y - 1,
            width,
            height,
            object: vec![false; width * height],
            enclosed: Vec::new(),
            start: IntPoint::new(0, 0),
            area: pixels.len() as u64,
        };
        let mut first = usize::MAX;
        for &p in &pixels {
            first = first.min(p);
            let (x, y) = self.dims.position(p);
            if let Some(local) = region.local(x, y) {
                region.object[local] = true;
            }
        }
        let (fx, fy) = self.dims.position(first);
        #[allow(clippy::cast_possible_truncation)]
        let start = IntPoint::new(fx as i32, fy as i32);
        region.start = start;

        // Everything not reachable from the window border through
        // 4-neighbours without crossing the region is enclosed by it.
        let mut reached = vec![false; region.len()];
        let mut queue = VecDeque::new();
        for local in 0..region.len() {
            let (lx, ly) = (local % width, local / width);
            if lx == 0 || ly == 0 || lx == width - 1 || ly == height - 1 {
                reached[local] = true;
                queue.push_back(local);
            }
        }
        while let Some(local) = queue.pop_front() {
            let (x, y) = region.global(local);
            for &(dx, dy) in &FOUR {
                if let Some(n) = region.local(x + i64::from(dx), y + i64::from(dy))
                    && !reached[n]
                    && !region.object[n]
                {
                    reached[n] = true;
                    queue.push_back(n);
                }
            }
        }
        region.enclosed = reached.iter().map(|&r| !r).collect();
        region
    }

    /// Pixel counts inside the region, split by the region's polarity.
    fn voxel_counts(&self, region: &Region) -> VoxelCounts {
        let value = region.polarity.region_value();
        let (same, other) = region
            .indices(&region.enclosed, self.dims)
            .fold((0u64, 0u64), |(same, other), i| {
                if self.mask[i] == value {
                    (same + 1, other)
                } else {
                    (same, other + 1)
                }
            });
        VoxelCounts::new(same, other)
    }

    /// The child regions directly inside `region`, with the window cells
    /// they enclose.
    fn child_regions(&mut self, region: &Region) -> (Vec<Region>, Vec<bool>) {
        let child_polarity = region.polarity.flipped();
        let child_value = child_polarity.region_value();
        let mut taken = vec![false; region.len()];
        let mut children = Vec::new();
        for local in 0..region.len() {
            if !region.enclosed[local] || region.object[local] || taken[local] {
                continue;
            }
            let (x, y) = region.global(local);
            let Some(index) = self.dims.to_index(x, y) else {
                continue;
            };
            if self.mask[index] != child_value || self.claimed[index] {
                continue;
            }
            let child = self.region_from(index, child_polarity, Some(region));
            for child_local in (0..child.len()).filter(|&l| child.enclosed[l]) {
                let (cx, cy) = child.global(child_local);
                if let Some(l) = region.local(cx, cy) {
                    taken[l] = true;
                }
            }
            children.push(child);
        }
        (children, taken)
    }

    /// Claim the region's pixels outside `taken`. Returns how many region
    /// pixels were left to the holes.
    fn claim_outside(&mut self, region: &Region, taken: &[bool]) -> u64 {
        let mut left = 0;
        for local in (0..region.len()).filter(|&l| region.object[l]) {
            if taken[local] {
                left += 1;
                continue;
            }
            let (x, y) = region.global(local);
            if let Some(i) = self.dims.to_index(x, y) {
                self.claimed[i] = true;
            }
        }
        left
    }

    fn trace_node(&mut self, region: &Region, depth: u32, inside_of: u32) -> NestedContour {
        self.next_polygon += 1;
        let number = self.next_polygon;

        let cap = 4 * region.len() + 8;
        let points = match region.polarity {
            Polarity::Foreground => trace_rim(|p| region.contains(p), region.start, WEST, cap),
            Polarity::Hole => trace_rim(
                |p| !region.encloses(i64::from(p.x), i64::from(p.y)),
                region.start.offset(0, -1),
                SOUTH,
                cap,
            ),
        };
        let voxel_counts = self.voxel_counts(region);

        let dims = self.dims;
        let mut area = region.area;
        let mut inner = Vec::new();
        if depth < self.max_depth {
            let (children, taken) = self.child_regions(region);
            if region.polarity == Polarity::Foreground {
                area -= self.claim_outside(region, &taken);
            }
            for child in &children {
                inner.push(self.trace_node(child, depth + 1, number));
            }
        } else if region.polarity == Polarity::Foreground {
            for i in region.indices(&region.enclosed, dims) {
                self.claimed[i] = true;
            }
        } else {
            for i in region.indices(&region.enclosed, dims) {
                if self.mask[i] == 1 && !self.claimed[i] {
                    self.island_parent[i] = number;
                }
            }
        }
        trace!(
            number,
            depth,
            points = points.len(),
            area,
            children = inner.len(),
            "traced rim"
        );

        let nested_total: u64 = inner.iter().map(|c| c.outer.voxel_counts.total).sum();
        NestedContour {
            outer: ContourRim {
                points,
                voxel_counts,
                inside_of_polygon: inside_of,
                region_area_pixels: area,
                nesting_level: self.starting_level.saturating_add(depth),
                polarity: region.polarity,
            },
            inner,
            total_pixels: voxel_counts.total - nested_total,
        }
    }
}

/// One Moore-neighbour step.
///
/// From `cur`, with the non-member neighbour in direction `back`, turn
/// clockwise until a member is found. Returns that member and the
/// direction, seen from it, of the last non-member checked.
fn moore_step<F>(member: &F, cur: IntPoint, back: usize) -> Option<(IntPoint, usize)>
where
    F: Fn(IntPoint) -> bool,
{
    (1..8).find_map(|k| {
        let dir = (back + k) % 8;
        let next = cur.offset(RING[dir].0, RING[dir].1);
        if !member(next) {
            return None;
        }
        let prev_dir = (back + k - 1) % 8;
        let prev = cur.offset(RING[prev_dir].0, RING[prev_dir].1);
        ring_direction(prev.x - next.x, prev.y - next.y).map(|b| (next, b))
    })
}

/// Walk the boundary of the member set starting at `start`, whose
/// neighbour in direction `back` is not a member.
///
/// The walk stops when it is about to repeat its first move, so a pixel
/// may appear more than once (thin parts are visited going out and coming
/// back). An isolated pixel yields just `[start]`.
fn trace_rim<F>(member: F, start: IntPoint, back: usize, cap: usize) -> Vec<IntPoint>
where
    F: Fn(IntPoint) -> bool,
{
    let Some(first) = moore_step(&member, start, back) else {
        return vec![start];
    };
    let mut chain = vec![start];
    let mut state = first;
    loop {
        let (cur, cur_back) = state;
        let Some(next) = moore_step(&member, cur, cur_back) else {
            break;
        };
        if cur == start && next == first {
            break;
        }
        chain.push(cur);
        if chain.len() > cap {
            warn!(?start, cap, "rim walk hit its step limit");
            break;
        }
        state = next;
    }
    chain
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Build a mask from rows of `#` (foreground) and `.` (background).
    fn mask(rows: &[&str]) -> Grid<u8> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let data = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        Grid::from_vec(Dims::new_2d(width, height), data).unwrap()
    }

    fn pts(coords: &[(i32, i32)]) -> Vec<IntPoint> {
        coords.iter().map(|&(x, y)| IntPoint::new(x, y)).collect()
    }

    // --- degenerate shapes ---

    #[test]
    fn empty_mask_has_no_contours() {
        let m = mask(&["....", "....", "...."]);
        assert!(contours_with_holes(&m).unwrap().is_empty());
    }

    #[test]
    fn isolated_pixel() {
        let m = mask(&["...", ".#.", "..."]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.outer.points, pts(&[(1, 1)]));
        assert_eq!(c.outer.region_area_pixels, 1);
        assert_eq!(c.outer.voxel_counts, VoxelCounts::new(1, 0));
        assert!(c.inner.is_empty());
        assert_eq!(c.total_pixels, 1);
    }

    #[test]
    fn two_isolated_pixels_are_two_components() {
        let m = mask(&["#...", "....", "...#"]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].outer.points, pts(&[(0, 0)]));
        assert_eq!(contours[1].outer.points, pts(&[(3, 2)]));
    }

    #[test]
    fn diagonal_pixels_are_one_component() {
        let m = mask(&["#..", ".#.", "..#"]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].outer.region_area_pixels, 3);
    }

    #[test]
    fn line_is_walked_out_and_back() {
        let m = mask(&[".....", ".###.", "....."]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].outer.points,
            pts(&[(1, 1), (2, 1), (3, 1), (2, 1)])
        );
        assert_eq!(contours[0].total_pixels, 3);
    }

    // --- holes ---

    #[test]
    fn diamond_with_center_hole() {
        let m = mask(&[".....", "..#..", ".#.#.", "..#..", "....."]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.outer.points, pts(&[(2, 1), (3, 2), (2, 3), (1, 2)]));
        assert_eq!(c.outer.voxel_counts.foreground, 4);
        assert_eq!(c.outer.voxel_counts.other, 1);
        assert_eq!(c.inner.len(), 1);

        let hole = &c.inner[0].outer;
        assert_eq!(hole.points, pts(&[(2, 1), (1, 2), (2, 3), (3, 2)]));
        assert_eq!(hole.voxel_counts, VoxelCounts::new(1, 0));
        assert_eq!(hole.polarity, Polarity::Hole);
        assert_eq!(hole.inside_of_polygon, 1);
        assert_eq!(c.total_pixels, 4);
    }

    #[test]
    fn ring_with_single_pixel_hole() {
        let m = mask(&[".....", ".###.", ".#.#.", ".###.", "....."]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.outer.points.len(), 8);
        assert_eq!(c.inner.len(), 1);
        assert_eq!(c.inner[0].outer.points.len(), 4);
        assert_eq!(c.total_pixels, 8);
    }

    #[test]
    fn depth_zero_fills_holes() {
        let m = mask(&[".....", ".###.", ".#.#.", ".###.", "....."]);
        let contours = trace(&m, 0, 0).unwrap();
        assert_eq!(contours.len(), 1);
        assert!(contours[0].inner.is_empty());
        assert_eq!(contours[0].total_pixels, 9);
        assert_eq!(contours[0].outer.voxel_counts, VoxelCounts::new(8, 1));

        let filled = contours_filled(&m).unwrap();
        assert_eq!(filled[0].outer.voxel_counts, VoxelCounts::new(9, 0));
        assert_eq!(filled[0].total_pixels, 9);
    }

    #[test]
    fn corner_touching_background_is_one_hole() {
        let m = mask(&["####", "#.##", "##.#", "####"]);
        let contours = contours_with_holes(&m).unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].outer.voxel_counts, VoxelCounts::new(14, 2));
        assert_eq!(contours[0].total_pixels, 14);
        assert_eq!(contours[0].inner.len(), 1);

        // Both pixels count, but the rim closes around the first one.
        let hole = &contours[0].inner[0].outer;
        assert_eq!(hole.voxel_counts, VoxelCounts::new(2, 0));
        assert_eq!(hole.region_area_pixels, 2);
        assert_eq!(hole.points, pts(&[(1, 0), (0, 1), (1, 2), (2, 1)]));
    }

    fn checkerboard() -> Grid<u8> {
        mask(&["#.#.#.#", ".#.#.#.", "#.#.#.#", ".#.#.#.", "#.#.#.#"])
    }

    #[test]
    fn checkerboard_hole_releases_corner_islands() {
        let contours = contours_with_holes(&checkerboard()).unwrap();
        assert_eq!(contours.len(), 3);

        let outer = &contours[0];
        assert_eq!(
            outer.outer.points,
            pts(&[
                (0, 0), (1, 1), (2, 0), (3, 1), (4, 0), (5, 1), (6, 0), (5, 1), (6, 2), (5, 3),
                (6, 4), (5, 3), (4, 4), (3, 3), (2, 4), (1, 3), (0, 4), (1, 3), (0, 2), (1, 1),
            ])
        );
        assert_eq!(outer.outer.voxel_counts, VoxelCounts::new(18, 7));
        assert_eq!(outer.outer.region_area_pixels, 16);
        assert_eq!(outer.total_pixels, 16);
        assert_eq!(outer.inner.len(), 1);

        let hole = &outer.inner[0].outer;
        assert_eq!(
            hole.points,
            pts(&[
                (2, 0), (1, 1), (0, 2), (1, 3), (2, 4), (3, 3),
                (4, 4), (5, 3), (6, 2), (5, 1), (4, 0), (3, 1),
            ])
        );
        assert_eq!(hole.voxel_counts, VoxelCounts::new(7, 2));
        assert_eq!(hole.inside_of_polygon, 1);

        for (island, x) in contours[1..].iter().zip([2, 4]) {
            assert_eq!(island.outer.points, pts(&[(x, 2)]));
            assert_eq!(island.outer.inside_of_polygon, 2);
            assert_eq!(island.total_pixels, 1);
            assert!(island.inner.is_empty());
        }
    }

    #[test]
    fn checkerboard_islands_nest_under_the_hole() {
        let contours = trace(&checkerboard(), 0, 10).unwrap();
        assert_eq!(contours.len(), 1);
        let hole = &contours[0].inner[0];
        assert_eq!(hole.total_pixels, 7);
        assert_eq!(hole.inner.len(), 2);
        assert!(hole.inner.iter().all(|i| i.total_pixels == 1 && i.outer.inside_of_polygon == 2));
    }

    // --- nesting ---

    /// 11x11 concentric squares: ring, gap, ring, gap, ring, center hole.
    fn concentric() -> Grid<u8> {
        mask(&[
            "###########",
            "#.........#",
            "#.#######.#",
            "#.#.....#.#",
            "#.#.###.#.#",
            "#.#.#.#.#.#",
            "#.#.###.#.#",
            "#.#.....#.#",
            "#.#######.#",
            "#.........#",
            "###########",
        ])
    }

    #[test]
    fn concentric_full_depth_counts() {
        let contours = trace(&concentric(), 0, 9).unwrap();
        assert_eq!(contours.len(), 1);

        let outer = &contours[0];
        assert_eq!(outer.outer.inside_of_polygon, 0);
        assert_eq!(outer.outer.voxel_counts, VoxelCounts::new(40 + 24 + 8, 32 + 16 + 1));
        assert_eq!(outer.total_pixels, 40);

        let gap = &outer.inner[0];
        assert_eq!(gap.outer.inside_of_polygon, 1);
        assert_eq!(gap.outer.voxel_counts, VoxelCounts::new(32 + 16 + 1, 24 + 8));

        let middle = &gap.inner[0];
        assert_eq!(middle.outer.inside_of_polygon, 2);
        assert_eq!(middle.outer.voxel_counts, VoxelCounts::new(24 + 8, 16 + 1));
        assert_eq!(middle.total_pixels, 24);

        let inner_gap = &middle.inner[0];
        assert_eq!(inner_gap.outer.inside_of_polygon, 3);
        assert_eq!(inner_gap.outer.voxel_counts, VoxelCounts::new(16 + 1, 8));

        let core = &inner_gap.inner[0];
        assert_eq!(core.outer.inside_of_polygon, 4);
        assert_eq!(core.outer.voxel_counts, VoxelCounts::new(8, 1));
        assert_eq!(core.total_pixels, 8);

        let center = &core.inner[0];
        assert_eq!(center.outer.inside_of_polygon, 5);
        assert_eq!(center.outer.voxel_counts, VoxelCounts::new(1, 0));
        assert!(center.inner.is_empty());
    }

    #[test]
    fn concentric_depth_limits() {
        let m = concentric();

        let filled = trace(&m, 0, 0).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].outer.points.len(), 40);
        assert_eq!(filled[0].total_pixels, 121);

        // Holes traced, islands left for the top-level scan.
        let one = trace(&m, 0, 1).unwrap();
        assert_eq!(one.len(), 3);
        assert_eq!(one[0].inner.len(), 1);
        assert_eq!(one[0].inner[0].outer.points.len(), 36);
        assert_eq!(one[0].total_pixels, 40);
        assert_eq!(one[1].outer.inside_of_polygon, 2);
        assert_eq!(one[1].outer.points.len(), 24);
        assert_eq!(one[1].total_pixels, 24);
        assert_eq!(one[2].outer.points.len(), 8);
        assert_eq!(one[2].inner.len(), 1);
        assert_eq!(one[2].total_pixels, 8);

        // Islands traced without their holes.
        let two = trace(&m, 0, 2).unwrap();
        assert_eq!(two.len(), 1);
        let island = &two[0].inner[0].inner[0];
        assert!(island.inner.is_empty());
        assert_eq!(island.total_pixels, 49);
    }

    #[test]
    fn islands_left_for_top_level_keep_their_hole_number() {
        let contours = contours_with_holes(&concentric()).unwrap();
        assert_eq!(contours.len(), 3);
        let expected = [
            (0, (72, 49), 1, (49, 32), 40),
            (2, (32, 17), 3, (17, 8), 24),
            (4, (8, 1), 5, (1, 0), 8),
        ];
        for (contour, (inside, counts, hole_inside, hole_counts, total)) in
            contours.iter().zip(expected)
        {
            assert_eq!(contour.outer.inside_of_polygon, inside);
            assert_eq!(contour.outer.voxel_counts, VoxelCounts::new(counts.0, counts.1));
            assert_eq!(contour.inner.len(), 1);
            let hole = &contour.inner[0].outer;
            assert_eq!(hole.inside_of_polygon, hole_inside);
            assert_eq!(hole.voxel_counts, VoxelCounts::new(hole_counts.0, hole_counts.1));
            assert_eq!(contour.total_pixels, total);
        }
    }

    #[test]
    fn starting_level_offsets_levels_not_depth() {
        let m = concentric();
        let relative = trace(&m, 1, 1).unwrap();
        assert_eq!(relative.len(), 3);
        assert_eq!(relative[0].outer.nesting_level, 1);
        assert_eq!(relative[0].inner[0].outer.nesting_level, 2);
    }

    #[test]
    fn hole_counts_match_children() {
        let contours = trace(&concentric(), 0, 9).unwrap();
        for node in contours.iter().flat_map(NestedContour::iter_depth_first) {
            if node.inner.is_empty() {
                continue;
            }
            let children: u64 = node.inner.iter().map(|c| c.outer.voxel_counts.foreground).sum();
            assert_eq!(node.outer.voxel_counts.other, children);
        }
    }

    // --- orientation ---

    #[test]
    fn outer_clockwise_hole_counterclockwise() {
        let contours = trace(&concentric(), 0, 9).unwrap();
        for node in contours.iter().flat_map(NestedContour::iter_depth_first) {
            match node.outer.polarity {
                Polarity::Foreground => assert!(node.outer.is_clockwise()),
                Polarity::Hole => assert!(!node.outer.is_clockwise()),
            }
        }
    }

    // --- errors ---

    #[test]
    fn non_binary_mask_is_rejected() {
        let m = Grid::from_vec(Dims::new_2d(2, 1), vec![0u8, 3]).unwrap();
        assert_eq!(
            contours_with_holes(&m),
            Err(ContourError::NonBinaryMask { index: 1, value: 3 })
        );
    }

    // --- moore walk ---

    #[test]
    fn ring_direction_lookup() {
        assert_eq!(ring_direction(0, -1), Some(NORTH));
        assert_eq!(ring_direction(-1, 0), Some(WEST));
        assert_eq!(ring_direction(2, 0), None);
    }
}
