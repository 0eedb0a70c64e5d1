//! Polygon rasterization and hole flood filling.
//!
//! Polygons are single closed paths in the coordinate space of pixel
//! centers, possibly self-touching (the bridge construction produced by
//! [`crate::smooth`]). A pixel is written when its center is inside by
//! even-odd crossing parity, or lies within [`BOUNDARY_TOLERANCE`] of an
//! edge.

use std::collections::VecDeque;

use rayon::prelude::*;
use tracing::debug;

use crate::geometry::{BoundingBox, FloatPoint, IntPoint, point_on_line};
use crate::grid::Grid;
use crate::types::{PointPosition, SmoothedPolygon};

/// Distance from an edge within which a point counts as on the boundary.
pub const BOUNDARY_TOLERANCE: f64 = 0.01;

/// Axis-aligned bounds of a polygon, `None` when it has no points.
#[must_use]
pub fn bounding_box(polygon: &[FloatPoint]) -> Option<BoundingBox> {
    BoundingBox::from_points(polygon.iter().copied())
}

/// Where `point` lies relative to a closed polygon.
///
/// The closing edge from the last point back to the first is implied.
/// Passing the polygon's [`bounding_box`] skips the edge walk for points
/// clearly outside.
#[must_use]
pub fn classify(polygon: &[FloatPoint], point: FloatPoint, bounds: Option<&BoundingBox>) -> PointPosition {
    let n = polygon.len();
    if n == 0 {
        return PointPosition::Outside;
    }
    if bounds.is_some_and(|b| !b.contains_with_margin(point, BOUNDARY_TOLERANCE)) {
        return PointPosition::Outside;
    }

    let edges = || (0..n).map(|i| (polygon[i], polygon[(i + 1) % n]));
    if edges().any(|(a, b)| point_on_line(a, b, point, BOUNDARY_TOLERANCE)) {
        return PointPosition::Boundary;
    }

    let crossings = edges()
        .filter_map(|(a, b)| crossing_x(a, b, point.y))
        .filter(|&x| point.x < x)
        .count();
    if crossings % 2 == 1 {
        PointPosition::Inside
    } else {
        PointPosition::Outside
    }
}

/// Where edge `a -> b` crosses the horizontal line at `y`, half-open in y
/// so a vertex shared by two edges is counted once.
fn crossing_x(a: FloatPoint, b: FloatPoint, y: f64) -> Option<f64> {
    ((a.y > y) != (b.y > y)).then(|| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
}

/// Rows of the grid whose centers fall in `[lo, hi]` (polygon space).
#[allow(clippy::cast_possible_truncation)]
fn row_range(lo: f64, hi: f64, origin: f64, len: usize) -> Option<(usize, usize)> {
    let first = (lo - origin).ceil().max(0.0);
    #[allow(clippy::cast_precision_loss)]
    let last = (hi - origin).floor().min(len as f64 - 1.0);
    if !(first <= last) {
        return None;
    }
    #[allow(clippy::cast_sign_loss)]
    let range = (first as usize, last as usize);
    Some(range)
}

/// Rasterize `polygon` into slice 0 of `grid`.
///
/// Grid pixel `(gx, gy)` is tested at the polygon-space point
/// `(gx + origin_x, gy + origin_y)`. Every pixel that [`classify`] would
/// not call [`PointPosition::Outside`] is set to `value`; pixels outside
/// the grid are skipped. Work is proportional to the polygon's edge spans
/// and the filled area, not to the grid size.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn fill<T: Copy>(polygon: &[FloatPoint], grid: &mut Grid<T>, origin_x: f64, origin_y: f64, value: T) {
    let n = polygon.len();
    let Some(bounds) = bounding_box(polygon) else {
        return;
    };
    let (dim_x, dim_y) = (grid.dim_x(), grid.dim_y());
    if dim_x == 0 || dim_y == 0 {
        return;
    }
    let edges = || (0..n).map(|i| (polygon[i], polygon[(i + 1) % n]));

    // Interior by scanline parity.
    if let Some((row0, row1)) = row_range(bounds.y, bounds.max_y(), origin_y, dim_y) {
        let mut rows: Vec<Vec<(FloatPoint, FloatPoint)>> = vec![Vec::new(); row1 - row0 + 1];
        for (a, b) in edges() {
            if let Some((r0, r1)) = row_range(a.y.min(b.y), a.y.max(b.y), origin_y, dim_y) {
                for gy in r0.max(row0)..=r1.min(row1) {
                    rows[gy - row0].push((a, b));
                }
            }
        }
        let mut xs = Vec::new();
        for (offset, bucket) in rows.iter().enumerate() {
            let gy = row0 + offset;
            let py = gy as f64 + origin_y;
            xs.clear();
            xs.extend(bucket.iter().filter_map(|&(a, b)| crossing_x(a, b, py)));
            xs.sort_by(f64::total_cmp);
            for span in xs.chunks_exact(2) {
                let (enter, leave) = (span[0], span[1]);
                let Some((c0, c1)) = row_range(enter, leave, origin_x, dim_x) else {
                    continue;
                };
                for gx in c0..=c1 {
                    let px = gx as f64 + origin_x;
                    if enter <= px && px < leave {
                        grid.set(gx as i64, gy as i64, value);
                    }
                }
            }
        }
    }

    // Pixel centers on an edge.
    let tol = BOUNDARY_TOLERANCE;
    for (a, b) in edges() {
        let Some((r0, r1)) = row_range(a.y.min(b.y) - tol, a.y.max(b.y) + tol, origin_y, dim_y) else {
            continue;
        };
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        for gy in r0..=r1 {
            let py = gy as f64 + origin_y;
            let (mut lo, mut hi) = (a.x.min(b.x), a.x.max(b.x));
            if dy.abs() > f64::EPSILON {
                let t0 = ((py - tol - a.y) / dy).clamp(0.0, 1.0);
                let t1 = ((py + tol - a.y) / dy).clamp(0.0, 1.0);
                let (xa, xb) = (a.x + t0 * dx, a.x + t1 * dx);
                lo = xa.min(xb);
                hi = xa.max(xb);
            }
            let Some((c0, c1)) = row_range(lo - tol, hi + tol, origin_x, dim_x) else {
                continue;
            };
            for gx in c0..=c1 {
                let p = FloatPoint::new(gx as f64 + origin_x, py);
                if point_on_line(a, b, p, tol) {
                    grid.set(gx as i64, gy as i64, value);
                }
            }
        }
    }
}

/// Rasterize every polygon into `grid` with its origin at the grid origin.
pub fn fill_all<T: Copy>(polygons: &[SmoothedPolygon], grid: &mut Grid<T>, value: T) {
    for polygon in polygons {
        fill(&polygon.contour_points, grid, 0.0, 0.0, value);
    }
    debug!(polygons = polygons.len(), "filled polygons");
}

/// Integer points on the segment between `p1` and `p2`, inclusive.
///
/// The walk always starts from the lexicographically smaller end, so both
/// argument orders give the same sequence. Each step advances the major
/// axis by one; the minor axis rounds half toward the start.
#[must_use]
pub fn points_on_line(p1: IntPoint, p2: IntPoint) -> Vec<IntPoint> {
    let (start, end) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
    let dx = i64::from(end.x) - i64::from(start.x);
    let dy = i64::from(end.y) - i64::from(start.y);
    let steps = dx.abs().max(dy.abs());
    if steps == 0 {
        return vec![start];
    }
    // ceil((2 * num - steps) / (2 * steps)), i.e. num / steps rounded half down.
    let along = |delta: i64, i: i64| -(-(2 * delta * i - steps)).div_euclid(2 * steps);
    (0..=steps)
        .filter_map(|i| {
            let x = i32::try_from(i64::from(start.x) + along(dx, i)).ok()?;
            let y = i32::try_from(i64::from(start.y) + along(dy, i)).ok()?;
            Some(IntPoint::new(x, y))
        })
        .collect()
}

/// Set every background pixel of one slice that the slice border cannot
/// reach through 4-connected background.
fn fill_slice_holes(slice: &mut [u8], dim_x: usize, dim_y: usize) -> usize {
    let mut reached = vec![false; slice.len()];
    let mut queue = VecDeque::new();
    let mut seed = |x: usize, y: usize, queue: &mut VecDeque<usize>| {
        let i = x + y * dim_x;
        if slice[i] == 0 && !reached[i] {
            reached[i] = true;
            queue.push_back(i);
        }
    };
    for x in 0..dim_x {
        seed(x, 0, &mut queue);
        seed(x, dim_y - 1, &mut queue);
    }
    for y in 0..dim_y {
        seed(0, y, &mut queue);
        seed(dim_x - 1, y, &mut queue);
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % dim_x, i / dim_x);
        if x > 0 {
            seed(x - 1, y, &mut queue);
        }
        if x + 1 < dim_x {
            seed(x + 1, y, &mut queue);
        }
        if y > 0 {
            seed(x, y - 1, &mut queue);
        }
        if y + 1 < dim_y {
            seed(x, y + 1, &mut queue);
        }
    }
    let mut filled = 0;
    for (value, reached) in slice.iter_mut().zip(&reached) {
        if *value == 0 && !reached {
            *value = 1;
            filled += 1;
        }
    }
    filled
}

/// Fill enclosed background in every Z slice independently.
///
/// A background pixel becomes `1` when no 4-connected background path
/// leads from it to the border of its slice. For a binary slice this is
/// the same pixel set as filling the outer rims of
/// [`crate::trace::contours_with_holes`]. Slices run in parallel.
pub fn flood_fill_holes(volume: &mut Grid<u8>) {
    let dims = volume.dims();
    if dims.is_empty() {
        return;
    }
    let filled: usize = volume
        .as_mut_slice()
        .par_chunks_mut(dims.slice_len())
        .map(|slice| fill_slice_holes(slice, dims.x, dims.y))
        .sum();
    debug!(slices = dims.z, filled, "flood filled holes");
}

/// Fill background that cannot reach any face of the volume through
/// 6-connected background.
///
/// Unlike [`flood_fill_holes`], background may escape through neighbouring
/// slices.
pub fn flood_fill_holes_3d(volume: &mut Grid<u8>) {
    let dims = volume.dims();
    if dims.is_empty() {
        return;
    }
    let data = volume.as_mut_slice();
    let mut reached = vec![false; data.len()];
    let mut queue = VecDeque::new();
    for z in 0..dims.z {
        for y in 0..dims.y {
            for x in 0..dims.x {
                let on_face = x == 0
                    || y == 0
                    || z == 0
                    || x + 1 == dims.x
                    || y + 1 == dims.y
                    || z + 1 == dims.z;
                let i = dims.index(x, y, z);
                if on_face && data[i] == 0 {
                    reached[i] = true;
                    queue.push_back((x, y, z));
                }
            }
        }
    }
    while let Some((x, y, z)) = queue.pop_front() {
        let neighbours = [
            (x.checked_sub(1), Some(y), Some(z)),
            (Some(x + 1).filter(|&v| v < dims.x), Some(y), Some(z)),
            (Some(x), y.checked_sub(1), Some(z)),
            (Some(x), Some(y + 1).filter(|&v| v < dims.y), Some(z)),
            (Some(x), Some(y), z.checked_sub(1)),
            (Some(x), Some(y), Some(z + 1).filter(|&v| v < dims.z)),
        ];
        for (nx, ny, nz) in neighbours {
            let (Some(nx), Some(ny), Some(nz)) = (nx, ny, nz) else {
                continue;
            };
            let i = dims.index(nx, ny, nz);
            if data[i] == 0 && !reached[i] {
                reached[i] = true;
                queue.push_back((nx, ny, nz));
            }
        }
    }
    let mut filled = 0_usize;
    for (value, reached) in data.iter_mut().zip(&reached) {
        if *value == 0 && !reached {
            *value = 1;
            filled += 1;
        }
    }
    debug!(filled, "flood filled enclosed volume");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::Dims;

    fn pt(x: f64, y: f64) -> FloatPoint {
        FloatPoint::new(x, y)
    }

    fn poly(coords: &[(f64, f64)]) -> Vec<FloatPoint> {
        coords.iter().map(|&(x, y)| pt(x, y)).collect()
    }

    fn filled(polygon: &[FloatPoint], x: usize, y: usize) -> Vec<u8> {
        let mut grid = Grid::<u8>::new_2d(x, y);
        fill(polygon, &mut grid, 0.0, 0.0, 1);
        grid.into_vec()
    }

    fn rows(rows: &[&str]) -> Vec<u8> {
        rows.iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'1')))
            .collect()
    }

    // --- classify ---

    #[test]
    fn square_edges_and_interior() {
        let square = poly(&[(1.0, 1.0), (10.0, 1.0), (10.0, 10.0), (1.0, 10.0)]);
        let bounds = bounding_box(&square);
        let bounds = bounds.as_ref();
        assert_eq!(classify(&square, pt(1.0, 5.0), bounds), PointPosition::Boundary);
        assert_eq!(classify(&square, pt(5.0, 10.0), bounds), PointPosition::Boundary);
        assert_eq!(classify(&square, pt(5.0, 5.0), bounds), PointPosition::Inside);
        assert_eq!(classify(&square, pt(11.0, 5.0), bounds), PointPosition::Outside);
    }

    #[test]
    fn repeated_collinear_points() {
        let mut coords = vec![(1.0, 1.0), (10.0, 1.0), (10.0, 10.0)];
        coords.extend((1..10).rev().map(|x| (f64::from(x), 10.0)));
        coords.extend([(1.0, 9.0), (1.0, 8.0), (1.0, 7.0), (1.0, 3.0), (1.0, 2.0)]);
        assert_eq!(classify(&poly(&coords), pt(5.0, 5.0), None), PointPosition::Inside);
    }

    #[test]
    fn degenerate_point_polygon() {
        let dot = poly(&[(1.0, 1.0), (1.0, 1.0)]);
        assert_eq!(classify(&dot, pt(1.0, 1.0), None), PointPosition::Boundary);
        assert_eq!(classify(&dot, pt(1.0001, 1.00001), None), PointPosition::Boundary);
        for (x, y) in [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (1, 2), (0, 2), (0, 1)] {
            assert_eq!(
                classify(&dot, pt(f64::from(x), f64::from(y)), None),
                PointPosition::Outside,
                "({x}, {y})"
            );
        }
    }

    #[test]
    fn notched_polygon() {
        let notched = poly(&[
            (1.0, 1.0),
            (2.0, 1.0),
            (2.0, 2.0),
            (3.0, 2.0),
            (4.0, 2.0),
            (4.0, 1.0),
            (5.0, 1.0),
            (5.0, 4.0),
            (3.0, 3.0),
            (1.0, 4.0),
            (1.0, 1.0),
        ]);
        let bounds = bounding_box(&notched);
        let bounds = bounds.as_ref();
        assert_eq!(classify(&notched, pt(1.0, 1.0), bounds), PointPosition::Boundary);
        assert_eq!(classify(&notched, pt(3.5, 1.5), bounds), PointPosition::Outside);
        assert_eq!(classify(&notched, pt(2.0, 4.0), bounds), PointPosition::Outside);
        assert_eq!(classify(&notched, pt(2.0, 1.0), bounds), PointPosition::Boundary);
    }

    #[test]
    fn triangle_closing_edge() {
        let triangle = poly(&[(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (1.0, 1.0)]);
        assert_eq!(classify(&triangle, pt(1.5, 1.5), None), PointPosition::Boundary);
        assert_eq!(classify(&triangle, pt(1.6, 1.6), None), PointPosition::Boundary);
        assert_eq!(classify(&triangle, pt(1.6, 1.5), None), PointPosition::Outside);
    }

    fn figure_of_eight() -> Vec<FloatPoint> {
        poly(&[
            (2.0, 1.0),
            (3.0, 2.0),
            (3.0, 6.0),
            (3.0, 6.0),
            (5.0, 6.0),
            (5.0, 3.0),
            (2.0, 4.0),
            (1.0, 2.0),
            (2.0, 1.0),
        ])
    }

    #[test]
    fn figure_of_eight_lobes() {
        let eight = figure_of_eight();
        assert_eq!(classify(&eight, pt(2.0, 3.0), None), PointPosition::Inside);
        assert_eq!(classify(&eight, pt(4.0, 4.0), None), PointPosition::Inside);
        assert_eq!(classify(&eight, pt(4.0, 2.0), None), PointPosition::Outside);
    }

    #[test]
    fn near_vertices_are_boundary() {
        let quad = poly(&[
            (0.994_356, 1.001_363_056_98),
            (3.000_242_5, 0.999_245_25),
            (2.999_235_236, 2.999_252_346),
            (1.001_353_57, 3.001_232_363),
        ]);
        let bounds = bounding_box(&quad);
        for (x, y) in [(1, 1), (2, 1), (3, 1), (3, 2), (3, 3), (2, 3), (1, 3), (1, 2)] {
            assert_eq!(
                classify(&quad, pt(f64::from(x), f64::from(y)), bounds.as_ref()),
                PointPosition::Boundary,
                "({x}, {y})"
            );
        }
    }

    #[test]
    fn empty_polygon_is_outside() {
        assert_eq!(classify(&[], pt(0.0, 0.0), None), PointPosition::Outside);
    }

    // --- fill ---

    #[test]
    fn fill_covering_square() {
        let square = poly(&[(-0.5, -0.5), (5.5, -0.5), (5.5, 5.5), (-0.5, 5.5)]);
        assert!(filled(&square, 5, 5).iter().all(|&v| v == 1));
    }

    #[test]
    fn fill_inner_square() {
        let square = poly(&[(0.1, 0.1), (3.9, 0.1), (3.9, 3.9), (0.1, 3.9)]);
        let expected = rows(&["00000", "01110", "01110", "01110", "00000"]);
        assert_eq!(filled(&square, 5, 5), expected);
    }

    #[test]
    fn fill_with_vertex_far_outside_grid() {
        let square = poly(&[(-10.5, -10.5), (5.5, -0.5), (5.5, 5.5), (-0.5, 5.5)]);
        assert!(filled(&square, 5, 5).iter().all(|&v| v == 1));
    }

    #[test]
    fn fill_figure_of_eight() {
        let eight: Vec<FloatPoint> = figure_of_eight().into_iter().map(|p| p - pt(0.5, 0.5)).collect();
        let expected = rows(&[
            "000000", "011000", "011000", "001110", "000110", "000110", "000000",
        ]);
        assert_eq!(filled(&eight, 6, 7), expected);
    }

    #[test]
    fn fill_whole_grid_outline() {
        let outline = poly(&[(-0.5, -0.5), (5.5, -0.5), (5.5, 6.5), (-0.5, 6.5), (-0.5, -0.5)]);
        assert!(filled(&outline, 6, 7).iter().all(|&v| v == 1));
    }

    #[test]
    fn fill_single_pixel_line() {
        let line = poly(&[(1.0, 1.0), (3.0, 1.0)]);
        let expected = rows(&["00000", "01110", "00000"]);
        assert_eq!(filled(&line, 5, 3), expected);
    }

    #[test]
    fn fill_thin_diamond_hits_only_boundary_pixels() {
        let diamond = poly(&[
            (2.0, 0.9),
            (3.1, 2.0),
            (2.0, 3.1),
            (0.9, 2.0),
            (2.0, 0.9),
            (1.1, 2.0),
            (2.0, 2.9),
            (2.9, 2.0),
            (2.0, 1.1),
        ]);
        let expected = rows(&["00000", "00100", "01010", "00100", "00000"]);
        assert_eq!(filled(&diamond, 5, 5), expected);
    }

    #[test]
    fn fill_sliver_on_large_grid() {
        let sliver = poly(&[
            (0.0, 0.0),
            (1999.0, 1999.0),
            (1999.0, 1999.000_001),
            (0.0, 0.000_001),
        ]);
        let mut grid = Grid::<u8>::new_2d(2000, 2000);
        fill(&sliver, &mut grid, 0.0, 0.0, 1);
        assert_eq!(grid.count(1), 2000);
        assert_eq!(grid.get(1000, 1000), Some(1));
        assert_eq!(grid.get(1000, 1001), Some(0));
    }

    #[test]
    fn fill_respects_origin() {
        let square = poly(&[(10.0, 20.0), (12.0, 20.0), (12.0, 21.0), (10.0, 21.0)]);
        let mut grid = Grid::<u8>::new_2d(4, 3);
        fill(&square, &mut grid, 9.0, 19.0, 7);
        let expected: Vec<u8> = rows(&["0000", "0111", "0111"]).iter().map(|v| v * 7).collect();
        assert_eq!(grid.into_vec(), expected);
    }

    #[test]
    fn fill_matches_classify() {
        let eight = figure_of_eight();
        let mut grid = Grid::<u8>::new_2d(7, 8);
        fill(&eight, &mut grid, 0.0, 0.0, 1);
        for y in 0..8 {
            for x in 0..7 {
                let expected = classify(&eight, pt(f64::from(x), f64::from(y)), None) != PointPosition::Outside;
                assert_eq!(grid.get(i64::from(x), i64::from(y)) == Some(1), expected, "({x}, {y})");
            }
        }
    }

    // --- points_on_line ---

    #[test]
    fn diagonal_line_is_symmetric() {
        let expected: Vec<IntPoint> = [(0, 0), (0, 1), (1, 2), (1, 3), (2, 4)]
            .iter()
            .map(|&(x, y)| IntPoint::new(x, y))
            .collect();
        let (a, b) = (IntPoint::new(0, 0), IntPoint::new(2, 4));
        assert_eq!(points_on_line(a, b), expected);
        assert_eq!(points_on_line(b, a), expected);
    }

    #[test]
    fn straight_line_is_symmetric() {
        let expected: Vec<IntPoint> = (1..=4).map(|x| IntPoint::new(x, 1)).collect();
        let (a, b) = (IntPoint::new(1, 1), IntPoint::new(4, 1));
        assert_eq!(points_on_line(a, b), expected);
        assert_eq!(points_on_line(b, a), expected);
    }

    #[test]
    fn line_of_one_point() {
        let p = IntPoint::new(3, -2);
        assert_eq!(points_on_line(p, p), vec![p]);
    }

    // --- flood fill ---

    #[test]
    fn flood_fill_each_slice() {
        let mut volume = Grid::<u8>::new(Dims::new_3d(3, 3, 3));
        for z in 0..3 {
            for (x, y) in [(1, 0), (0, 1), (2, 1), (1, 2)] {
                volume.set_3d(x, y, z, 1);
            }
        }
        let mut expected = volume.clone();
        for z in 0..3 {
            expected.set_3d(1, 1, z, 1);
        }
        flood_fill_holes(&mut volume);
        assert_eq!(volume, expected);
    }

    #[test]
    fn flood_fill_column_through_slices() {
        let mut volume = Grid::filled(Dims::new_3d(3, 3, 3), 1_u8);
        for z in 0..3 {
            volume.set_3d(1, 1, z, 0);
        }
        let mut per_slice = volume.clone();
        flood_fill_holes(&mut per_slice);
        assert!(per_slice.as_slice().iter().all(|&v| v == 1));

        // The column touches the top and bottom faces.
        let mut connected = volume.clone();
        flood_fill_holes_3d(&mut connected);
        assert_eq!(connected, volume);
    }

    #[test]
    fn flood_fill_3d_enclosed_cell() {
        let mut volume = Grid::filled(Dims::new_3d(3, 3, 3), 1_u8);
        volume.set_3d(1, 1, 1, 0);
        flood_fill_holes_3d(&mut volume);
        assert!(volume.as_slice().iter().all(|&v| v == 1));
    }

    #[test]
    fn flood_fill_leaves_open_background() {
        let mut grid = Grid::from_vec(
            Dims::new_2d(5, 4),
            rows(&["11111", "10001", "10001", "11011"]),
        )
        .unwrap();
        let before = grid.clone();
        flood_fill_holes(&mut grid);
        assert_eq!(grid, before);
    }
}
