//! Rim smoothing and hole merging.
//!
//! A traced rim lists boundary pixels. Smoothing turns it into a
//! floating-point path: [`pixel_outline`] walks the outer edges of those
//! pixels, and the [`SmoothingKind`] strategy may then round the corners.
//! Merging splices each hole path into its parent through a vertical
//! connector bridge, so one even-odd fill of the result reproduces the
//! structure with its holes.
//!
//! # Strategy pattern
//!
//! [`RimSmoother`] is the pluggable step; [`SmoothingKind`] selects an
//! implementation at runtime.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{FloatPoint, IntPoint};
use crate::trace::{EAST, NORTH, RING, SOUTH, WEST, ring_direction};
use crate::types::{ContourError, ContourRim, NestedContour, Polarity, SmoothedPolygon};

/// Distance from a corner at which [`SmoothingKind::Small`] cuts it.
///
/// Below half a pixel edge, so cuts never overlap and pixel centers stay
/// on the same side of the path.
pub const CORNER_CUT: f64 = 0.25;

/// Selects how a traced rim becomes a floating-point path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothingKind {
    /// Follow pixel edges exactly.
    #[default]
    None,
    /// Pixel edges with every turning corner cut at [`CORNER_CUT`].
    /// Straight runs keep their vertices.
    Small,
}

/// Trait for rim smoothing strategies.
pub trait RimSmoother {
    /// Convert rim pixels, in walk order, into a closed path.
    fn smooth(&self, points: &[IntPoint], is_counter_clockwise: bool) -> Vec<FloatPoint>;
}

impl RimSmoother for SmoothingKind {
    fn smooth(&self, points: &[IntPoint], is_counter_clockwise: bool) -> Vec<FloatPoint> {
        let outline = pixel_outline(points, is_counter_clockwise);
        match *self {
            Self::None => outline,
            Self::Small => cut_corners(&outline, CORNER_CUT),
        }
    }
}

/// Smooth one rim in isolation.
#[must_use]
pub fn smooth(rim: &ContourRim, is_counter_clockwise: bool, kind: SmoothingKind) -> Vec<FloatPoint> {
    kind.smooth(&rim.points, is_counter_clockwise)
}

/// Start corner of a pixel side, walking the pixel clockwise.
fn edge_start(p: IntPoint, side: usize) -> FloatPoint {
    let (x, y) = (f64::from(p.x), f64::from(p.y));
    match side {
        NORTH => FloatPoint::new(x - 0.5, y - 0.5),
        EAST => FloatPoint::new(x + 0.5, y - 0.5),
        SOUTH => FloatPoint::new(x + 0.5, y + 0.5),
        _ => FloatPoint::new(x - 0.5, y + 0.5),
    }
}

/// The path along the pixel edges that separate a walked rim from the
/// region on its left.
///
/// For every rim pixel the walk arrived from one neighbour and leaves to
/// another; the sides facing the neighbours swept in between belong to
/// the boundary. The walk order fixes the orientation, so
/// `counter_clockwise` only decides the order of a single pixel's corners.
#[must_use]
pub fn pixel_outline(points: &[IntPoint], counter_clockwise: bool) -> Vec<FloatPoint> {
    match points {
        [] => Vec::new(),
        [p] => {
            let mut corners: Vec<FloatPoint> =
                [NORTH, EAST, SOUTH, WEST].iter().map(|&s| edge_start(*p, s)).collect();
            if counter_clockwise {
                corners.reverse();
            }
            corners
        }
        _ => {
            let n = points.len();
            let mut outline = Vec::with_capacity(2 * n);
            for i in 0..n {
                let prev = points[(i + n - 1) % n];
                let cur = points[i];
                let next = points[(i + 1) % n];
                let Some(arrival) = ring_direction(cur.x - prev.x, cur.y - prev.y) else {
                    continue;
                };
                let (bx, by) = RING[(arrival + 7) % 8];
                let back = prev.offset(bx, by);
                let (Some(from), Some(to)) = (
                    ring_direction(back.x - cur.x, back.y - cur.y),
                    ring_direction(next.x - cur.x, next.y - cur.y),
                ) else {
                    continue;
                };
                let mut side = from;
                while side != to {
                    if side % 2 == 0 {
                        outline.push(edge_start(cur, side));
                    }
                    side = (side + 1) % 8;
                }
            }
            outline
        }
    }
}

/// Replace every turning vertex by two points `cut` along its edges.
fn cut_corners(path: &[FloatPoint], cut: f64) -> Vec<FloatPoint> {
    let n = path.len();
    if n < 3 {
        return path.to_vec();
    }
    let mut out = Vec::with_capacity(2 * n);
    for i in 0..n {
        let cur = path[i];
        let to_prev = path[(i + n - 1) % n] - cur;
        let to_next = path[(i + 1) % n] - cur;
        let (lp, ln) = (to_prev.length(), to_next.length());
        if lp == 0.0 || ln == 0.0 || to_prev.cross(to_next).abs() < 1e-12 {
            out.push(cur);
            continue;
        }
        out.push(cur + to_prev * (cut.min(lp / 2.0) / lp));
        out.push(cur + to_next * (cut.min(ln / 2.0) / ln));
    }
    out
}

/// Splice `child` into `parent` after `insert_position`.
///
/// The result is `parent[..=insert_position]`, the connection points,
/// the child rotated to begin at `child_start_position`, the connection
/// points reversed, then the rest of the parent. An insert position past
/// the end appends; the child start wraps around.
#[must_use]
pub fn merge_hole_into_parent<T: Copy>(
    parent: &[T],
    insert_position: usize,
    child: &[T],
    child_start_position: usize,
    connection_points: &[T],
) -> Vec<T> {
    let split = insert_position.saturating_add(1).min(parent.len());
    let mut merged =
        Vec::with_capacity(parent.len() + child.len() + 2 * connection_points.len());
    merged.extend_from_slice(&parent[..split]);
    merged.extend_from_slice(connection_points);
    if !child.is_empty() {
        let start = child_start_position % child.len();
        merged.extend_from_slice(&child[start..]);
        merged.extend_from_slice(&child[..start]);
    }
    merged.extend(connection_points.iter().rev().copied());
    merged.extend_from_slice(&parent[split..]);
    merged
}

/// Where the vertical line through `x` crosses segment `p1 -> p2`.
///
/// Vertical segments never cross; zero-length ones cross at their point.
#[allow(clippy::float_cmp)]
fn crossing_y(p1: FloatPoint, p2: FloatPoint, x: f64) -> Option<f64> {
    if x < p1.x.min(p2.x) || x > p1.x.max(p2.x) {
        return None;
    }
    if p1.x == p2.x {
        return (p1.y == p2.y).then_some(p1.y);
    }
    Some(p1.y + (x - p1.x) * (p2.y - p1.y) / (p2.x - p1.x))
}

/// Index `i` of the edge `contour[i] -> contour[i + 1]` (closing edge
/// included) crossed by the vertical line `x = from.x`.
///
/// With `search_for_highest_y` the nearest crossing strictly above
/// `from` (greatest `y < from.y`) wins; otherwise the topmost crossing
/// anywhere (least `y`). Vertical edges are skipped, zero-length edges
/// count as a crossing at their point, and ties go to the later index.
///
/// # Errors
///
/// Returns [`ContourError::NoIntersectingEdge`] when no edge qualifies.
pub fn find_intersecting_edge(
    contour: &[FloatPoint],
    from: FloatPoint,
    search_for_highest_y: bool,
) -> Result<usize, ContourError> {
    let n = contour.len();
    let mut best: Option<(usize, f64)> = None;
    for i in 0..n {
        let Some(y) = crossing_y(contour[i], contour[(i + 1) % n], from.x) else {
            continue;
        };
        let better = if search_for_highest_y {
            y < from.y && best.is_none_or(|(_, b)| y >= b)
        } else {
            best.is_none_or(|(_, b)| y <= b)
        };
        if better {
            best = Some((i, y));
        }
    }
    best.map(|(i, _)| i).ok_or(ContourError::NoIntersectingEdge {
        x: from.x,
        y: from.y,
    })
}

/// The point on segment `p1 -> p2` at the given `x`.
///
/// # Errors
///
/// Returns [`ContourError::SegmentDoesNotSpan`] when `x` lies outside the
/// segment's horizontal extent.
#[allow(clippy::float_cmp)]
pub fn intersect_edge_at_x(p1: FloatPoint, p2: FloatPoint, x: f64) -> Result<FloatPoint, ContourError> {
    if !(x >= p1.x.min(p2.x) && x <= p1.x.max(p2.x)) {
        return Err(ContourError::SegmentDoesNotSpan { x });
    }
    if p1.x == p2.x {
        return Ok(FloatPoint::new(x, p1.y));
    }
    let t = (x - p1.x) / (p2.x - p1.x);
    Ok(FloatPoint::new(x, (p2.y - p1.y).mul_add(t, p1.y)))
}

/// Index of the topmost point, leftmost among ties.
fn top_point(path: &[FloatPoint]) -> Option<usize> {
    (0..path.len()).min_by(|&a, &b| {
        path[a]
            .y
            .total_cmp(&path[b].y)
            .then(path[a].x.total_cmp(&path[b].x))
    })
}

fn compare_top(a: FloatPoint, b: FloatPoint) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// A closed path taking part in a merge, walked from `start`.
struct Ring {
    points: Vec<FloatPoint>,
    start: usize,
}

impl Ring {
    fn len(&self) -> usize {
        self.points.len()
    }

    /// Walk position of edge `index`.
    fn slot(&self, index: usize) -> usize {
        (index + self.len() - self.start) % self.len()
    }

    fn at_slot(&self, slot: usize) -> FloatPoint {
        self.points[(self.start + slot) % self.len()]
    }

    fn edge(&self, index: usize) -> (FloatPoint, FloatPoint) {
        (self.points[index], self.points[(index + 1) % self.len()])
    }

    /// Fraction of the way along edge `index` at which it reaches `x`.
    fn along(&self, index: usize, x: f64) -> f64 {
        let (p1, p2) = self.edge(index);
        if p1.x.total_cmp(&p2.x) == Ordering::Equal {
            0.0
        } else {
            (x - p1.x) / (p2.x - p1.x)
        }
    }
}

/// Where a hole joins the merged path: after walk position `slot` of ring
/// `host`, a fraction `along` of the way down that edge.
struct Bridge {
    host: usize,
    slot: usize,
    along: f64,
    anchor: FloatPoint,
    depth: usize,
}

/// A position in the merged path, relative to one ring. Edges sort after
/// holes bridged to the same point.
#[derive(Debug, Clone, Copy)]
struct Place {
    ring: usize,
    slot: usize,
    along: f64,
    order: usize,
}

impl Place {
    fn cmp_within(&self, other: &Self) -> Ordering {
        self.slot
            .cmp(&other.slot)
            .then(self.along.total_cmp(&other.along))
            .then(self.order.cmp(&other.order))
    }
}

#[derive(Debug, Clone, Copy)]
struct EdgeRef {
    ring: usize,
    index: usize,
    min_y: f64,
}

#[derive(Debug, Default)]
struct Column {
    /// Sorted by `min_y`.
    edges: Vec<EdgeRef>,
    max_span: f64,
}

/// Non-vertical edges of a set of rings, bucketed by the unit columns
/// their x-range touches.
struct EdgeColumns {
    columns: HashMap<i64, Column>,
}

#[allow(clippy::cast_possible_truncation)]
fn column_of(x: f64) -> i64 {
    x.floor() as i64
}

impl EdgeColumns {
    #[allow(clippy::float_cmp)]
    fn new(rings: &[Ring]) -> Self {
        let mut columns: HashMap<i64, Column> = HashMap::new();
        for (r, ring) in rings.iter().enumerate() {
            for index in 0..ring.len() {
                let (p1, p2) = ring.edge(index);
                if p1.x == p2.x && p1.y != p2.y {
                    continue;
                }
                let min_y = p1.y.min(p2.y);
                let span = p1.y.max(p2.y) - min_y;
                for c in column_of(p1.x.min(p2.x))..=column_of(p1.x.max(p2.x)) {
                    let column = columns.entry(c).or_default();
                    column.edges.push(EdgeRef { ring: r, index, min_y });
                    column.max_span = column.max_span.max(span);
                }
            }
        }
        for column in columns.values_mut() {
            column.edges.sort_by(|a, b| a.min_y.total_cmp(&b.min_y));
        }
        Self { columns }
    }
}

/// Rings being spliced, with the bridges placed so far.
struct Splicer<'a> {
    rings: &'a [Ring],
    edges: EdgeColumns,
    /// Bridge of ring `k` at `k - 1`.
    bridges: Vec<Bridge>,
}

impl Splicer<'_> {
    fn bridge(&self, ring: usize) -> &Bridge {
        &self.bridges[ring - 1]
    }

    fn depth(&self, ring: usize) -> usize {
        if ring == 0 { 0 } else { self.bridge(ring).depth }
    }

    /// The place of ring `ring`'s bridge in its host.
    fn lift(&self, ring: usize) -> Place {
        let bridge = self.bridge(ring);
        Place {
            ring: bridge.host,
            slot: bridge.slot,
            along: bridge.along,
            order: ring,
        }
    }

    fn edge_place(&self, edge: EdgeRef, x: f64) -> Place {
        let ring = &self.rings[edge.ring];
        Place {
            ring: edge.ring,
            slot: ring.slot(edge.index),
            along: ring.along(edge.index, x),
            order: usize::MAX,
        }
    }

    /// Order of two edges, crossed at `x`, in the path merged so far.
    fn path_order(&self, a: EdgeRef, b: EdgeRef, x: f64) -> Ordering {
        let (mut a, mut b) = (self.edge_place(a, x), self.edge_place(b, x));
        while a.ring != b.ring {
            if self.depth(a.ring) >= self.depth(b.ring) {
                a = self.lift(a.ring);
            } else {
                b = self.lift(b.ring);
            }
        }
        a.cmp_within(&b)
    }

    /// The edge of a ring before `before` crossed nearest above `from`.
    /// Ties go to the edge later in the path merged so far.
    fn nearest_above(&self, before: usize, from: FloatPoint) -> Option<EdgeRef> {
        let column = self.edges.columns.get(&column_of(from.x))?;
        let end = column.edges.partition_point(|e| e.min_y < from.y);
        let mut best: Option<(EdgeRef, f64)> = None;
        for &edge in column.edges[..end].iter().rev() {
            if best.is_some_and(|(_, y)| edge.min_y + column.max_span < y) {
                break;
            }
            if edge.ring >= before {
                continue;
            }
            let (p1, p2) = self.rings[edge.ring].edge(edge.index);
            let Some(y) = crossing_y(p1, p2, from.x).filter(|&y| y < from.y) else {
                continue;
            };
            let better = best.is_none_or(|(b, by)| {
                y > by || (y >= by && self.path_order(edge, b, from.x) == Ordering::Greater)
            });
            if better {
                best = Some((edge, y));
            }
        }
        best.map(|(edge, _)| edge)
    }
}

/// Splice rings `1..` into ring 0, each through a vertical bridge up to
/// the nearest edge above its start.
///
/// Rings must be in top-to-bottom order of their starts, so every bridge
/// lands on ring 0 or an earlier hole. The result matches inserting the
/// holes one by one with [`find_intersecting_edge`] and
/// [`merge_hole_into_parent`], without rescanning the growing path.
fn splice_rings(rings: &[Ring]) -> Result<Vec<FloatPoint>, ContourError> {
    let mut splicer = Splicer {
        rings,
        edges: EdgeColumns::new(rings),
        bridges: Vec::with_capacity(rings.len()),
    };
    let mut attached: Vec<Vec<usize>> = vec![Vec::new(); rings.len()];
    for (k, ring) in rings.iter().enumerate().skip(1) {
        let s = ring.at_slot(0);
        let edge = splicer
            .nearest_above(k, s)
            .ok_or(ContourError::NoIntersectingEdge { x: s.x, y: s.y })?;
        let host = &rings[edge.ring];
        let (p1, p2) = host.edge(edge.index);
        let bridge = Bridge {
            host: edge.ring,
            slot: host.slot(edge.index),
            along: host.along(edge.index, s.x),
            anchor: intersect_edge_at_x(p1, p2, s.x)?,
            depth: splicer.depth(edge.ring) + 1,
        };
        attached[edge.ring].push(k);
        splicer.bridges.push(bridge);
    }
    for list in &mut attached {
        list.sort_by(|&a, &b| splicer.lift(a).cmp_within(&splicer.lift(b)));
    }

    let total = rings.iter().map(Ring::len).sum::<usize>() + 4 * (rings.len() - 1);
    let mut merged = Vec::with_capacity(total);
    // (ring, next walk position, next attached hole)
    let mut stack = vec![(0usize, 0usize, 0usize)];
    while let Some(frame) = stack.last_mut() {
        let (r, slot, next) = *frame;
        let ring = &rings[r];
        if slot > 0
            && let Some(&k) = attached[r].get(next)
            && splicer.bridge(k).slot == slot - 1
        {
            frame.2 += 1;
            merged.push(splicer.bridge(k).anchor);
            merged.push(rings[k].at_slot(0));
            stack.push((k, 0, 0));
            continue;
        }
        if slot < ring.len() {
            merged.push(ring.at_slot(slot));
            frame.1 += 1;
            continue;
        }
        stack.pop();
        if r > 0 {
            merged.push(ring.at_slot(0));
            merged.push(splicer.bridge(r).anchor);
        }
    }
    Ok(merged)
}

/// Smooth a rim and every rim below it, splicing each child into its
/// parent from the deepest level outward.
fn merged_path(node: &NestedContour, kind: SmoothingKind) -> Result<Vec<FloatPoint>, ContourError> {
    let path = kind.smooth(&node.outer.points, node.outer.polarity == Polarity::Hole);
    if path.is_empty() {
        return Err(ContourError::EmptyContour);
    }
    if node.inner.is_empty() {
        return Ok(path);
    }

    let mut rings = Vec::with_capacity(node.inner.len() + 1);
    rings.push(Ring {
        points: path,
        start: 0,
    });
    for child in &node.inner {
        let points = merged_path(child, kind)?;
        let start = top_point(&points).ok_or(ContourError::EmptyContour)?;
        rings.push(Ring { points, start });
    }
    // Top to bottom, so a bridge never has to pass a hole that is not in
    // the path yet.
    rings[1..].sort_by(|a, b| compare_top(a.at_slot(0), b.at_slot(0)));
    splice_rings(&rings)
}

/// Smooth a traced structure and merge its holes into a single path.
///
/// # Errors
///
/// Returns [`ContourError::EmptyContour`] for a rim without points and
/// [`ContourError::NoIntersectingEdge`] if a hole has no parent edge
/// above it.
pub fn smooth_and_merge(
    contour: &NestedContour,
    kind: SmoothingKind,
) -> Result<SmoothedPolygon, ContourError> {
    let contour_points = merged_path(contour, kind)?;
    debug!(
        holes = contour.inner.len(),
        points = contour_points.len(),
        ?kind,
        "merged structure"
    );
    Ok(SmoothedPolygon {
        contour_points,
        total_pixels: contour.total_pixels,
    })
}

/// [`smooth_and_merge`] over a whole trace result.
///
/// # Errors
///
/// Fails on the first structure that [`smooth_and_merge`] rejects.
pub fn smooth_and_merge_all(
    contours: &[NestedContour],
    kind: SmoothingKind,
) -> Result<Vec<SmoothedPolygon>, ContourError> {
    contours.iter().map(|c| smooth_and_merge(c, kind)).collect()
}
