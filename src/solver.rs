// Force-directed label anti-overlap solver.
//
// Labels start centered on their host element and are pushed apart by an
// iterative simulation: overlapping boxes repel, free labels are pulled back
// toward their host, velocities decay under friction, and every box is kept
// inside the viewport. The loop exits on the first full pass without an
// overlap or leader-line crossing event, or at `max_iter`.
//
// All force math runs in a normalized working space where the viewport maps
// to the unit square, so the tuning constants below are independent of the
// chart's pixel dimensions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RepelConfig;
use crate::geometry::{segments_intersect, Point, Rect};

/// Overlap count beyond which an item is considered hopelessly crowded.
pub const MAX_OVERLAPS: u32 = 10;
/// Iteration at which crowded items are frozen for the rest of the solve.
pub const FREEZE_CHECK_ITERATION: u32 = 2;
/// Leader-line crossings are resolved every this many iterations (and on
/// every overlap-free pass).
pub const CROSSING_CHECK_INTERVAL: u32 = 10;
/// Stuck-pair detection runs every this many iterations.
pub const STUCK_CHECK_INTERVAL: u32 = 100;
/// Per-iteration decay applied to both force magnitudes (simulated cooling).
pub const FORCE_COOLING: f32 = 0.9999;
/// Label-host repulsion is weaker than label-label repulsion by this factor.
pub const REPEL_FORCE_FACTOR: f32 = 0.3;
/// Multiplier on `force_pull` for the back-to-host attraction.
pub const PULL_FORCE_FACTOR: f32 = 100.0;
/// Floor on squared center distance in the repulsion formula; caps the
/// force when two centers are (near) coincident.
pub const MIN_REPEL_DIST_SQ: f32 = 0.0004;
/// Cross-product magnitude below which two host-to-label vectors count as
/// colinear when judging a wedged pair.
pub const COLINEAR_EPS: f32 = 1e-5;
/// Scale applied to the escape displacement that breaks a wedged pair.
pub const STUCK_ESCAPE_SCALE: f32 = 10.0;

/// One label participating in the solve.
///
/// `anchor` and `rect` are rewritten in place with the resolved position;
/// `host_rect` is the bounding box of the element the label belongs to
/// (already transformed to pixel space) and is only read.
#[derive(Debug, Clone)]
pub struct RepelLabel {
    pub anchor: Point,
    pub rect: Rect,
    pub host_rect: Rect,
}

/// Pixel-space viewport extent labels must stay within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub lower: f32,
    pub upper: f32,
}

impl Bounds {
    pub fn new(left: f32, right: f32, lower: f32, upper: f32) -> Self {
        Self {
            left,
            right,
            lower,
            upper,
        }
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepelOutcome {
    /// Iterations actually run (0 for an empty label set).
    pub iterations: u32,
    /// True when the final pass saw no overlap or crossing events; false
    /// means the solve hit `max_iter` with a best-effort layout.
    pub converged: bool,
}

/// Per-axis affine map between pixel space and the unit working space.
#[derive(Debug, Clone, Copy)]
struct AxisScale {
    offset: f32,
    scale: f32,
}

impl AxisScale {
    /// A zero-extent axis gets the identity map instead of dividing by zero.
    fn new(lo: f32, hi: f32) -> Self {
        let span = hi - lo;
        if span == 0.0 || !span.is_finite() {
            Self {
                offset: 0.0,
                scale: 1.0,
            }
        } else {
            Self {
                offset: lo,
                scale: span,
            }
        }
    }

    fn to_working(self, v: f32) -> f32 {
        (v - self.offset) / self.scale
    }

    fn to_pixel(self, v: f32) -> f32 {
        v * self.scale + self.offset
    }
}

/// Working state for one label. Replaces the original's four parallel
/// arrays with a single struct per index.
#[derive(Debug, Clone)]
struct Item {
    rect: Rect,
    anchor: Point,
    host_rect: Rect,
    host_center: Point,
    velocity: Point,
    overlap_count: u32,
    frozen: bool,
    /// Whether the last bounds clamp had to move this item. A pinned label
    /// overlapping two hosts is trapped the same way a colinear wedge is.
    pinned: bool,
}

impl Item {
    /// The one mutation primitive: rect and anchor always move by the same
    /// delta, so they can never drift apart.
    fn move_by(&mut self, delta: Point) {
        self.rect.translate(delta);
        self.anchor += delta;
    }
}

/// Repulsion between two centers: directed from `repeller` toward `from`,
/// magnitude `factor / d2` along the normalized offset, with `d2` floored
/// so coincident centers produce a large finite push instead of infinity.
fn repel_force(from: Point, repeller: Point, factor: f32) -> Point {
    let offset = from - repeller;
    let d2 = (offset.x * offset.x + offset.y * offset.y).max(MIN_REPEL_DIST_SQ);
    offset * (1.0 / d2.sqrt()) * (factor / d2)
}

/// Spring pull of `from` toward `toward`, proportional to the offset.
fn pull_force(toward: Point, from: Point, factor: f32) -> Point {
    (toward - from) * factor
}

/// Judge whether a label sitting between its own host and a neighbor's host
/// is geometrically wedged: the two host-to-label vectors are near colinear,
/// so plain repulsion can only slide it along the line joining the hosts.
fn is_wedged(label_center: Point, own_host: Point, other_host: Point) -> bool {
    let v1 = label_center - own_host;
    let v2 = other_host - label_center;
    (v1.x * v2.y - v2.x * v1.y).abs() < COLINEAR_EPS
}

/// Clamp an item's rect into the given ranges, snapping to the edge. The
/// anchor follows by the same delta; `pinned` records whether the clamp had
/// to intervene.
fn clamp_to_bounds(item: &mut Item, x_lim: (f32, f32), y_lim: (f32, f32)) {
    let rect = item.rect;
    let mut delta = Point::ZERO;
    if rect.x < x_lim.0 {
        delta.x = x_lim.0 - rect.x;
    } else if rect.x + rect.width > x_lim.1 {
        delta.x = x_lim.1 - rect.width - rect.x;
    }
    if rect.y < y_lim.0 {
        delta.y = y_lim.0 - rect.y;
    } else if rect.y + rect.height > y_lim.1 {
        delta.y = y_lim.1 - rect.height - rect.y;
    }
    item.pinned = delta != Point::ZERO;
    if item.pinned {
        item.move_by(delta);
    }
}

/// Remove label overlaps by force, using a seeded (or entropy-seeded) RNG
/// from the config.
pub fn shift_layout_by_force(
    labels: &mut [RepelLabel],
    bounds: Bounds,
    config: &RepelConfig,
) -> RepelOutcome {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    shift_layout_by_force_with_rng(labels, bounds, config, &mut rng)
}

/// Remove label overlaps by force with a caller-supplied random source.
///
/// Randomness only seeds the initial jitter and the stuck-pair coin flips,
/// so identical inputs with an identical RNG state produce bitwise
/// identical output.
pub fn shift_layout_by_force_with_rng<R: Rng>(
    labels: &mut [RepelLabel],
    bounds: Bounds,
    config: &RepelConfig,
    rng: &mut R,
) -> RepelOutcome {
    if labels.is_empty() {
        return RepelOutcome {
            iterations: 0,
            converged: true,
        };
    }

    let xs = AxisScale::new(bounds.left, bounds.right);
    let ys = AxisScale::new(bounds.lower, bounds.upper);

    let (x_lo, x_hi) = config.x_bounds.unwrap_or((bounds.left, bounds.right));
    let (y_lo, y_hi) = config.y_bounds.unwrap_or((bounds.lower, bounds.upper));
    let x_lim = (xs.to_working(x_lo), xs.to_working(x_hi));
    let y_lim = (ys.to_working(y_lo), ys.to_working(y_hi));

    // Geometry adapter + normalizer: snapshot every label into working
    // space. Host rects are copied, never written back.
    let mut items: Vec<Item> = labels
        .iter()
        .map(|label| {
            let rect = Rect::new(
                xs.to_working(label.rect.x),
                ys.to_working(label.rect.y),
                label.rect.width / xs.scale,
                label.rect.height / ys.scale,
            );
            let host_rect = Rect::new(
                xs.to_working(label.host_rect.x),
                ys.to_working(label.host_rect.y),
                label.host_rect.width / xs.scale,
                label.host_rect.height / ys.scale,
            );
            let anchor = Point::new(xs.to_working(label.anchor.x), ys.to_working(label.anchor.y));
            Item {
                rect,
                anchor,
                host_rect,
                host_center: host_rect.center(),
                velocity: Point::ZERO,
                overlap_count: 0,
                frozen: false,
                pinned: false,
            }
        })
        .collect();

    // Initializer: center each rect on its host, then jitter by a sub-pixel
    // random offset so coincident labels don't deadlock at zero force.
    for item in &mut items {
        let recenter = item.host_center - item.rect.center();
        item.move_by(recenter);
        let jitter = Point::new(
            rng.gen_range(-0.5..0.5) / xs.scale,
            rng.gen_range(-0.5..0.5) / ys.scale,
        );
        item.move_by(jitter);
    }

    let n = items.len();
    let mut force_push = config.force_push;
    let mut force_pull = config.force_pull;
    let mut iter: u32 = 0;
    let mut total_overlaps: u32 = 1;

    while total_overlaps > 0 && iter < config.max_iter {
        iter += 1;
        total_overlaps = 0;
        force_push *= FORCE_COOLING;
        force_pull *= FORCE_COOLING;

        for i in 0..n {
            // Freeze check uses the previous iteration's overlap count.
            if iter == FREEZE_CHECK_ITERATION && items[i].overlap_count > MAX_OVERLAPS {
                items[i].frozen = true;
            }
            if items[i].frozen {
                continue;
            }
            items[i].overlap_count = 0;

            let mut force = Point::ZERO;
            let mut i_overlaps = false;
            let ci = items[i].rect.center();

            for j in 0..n {
                if j == i {
                    if items[i].rect.intersects(&items[i].host_rect) {
                        total_overlaps += 1;
                        i_overlaps = true;
                        items[i].overlap_count += 1;
                        force += repel_force(ci, items[i].host_center, force_push * REPEL_FORCE_FACTOR);
                    }
                } else if items[j].frozen {
                    // Frozen items no longer move but still repel.
                    if items[i].rect.intersects(&items[j].host_rect) {
                        total_overlaps += 1;
                        i_overlaps = true;
                        items[i].overlap_count += 1;
                        force += repel_force(ci, items[j].host_center, force_push * REPEL_FORCE_FACTOR);
                    }
                } else {
                    let cj = items[j].rect.center();
                    if items[i].rect.intersects(&items[j].host_rect) {
                        total_overlaps += 1;
                        i_overlaps = true;
                        items[i].overlap_count += 1;
                        force += repel_force(ci, items[j].host_center, force_push * REPEL_FORCE_FACTOR);
                    }
                    // Label-label overlap pushes harder than label-host.
                    if items[i].rect.intersects(&items[j].rect) {
                        total_overlaps += 1;
                        i_overlaps = true;
                        items[i].overlap_count += 1;
                        force += repel_force(ci, cj, force_push);
                    }
                    if iter % STUCK_CHECK_INTERVAL == 0
                        && items[i].overlap_count == 2
                        && items[i].rect.intersects(&items[i].host_rect)
                        && items[i].rect.intersects(&items[j].host_rect)
                    {
                        // A label the clamp keeps shoving back while it
                        // covers two hosts is just as trapped as a colinear
                        // wedge: repulsion only drives it into the edge.
                        if is_wedged(ci, items[i].host_center, items[j].host_center)
                            || items[i].pinned
                        {
                            let escape = ci * STUCK_ESCAPE_SCALE;
                            // Flip one axis at random to kick the label off
                            // the line joining the two hosts.
                            let kick = if rng.gen_bool(0.5) {
                                Point::new(escape.x, -escape.y)
                            } else {
                                Point::new(-escape.x, escape.y)
                            };
                            items[i].move_by(kick);
                        }
                    }
                }
            }

            if !i_overlaps {
                force += pull_force(items[i].host_center, ci, force_pull * PULL_FORCE_FACTOR);
            }

            // Crowded items get extra damping so they settle instead of
            // ricocheting between neighbors.
            let crowding = items[i].overlap_count;
            let friction2 = if crowding > MAX_OVERLAPS {
                1.5
            } else {
                1.0 + 0.05 * crowding as f32
            };
            items[i].velocity = items[i].velocity * (config.friction * friction2) + force;
            let velocity = items[i].velocity;
            items[i].move_by(velocity);

            clamp_to_bounds(&mut items[i], x_lim, y_lim);

            // Uncross leader lines: when the pass is otherwise clean (or on
            // the periodic check), swap any two labels whose host-to-label
            // segments intersect.
            if total_overlaps == 0 || iter % CROSSING_CHECK_INTERVAL == 0 {
                for j in 0..n {
                    if j == i || items[j].frozen {
                        continue;
                    }
                    let ci = items[i].rect.center();
                    let cj = items[j].rect.center();
                    if segments_intersect(ci, items[i].host_center, cj, items[j].host_center) {
                        total_overlaps += 1;
                        items[i].move_by(cj - ci);
                        items[j].move_by(ci - cj);
                    }
                }
            }
        }
    }

    // The crossing swap moves its partner after that partner's own clamp
    // already ran, so a solve that stops on such an iteration could leak a
    // box past the edge. One last clamp before write-back closes that hole.
    for item in &mut items {
        clamp_to_bounds(item, x_lim, y_lim);
    }

    // Result writer: exact inverse of the normalization, copied back onto
    // the caller's labels.
    for (label, item) in labels.iter_mut().zip(&items) {
        label.rect = Rect::new(
            xs.to_pixel(item.rect.x),
            ys.to_pixel(item.rect.y),
            item.rect.width * xs.scale,
            item.rect.height * ys.scale,
        );
        label.anchor = Point::new(xs.to_pixel(item.anchor.x), ys.to_pixel(item.anchor.y));
    }

    RepelOutcome {
        iterations: iter,
        converged: total_overlaps == 0,
    }
}
