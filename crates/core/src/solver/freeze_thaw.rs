//! Freezing fronts and layer ice content.
//!
//! Each node is frozen strictly below 273.15 K. Between two nodes of
//! different state the temperature is interpolated linearly and the
//! crossing depth becomes a thaw front; the stretch on the frozen node's
//! side of the front is frozen. Below the deepest node the profile keeps
//! that node's state. A layer's ice proportion is the frozen share of its
//! thickness.

use tracing::trace;

use crate::core_types::column::SoilColumnState;
use crate::physics::constants::FREEZE;

/// A depth interval and whether it is frozen.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    top: f64,
    bottom: f64,
    frozen: bool,
}

/// Depth at which temperature crosses freezing between two nodes.
fn front_depth(z0: f64, t0: f64, z1: f64, t1: f64) -> f64 {
    z0 + (FREEZE - t0) / (t1 - t0) * (z1 - z0)
}

/// Split the profile below the surface into frozen and thawed spans.
fn classify(temperatures: &[f64], depths: &[f64]) -> (Vec<Span>, Vec<f64>) {
    let mut spans = Vec::with_capacity(temperatures.len() + 2);
    let mut fronts = Vec::new();

    for (t, z) in temperatures.windows(2).zip(depths.windows(2)) {
        let upper_frozen = t[0] < FREEZE;
        let lower_frozen = t[1] < FREEZE;
        if upper_frozen == lower_frozen {
            spans.push(Span {
                top: z[0],
                bottom: z[1],
                frozen: upper_frozen,
            });
        } else {
            let front = front_depth(z[0], t[0], z[1], t[1]);
            fronts.push(front);
            spans.push(Span {
                top: z[0],
                bottom: front,
                frozen: upper_frozen,
            });
            spans.push(Span {
                top: front,
                bottom: z[1],
                frozen: lower_frozen,
            });
        }
    }

    if let (Some(&t), Some(&z)) = (temperatures.last(), depths.last()) {
        spans.push(Span {
            top: z,
            bottom: f64::INFINITY,
            frozen: t < FREEZE,
        });
    }
    (spans, fronts)
}

/// Frozen length of `[top, bottom]` given the span list.
fn frozen_length(spans: &[Span], top: f64, bottom: f64) -> f64 {
    spans
        .iter()
        .filter(|s| s.frozen)
        .map(|s| (s.bottom.min(bottom) - s.top.max(top)).max(0.0))
        .sum()
}

/// Thaw front depths (m) for node temperatures and depths, shallowest first.
pub fn thaw_fronts(temperatures: &[f64], depths: &[f64]) -> Vec<f64> {
    classify(temperatures, depths).1
}

/// Recompute thaw fronts and every layer's ice proportion from the current
/// node temperatures.
pub fn update_ice(state: &mut SoilColumnState) {
    let (spans, fronts) = classify(&state.temperature_nodes(), &state.node_depths());

    for layer in &mut state.layers {
        let frozen = frozen_length(&spans, layer.depth_to_top, layer.depth_to_bottom());
        layer.ice_proportion = (frozen / layer.thickness).clamp(0.0, 1.0);
    }

    trace!(fronts = fronts.len(), "freeze/thaw fronts located");
    state.thaw_fronts = fronts;
}
