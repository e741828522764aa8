//! Wetting fronts and the dry surface zone of the top soil layer.
//!
//! The top layer is tracked as a stack of wet bands. Net infiltration pushes
//! a new band in at the surface; net evaporation eats the shallowest band
//! from the top. The depth of the shallowest band's top is the dry-zone
//! thickness that limits soil evaporation.
//!
//! ```text
//! net = (infiltration₁ - evaporation) / φ₁       (m of wetted depth)
//! ```
//!
//! A new band that reaches the band below merges with it; whatever depth is
//! left over pushes the merged band's lower edge down, swallowing deeper
//! bands it reaches. Lower edges never pass the bottom of the layer.

use tracing::trace;

use crate::core_types::column::{WettingZone, WettingZones};

/// Drying demand that could not be met because no wet band remained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Desiccation {
    /// Wetted depth still to be removed (m)
    pub unmet_demand: f64,
}

/// Wetting-zone update rules for one surface layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceWetting {
    /// Thickness of the surface layer (m)
    pub layer_thickness: f64,
    /// Stack size above which the two deepest bands merge
    pub max_zones: usize,
}

impl SurfaceWetting {
    /// Net change in wetted depth (m) from infiltration and evaporation depths (m).
    pub fn net_wetting(infiltration: f64, evaporation: f64, porosity: f64) -> f64 {
        (infiltration - evaporation) / porosity
    }

    /// Apply a net wetting (`net > 0`) or drying (`net < 0`) to the stack.
    ///
    /// # Errors
    /// Returns [`Desiccation`] when drying removes every wet band.
    pub fn apply(&self, zones: &mut WettingZones, net: f64) -> Result<(), Desiccation> {
        if net > 0.0 {
            self.wet(zones, net);
        } else if net < 0.0 {
            Self::dry(zones, -net)?;
        }
        trace!(zones = zones.len(), dry_thickness = zones.dry_thickness(), "wetting zones updated");
        Ok(())
    }

    fn wet(&self, zones: &mut WettingZones, depth: f64) {
        let limit = self.layer_thickness;
        let stack = zones.zones_mut();

        let reaches_front = stack.first().is_some_and(|front| depth >= front.top);
        if !reaches_front {
            stack.insert(
                0,
                WettingZone {
                    top: 0.0,
                    bottom: depth.min(limit),
                },
            );
            if stack.len() > self.max_zones {
                merge_deepest(stack);
            }
            return;
        }

        // Fill the dry gap above the front, then keep pushing down.
        let front = stack[0];
        let mut bottom = front.bottom + (depth - front.top);
        stack.remove(0);
        while let Some(next) = stack.first().copied() {
            if bottom < next.top {
                break;
            }
            bottom = next.bottom + (bottom - next.top);
            stack.remove(0);
        }
        stack.insert(
            0,
            WettingZone {
                top: 0.0,
                bottom: bottom.min(limit),
            },
        );
    }

    fn dry(zones: &mut WettingZones, depth: f64) -> Result<(), Desiccation> {
        let stack = zones.zones_mut();
        let mut demand = depth;
        while demand > 0.0 {
            let Some(front) = stack.first_mut() else {
                return Err(Desiccation {
                    unmet_demand: demand,
                });
            };
            let extent = front.extent();
            if demand < extent {
                front.top += demand;
                demand = 0.0;
            } else {
                demand -= extent;
                stack.remove(0);
            }
        }
        if stack.is_empty() {
            return Err(Desiccation { unmet_demand: 0.0 });
        }
        Ok(())
    }
}

fn merge_deepest(stack: &mut Vec<WettingZone>) {
    if let Some(deepest) = stack.pop() {
        if let Some(above) = stack.last_mut() {
            above.bottom = deepest.bottom;
        }
    }
}
