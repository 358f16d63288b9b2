//! Apply the grid layout to a live compositor element.

use gst::glib;
use gst::prelude::*;
use gstreamer as gst;

use mixcast_common::error::MixcastResult;

use crate::layout::{compute_layout, grid_for, Canvas, Grid, LayoutSlot};

/// Outcome of one relayout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutReport {
    pub grid: Grid,
    /// Slots assigned to the input pads, in pad order.
    pub slots: Vec<LayoutSlot>,
    /// Pads on which at least one property could not be set.
    pub failed_pads: Vec<String>,
}

impl LayoutReport {
    pub fn inputs(&self) -> usize {
        self.slots.len()
    }
}

/// Relayout every sink pad of `compositor` from scratch.
///
/// Pads are taken in attachment order. The first pad is the reserved
/// background input: it is not counted toward the grid tier and always
/// covers the whole canvas. Properties are set one by one; a pad that
/// rejects a property is reported and the remaining pads are still placed.
pub fn relayout(
    compositor: &gst::Element,
    canvas: Canvas,
    max_inputs: usize,
) -> MixcastResult<LayoutReport> {
    let pads = compositor.sink_pads();
    let (base, inputs) = match pads.split_first() {
        Some((base, inputs)) => (Some(base), inputs),
        None => (None, &[][..]),
    };

    let grid = grid_for(inputs.len(), max_inputs)?;
    let slots = compute_layout(inputs.len(), canvas, max_inputs)?;
    let mut failed_pads = Vec::new();

    if let Some(base) = base {
        if !place_pad(base, canvas.full_slot()) {
            failed_pads.push(base.name().to_string());
        }
    }

    for (pad, slot) in inputs.iter().zip(&slots) {
        tracing::debug!(
            pad = %pad.name(),
            x = slot.x,
            y = slot.y,
            width = slot.width,
            height = slot.height,
            "Placing compositor input"
        );
        if !place_pad(pad, *slot) {
            failed_pads.push(pad.name().to_string());
        }
    }

    tracing::info!(
        compositor = %compositor.name(),
        inputs = inputs.len(),
        rows = grid.rows,
        cols = grid.cols,
        failed = failed_pads.len(),
        "Compositor relaid out"
    );

    Ok(LayoutReport {
        grid,
        slots,
        failed_pads,
    })
}

fn place_pad(pad: &gst::Pad, slot: LayoutSlot) -> bool {
    let mut placed = true;
    for (property, value) in [
        ("xpos", slot.x),
        ("ypos", slot.y),
        ("width", slot.width),
        ("height", slot.height),
    ] {
        placed &= set_int_property(pad, property, value);
    }
    placed
}

fn set_int_property(pad: &gst::Pad, property: &str, value: u32) -> bool {
    let Ok(value) = i32::try_from(value) else {
        tracing::warn!(pad = %pad.name(), property, value, "Layout value out of range");
        return false;
    };

    match pad.find_property(property) {
        Some(pspec) if pspec.value_type() == <i32 as glib::types::StaticType>::static_type() => {
            pad.set_property(property, value);
            true
        }
        _ => {
            tracing::warn!(pad = %pad.name(), property, "Compositor pad has no integer property");
            false
        }
    }
}
