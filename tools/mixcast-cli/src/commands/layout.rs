//! Print the compositor grid for a number of inputs.

use mixcast_common::config::AppConfig;
use mixcast_pipeline::layout::{compute_layout, grid_for, Canvas};

pub fn run(config: &AppConfig, inputs: usize, json: bool) -> anyhow::Result<()> {
    let canvas = Canvas::new(config.compositor.canvas_width, config.compositor.canvas_height);
    let max_inputs = config.compositor.max_inputs;
    let slots = compute_layout(inputs, canvas, max_inputs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&slots)?);
        return Ok(());
    }

    let grid = grid_for(inputs, max_inputs)?;
    println!(
        "{inputs} input(s) on {}x{}: {}x{} grid",
        canvas.width, canvas.height, grid.rows, grid.cols
    );
    for (index, slot) in slots.iter().enumerate() {
        println!(
            "  #{index:<3} x={:<5} y={:<5} {}x{}",
            slot.x, slot.y, slot.width, slot.height
        );
    }
    Ok(())
}
