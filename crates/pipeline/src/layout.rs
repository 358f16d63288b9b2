//! Grid layout for the video compositor.
//!
//! The layout is a pure function of the number of connected video inputs:
//! it is recomputed from scratch on every topology change and applied to
//! every pad, so add/remove ordering never leaves stale placements behind.

use serde::{Deserialize, Serialize};

use mixcast_common::error::{MixcastError, MixcastResult};

/// Output canvas the compositor renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const FULL_HD: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A slot covering the whole canvas.
    pub fn full_slot(&self) -> LayoutSlot {
        LayoutSlot {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::FULL_HD
    }
}

/// Square tiling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: u32,
    pub cols: u32,
}

impl Grid {
    pub fn cells(&self) -> usize {
        (self.rows * self.cols) as usize
    }
}

/// Placement of one compositor input on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSlot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl LayoutSlot {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &LayoutSlot) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Pick the grid tier for `inputs` video inputs.
///
/// Up to 16 inputs the tiers are 1×1, 2×2 and 4×4. Above that the grid
/// keeps doubling its side (8×8, 16×16, ...) until it holds every input.
/// More than `max_inputs` inputs is rejected.
pub fn grid_for(inputs: usize, max_inputs: usize) -> MixcastResult<Grid> {
    if inputs > max_inputs {
        return Err(MixcastError::layout(format!(
            "{inputs} video inputs exceed the compositor limit of {max_inputs}"
        )));
    }

    let mut grid = Grid { rows: 1, cols: 1 };
    while grid.cells() < inputs {
        grid.rows *= 2;
        grid.cols *= 2;
    }
    Ok(grid)
}

/// Compute one slot per input, left-to-right then top-to-bottom.
pub fn compute_layout(
    inputs: usize,
    canvas: Canvas,
    max_inputs: usize,
) -> MixcastResult<Vec<LayoutSlot>> {
    let grid = grid_for(inputs, max_inputs)?;
    let cell_width = canvas.width / grid.cols;
    let cell_height = canvas.height / grid.rows;

    if cell_width == 0 || cell_height == 0 {
        return Err(MixcastError::layout(format!(
            "{}x{} grid leaves zero-sized cells on a {}x{} canvas",
            grid.cols, grid.rows, canvas.width, canvas.height
        )));
    }

    let mut slots = Vec::with_capacity(inputs);
    let (mut x, mut y) = (0, 0);
    for _ in 0..inputs {
        slots.push(LayoutSlot {
            x,
            y,
            width: cell_width,
            height: cell_height,
        });

        x += cell_width;
        if x + cell_width > canvas.width {
            x = 0;
            y += cell_height;
        }
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX: usize = 64;

    #[test]
    fn single_input_fills_canvas() {
        let slots = compute_layout(1, Canvas::FULL_HD, MAX).unwrap();
        assert_eq!(slots, vec![Canvas::FULL_HD.full_slot()]);
    }

    #[test]
    fn no_inputs_yield_no_slots() {
        assert_eq!(grid_for(0, MAX).unwrap(), Grid { rows: 1, cols: 1 });
        assert!(compute_layout(0, Canvas::FULL_HD, MAX).unwrap().is_empty());
    }

    #[test]
    fn four_inputs_take_one_quadrant_each() {
        let slots = compute_layout(4, Canvas::FULL_HD, MAX).unwrap();
        let origins: Vec<_> = slots.iter().map(|s| (s.x, s.y)).collect();
        assert_eq!(origins, vec![(0, 0), (960, 0), (0, 540), (960, 540)]);
        assert!(slots.iter().all(|s| s.width == 960 && s.height == 540));
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(grid_for(2, MAX).unwrap().cols, 2);
        assert_eq!(grid_for(5, MAX).unwrap().cols, 4);
        assert_eq!(grid_for(16, MAX).unwrap().cols, 4);
        assert_eq!(grid_for(17, MAX).unwrap().cols, 8);
        assert_eq!(grid_for(64, MAX).unwrap().cols, 8);
        assert_eq!(grid_for(17, MAX).unwrap().cells(), 64);
    }

    #[test]
    fn five_inputs_use_sixteenth_cells() {
        let slots = compute_layout(5, Canvas::FULL_HD, MAX).unwrap();
        assert!(slots.iter().all(|s| s.width == 480 && s.height == 270));
        assert_eq!((slots[4].x, slots[4].y), (0, 270));
    }

    #[test]
    fn seventeen_inputs_get_an_eight_by_eight_grid() {
        let slots = compute_layout(17, Canvas::FULL_HD, MAX).unwrap();
        assert_eq!(slots.len(), 17);
        assert!(slots.iter().all(|s| s.width == 240 && s.height == 135));
        assert_eq!((slots[16].x, slots[16].y), (0, 270));
    }

    #[test]
    fn over_limit_is_rejected() {
        let err = compute_layout(65, Canvas::FULL_HD, MAX).unwrap_err();
        assert!(err.to_string().contains("exceed the compositor limit"));
    }

    #[test]
    fn tiny_canvas_rejects_zero_sized_cells() {
        let err = compute_layout(20, Canvas::new(4, 4), MAX).unwrap_err();
        assert!(err.to_string().contains("zero-sized"));
    }

    proptest! {
        #[test]
        fn slots_stay_inside_canvas_without_overlap(
            inputs in 0usize..=MAX,
            width in 320u32..4096,
            height in 240u32..2160,
        ) {
            let canvas = Canvas::new(width, height);
            let slots = compute_layout(inputs, canvas, MAX).unwrap();
            prop_assert_eq!(slots.len(), inputs);
            for (i, a) in slots.iter().enumerate() {
                prop_assert!(a.right() <= canvas.width);
                prop_assert!(a.bottom() <= canvas.height);
                for b in &slots[i + 1..] {
                    prop_assert!(!a.overlaps(b));
                }
            }
        }
    }
}
