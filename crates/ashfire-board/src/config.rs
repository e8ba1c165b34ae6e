//! Board configuration.

use serde::{Deserialize, Serialize};

/// Shape of the board before (and beyond) the server's map-size answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Number of stacked layers (floor, objects, overlays...).
    pub layers: usize,

    /// Board width in cells until a map size is acknowledged.
    pub initial_width: usize,

    /// Board height in cells until a map size is acknowledged.
    pub initial_height: usize,

    /// Extra cells added to each axis of an acknowledged map size. The
    /// server addresses cells just past the edges of the requested view.
    pub map_margin: usize,

    /// Largest acknowledged map size accepted per axis, before the margin.
    pub max_map_size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            layers: 10,
            initial_width: 11,
            initial_height: 11,
            map_margin: 2,
            max_map_size: 255,
        }
    }
}

/// Map size to ask the server for, in cells: `ceil(viewport / cell) + 1`
/// per axis. The extra cell is overscan, so a partially visible edge
/// cell is still drawn.
///
/// A zero cell size is treated as 1 pixel.
pub fn requested_board_size(viewport_px: (u32, u32), cell_px: (u32, u32)) -> (usize, usize) {
    let axis = |viewport: u32, cell: u32| viewport.div_ceil(cell.max(1)) as usize + 1;
    (axis(viewport_px.0, cell_px.0), axis(viewport_px.1, cell_px.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_board_size_rounds_up_and_overscans() {
        assert_eq!(requested_board_size((320, 320), (32, 32)), (11, 11));
        assert_eq!(requested_board_size((321, 300), (32, 32)), (12, 11));
        assert_eq!(requested_board_size((0, 0), (32, 32)), (1, 1));
    }

    #[test]
    fn test_requested_board_size_zero_cell_does_not_panic() {
        assert_eq!(requested_board_size((10, 10), (0, 0)), (11, 11));
    }
}
