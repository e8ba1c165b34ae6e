//! Error types for the board layer.

use ashfire_protocol::ProtocolError;

/// Errors from direct board mutation and map-size negotiation.
///
/// Map deltas from the server that hit one of these are logged and
/// skipped; they never stop reconciliation of the rest of the batch.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A cell coordinate outside the current board.
    #[error("cell ({x}, {y}) is outside the {width}x{height} board")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: usize,
        height: usize,
    },

    /// A layer index past the top of the stack.
    #[error("layer {layer} does not exist (board has {layers})")]
    NoSuchLayer { layer: usize, layers: usize },

    /// A grid whose cell count overflows or exceeds
    /// [`MAX_CELLS`](crate::layer::MAX_CELLS).
    #[error("a {width}x{height} board is too large")]
    TooLarge { width: usize, height: usize },

    /// The server acknowledged a map size with an axis of zero or past the
    /// configured limit.
    #[error("map size {width}x{height} is outside 1..={max} per axis")]
    MapSizeOutOfRange {
        width: usize,
        height: usize,
        max: usize,
    },

    /// The server acknowledged a map size we can't parse.
    #[error(transparent)]
    InvalidMapSize(#[from] ProtocolError),
}
