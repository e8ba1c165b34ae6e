//! Error types for the object model.

use ashfire_protocol::Tag;

/// Errors from requests made against the object table.
///
/// Server deltas naming unknown objects are not errors; they are logged
/// and ignored.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// No object with this tag is known.
    #[error("unknown object {0}")]
    UnknownObject(Tag),
}
