//! # ashfire-board
//!
//! The visible slice of the world as Z-ordered tile layers, independent
//! of rendering.
//!
//! - [`FaceStore`] - announced faces, loaded images, image sets, animations
//! - [`MultiBoard`] - layers, darkness, shift, deferred face resolution
//! - [`BoardManager`] - applies map, setup, new-map, and tick messages
//!
//! A cell update naming a face whose image hasn't arrived yet is parked
//! and applied once [`BoardManager::face_loaded`] is called for it.

pub mod config;
pub mod error;
pub mod faces;
pub mod layer;
pub mod manager;
pub mod multi;

pub use config::{BoardConfig, requested_board_size};
pub use error::BoardError;
pub use faces::{Animation, FaceCache, FaceEntry, FaceImage, FaceStore};
pub use layer::{Layer, Tile};
pub use manager::BoardManager;
pub use multi::{BoardEvent, BoardObserver, MultiBoard, PendingFace, Placement};
