//! Reconciles map messages into the [`MultiBoard`].

use ashfire_protocol::{CoordKind, FaceId, Map2, Map2Coord, Map2Data, Message, Setup};

use crate::config::{BoardConfig, requested_board_size};
use crate::error::BoardError;
use crate::faces::FaceCache;
use crate::multi::{BoardObserver, MultiBoard, Placement};

/// Owns the board and applies server map traffic to it.
#[derive(Debug)]
pub struct BoardManager {
    config: BoardConfig,
    board: MultiBoard,
}

impl BoardManager {
    /// Creates a manager with an empty board of the configured initial size.
    ///
    /// # Errors
    /// [`BoardError::TooLarge`] when the initial size can't be allocated.
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        let board = MultiBoard::new(config.initial_width, config.initial_height, config.layers)?;
        Ok(Self { config, board })
    }

    /// Like [`BoardManager::new`] with a seeded animation RNG.
    pub fn with_seed(config: BoardConfig, seed: u64) -> Result<Self, BoardError> {
        let board = MultiBoard::with_seed(
            config.initial_width,
            config.initial_height,
            config.layers,
            seed,
        )?;
        Ok(Self { config, board })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn board(&self) -> &MultiBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut MultiBoard {
        &mut self.board
    }

    /// Installs (or removes) the board change observer.
    pub fn set_observer(&mut self, observer: Option<BoardObserver>) {
        self.board.set_observer(observer);
    }

    /// The setup message asking for a map that fills `viewport_px`.
    pub fn map_size_request(&self, viewport_px: (u32, u32), cell_px: (u32, u32)) -> Message {
        let (w, h) = requested_board_size(viewport_px, cell_px);
        tracing::debug!(width = w, height = h, "requesting map size");
        Message::Setup(Setup {
            map_size: Some(format!("{w}x{h}")),
            ..Default::default()
        })
    }

    /// Applies an acknowledged map size, if the setup carries one. The
    /// board is recreated with the configured margin added to each axis.
    ///
    /// On error the board is left untouched.
    ///
    /// # Errors
    /// - [`BoardError::InvalidMapSize`] for an unparsable size
    /// - [`BoardError::MapSizeOutOfRange`] for a zero axis or one past
    ///   [`BoardConfig::max_map_size`]
    /// - [`BoardError::TooLarge`] if the margin pushes it past the cell cap
    pub fn handle_setup(&mut self, setup: &Setup) -> Result<Option<(usize, usize)>, BoardError> {
        let Some((w, h)) = setup.map_dimensions()? else {
            return Ok(None);
        };
        let max = self.config.max_map_size;
        if !(1..=max).contains(&w) || !(1..=max).contains(&h) {
            return Err(BoardError::MapSizeOutOfRange {
                width: w,
                height: h,
                max,
            });
        }
        let margin = self.config.map_margin;
        let size = (w.saturating_add(margin), h.saturating_add(margin));
        self.board.set_board_size(size.0, size.1)?;
        Ok(Some(size))
    }

    /// Applies one batch of map deltas in order. A delta that can't be
    /// applied is logged and skipped.
    pub fn handle_map2(&mut self, map: &Map2, faces: &dyn FaceCache) {
        for coord in &map.coords {
            if coord.kind == CoordKind::Scroll {
                self.board.shift(i32::from(coord.x), i32::from(coord.y));
                continue;
            }
            for data in &coord.data {
                if let Err(e) = self.apply(coord, data, faces) {
                    tracing::warn!(error = %e, ?data, "map delta skipped");
                }
            }
        }
    }

    /// A new map: every layer is emptied and deferred updates dropped.
    pub fn handle_new_map(&mut self) {
        tracing::debug!("new map");
        self.board.clear();
    }

    /// Advances animations to the global tick.
    pub fn handle_tick(&mut self, tick: u32, faces: &dyn FaceCache) {
        self.board.tick(tick, faces);
    }

    /// A face image arrived: applies the cells waiting on it.
    pub fn face_loaded(&mut self, face: FaceId) -> usize {
        self.board.resolve_face(face)
    }

    fn apply(
        &mut self,
        coord: &Map2Coord,
        data: &Map2Data,
        faces: &dyn FaceCache,
    ) -> Result<(), BoardError> {
        let (x, y) = (i32::from(coord.x), i32::from(coord.y));
        match *data {
            Map2Data::Clear => self.board.set_cells(x, y, None),
            Map2Data::ClearLayer { layer } => self.board.set_cell(x, y, layer.into(), None),
            Map2Data::Darkness { value } => self.board.set_darkness(x, y, value),
            Map2Data::Image { layer, face } => {
                let placed = self.board.apply_image(x, y, layer.into(), face, faces)?;
                if placed == Placement::Deferred {
                    tracing::trace!(%face, "image deferred until face arrives");
                }
                Ok(())
            }
            Map2Data::Anim {
                layer,
                anim,
                flags,
                speed,
            } => {
                let bound = faces.anim(anim);
                if bound.is_none() {
                    tracing::debug!(%anim, "unknown animation, unbinding");
                }
                self.board
                    .set_anim(x, y, layer.into(), bound, flags, speed, faces)
            }
        }
    }
}
