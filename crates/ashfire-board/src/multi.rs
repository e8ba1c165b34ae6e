//! The layered board: Z-ordered layers, the darkness overlay, and the
//! list of cells waiting on a face image.

use std::fmt;
use std::sync::Arc;

use ashfire_protocol::FaceId;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::BoardError;
use crate::faces::{Animation, FaceCache};
use crate::layer::{Layer, Tile, cell_count, shifted_indices};

/// Something about the board changed. Coordinates are always in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    CellChanged { x: usize, y: usize, layer: usize },
    DarknessChanged { x: usize, y: usize },
    Shifted { dx: i32, dy: i32 },
    Resized { width: usize, height: usize },
    Cleared,
}

/// Callback observing board changes.
pub type BoardObserver = Box<dyn FnMut(&BoardEvent) + Send>;

/// A cell update parked until its face image arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFace {
    pub x: usize,
    pub y: usize,
    pub layer: usize,
    pub face: FaceId,
}

/// Result of [`MultiBoard::apply_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The face was loaded and is now shown.
    Applied,
    /// Face `0`: the layer was emptied.
    Cleared,
    /// The face isn't loaded yet; the update waits for it.
    Deferred,
}

/// Z-ordered tile layers plus a darkness grid of the same size.
pub struct MultiBoard {
    width: usize,
    height: usize,
    layers: Vec<Layer>,
    darkness: Vec<u8>,
    pending: Vec<PendingFace>,
    last_tick: Option<u32>,
    observer: Option<BoardObserver>,
    rng: StdRng,
}

impl MultiBoard {
    /// Creates an empty board of `layers` layers.
    ///
    /// # Errors
    /// [`BoardError::TooLarge`] for a grid past
    /// [`MAX_CELLS`](crate::layer::MAX_CELLS).
    pub fn new(width: usize, height: usize, layers: usize) -> Result<Self, BoardError> {
        Self::with_rng(width, height, layers, StdRng::from_os_rng())
    }

    /// Creates a board whose random animation frames come from `seed`.
    pub fn with_seed(
        width: usize,
        height: usize,
        layers: usize,
        seed: u64,
    ) -> Result<Self, BoardError> {
        Self::with_rng(width, height, layers, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: usize, height: usize, layers: usize, rng: StdRng) -> Result<Self, BoardError> {
        let (layers, darkness) = grids(width, height, layers)?;
        Ok(Self {
            width,
            height,
            layers,
            darkness,
            pending: Vec::new(),
            last_tick: None,
            observer: None,
            rng,
        })
    }

    /// Installs (or removes) the change observer.
    pub fn set_observer(&mut self, observer: Option<BoardObserver>) {
        self.observer = observer;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The tile at `(x, y)` on `layer`.
    pub fn tile(&self, x: usize, y: usize, layer: usize) -> Option<&Tile> {
        self.layers.get(layer)?.get(x, y)
    }

    /// The face shown at `(x, y)` on `layer`.
    pub fn face_at(&self, x: usize, y: usize, layer: usize) -> Option<FaceId> {
        self.tile(x, y, layer)?.face
    }

    /// The darkness value at `(x, y)`.
    pub fn darkness(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.darkness[y * self.width + x])
    }

    /// Cell updates still waiting on a face image.
    pub fn pending(&self) -> &[PendingFace] {
        &self.pending
    }

    // =========================================================================
    // Whole-board operations
    // =========================================================================

    /// Discards every layer, the darkness grid, and pending updates, and
    /// recreates them empty at the new size.
    ///
    /// # Errors
    /// [`BoardError::TooLarge`] leaves the board as it was.
    pub fn set_board_size(&mut self, width: usize, height: usize) -> Result<(), BoardError> {
        let count = self.layers.len();
        let (layers, darkness) = grids(width, height, count)?;
        self.width = width;
        self.height = height;
        self.layers = layers;
        self.darkness = darkness;
        self.pending.clear();
        tracing::debug!(width, height, layers = count, "board resized");
        self.emit(BoardEvent::Resized { width, height });
        Ok(())
    }

    /// Scrolls the view: every cell takes the content previously at
    /// `(x + dx, y + dy)`, or becomes empty when that is off the board.
    /// Applies to every layer and to darkness. Pending updates move with
    /// their cells and are dropped once scrolled off.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        for layer in &mut self.layers {
            layer.shift(dx, dy);
        }
        let darkness: Vec<u8> = shifted_indices(self.width, self.height, dx, dy)
            .map(|src| src.map_or(0, |i| self.darkness[i]))
            .collect();
        self.darkness = darkness;

        let (width, height) = (self.width as i64, self.height as i64);
        self.pending.retain_mut(|p| {
            let x = p.x as i64 - i64::from(dx);
            let y = p.y as i64 - i64::from(dy);
            if (0..width).contains(&x) && (0..height).contains(&y) {
                p.x = x as usize;
                p.y = y as usize;
                true
            } else {
                false
            }
        });
        self.emit(BoardEvent::Shifted { dx, dy });
    }

    /// Empties every layer and drops pending updates. Darkness is kept.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.clear();
        }
        self.pending.clear();
        self.emit(BoardEvent::Cleared);
    }

    /// Empties one layer everywhere.
    ///
    /// # Errors
    /// [`BoardError::NoSuchLayer`] when `layer` doesn't exist.
    pub fn clear_board(&mut self, layer: usize) -> Result<(), BoardError> {
        self.check_layer(layer)?;
        self.layers[layer].clear();
        self.pending.retain(|p| p.layer != layer);
        self.emit(BoardEvent::Cleared);
        Ok(())
    }

    // =========================================================================
    // Cell operations
    // =========================================================================

    /// Sets the face of one cell on one layer. `None` hides it and drops
    /// its animation. Supersedes any pending update for the same cell and
    /// layer.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`] or [`BoardError::NoSuchLayer`].
    pub fn set_cell(
        &mut self,
        x: i32,
        y: i32,
        layer: usize,
        face: Option<FaceId>,
    ) -> Result<(), BoardError> {
        let (x, y) = self.check_cell(x, y)?;
        self.check_layer(layer)?;
        self.supersede(x, y, layer);
        self.layers[layer].set_face(x, y, face);
        self.emit(BoardEvent::CellChanged { x, y, layer });
        Ok(())
    }

    /// Sets the face of one cell on every layer.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`].
    pub fn set_cells(&mut self, x: i32, y: i32, face: Option<FaceId>) -> Result<(), BoardError> {
        let (x, y) = self.check_cell(x, y)?;
        self.pending.retain(|p| p.x != x || p.y != y);
        for layer in 0..self.layers.len() {
            self.layers[layer].set_face(x, y, face);
            self.emit(BoardEvent::CellChanged { x, y, layer });
        }
        Ok(())
    }

    /// Sets the darkness of one cell.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`].
    pub fn set_darkness(&mut self, x: i32, y: i32, value: u8) -> Result<(), BoardError> {
        let (x, y) = self.check_cell(x, y)?;
        self.darkness[y * self.width + x] = value;
        self.emit(BoardEvent::DarknessChanged { x, y });
        Ok(())
    }

    /// Binds an animation to a cell (or unbinds it with `None`) and shows
    /// its first frame if that face is loaded.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`] or [`BoardError::NoSuchLayer`].
    #[allow(clippy::too_many_arguments)]
    pub fn set_anim(
        &mut self,
        x: i32,
        y: i32,
        layer: usize,
        anim: Option<Arc<Animation>>,
        flags: u8,
        speed: u8,
        faces: &dyn FaceCache,
    ) -> Result<(), BoardError> {
        let (x, y) = self.check_cell(x, y)?;
        self.check_layer(layer)?;
        self.supersede(x, y, layer);
        self.layers[layer].set_anim(x, y, anim, flags, speed, faces);
        self.emit(BoardEvent::CellChanged { x, y, layer });
        Ok(())
    }

    /// Shows `face` on a cell, or defers it until the face is loaded.
    ///
    /// # Errors
    /// [`BoardError::OutOfBounds`] or [`BoardError::NoSuchLayer`].
    pub fn apply_image(
        &mut self,
        x: i32,
        y: i32,
        layer: usize,
        face: FaceId,
        faces: &dyn FaceCache,
    ) -> Result<Placement, BoardError> {
        if face.is_blank() {
            self.set_cell(x, y, layer, None)?;
            return Ok(Placement::Cleared);
        }
        if faces.face(face).is_some() {
            self.set_cell(x, y, layer, Some(face))?;
            return Ok(Placement::Applied);
        }

        let (ux, uy) = self.check_cell(x, y)?;
        self.check_layer(layer)?;
        self.supersede(ux, uy, layer);
        self.pending.push(PendingFace {
            x: ux,
            y: uy,
            layer,
            face,
        });
        tracing::trace!(%face, x, y, layer, "cell waiting on face");
        Ok(Placement::Deferred)
    }

    /// Applies every pending update waiting on `face` and forgets them.
    /// Returns how many cells were updated.
    pub fn resolve_face(&mut self, face: FaceId) -> usize {
        let mut ready = Vec::new();
        self.pending.retain(|p| {
            if p.face == face {
                ready.push(*p);
                false
            } else {
                true
            }
        });
        for p in &ready {
            self.layers[p.layer].set_face(p.x, p.y, Some(p.face));
            self.emit(BoardEvent::CellChanged {
                x: p.x,
                y: p.y,
                layer: p.layer,
            });
        }
        if !ready.is_empty() {
            tracing::trace!(%face, cells = ready.len(), "deferred face applied");
        }
        ready.len()
    }

    // =========================================================================
    // Animation
    // =========================================================================

    /// Advances animations to the global tick `tick`. The first tick seen,
    /// and a tick lower than the previous one, advance nothing.
    pub fn tick(&mut self, tick: u32, faces: &dyn FaceCache) {
        let delta = match self.last_tick {
            Some(last) => tick.checked_sub(last).unwrap_or(0),
            None => 0,
        };
        self.last_tick = Some(tick);
        if delta == 0 {
            return;
        }

        for layer in 0..self.layers.len() {
            let changed = self.layers[layer].advance(delta, faces, &mut self.rng);
            for (x, y) in changed {
                self.emit(BoardEvent::CellChanged { x, y, layer });
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_cell(&self, x: i32, y: i32) -> Result<(usize, usize), BoardError> {
        let out = || BoardError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        };
        let ux = usize::try_from(x).map_err(|_| out())?;
        let uy = usize::try_from(y).map_err(|_| out())?;
        if ux >= self.width || uy >= self.height {
            return Err(out());
        }
        Ok((ux, uy))
    }

    fn check_layer(&self, layer: usize) -> Result<(), BoardError> {
        if layer >= self.layers.len() {
            return Err(BoardError::NoSuchLayer {
                layer,
                layers: self.layers.len(),
            });
        }
        Ok(())
    }

    fn supersede(&mut self, x: usize, y: usize, layer: usize) {
        self.pending
            .retain(|p| p.x != x || p.y != y || p.layer != layer);
    }

    fn emit(&mut self, event: BoardEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }
}

impl fmt::Debug for MultiBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiBoard")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layers", &self.layers.len())
            .field("pending", &self.pending.len())
            .field("last_tick", &self.last_tick)
            .finish()
    }
}

/// Empty layers plus a darkness grid for a `width x height` board.
fn grids(width: usize, height: usize, count: usize) -> Result<(Vec<Layer>, Vec<u8>), BoardError> {
    let cells = cell_count(width, height)?;
    let layers = (0..count)
        .map(|_| Layer::new(width, height))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((layers, vec![0; cells]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::FaceStore;
    use ashfire_protocol::Image2;
    use std::sync::Mutex;

    fn image(id: u32) -> Image2 {
        Image2 {
            face: FaceId(id),
            set: 0,
            width: 32,
            height: 32,
            data: Vec::new(),
        }
    }

    #[test]
    fn test_set_cell_rejects_bad_coordinates() {
        let mut board = MultiBoard::with_seed(3, 3, 2, 0).unwrap();

        assert!(matches!(
            board.set_cell(-1, 0, 0, None),
            Err(BoardError::OutOfBounds { x: -1, .. })
        ));
        assert!(matches!(
            board.set_cell(0, 3, 0, None),
            Err(BoardError::OutOfBounds { .. })
        ));
        assert!(matches!(
            board.set_cell(0, 0, 2, None),
            Err(BoardError::NoSuchLayer { layer: 2, layers: 2 })
        ));
    }

    #[test]
    fn test_set_cells_touches_every_layer() {
        let mut board = MultiBoard::with_seed(2, 2, 3, 0).unwrap();

        board.set_cells(1, 1, Some(FaceId(4))).unwrap();

        for layer in 0..3 {
            assert_eq!(board.face_at(1, 1, layer), Some(FaceId(4)));
        }
    }

    #[test]
    fn test_shift_moves_darkness() {
        let mut board = MultiBoard::with_seed(3, 1, 1, 0).unwrap();
        board.set_darkness(2, 0, 200).unwrap();

        board.shift(1, 0);
        assert_eq!(board.darkness(1, 0), Some(200));
        assert_eq!(board.darkness(2, 0), Some(0));
    }

    #[test]
    fn test_shift_moves_and_drops_pending() {
        let store = FaceStore::new();
        let mut board = MultiBoard::with_seed(3, 3, 1, 0).unwrap();
        board.apply_image(2, 0, 0, FaceId(5), &store).unwrap();
        board.apply_image(0, 0, 0, FaceId(6), &store).unwrap();

        board.shift(1, 0);

        assert_eq!(
            board.pending(),
            &[PendingFace { x: 1, y: 0, layer: 0, face: FaceId(5) }]
        );
    }

    #[test]
    fn test_later_update_supersedes_pending() {
        let store = FaceStore::new();
        let mut board = MultiBoard::with_seed(2, 2, 1, 0).unwrap();
        board.apply_image(0, 0, 0, FaceId(5), &store).unwrap();

        board.set_cell(0, 0, 0, Some(FaceId(9))).unwrap();

        assert!(board.pending().is_empty());
        assert_eq!(board.resolve_face(FaceId(5)), 0);
        assert_eq!(board.face_at(0, 0, 0), Some(FaceId(9)));
    }

    #[test]
    fn test_resize_discards_content_and_pending() {
        let store = FaceStore::new();
        let mut board = MultiBoard::with_seed(2, 2, 2, 0).unwrap();
        board.set_cell(0, 0, 0, Some(FaceId(1))).unwrap();
        board.set_darkness(1, 1, 9).unwrap();
        board.apply_image(1, 0, 1, FaceId(5), &store).unwrap();

        board.set_board_size(4, 3).unwrap();

        assert_eq!((board.width(), board.height(), board.layer_count()), (4, 3, 2));
        assert_eq!(board.face_at(0, 0, 0), None);
        assert_eq!(board.darkness(1, 1), Some(0));
        assert!(board.pending().is_empty());
    }

    #[test]
    fn test_resize_too_large_keeps_board() {
        let mut board = MultiBoard::with_seed(2, 2, 2, 0).unwrap();
        board.set_cell(1, 1, 1, Some(FaceId(3))).unwrap();

        assert!(matches!(
            board.set_board_size(usize::MAX, usize::MAX),
            Err(BoardError::TooLarge { .. })
        ));

        assert_eq!((board.width(), board.height()), (2, 2));
        assert_eq!(board.face_at(1, 1, 1), Some(FaceId(3)));
    }

    #[test]
    fn test_tick_first_and_backwards_do_not_advance() {
        let mut store = FaceStore::new();
        store.add_image(&image(1));
        store.add_image(&image(2));
        let anim = Arc::new(Animation {
            id: ashfire_protocol::AnimId(1),
            flags: 0,
            faces: vec![FaceId(1), FaceId(2)],
        });
        let mut board = MultiBoard::with_seed(1, 1, 1, 0).unwrap();
        board.set_anim(0, 0, 0, Some(anim), 0, 1, &store).unwrap();

        board.tick(100, &store);
        assert_eq!(board.face_at(0, 0, 0), Some(FaceId(1)));

        board.tick(50, &store);
        assert_eq!(board.face_at(0, 0, 0), Some(FaceId(1)));

        board.tick(51, &store);
        assert_eq!(board.face_at(0, 0, 0), Some(FaceId(2)));
    }

    #[test]
    fn test_observer_sees_changes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut board = MultiBoard::with_seed(2, 2, 1, 0).unwrap();
        board.set_observer(Some(Box::new(move |e| sink.lock().unwrap().push(*e))));

        board.set_cell(1, 0, 0, Some(FaceId(3))).unwrap();
        board.shift(0, 1);
        board.clear();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                BoardEvent::CellChanged { x: 1, y: 0, layer: 0 },
                BoardEvent::Shifted { dx: 0, dy: 1 },
                BoardEvent::Cleared,
            ]
        );
    }
}
