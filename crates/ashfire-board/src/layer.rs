//! One Z-layer of the board.

use std::sync::Arc;

use ashfire_protocol::{FaceId, anim_flags};
use rand::Rng;

use crate::error::BoardError;
use crate::faces::{Animation, FaceCache};

/// Most cells a single layer may hold.
pub const MAX_CELLS: usize = 512 * 512;

/// `width * height`, refused past [`MAX_CELLS`] or on overflow.
pub(crate) fn cell_count(width: usize, height: usize) -> Result<usize, BoardError> {
    width
        .checked_mul(height)
        .filter(|&cells| cells <= MAX_CELLS)
        .ok_or(BoardError::TooLarge { width, height })
}

/// One cell of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tile {
    /// The face shown, `None` when the tile is hidden.
    pub face: Option<FaceId>,
    /// Bound animation, if any.
    pub anim: Option<Arc<Animation>>,
    /// Index into `anim.faces` of the frame currently shown.
    pub frame: usize,
    /// Ticks per frame. Zero behaves like one.
    pub speed: u8,
    /// [`anim_flags`] bits.
    pub flags: u8,
    /// Ticks accumulated toward the next frame.
    pub counter: u32,
}

impl Tile {
    /// Returns `true` if the tile shows nothing and animates nothing.
    pub fn is_empty(&self) -> bool {
        self.face.is_none() && self.anim.is_none()
    }
}

/// A `width x height` grid of tiles, row-major.
#[derive(Debug, Clone)]
pub struct Layer {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl Layer {
    /// Creates an empty layer.
    ///
    /// # Errors
    /// [`BoardError::TooLarge`] past [`MAX_CELLS`] cells.
    pub fn new(width: usize, height: usize) -> Result<Self, BoardError> {
        let cells = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            tiles: vec![Tile::default(); cells],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The tile at `(x, y)`, or `None` out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    /// Sets the shown face. `None` hides the tile and drops any animation.
    /// Returns `false` out of bounds.
    pub fn set_face(&mut self, x: usize, y: usize, face: Option<FaceId>) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let tile = &mut self.tiles[i];
        tile.face = face;
        if face.is_none() {
            tile.anim = None;
        }
        true
    }

    /// Binds (or, with `None`, unbinds) an animation and shows its first
    /// frame when that face is loaded. Returns `false` out of bounds.
    pub fn set_anim(
        &mut self,
        x: usize,
        y: usize,
        anim: Option<Arc<Animation>>,
        flags: u8,
        speed: u8,
        faces: &dyn FaceCache,
    ) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let tile = &mut self.tiles[i];
        tile.frame = 0;
        tile.counter = 0;
        tile.flags = flags;
        tile.speed = speed;
        let first = anim.as_ref().and_then(|a| a.faces.first()).copied();
        if let Some(first) = first.filter(|&f| faces.face(f).is_some()) {
            tile.face = Some(first);
        }
        tile.anim = anim;
        true
    }

    /// Replaces every tile with the one previously at `(x + dx, y + dy)`,
    /// or an empty tile when that source is off the grid.
    pub fn shift(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let shifted: Vec<Tile> = shifted_indices(self.width, self.height, dx, dy)
            .map(|src| src.map(|i| self.tiles[i].clone()).unwrap_or_default())
            .collect();
        self.tiles = shifted;
    }

    /// Hides every tile.
    pub fn clear(&mut self) {
        self.tiles.fill(Tile::default());
    }

    /// Advances every animated tile by `delta` ticks. Returns the cells
    /// whose shown face changed.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        delta: u32,
        faces: &dyn FaceCache,
        rng: &mut R,
    ) -> Vec<(usize, usize)> {
        let mut changed = Vec::new();
        if delta == 0 {
            return changed;
        }

        for (i, tile) in self.tiles.iter_mut().enumerate() {
            let Some(anim) = tile.anim.as_ref() else {
                continue;
            };
            let frames = anim.faces.len();
            if frames == 0 {
                continue;
            }

            let speed = u32::from(tile.speed.max(1));
            tile.counter = tile.counter.saturating_add(delta);
            if tile.counter < speed {
                continue;
            }

            if tile.flags & anim_flags::RANDOM != 0 {
                tile.counter = 0;
                tile.frame = rng.random_range(0..frames);
            } else {
                let steps = (tile.counter / speed) as usize;
                tile.counter %= speed;
                tile.frame = (tile.frame + steps % frames) % frames;
            }

            let face = anim.faces[tile.frame];
            if faces.face(face).is_some() && tile.face != Some(face) {
                tile.face = Some(face);
                changed.push((i % self.width, i / self.width));
            }
        }
        changed
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

/// For each destination cell in row-major order, the source index that
/// a `(dx, dy)` shift reads from, or `None` when it falls off the grid.
pub(crate) fn shifted_indices(
    width: usize,
    height: usize,
    dx: i32,
    dy: i32,
) -> impl Iterator<Item = Option<usize>> {
    (0..height).flat_map(move |y| {
        (0..width).map(move |x| {
            let sx = x as i64 + i64::from(dx);
            let sy = y as i64 + i64::from(dy);
            let inside = (0..width as i64).contains(&sx) && (0..height as i64).contains(&sy);
            inside.then(|| sy as usize * width + sx as usize)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::FaceStore;
    use ashfire_protocol::{AnimId, Image2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn loaded(ids: &[u32]) -> FaceStore {
        let mut store = FaceStore::new();
        for &id in ids {
            store.add_image(&Image2 {
                face: FaceId(id),
                set: 0,
                width: 32,
                height: 32,
                data: Vec::new(),
            });
        }
        store
    }

    fn anim(faces: &[u32]) -> Arc<Animation> {
        Arc::new(Animation {
            id: AnimId(1),
            flags: 0,
            faces: faces.iter().copied().map(FaceId).collect(),
        })
    }

    fn faces_of(layer: &Layer) -> Vec<u32> {
        let mut out = Vec::new();
        for y in 0..layer.height() {
            for x in 0..layer.width() {
                out.push(layer.get(x, y).and_then(|t| t.face).map_or(0, |f| f.0));
            }
        }
        out
    }

    // =========================================================================
    // set_face / set_anim
    // =========================================================================

    #[test]
    fn test_new_refuses_overflowing_and_oversized_grids() {
        assert!(matches!(
            Layer::new(usize::MAX, 2),
            Err(BoardError::TooLarge { width: usize::MAX, height: 2 })
        ));
        assert!(Layer::new(MAX_CELLS + 1, 1).is_err());
        assert_eq!(Layer::new(MAX_CELLS, 1).unwrap().width(), MAX_CELLS);
    }

    #[test]
    fn test_set_face_none_drops_animation() {
        let store = loaded(&[1, 2]);
        let mut layer = Layer::new(2, 2).unwrap();
        layer.set_anim(0, 0, Some(anim(&[1, 2])), 0, 1, &store);
        assert_eq!(layer.get(0, 0).unwrap().face, Some(FaceId(1)));

        layer.set_face(0, 0, None);

        assert!(layer.get(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_set_face_out_of_bounds_is_rejected() {
        let mut layer = Layer::new(2, 2).unwrap();
        assert!(!layer.set_face(2, 0, Some(FaceId(1))));
        assert!(!layer.set_face(0, 2, Some(FaceId(1))));
    }

    #[test]
    fn test_set_anim_unloaded_first_frame_keeps_face() {
        let store = loaded(&[]);
        let mut layer = Layer::new(1, 1).unwrap();
        layer.set_face(0, 0, Some(FaceId(9)));

        layer.set_anim(0, 0, Some(anim(&[1, 2])), 0, 1, &store);

        assert_eq!(layer.get(0, 0).unwrap().face, Some(FaceId(9)));
        assert!(layer.get(0, 0).unwrap().anim.is_some());
    }

    // =========================================================================
    // shift
    // =========================================================================

    #[test]
    fn test_shift_reads_from_offset_and_clears_edge() {
        let mut layer = Layer::new(3, 3).unwrap();
        for i in 0..9u32 {
            layer.set_face((i % 3) as usize, (i / 3) as usize, Some(FaceId(i + 1)));
        }

        layer.shift(1, 0);
        assert_eq!(faces_of(&layer), vec![2, 3, 0, 5, 6, 0, 8, 9, 0]);

        layer.shift(-1, 0);
        assert_eq!(faces_of(&layer), vec![0, 2, 3, 0, 5, 6, 0, 8, 9]);
    }

    #[test]
    fn test_shift_vertical_and_past_size_clears_all() {
        let mut layer = Layer::new(2, 2).unwrap();
        layer.set_face(0, 1, Some(FaceId(3)));

        layer.shift(0, 1);
        assert_eq!(faces_of(&layer), vec![3, 0, 0, 0]);

        layer.shift(5, 0);
        assert_eq!(faces_of(&layer), vec![0, 0, 0, 0]);
    }

    // =========================================================================
    // advance
    // =========================================================================

    #[test]
    fn test_advance_steps_and_wraps() {
        let store = loaded(&[1, 2, 3]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Layer::new(1, 1).unwrap();
        layer.set_anim(0, 0, Some(anim(&[1, 2, 3])), 0, 2, &store);

        assert!(layer.advance(1, &store, &mut rng).is_empty());
        assert_eq!(layer.advance(1, &store, &mut rng), vec![(0, 0)]);
        assert_eq!(layer.get(0, 0).unwrap().face, Some(FaceId(2)));

        // Four ticks at speed 2 is two frames: 2 -> 3 -> 1.
        layer.advance(4, &store, &mut rng);
        assert_eq!(layer.get(0, 0).unwrap().face, Some(FaceId(1)));
    }

    #[test]
    fn test_advance_zero_speed_moves_every_tick() {
        let store = loaded(&[1, 2]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Layer::new(1, 1).unwrap();
        layer.set_anim(0, 0, Some(anim(&[1, 2])), 0, 0, &store);

        layer.advance(1, &store, &mut rng);

        assert_eq!(layer.get(0, 0).unwrap().face, Some(FaceId(2)));
    }

    #[test]
    fn test_advance_random_stays_in_range() {
        let store = loaded(&[1, 2, 3, 4]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut layer = Layer::new(1, 1).unwrap();
        layer.set_anim(0, 0, Some(anim(&[1, 2, 3, 4])), anim_flags::RANDOM, 1, &store);

        for _ in 0..50 {
            layer.advance(1, &store, &mut rng);
            let tile = layer.get(0, 0).unwrap();
            assert!(tile.frame < 4);
            assert_eq!(tile.counter, 0);
        }
    }

    #[test]
    fn test_advance_unloaded_frame_keeps_previous_face() {
        let store = loaded(&[1]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Layer::new(1, 1).unwrap();
        layer.set_anim(0, 0, Some(anim(&[1, 2])), 0, 1, &store);

        assert!(layer.advance(1, &store, &mut rng).is_empty());

        let tile = layer.get(0, 0).unwrap();
        assert_eq!(tile.frame, 1);
        assert_eq!(tile.face, Some(FaceId(1)));
    }
}
