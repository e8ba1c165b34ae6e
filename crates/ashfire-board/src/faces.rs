//! The face and animation store.
//!
//! Faces arrive in two steps: an announcement ([`Face2`]) naming the face,
//! then, on request, its image ([`Image2`]). Only a face whose image has
//! arrived counts as present for the board. Image bytes are kept opaque;
//! decoding them is the presentation layer's business.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ashfire_protocol::{Anim, AnimId, Face2, FaceId, FaceSetInfo, Image2};

/// Lookup capability the board needs from a face cache.
pub trait FaceCache {
    /// The loaded image of `id`, or `None` while it hasn't arrived.
    fn face(&self, id: FaceId) -> Option<&FaceImage>;

    /// The animation registered as `id`.
    fn anim(&self, id: AnimId) -> Option<Arc<Animation>>;
}

/// The image data of one face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    pub set: u8,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// What is known about a face.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceEntry {
    pub id: FaceId,
    pub name: String,
    pub checksum: u32,
    /// `None` until the image arrives.
    pub image: Option<FaceImage>,
}

/// An ordered list of faces shown in turn on an animated tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub id: AnimId,
    pub flags: u16,
    pub faces: Vec<FaceId>,
}

/// The session's face, image-set, and animation store.
#[derive(Debug, Default)]
pub struct FaceStore {
    sets: BTreeMap<u8, FaceSetInfo>,
    current_set: Option<u8>,
    faces: HashMap<FaceId, FaceEntry>,
    names: HashMap<String, FaceId>,
    anims: HashMap<AnimId, Arc<Animation>>,
}

impl FaceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Image sets -------------------------------------------------------

    /// Replaces the known image sets. The lowest index becomes current
    /// unless the current one is still offered.
    pub fn set_face_sets(&mut self, sets: impl IntoIterator<Item = FaceSetInfo>) {
        self.sets = sets.into_iter().map(|s| (s.index, s)).collect();
        let still_offered = self
            .current_set
            .is_some_and(|index| self.sets.contains_key(&index));
        if !still_offered {
            self.current_set = self.sets.keys().next().copied();
        }
        tracing::debug!(sets = self.sets.len(), current = ?self.current_set, "image sets updated");
    }

    /// Known image sets, ordered by index.
    pub fn face_sets(&self) -> impl Iterator<Item = &FaceSetInfo> {
        self.sets.values()
    }

    /// Makes `index` the current set. Returns `false` for an unknown set.
    pub fn select_set(&mut self, index: u8) -> bool {
        if !self.sets.contains_key(&index) {
            return false;
        }
        self.current_set = Some(index);
        true
    }

    /// The current image set, if any is known.
    pub fn current_set(&self) -> Option<&FaceSetInfo> {
        self.current_set.and_then(|index| self.sets.get(&index))
    }

    /// Pixel size of a board cell in the current set (32x32 without one).
    pub fn cell_size(&self) -> (u32, u32) {
        self.current_set()
            .map(|s| (s.width.max(1), s.height.max(1)))
            .unwrap_or((32, 32))
    }

    // ---- Faces ------------------------------------------------------------

    /// Records an announced face. Returns `true` when its image is still
    /// missing and should be asked for.
    pub fn announce(&mut self, face: &Face2) -> bool {
        let entry = self.faces.entry(face.face).or_insert_with(|| FaceEntry {
            id: face.face,
            ..Default::default()
        });
        entry.name.clone_from(&face.name);
        entry.checksum = face.checksum;
        if !face.name.is_empty() {
            self.names.insert(face.name.clone(), face.face);
        }
        entry.image.is_none()
    }

    /// Stores an image. Returns `true` if the face had no image before.
    pub fn add_image(&mut self, image: &Image2) -> bool {
        let entry = self.faces.entry(image.face).or_insert_with(|| FaceEntry {
            id: image.face,
            ..Default::default()
        });
        let first = entry.image.is_none();
        entry.image = Some(FaceImage {
            set: image.set,
            width: image.width,
            height: image.height,
            data: image.data.clone(),
        });
        tracing::trace!(face = %image.face, bytes = image.data.len(), first, "face image stored");
        first
    }

    /// Whether the image of `id` has arrived.
    pub fn is_loaded(&self, id: FaceId) -> bool {
        self.face(id).is_some()
    }

    /// Everything known about `id`, loaded or not.
    pub fn entry(&self, id: FaceId) -> Option<&FaceEntry> {
        self.faces.get(&id)
    }

    /// Looks a face up by its announced name.
    pub fn face_by_name(&self, name: &str) -> Option<FaceId> {
        self.names.get(name).copied()
    }

    /// Faces announced but still without an image.
    pub fn missing(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces
            .values()
            .filter(|e| e.image.is_none())
            .map(|e| e.id)
    }

    /// Number of known faces (announced or loaded).
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` if no face is known.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    // ---- Animations -------------------------------------------------------

    /// Registers (or replaces) an animation.
    pub fn add_anim(&mut self, anim: &Anim) {
        self.anims.insert(
            anim.anim,
            Arc::new(Animation {
                id: anim.anim,
                flags: anim.flags,
                faces: anim.faces.clone(),
            }),
        );
    }
}

impl FaceCache for FaceStore {
    fn face(&self, id: FaceId) -> Option<&FaceImage> {
        self.faces.get(&id).and_then(|e| e.image.as_ref())
    }

    fn anim(&self, id: AnimId) -> Option<Arc<Animation>> {
        self.anims.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face2(id: u32, name: &str) -> Face2 {
        Face2 {
            face: FaceId(id),
            set: 0,
            checksum: 0,
            name: name.into(),
        }
    }

    fn image(id: u32) -> Image2 {
        Image2 {
            face: FaceId(id),
            set: 0,
            width: 32,
            height: 32,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_announce_is_not_loaded() {
        let mut store = FaceStore::new();

        assert!(store.announce(&face2(7, "wall.111")));
        assert!(!store.is_loaded(FaceId(7)));
        assert_eq!(store.face_by_name("wall.111"), Some(FaceId(7)));
        assert_eq!(store.missing().collect::<Vec<_>>(), vec![FaceId(7)]);
    }

    #[test]
    fn test_image_after_announce_keeps_name() {
        let mut store = FaceStore::new();
        store.announce(&face2(7, "wall.111"));

        assert!(store.add_image(&image(7)));
        assert!(!store.add_image(&image(7)), "second image is a replacement");

        assert!(store.is_loaded(FaceId(7)));
        assert_eq!(store.entry(FaceId(7)).unwrap().name, "wall.111");
        assert!(!store.announce(&face2(7, "wall.111")), "already loaded");
    }

    #[test]
    fn test_image_without_announce_is_loaded() {
        let mut store = FaceStore::new();
        store.add_image(&image(3));
        assert_eq!(store.face(FaceId(3)).unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_face_sets_pick_lowest_and_select() {
        let mut store = FaceStore::new();
        assert_eq!(store.cell_size(), (32, 32));

        store.set_face_sets([
            FaceSetInfo { index: 1, name: "x2".into(), width: 64, height: 64 },
            FaceSetInfo { index: 0, name: "std".into(), width: 32, height: 32 },
        ]);
        assert_eq!(store.current_set().unwrap().name, "std");
        assert_eq!(
            store.face_sets().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1]
        );

        assert!(store.select_set(1));
        assert_eq!(store.cell_size(), (64, 64));
        assert!(!store.select_set(9));
    }

    #[test]
    fn test_add_anim_is_shared() {
        let mut store = FaceStore::new();
        store.add_anim(&Anim {
            anim: AnimId(2),
            flags: 0,
            faces: vec![FaceId(1), FaceId(2)],
        });

        let a = store.anim(AnimId(2)).unwrap();
        let b = store.anim(AnimId(2)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(store.anim(AnimId(3)).is_none());
    }
}
