//! Game objects and inventories.

use ashfire_protocol::{AnimId, FaceId, ItemField, ItemObject, Player, Tag, is_container_kind};

/// One server object, keyed by its tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameObject {
    pub tag: Tag,
    pub name: String,
    pub plural_name: String,
    pub face: FaceId,
    pub weight: i32,
    /// Weight including contents. Only the player's is reported.
    pub total_weight: i32,
    pub flags: u32,
    pub kind: u16,
    pub nrof: u32,
    pub anim: AnimId,
    pub anim_speed: u8,
    /// Accumulated examine output, one line per entry.
    pub examine_text: String,
    /// Owner of the inventory this object is listed in. `None` until it
    /// is placed in one; the player object is never listed anywhere.
    pub container: Option<Tag>,
}

impl GameObject {
    /// A fresh object from an item payload, not yet in any inventory.
    pub fn from_item(item: &ItemObject) -> Self {
        let mut object = Self {
            tag: item.tag,
            ..Default::default()
        };
        object.replace(item);
        object
    }

    /// The player object as described by a player message.
    pub fn from_player(player: &Player) -> Self {
        let weight = i32::try_from(player.weight).unwrap_or(i32::MAX);
        Self {
            tag: player.tag,
            name: player.name.clone(),
            face: player.face,
            weight,
            total_weight: weight,
            ..Default::default()
        }
    }

    /// Overwrites every described field. Examine text and container stay.
    pub fn replace(&mut self, item: &ItemObject) {
        self.name.clone_from(&item.name);
        self.plural_name.clone_from(&item.plural);
        self.face = item.face;
        self.weight = item.weight;
        self.flags = item.flags;
        self.kind = item.kind;
        self.nrof = item.nrof;
        self.anim = item.anim;
        self.anim_speed = item.anim_speed;
    }

    /// Applies one delta field. Returns the new location for a location
    /// field, which the caller has to carry out as a move.
    pub fn apply(&mut self, field: &ItemField) -> Option<Tag> {
        match field {
            ItemField::Location(to) => return Some(*to),
            ItemField::Flags(flags) => self.flags = *flags,
            ItemField::Weight(weight) => self.weight = *weight,
            ItemField::Face(face) => self.face = *face,
            ItemField::Name { name, plural } => {
                self.name.clone_from(name);
                self.plural_name.clone_from(plural);
            }
            ItemField::Anim(anim) => self.anim = *anim,
            ItemField::AnimSpeed(speed) => self.anim_speed = *speed,
            ItemField::Nrof(nrof) => self.nrof = *nrof,
        }
        None
    }

    /// Whether this object holds other objects.
    pub fn is_container(&self) -> bool {
        is_container_kind(self.kind)
    }

    /// Name as displayed for the current stack size.
    pub fn display_name(&self) -> &str {
        if self.nrof > 1 && !self.plural_name.is_empty() {
            &self.plural_name
        } else {
            &self.name
        }
    }
}

/// The objects held by one owner: the ground (tag 0), the player, or a
/// container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub owner: Tag,
    pub name: String,
    members: Vec<Tag>,
}

impl Inventory {
    pub fn new(owner: Tag) -> Self {
        Self {
            owner,
            ..Default::default()
        }
    }

    /// Member tags in display order (by item type, then arrival).
    pub fn members(&self) -> &[Tag] {
        &self.members
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.members.contains(&tag)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Inserts `tag` after every member whose type is not greater than
    /// `kind`. A tag already present is re-positioned.
    pub(crate) fn insert_sorted(&mut self, tag: Tag, kind: u16, kind_of: impl Fn(Tag) -> u16) {
        self.remove(tag);
        let at = self.members.partition_point(|&m| kind_of(m) <= kind);
        self.members.insert(at, tag);
    }

    pub(crate) fn remove(&mut self, tag: Tag) -> bool {
        let before = self.members.len();
        self.members.retain(|&m| m != tag);
        self.members.len() != before
    }

    pub(crate) fn take_members(&mut self) -> Vec<Tag> {
        std::mem::take(&mut self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fields_independently() {
        let mut object = GameObject::from_item(&ItemObject {
            tag: Tag(5),
            name: "sword".into(),
            weight: 100,
            nrof: 1,
            ..Default::default()
        });
        object.examine_text = "sharp\n".into();

        assert_eq!(object.apply(&ItemField::Nrof(3)), None);
        assert_eq!(
            object.apply(&ItemField::Name {
                name: "sword".into(),
                plural: "swords".into()
            }),
            None
        );
        assert_eq!(object.apply(&ItemField::Location(Tag(9))), Some(Tag(9)));

        assert_eq!(object.nrof, 3);
        assert_eq!(object.weight, 100);
        assert_eq!(object.display_name(), "swords");
        assert_eq!(object.examine_text, "sharp\n");
    }

    #[test]
    fn test_replace_keeps_examine_and_container() {
        let mut object = GameObject::from_item(&ItemObject {
            tag: Tag(5),
            name: "bag".into(),
            ..Default::default()
        });
        object.container = Some(Tag(1));
        object.examine_text = "leather\n".into();

        object.replace(&ItemObject {
            tag: Tag(5),
            name: "large bag".into(),
            kind: 51,
            ..Default::default()
        });

        assert_eq!(object.name, "large bag");
        assert_eq!(object.container, Some(Tag(1)));
        assert_eq!(object.examine_text, "leather\n");
        assert!(object.is_container());
    }

    #[test]
    fn test_insert_sorted_is_stable_by_kind() {
        let kinds = |t: Tag| match t.0 {
            1 | 3 => 10,
            2 => 5,
            _ => 20,
        };
        let mut inventory = Inventory::new(Tag::GROUND);

        inventory.insert_sorted(Tag(1), 10, kinds);
        inventory.insert_sorted(Tag(4), 20, kinds);
        inventory.insert_sorted(Tag(3), 10, kinds);
        inventory.insert_sorted(Tag(2), 5, kinds);

        assert_eq!(inventory.members(), &[Tag(2), Tag(1), Tag(3), Tag(4)]);

        inventory.insert_sorted(Tag(1), 10, kinds);
        assert_eq!(inventory.members(), &[Tag(2), Tag(3), Tag(1), Tag(4)]);
    }

    #[test]
    fn test_from_player_clamps_weight() {
        let object = GameObject::from_player(&Player {
            tag: Tag(7),
            weight: u32::MAX,
            face: FaceId(3),
            name: "Ash".into(),
        });
        assert_eq!(object.weight, i32::MAX);
        assert_eq!(object.total_weight, i32::MAX);
    }
}
