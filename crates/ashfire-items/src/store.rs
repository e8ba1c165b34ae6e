//! The object table and its inventories.

use std::collections::HashMap;
use std::fmt;

use ashfire_protocol::{
    DeleteInventory, DeleteItem, Item2, ItemObject, Player, Tag, UpdateItem,
};

use crate::object::{GameObject, Inventory};

/// Something in the object model changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEvent {
    /// Members were added, removed, or re-ordered.
    InventoryChanged(Tag),
    /// Fields of an object changed.
    ObjectChanged(Tag),
    /// The examine text of an object changed.
    ExamineChanged(Tag),
}

/// Callback observing object model changes.
pub type ItemObserver = Box<dyn FnMut(&ItemEvent) + Send>;

/// What a player message meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerChange {
    /// The player object is now `tag`.
    Entered(Tag),
    /// An empty player message: the player left the game.
    Left,
}

/// Every known object, keyed by tag, and the inventories listing them.
///
/// An object listed in an inventory always has that inventory's owner as
/// its `container`, and appears in no other inventory. An object with no
/// `container` is listed nowhere.
#[derive(Default)]
pub struct ItemStore {
    pub(crate) objects: HashMap<Tag, GameObject>,
    pub(crate) inventories: HashMap<Tag, Inventory>,
    pub(crate) player: Option<Tag>,
    pub(crate) pending_examine: Option<Tag>,
    pub(crate) observer: Option<ItemObserver>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or removes) the change observer.
    pub fn set_observer(&mut self, observer: Option<ItemObserver>) {
        self.observer = observer;
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn object(&self, tag: Tag) -> Option<&GameObject> {
        self.objects.get(&tag)
    }

    pub fn inventory(&self, owner: Tag) -> Option<&Inventory> {
        self.inventories.get(&owner)
    }

    pub fn inventories(&self) -> impl Iterator<Item = &Inventory> {
        self.inventories.values()
    }

    /// The objects of `owner`'s inventory in display order.
    pub fn contents(&self, owner: Tag) -> impl Iterator<Item = &GameObject> {
        self.inventories
            .get(&owner)
            .map(|inv| inv.members())
            .unwrap_or_default()
            .iter()
            .filter_map(|tag| self.objects.get(tag))
    }

    /// The first object named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&GameObject> {
        self.objects.values().find(|o| o.name == name)
    }

    /// The player's tag, once a player message has named them.
    pub fn player_tag(&self) -> Option<Tag> {
        self.player
    }

    /// The object whose examine text is being collected.
    pub fn pending_examine(&self) -> Option<Tag> {
        self.pending_examine
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Forgets every object and inventory.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.inventories.clear();
        self.player = None;
        self.pending_examine = None;
    }

    // =========================================================================
    // Server messages
    // =========================================================================

    /// Records the player object and names the player's inventory.
    pub fn handle_player(&mut self, player: &Player) -> PlayerChange {
        if player.name.is_empty() {
            tracing::info!("player left the game");
            self.player = None;
            return PlayerChange::Left;
        }

        let tag = player.tag;
        self.player = Some(tag);
        match self.objects.get_mut(&tag) {
            Some(object) => {
                let fresh = GameObject::from_player(player);
                object.name = fresh.name;
                object.face = fresh.face;
                object.weight = fresh.weight;
                object.total_weight = fresh.total_weight;
            }
            None => {
                self.objects.insert(tag, GameObject::from_player(player));
            }
        }
        self.ensure_inventory(tag).name = format!("{}'s Inventory", player.name);
        tracing::debug!(%tag, name = %player.name, "player identified");
        self.emit(ItemEvent::ObjectChanged(tag));
        PlayerChange::Entered(tag)
    }

    /// Upserts every object of the payload and moves it into the
    /// payload's inventory.
    pub fn handle_item2(&mut self, item2: &Item2) {
        let location = item2.location;
        for item in &item2.objects {
            self.upsert(item);
        }
        self.name_inventory(location);

        let mut touched = Vec::new();
        for item in &item2.objects {
            self.place(item.tag, location, &mut touched);
            self.emit(ItemEvent::ObjectChanged(item.tag));
        }
        touched.push(location);
        self.emit_inventories(touched);
    }

    /// Applies the delta fields of one object. A location field moves the
    /// object between inventories in the same step. Returns `false` for an
    /// unknown tag.
    pub fn handle_update_item(&mut self, update: &UpdateItem) -> bool {
        let Some(object) = self.objects.get_mut(&update.tag) else {
            tracing::warn!(tag = %update.tag, "update for unknown object ignored");
            return false;
        };

        let mut moved_to = None;
        for field in &update.fields {
            if let Some(to) = object.apply(field) {
                moved_to = Some(to);
            }
        }

        let mut touched = Vec::new();
        if let Some(to) = moved_to {
            self.name_inventory(to);
            self.place(update.tag, to, &mut touched);
        }
        self.emit(ItemEvent::ObjectChanged(update.tag));
        self.emit_inventories(touched);
        true
    }

    /// Removes the objects from their inventories and the table.
    pub fn handle_delete_item(&mut self, delete: &DeleteItem) -> usize {
        let mut touched = Vec::new();
        let removed = delete
            .tags
            .iter()
            .filter(|&&tag| self.remove_object(tag, &mut touched))
            .count();
        self.emit_inventories(touched);
        removed
    }

    /// Empties an inventory and drops the objects it listed.
    pub fn handle_delete_inventory(&mut self, delete: &DeleteInventory) {
        let Some(inventory) = self.inventories.get_mut(&delete.tag) else {
            return;
        };
        let members = inventory.take_members();
        let mut touched = vec![delete.tag];
        for tag in members {
            self.remove_object(tag, &mut touched);
        }
        self.emit_inventories(touched);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn upsert(&mut self, item: &ItemObject) {
        match self.objects.get_mut(&item.tag) {
            Some(object) => object.replace(item),
            None => {
                self.objects.insert(item.tag, GameObject::from_item(item));
            }
        }
    }

    fn ensure_inventory(&mut self, owner: Tag) -> &mut Inventory {
        self.inventories
            .entry(owner)
            .or_insert_with(|| Inventory::new(owner))
    }

    /// Gives an unnamed inventory its display name.
    fn name_inventory(&mut self, owner: Tag) {
        let name = if owner.is_ground() {
            "Ground".to_string()
        } else if Some(owner) == self.player {
            let player = self.objects.get(&owner).map_or("", |o| o.name.as_str());
            format!("{player}'s Inventory")
        } else {
            self.objects
                .get(&owner)
                .map(|o| o.name.clone())
                .unwrap_or_default()
        };
        let inventory = self.ensure_inventory(owner);
        if inventory.name.is_empty() {
            inventory.name = name;
        }
    }

    /// Lists `tag` in `to`'s inventory, unlisting it from wherever it was.
    fn place(&mut self, tag: Tag, to: Tag, touched: &mut Vec<Tag>) {
        let Some(object) = self.objects.get_mut(&tag) else {
            return;
        };
        let from = object.container.replace(to);
        let kind = object.kind;

        if let Some(from) = from.filter(|&from| from != to) {
            let unlisted = self
                .inventories
                .get_mut(&from)
                .is_some_and(|previous| previous.remove(tag));
            if unlisted {
                touched.push(from);
            }
        }

        let objects = &self.objects;
        self.inventories
            .entry(to)
            .or_insert_with(|| Inventory::new(to))
            .insert_sorted(tag, kind, |t| objects.get(&t).map_or(0, |o| o.kind));
        touched.push(to);
    }

    /// Removes an object, and whatever its own inventory held.
    fn remove_object(&mut self, tag: Tag, touched: &mut Vec<Tag>) -> bool {
        let Some(object) = self.objects.remove(&tag) else {
            return false;
        };
        if let Some(container) = object.container {
            let unlisted = self
                .inventories
                .get_mut(&container)
                .is_some_and(|inventory| inventory.remove(tag));
            if unlisted {
                touched.push(container);
            }
        }
        if self.pending_examine == Some(tag) {
            self.pending_examine = None;
        }
        if let Some(mut owned) = self.inventories.remove(&tag) {
            for member in owned.take_members() {
                self.remove_object(member, touched);
            }
        }
        true
    }

    fn emit_inventories(&mut self, mut touched: Vec<Tag>) {
        touched.sort_unstable();
        touched.dedup();
        for owner in touched {
            self.emit(ItemEvent::InventoryChanged(owner));
        }
    }

    pub(crate) fn emit(&mut self, event: ItemEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }
}

impl fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStore")
            .field("objects", &self.objects.len())
            .field("inventories", &self.inventories.len())
            .field("player", &self.player)
            .field("pending_examine", &self.pending_examine)
            .finish()
    }
}
