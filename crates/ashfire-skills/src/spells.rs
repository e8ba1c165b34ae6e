//! The spells the player knows.

use ashfire_protocol::{AddSpell, DeleteSpell, Spell, SpellField, Tag, UpdateSpell};

/// Known spells in display order: grouped by casting skill, otherwise in
/// the order the server first sent them.
#[derive(Debug, Default)]
pub struct SpellStore {
    spells: Vec<Spell>,
    /// Distinct casting skills, in the order of `spells`.
    skills: Vec<u8>,
}

impl SpellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spell(&self, tag: Tag) -> Option<&Spell> {
        self.spells.iter().find(|s| s.tag == tag)
    }

    pub fn spells(&self) -> &[Spell] {
        &self.spells
    }

    /// The first spell named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<&Spell> {
        self.spells.iter().find(|s| s.name == name)
    }

    /// Casting skills with at least one known spell.
    pub fn skills(&self) -> &[u8] {
        &self.skills
    }

    /// The spells cast with `skill`, in display order.
    pub fn by_skill(&self, skill: u8) -> impl Iterator<Item = &Spell> {
        self.spells.iter().filter(move |s| s.skill == skill)
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }

    pub fn clear(&mut self) {
        self.spells.clear();
        self.skills.clear();
    }

    // =========================================================================
    // Server messages
    // =========================================================================

    /// Adds the spells. A tag that is already known is replaced in place.
    pub fn handle_add_spell(&mut self, add: &AddSpell) {
        for spell in &add.spells {
            match self.spells.iter_mut().find(|s| s.tag == spell.tag) {
                Some(known) => *known = spell.clone(),
                None => self.spells.push(spell.clone()),
            }
        }
        self.spells.sort_by_key(|s| s.skill);
        self.skills = self.spells.iter().map(|s| s.skill).collect();
        self.skills.dedup();
        tracing::debug!(added = add.spells.len(), known = self.spells.len(), "spells added");
    }

    /// Applies the delta fields. Returns `false` for an unknown tag.
    pub fn handle_update_spell(&mut self, update: &UpdateSpell) -> bool {
        let Some(spell) = self.spells.iter_mut().find(|s| s.tag == update.tag) else {
            tracing::warn!(tag = %update.tag, "update for unknown spell ignored");
            return false;
        };
        for field in &update.fields {
            match *field {
                SpellField::Mana(mana) => spell.mana = mana,
                SpellField::Grace(grace) => spell.grace = grace,
                SpellField::Damage(damage) => spell.damage = damage,
            }
        }
        true
    }

    /// Forgets a spell. Returns `false` for an unknown tag.
    pub fn handle_delete_spell(&mut self, delete: &DeleteSpell) -> bool {
        let Some(index) = self.spells.iter().position(|s| s.tag == delete.tag) else {
            return false;
        };
        let removed = self.spells.remove(index);
        if !self.spells.iter().any(|s| s.skill == removed.skill) {
            self.skills.retain(|&skill| skill != removed.skill);
        }
        true
    }
}
