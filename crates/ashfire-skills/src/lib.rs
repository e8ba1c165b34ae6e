//! # ashfire-skills
//!
//! What the character can do, as the server reports it:
//!
//! - [`SpellStore`] - known spells keyed by tag, grouped by casting skill
//! - [`SkillStore`] - skill names and descriptions, the skills the player
//!   knows with their level and experience, and the experience table
//!
//! Both are mutated only from the dispatch path and need no locking of
//! their own.

pub mod skills;
pub mod spells;

pub use skills::{KnownSkill, Skill, SkillSort, SkillStore};
pub use spells::SpellStore;
