//! Skill definitions, the skills the player knows, and experience.
//!
//! Definitions come from the `SkillInfo` and `SkillExtra` info topics, the
//! level table from `ExpTable`. What the player knows arrives through
//! `Stats`, which may come before or after the definitions.

use std::collections::{BTreeMap, HashMap};

use ashfire_protocol::{FaceId, InfoTopic, ReplyInfo, Stat, Stats};

/// A skill the server defines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skill {
    pub number: u16,
    pub name: String,
    pub face: FaceId,
    pub description: String,
}

/// The player's standing in one skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KnownSkill {
    pub skill: u16,
    pub level: u8,
    pub exp: u64,
}

/// Ordering for [`SkillStore::known_skills`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkillSort {
    #[default]
    Level,
    Exp,
    Name,
}

#[derive(Debug, Default)]
pub struct SkillStore {
    skills: BTreeMap<u16, Skill>,
    known: HashMap<u16, KnownSkill>,
    exp_table: Vec<u64>,
    player_level: u16,
    player_exp: u64,
}

impl SkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skill(&self, number: u16) -> Option<&Skill> {
        self.skills.get(&number)
    }

    /// Every defined skill, by number.
    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    pub fn known(&self, number: u16) -> Option<KnownSkill> {
        self.known.get(&number).copied()
    }

    /// The skills the player knows. Ties keep skill-number order.
    pub fn known_skills(&self, sort: SkillSort, ascending: bool) -> Vec<KnownSkill> {
        let mut out: Vec<KnownSkill> = self.known.values().copied().collect();
        out.sort_by_key(|k| k.skill);
        match sort {
            SkillSort::Level => out.sort_by_key(|k| k.level),
            SkillSort::Exp => out.sort_by_key(|k| k.exp),
            SkillSort::Name => out.sort_by(|a, b| self.name_of(a.skill).cmp(self.name_of(b.skill))),
        }
        if !ascending {
            out.reverse();
        }
        out
    }

    pub fn exp_table(&self) -> &[u64] {
        &self.exp_table
    }

    pub fn player_level(&self) -> u16 {
        self.player_level
    }

    pub fn player_exp(&self) -> u64 {
        self.player_exp
    }

    /// Experience still needed to go from `level` to the next one, or 0
    /// when the table has no next level.
    pub fn exp_to_next_level(&self, level: u16, exp: u64) -> u64 {
        self.exp_table
            .get(usize::from(level))
            .map_or(0, |&next| next.saturating_sub(exp))
    }

    /// How far `exp` has come from `level` toward the next one, in `0.0..=1.0`.
    ///
    /// Returns 1.0 past the end of the table.
    pub fn progress(&self, level: u16, exp: u64) -> f64 {
        let level = usize::from(level);
        let Some(&next) = self.exp_table.get(level) else {
            return 1.0;
        };
        let base = match level {
            0 => 0,
            _ => self.exp_table.get(level - 1).copied().unwrap_or(0),
        };
        if next <= base {
            return 1.0;
        }
        let done = exp.saturating_sub(base) as f64 / (next - base) as f64;
        done.clamp(0.0, 1.0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn name_of(&self, number: u16) -> &str {
        self.skills.get(&number).map_or("", |s| s.name.as_str())
    }

    // =========================================================================
    // Server messages
    // =========================================================================

    /// Absorbs a reply to one of the skill topics. Returns `false` for
    /// other topics.
    pub fn handle_reply_info(&mut self, reply: &ReplyInfo) -> bool {
        match reply.topic {
            InfoTopic::SkillInfo => {
                for info in &reply.skills {
                    let skill = self.skills.entry(info.skill).or_default();
                    skill.number = info.skill;
                    skill.name.clone_from(&info.name);
                    skill.face = info.face;
                }
                tracing::debug!(count = reply.skills.len(), "skill definitions received");
            }
            InfoTopic::SkillExtra => {
                for info in &reply.skills {
                    let skill = self.skills.entry(info.skill).or_default();
                    skill.number = info.skill;
                    skill.description.clone_from(&info.description);
                }
            }
            InfoTopic::ExpTable => {
                self.exp_table.clone_from(&reply.exp_table);
                tracing::debug!(levels = self.exp_table.len(), "experience table received");
            }
            InfoTopic::ImageInfo => return false,
        }
        true
    }

    pub fn handle_stats(&mut self, stats: &Stats) {
        for stat in &stats.stats {
            match *stat {
                Stat::Skill { skill, level, exp } => {
                    self.known.insert(skill, KnownSkill { skill, level, exp });
                }
                Stat::Exp { value } => self.player_exp = value,
                Stat::Level { value } => self.player_level = value,
                Stat::Other => {}
            }
        }
    }
}
