//! The informational commands every server understands, with the text
//! classification their output arrives under.

use std::fmt;
use std::str::FromStr;

use ashfire_protocol::{PacketId, msg_subtype, msg_type};
use ashfire_transport::Outbound;

use crate::{QueryError, QueryManager};

/// A built-in command with a known reply shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardCommand {
    Who,
    Statistics,
    Body,
    Inventory,
    Skills,
    Maps,
    Hiscore,
    News,
    Rules,
    Motd,
    /// Accepts a topic; answering keeps offering topics.
    Help,
    /// Accepts the new title.
    Title,
}

impl StandardCommand {
    /// Every standard command, in menu order.
    pub const ALL: [StandardCommand; 12] = [
        StandardCommand::Who,
        StandardCommand::Statistics,
        StandardCommand::Body,
        StandardCommand::Inventory,
        StandardCommand::Skills,
        StandardCommand::Maps,
        StandardCommand::Hiscore,
        StandardCommand::News,
        StandardCommand::Rules,
        StandardCommand::Motd,
        StandardCommand::Help,
        StandardCommand::Title,
    ];

    /// Command text as sent to the server.
    pub fn command(self) -> &'static str {
        match self {
            StandardCommand::Who => "who",
            StandardCommand::Statistics => "statistics",
            StandardCommand::Body => "body",
            StandardCommand::Inventory => "inventory",
            StandardCommand::Skills => "skills",
            StandardCommand::Maps => "maps",
            StandardCommand::Hiscore => "hiscore",
            StandardCommand::News => "news",
            StandardCommand::Rules => "rules",
            StandardCommand::Motd => "motd",
            StandardCommand::Help => "help",
            StandardCommand::Title => "title",
        }
    }

    /// `(type, subtype)` of the text output that answers the command.
    pub fn correlation(self) -> (u8, u8) {
        use msg_subtype::*;
        match self {
            StandardCommand::Who => (msg_type::COMMAND, COMMAND_WHO),
            StandardCommand::Statistics => (msg_type::COMMAND, COMMAND_STATISTICS),
            StandardCommand::Body => (msg_type::COMMAND, COMMAND_BODY),
            StandardCommand::Inventory => (msg_type::COMMAND, COMMAND_INVENTORY),
            StandardCommand::Skills => (msg_type::SKILL, SKILL_LIST),
            StandardCommand::Maps => (msg_type::COMMAND, COMMAND_MAPS),
            StandardCommand::Hiscore => (msg_type::ADMIN, ADMIN_HISCORE),
            StandardCommand::News => (msg_type::ADMIN, ADMIN_NEWS),
            StandardCommand::Rules => (msg_type::ADMIN, ADMIN_RULES),
            StandardCommand::Motd => (msg_type::MOTD, 0),
            StandardCommand::Help => (msg_type::COMMAND, COMMAND_INFO),
            StandardCommand::Title => (msg_type::COMMAND, COMMAND_CONFIG),
        }
    }

    /// Sends the command through `manager`.
    ///
    /// `Help` is issued as a repeatable input query, `Title` as an input
    /// query labelled "Set Title"; the rest are simple queries.
    pub fn issue(self, manager: &mut QueryManager, out: &dyn Outbound) -> Result<PacketId, QueryError> {
        let (ty, st) = self.correlation();
        match self {
            StandardCommand::Help => {
                let query = manager.query_simple_with_input(out, self.command(), ty, st)?;
                query.repeat = true;
                Ok(query.packet)
            }
            StandardCommand::Title => {
                let query = manager.query_simple_with_input(out, self.command(), ty, st)?;
                query.submit_label = Some("Set Title".into());
                Ok(query.packet)
            }
            _ => manager.query_simple(out, self.command(), ty, st),
        }
    }
}

impl fmt::Display for StandardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for StandardCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardCommand::ALL
            .into_iter()
            .find(|c| c.command().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown command {s:?}"))
    }
}
