//! Examine text collection.
//!
//! After an examine request, tagged text lines are appended to the
//! examined object until another object is examined. Two server quirks
//! are handled by prefix: a prompt to examine again triggers a fresh
//! request, and the echo preamble is dropped.

use ashfire_protocol::{DrawExtInfo, Examine, Message, Tag, msg_subtype, msg_type};

use crate::error::ItemError;
use crate::store::{ItemEvent, ItemStore};

const EXAMINE_AGAIN: &str = "Examine again";
const EXAMINE_ECHO: &str = "You examine the";

/// What [`ItemStore::accept_text`] did with a text line.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamineOutcome {
    /// Not examine output; the caller should show it normally.
    NotExamine,
    /// Appended to the examined object's text.
    Appended(Tag),
    /// Examine output that carries nothing new.
    Filtered,
    /// The server asked to examine again; send this message.
    ReRequest(Message),
}

/// Whether a text line carries examine output.
pub fn is_examine_text(info: &DrawExtInfo) -> bool {
    matches!(
        (info.msg_type, info.subtype),
        (msg_type::COMMAND, msg_subtype::COMMAND_EXAMINE) | (msg_type::SPELL, msg_subtype::SPELL_INFO)
    )
}

impl ItemStore {
    /// Starts collecting examine text for `tag`, clearing what it had.
    /// Returns the request to send.
    ///
    /// # Errors
    /// [`ItemError::UnknownObject`] when no such object is known.
    pub fn request_examine(&mut self, tag: Tag) -> Result<Message, ItemError> {
        let object = self
            .objects
            .get_mut(&tag)
            .ok_or(ItemError::UnknownObject(tag))?;
        object.examine_text.clear();
        self.pending_examine = Some(tag);
        tracing::debug!(%tag, "examining");
        self.emit(ItemEvent::ExamineChanged(tag));
        Ok(Message::Examine(Examine { tag }))
    }

    /// Routes a text line into the examined object's text if it is
    /// examine output.
    pub fn accept_text(&mut self, info: &DrawExtInfo) -> ExamineOutcome {
        if !is_examine_text(info) {
            return ExamineOutcome::NotExamine;
        }
        let Some(tag) = self.pending_examine else {
            return ExamineOutcome::NotExamine;
        };
        let Some(object) = self.objects.get_mut(&tag) else {
            return ExamineOutcome::NotExamine;
        };

        if info.message.starts_with(EXAMINE_AGAIN) {
            tracing::debug!(%tag, "server asked to examine again");
            return ExamineOutcome::ReRequest(Message::Examine(Examine { tag }));
        }
        if info.message.starts_with(EXAMINE_ECHO) {
            return ExamineOutcome::Filtered;
        }

        object.examine_text.push_str(&info.message);
        object.examine_text.push('\n');
        self.emit(ItemEvent::ExamineChanged(tag));
        ExamineOutcome::Appended(tag)
    }
}
