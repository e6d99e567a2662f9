//! Poll model

use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::require_text;
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

/// A poll attached to a list. Options are stored inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub list_id: RecordId,
    pub question: String,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Count one vote for the option at `option`.
    pub fn record_vote(&mut self, option: usize) -> Result<()> {
        let count = self.options.len();
        let choice = self.options.get_mut(option).ok_or_else(|| {
            Error::InvalidInput(format!(
                "poll option {option} is out of range (poll has {count} options)"
            ))
        })?;
        choice.votes = choice.votes.saturating_add(1);
        Ok(())
    }

    pub fn clear_votes(&mut self) {
        for option in &mut self.options {
            option.votes = 0;
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|option| option.votes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDraft {
    pub list_id: RecordId,
    pub question: String,
    pub options: Vec<String>,
}

impl PollDraft {
    pub fn new(
        list_id: RecordId,
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            list_id,
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

impl Record for Poll {
    const KIND: EntityKind = EntityKind::Poll;
    const FIELDS: &'static [&'static str] = &["list_id", "question", "options"];

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.list_id)
    }

    fn field_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            Value::Text(self.list_id.to_string()),
            Value::Text(self.question.clone()),
            Value::Text(serde_json::to_string(&self.options)?),
        ])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let raw_options: String = row.get(offset + 2)?;
        let options = serde_json::from_str(&raw_options).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(offset + 2, Type::Text, Box::new(error))
        })?;
        Ok(Self {
            header,
            list_id: row.get(offset)?,
            question: row.get(offset + 1)?,
            options,
        })
    }
}

impl Draft for PollDraft {
    type Record = Poll;

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.list_id)
    }

    fn validate(&self) -> Result<()> {
        require_text("poll question", &self.question)?;
        if self.options.len() < 2 {
            return Err(Error::InvalidInput(
                "a poll needs at least two options".to_string(),
            ));
        }
        for option in &self.options {
            require_text("poll option", option)?;
        }
        Ok(())
    }

    fn into_record(self, header: RecordHeader) -> Poll {
        Poll {
            header,
            list_id: self.list_id,
            question: self.question.trim().to_string(),
            options: self
                .options
                .into_iter()
                .map(|label| PollOption {
                    label: label.trim().to_string(),
                    votes: 0,
                })
                .collect(),
        }
    }

    fn into_action(self) -> Action {
        Action::CreatePoll(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorId;

    fn poll() -> Poll {
        let header = RecordHeader::pending_upload(RecordId::temporary(), AuthorId::anonymous(), 1);
        PollDraft::new(RecordId::from("3"), "Dinner?", ["Pizza", "Tacos"]).into_record(header)
    }

    #[test]
    fn record_vote_counts_votes() {
        let mut poll = poll();
        poll.record_vote(1).unwrap();
        poll.record_vote(1).unwrap();
        assert_eq!(poll.options[1].votes, 2);
        assert_eq!(poll.total_votes(), 2);
    }

    #[test]
    fn clear_votes_keeps_options() {
        let mut poll = poll();
        poll.record_vote(0).unwrap();
        poll.clear_votes();
        assert_eq!(poll.total_votes(), 0);
        assert_eq!(poll.options.len(), 2);
    }

    #[test]
    fn record_vote_rejects_unknown_option() {
        let mut poll = poll();
        let error = poll.record_vote(5).unwrap_err();
        assert!(error.to_string().contains("out of range"));
        assert_eq!(poll.total_votes(), 0);
    }

    #[test]
    fn draft_requires_two_options() {
        let draft = PollDraft::new(RecordId::from("3"), "Dinner?", ["Pizza"]);
        assert!(draft.validate().is_err());
    }
}
