//! Note model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::require_text;
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::Result;

/// Free-form text attached to a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub list_id: RecordId,
    pub body: String,
}

impl Note {
    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.body
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub list_id: RecordId,
    pub body: String,
}

impl NoteDraft {
    pub fn new(list_id: RecordId, body: impl Into<String>) -> Self {
        Self {
            list_id,
            body: body.into(),
        }
    }
}

impl Record for Note {
    const KIND: EntityKind = EntityKind::Note;
    const FIELDS: &'static [&'static str] = &["list_id", "body"];

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
            Value::Text(self.body.clone()),
        ])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            header,
            list_id: row.get(offset)?,
            body: row.get(offset + 1)?,
        })
    }
}

impl Draft for NoteDraft {
    type Record = Note;

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.list_id)
    }

    fn validate(&self) -> Result<()> {
        require_text("note body", &self.body)
    }

    fn into_record(self, header: RecordHeader) -> Note {
        Note {
            header,
            list_id: self.list_id,
            body: self.body,
        }
    }

    fn into_action(self) -> Action {
        Action::CreateNote(self)
    }
}
