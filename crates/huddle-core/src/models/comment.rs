//! Comment model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::require_text;
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub item_id: RecordId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub item_id: RecordId,
    pub body: String,
}

impl CommentDraft {
    pub fn new(item_id: RecordId, body: impl Into<String>) -> Self {
        Self {
            item_id,
            body: body.into(),
        }
    }
}

impl Record for Comment {
    const KIND: EntityKind = EntityKind::Comment;
    const FIELDS: &'static [&'static str] = &["item_id", "body"];

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.item_id)
    }

    fn field_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            Value::Text(self.item_id.to_string()),
            Value::Text(self.body.clone()),
        ])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            header,
            item_id: row.get(offset)?,
            body: row.get(offset + 1)?,
        })
    }
}

impl Draft for CommentDraft {
    type Record = Comment;

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.item_id)
    }

    fn validate(&self) -> Result<()> {
        require_text("comment", &self.body)
    }

    fn into_record(self, header: RecordHeader) -> Comment {
        Comment {
            header,
            item_id: self.item_id,
            body: self.body.trim().to_string(),
        }
    }

    fn into_action(self) -> Action {
        Action::CreateComment(self)
    }
}
