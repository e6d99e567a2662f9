//! List item model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::require_text;
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::Result;

/// A checkable entry in a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub list_id: RecordId,
    pub content: String,
    #[serde(default)]
    pub checked: bool,
    /// Sort position within the list
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub list_id: RecordId,
    pub content: String,
    #[serde(default)]
    pub position: i64,
}

impl ItemDraft {
    pub fn new(list_id: RecordId, content: impl Into<String>) -> Self {
        Self {
            list_id,
            content: content.into(),
            position: 0,
        }
    }

    #[must_use]
    pub const fn at_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }
}

impl Record for Item {
    const KIND: EntityKind = EntityKind::Item;
    const FIELDS: &'static [&'static str] = &["list_id", "content", "checked", "position"];

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
            Value::Text(self.content.clone()),
            Value::Integer(i64::from(self.checked)),
            Value::Integer(self.position),
        ])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            header,
            list_id: row.get(offset)?,
            content: row.get(offset + 1)?,
            checked: row.get::<_, i64>(offset + 2)? != 0,
            position: row.get(offset + 3)?,
        })
    }
}

impl Draft for ItemDraft {
    type Record = Item;

    fn parent_id(&self) -> Option<&RecordId> {
        Some(&self.list_id)
    }

    fn validate(&self) -> Result<()> {
        require_text("item content", &self.content)
    }

    fn into_record(self, header: RecordHeader) -> Item {
        Item {
            header,
            list_id: self.list_id,
            content: self.content.trim().to_string(),
            checked: false,
            position: self.position,
        }
    }

    fn into_action(self) -> Action {
        Action::CreateItem(self)
    }
}
