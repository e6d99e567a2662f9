//! List model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::{optional_id_value, require_text};
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::Result;

/// A shared list, optionally belonging to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    #[serde(flatten)]
    pub header: RecordHeader,
    /// Owning group, if any
    #[serde(default)]
    pub group_id: Option<RecordId>,
    pub title: String,
}

/// Fields needed to create a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDraft {
    pub title: String,
    #[serde(default)]
    pub group_id: Option<RecordId>,
}

impl ListDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            group_id: None,
        }
    }

    /// Place the list inside a group
    #[must_use]
    pub fn in_group(mut self, group_id: RecordId) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

impl Record for List {
    const KIND: EntityKind = EntityKind::List;
    const FIELDS: &'static [&'static str] = &["group_id", "title"];

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn parent_id(&self) -> Option<&RecordId> {
        self.group_id.as_ref()
    }

    fn field_values(&self) -> Result<Vec<Value>> {
        Ok(vec![
            optional_id_value(self.group_id.as_ref()),
            Value::Text(self.title.clone()),
        ])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            header,
            group_id: row.get(offset)?,
            title: row.get(offset + 1)?,
        })
    }
}

impl Draft for ListDraft {
    type Record = List;

    fn parent_id(&self) -> Option<&RecordId> {
        self.group_id.as_ref()
    }

    fn validate(&self) -> Result<()> {
        require_text("list title", &self.title)
    }

    fn into_record(self, header: RecordHeader) -> List {
        List {
            header,
            group_id: self.group_id,
            title: self.title.trim().to_string(),
        }
    }

    fn into_action(self) -> Action {
        Action::CreateList(self)
    }
}
