//! Group model

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::record::require_text;
use super::{Action, Draft, EntityKind, Record, RecordHeader, RecordId};
use crate::error::Result;

/// A group that lists can be shared within
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDraft {
    pub name: String,
}

impl GroupDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Record for Group {
    const KIND: EntityKind = EntityKind::Group;
    const FIELDS: &'static [&'static str] = &["name"];

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn parent_id(&self) -> Option<&RecordId> {
        None
    }

    fn field_values(&self) -> Result<Vec<Value>> {
        Ok(vec![Value::Text(self.name.clone())])
    }

    fn from_row(header: RecordHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            header,
            name: row.get(offset)?,
        })
    }
}

impl Draft for GroupDraft {
    type Record = Group;

    fn parent_id(&self) -> Option<&RecordId> {
        None
    }

    fn validate(&self) -> Result<()> {
        require_text("group name", &self.name)
    }

    fn into_record(self, header: RecordHeader) -> Group {
        Group {
            header,
            name: self.name.trim().to_string(),
        }
    }

    fn into_action(self) -> Action {
        Action::CreateGroup(self)
    }
}
