//! Entity kinds and their parent/child relations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A child table whose foreign key column points at a parent kind's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cascade {
    pub child: EntityKind,
    pub foreign_key: &'static str,
}

/// Every synchronized entity type. Each kind is stored in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Group,
    List,
    Item,
    Note,
    Comment,
    Poll,
}

impl EntityKind {
    /// All kinds, parents before children.
    pub const ALL: [Self; 6] = [
        Self::Group,
        Self::List,
        Self::Item,
        Self::Note,
        Self::Comment,
        Self::Poll,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::List => "list",
            Self::Item => "item",
            Self::Note => "note",
            Self::Comment => "comment",
            Self::Poll => "poll",
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            Self::Group => "groups",
            Self::List => "lists",
            Self::Item => "items",
            Self::Note => "notes",
            Self::Comment => "comments",
            Self::Poll => "polls",
        }
    }

    /// Children whose foreign key must follow this kind's id when it changes.
    pub const fn cascades(self) -> &'static [Cascade] {
        match self {
            Self::Group => &[Cascade {
                child: Self::List,
                foreign_key: "group_id",
            }],
            Self::List => &[
                Cascade {
                    child: Self::Item,
                    foreign_key: "list_id",
                },
                Cascade {
                    child: Self::Note,
                    foreign_key: "list_id",
                },
                Cascade {
                    child: Self::Poll,
                    foreign_key: "list_id",
                },
            ],
            Self::Item => &[Cascade {
                child: Self::Comment,
                foreign_key: "item_id",
            }],
            Self::Note | Self::Comment | Self::Poll => &[],
        }
    }

    /// The kind this kind's foreign key points at, if any.
    pub fn parent(self) -> Option<Self> {
        self.parent_link().map(|(parent, _)| parent)
    }

    /// Column holding the parent's id, if this kind has a parent.
    pub fn foreign_key(self) -> Option<&'static str> {
        self.parent_link().map(|(_, foreign_key)| foreign_key)
    }

    fn parent_link(self) -> Option<(Self, &'static str)> {
        Self::ALL.into_iter().find_map(|candidate| {
            candidate
                .cascades()
                .iter()
                .find(|cascade| cascade.child == self)
                .map(|cascade| (candidate, cascade.foreign_key))
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown entity kind '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_follow_cascade_declarations() {
        assert_eq!(EntityKind::Group.parent(), None);
        assert_eq!(EntityKind::List.parent(), Some(EntityKind::Group));
        assert_eq!(EntityKind::Item.parent(), Some(EntityKind::List));
        assert_eq!(EntityKind::Poll.parent(), Some(EntityKind::List));
        assert_eq!(EntityKind::Comment.parent(), Some(EntityKind::Item));
        assert_eq!(EntityKind::Comment.foreign_key(), Some("item_id"));
        assert_eq!(EntityKind::Group.foreign_key(), None);
    }

    #[test]
    fn all_lists_parents_before_children() {
        for (index, kind) in EntityKind::ALL.iter().enumerate() {
            if let Some(parent) = kind.parent() {
                let parent_index = EntityKind::ALL.iter().position(|k| *k == parent).unwrap();
                assert!(parent_index < index, "{parent} must precede {kind}");
            }
        }
    }

    #[test]
    fn parses_kind_names() {
        assert_eq!("List".parse::<EntityKind>().unwrap(), EntityKind::List);
        assert!("widget".parse::<EntityKind>().is_err());
    }
}
