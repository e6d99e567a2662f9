pub mod auth_cmd;
pub mod comment;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod group;
pub mod item;
pub mod list;
pub mod note;
pub mod poll;
pub mod queue;
pub mod sync;
