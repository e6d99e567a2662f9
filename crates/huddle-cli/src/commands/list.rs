use std::path::Path;

use huddle_core::models::{Comment, Item, List, ListDraft, Note, Poll};
use huddle_core::SyncEngine;
use serde::Serialize;

use crate::cli::ListCommands;
use crate::commands::common::{
    format_record_line, item_line, join_content, list_line, normalize_record_id, note_line,
    open_context, poll_line, record_line, RecordLine,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ListView {
    pub list: RecordLine,
    pub items: Vec<ItemView>,
    pub notes: Vec<RecordLine>,
    pub polls: Vec<RecordLine>,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub item: RecordLine,
    pub comments: Vec<RecordLine>,
}

pub async fn run_list(
    command: ListCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ListCommands::Create { title, group } => {
            let title = join_content(&title)?;
            let mut draft = ListDraft::new(title);
            if let Some(group) = group {
                draft = draft.in_group(normalize_record_id(&group)?);
            }
            let context = open_context(db_path, profile)?;
            let list = context
                .engine
                .create_list(&context.session, draft)
                .await?;
            println!("{}", list.header.id);
            Ok(())
        }
        ListCommands::Show { id, json } => {
            let context = open_context(db_path, profile)?;
            let view = load_list_view(&context.engine, &id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for line in render_list_view(&view) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        ListCommands::Ls { json } => {
            let context = open_context(db_path, profile)?;
            let lines = context
                .engine
                .all::<List>()
                .await?
                .iter()
                .map(list_line)
                .collect::<Vec<_>>();
            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else if lines.is_empty() {
                println!("No lists yet.");
            } else {
                for line in &lines {
                    println!("{}", format_record_line(line));
                }
            }
            Ok(())
        }
    }
}

pub async fn load_list_view(engine: &SyncEngine, id: &str) -> Result<ListView, CliError> {
    let id = normalize_record_id(id)?;
    let list = engine
        .get::<List>(&id)
        .await?
        .ok_or_else(|| CliError::RecordNotFound {
            kind: "List",
            id: id.to_string(),
        })?;

    let mut items = Vec::new();
    for item in engine.children::<Item>(&id).await? {
        let comments = engine
            .children::<Comment>(&item.header.id)
            .await?
            .iter()
            .map(|comment| record_line(comment, comment.body.clone()))
            .collect();
        items.push(ItemView {
            item: item_line(&item),
            comments,
        });
    }

    let notes = engine
        .children::<Note>(&id)
        .await?
        .iter()
        .map(note_line)
        .collect();
    let polls = engine
        .children::<Poll>(&id)
        .await?
        .iter()
        .map(poll_line)
        .collect();

    Ok(ListView {
        list: list_line(&list),
        items,
        notes,
        polls,
    })
}

pub fn render_list_view(view: &ListView) -> Vec<String> {
    let mut lines = vec![format_record_line(&view.list)];
    for item in &view.items {
        lines.push(format!("  {}", format_record_line(&item.item)));
        for comment in &item.comments {
            lines.push(format!("      > {}", format_record_line(comment)));
        }
    }
    if !view.notes.is_empty() {
        lines.push("  Notes:".to_string());
        lines.extend(
            view.notes
                .iter()
                .map(|note| format!("  {}", format_record_line(note))),
        );
    }
    if !view.polls.is_empty() {
        lines.push("  Polls:".to_string());
        lines.extend(
            view.polls
                .iter()
                .map(|poll| format!("  {}", format_record_line(poll))),
        );
    }
    lines
}
