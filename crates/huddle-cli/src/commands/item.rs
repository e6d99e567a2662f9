use std::path::Path;

use huddle_core::models::{Item, ItemDraft};

use crate::cli::ItemCommands;
use crate::commands::common::{join_content, normalize_record_id, open_context};
use crate::error::CliError;

pub async fn run_item(
    command: ItemCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ItemCommands::Add {
            list,
            content,
            position,
        } => {
            let list_id = normalize_record_id(&list)?;
            let content = join_content(&content)?;
            let context = open_context(db_path, profile)?;
            let item = context
                .engine
                .create_item(
                    &context.session,
                    ItemDraft::new(list_id, content).at_position(position),
                )
                .await?;
            println!("{}", item.header.id);
            Ok(())
        }
        ItemCommands::Toggle { id } => {
            let id = normalize_record_id(&id)?;
            let context = open_context(db_path, profile)?;
            let current = context
                .engine
                .get::<Item>(&id)
                .await?
                .ok_or_else(|| CliError::RecordNotFound {
                    kind: "Item",
                    id: id.to_string(),
                })?;
            let item = context
                .engine
                .toggle_item(&context.session, &id, !current.checked)
                .await?;
            let state = if item.checked { "checked" } else { "unchecked" };
            println!("{} {state}", item.header.id);
            Ok(())
        }
    }
}
