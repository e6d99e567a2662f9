use std::path::Path;

use huddle_core::models::CommentDraft;

use crate::cli::CommentCommands;
use crate::commands::common::{join_content, normalize_record_id, open_context};
use crate::error::CliError;

pub async fn run_comment(
    command: CommentCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        CommentCommands::Add { item, body } => {
            let item_id = normalize_record_id(&item)?;
            let body = join_content(&body)?;
            let context = open_context(db_path, profile)?;
            let comment = context
                .engine
                .create_comment(&context.session, CommentDraft::new(item_id, body))
                .await?;
            println!("{}", comment.header.id);
            Ok(())
        }
    }
}
