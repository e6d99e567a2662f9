use std::path::Path;

use huddle_core::models::NoteDraft;

use crate::cli::NoteCommands;
use crate::commands::common::{join_content, normalize_record_id, open_context};
use crate::error::CliError;

pub async fn run_note(
    command: NoteCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        NoteCommands::Add { list, body } => {
            let list_id = normalize_record_id(&list)?;
            let body = join_content(&body)?;
            let context = open_context(db_path, profile)?;
            let note = context
                .engine
                .create_note(&context.session, NoteDraft::new(list_id, body))
                .await?;
            println!("{}", note.header.id);
            Ok(())
        }
    }
}
