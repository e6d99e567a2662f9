use std::path::Path;

use huddle_core::models::PollDraft;

use crate::cli::PollCommands;
use crate::commands::common::{normalize_content, normalize_record_id, open_context};
use crate::error::CliError;

pub async fn run_poll(
    command: PollCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        PollCommands::Create {
            list,
            question,
            options,
        } => {
            let list_id = normalize_record_id(&list)?;
            let question = normalize_content(&question).ok_or(CliError::EmptyContent)?;
            let context = open_context(db_path, profile)?;
            let poll = context
                .engine
                .create_poll(&context.session, PollDraft::new(list_id, question, options))
                .await?;
            println!("{}", poll.header.id);
            Ok(())
        }
        PollCommands::Vote { id, option } => {
            let id = normalize_record_id(&id)?;
            let context = open_context(db_path, profile)?;
            let poll = context.engine.cast_vote(&context.session, &id, option).await?;
            let votes = poll.options.get(option).map_or(0, |choice| choice.votes);
            println!("{} option {option} now has {votes} vote(s)", poll.header.id);
            Ok(())
        }
    }
}
