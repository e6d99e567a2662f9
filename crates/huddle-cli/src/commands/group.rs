use std::path::Path;

use huddle_core::models::GroupDraft;

use crate::cli::GroupCommands;
use crate::commands::common::{join_content, open_context};
use crate::error::CliError;

pub async fn run_group(
    command: GroupCommands,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    match command {
        GroupCommands::Create { name } => {
            let name = join_content(&name)?;
            let context = open_context(db_path, profile)?;
            let group = context
                .engine
                .create_group(&context.session, GroupDraft::new(name))
                .await?;
            println!("{}", group.header.id);
            Ok(())
        }
    }
}
