use std::path::Path;

use huddle_core::EntityKind;

use crate::cli::KindArg;
use crate::commands::common::{normalize_record_id, open_context};
use crate::error::CliError;

pub async fn run_delete(
    kind: KindArg,
    id: &str,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let kind = EntityKind::from(kind);
    let id = normalize_record_id(id)?;
    let context = open_context(db_path, profile)?;
    let deleted = context
        .engine
        .delete_record(&context.session, kind, &id)
        .await?;
    println!("Deleted {} {}", kind.as_str(), deleted.header().id);
    Ok(())
}
