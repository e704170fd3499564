use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::{command_failure, print_ok_envelope};
use crate::config::AppConfig;
use crate::models::QueryEnvelope;
use crate::store::{StoreError, restore_store};

const COMMAND: &str = "restore";

#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {}

pub fn run(_args: &RestoreArgs, config: &AppConfig) -> Result<()> {
    let store = &config.store;
    println!(
        "restore: start backup={} store={}",
        store.backup.display(),
        store.database.display()
    );

    restore_store(&store.database, &store.backup, store.busy_timeout).map_err(|error| {
        let code = match &error {
            StoreError::MissingBackup { .. } => "restore_backup_missing",
            _ => "restore_failed",
        };
        command_failure(
            QueryEnvelope::failure(COMMAND, code, "failed to restore store from backup", &error)
                .with_meta("backup_path", json!(store.backup.display().to_string()))
                .with_meta("store_path", json!(store.database.display().to_string())),
        )
    })?;
    println!("restore: complete");

    print_ok_envelope(
        COMMAND,
        &json!({
            "backup_path": store.backup.display().to_string(),
            "store_path": store.database.display().to_string(),
        }),
        |envelope| envelope,
    )
}
