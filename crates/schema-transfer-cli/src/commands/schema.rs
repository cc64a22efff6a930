use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use schema_transfer_core::model::SchemaDiff;
use schema_transfer_core::{SchemaSession, SchemaSync, SyncError};
use std::path::{Path, PathBuf};
use tracing::info;

use super::Context;

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Show how the remote schema differs from the master's
    Diff,

    /// Bring the remote schema in line with the master's
    Apply {
        /// Apply this diff (JSON) instead of the computed one
        #[arg(long)]
        diff: Option<PathBuf>,
    },

    /// Write the computed diff to a file for review
    SaveDiff {
        file: PathBuf,
    },
}

pub async fn handle_schema_command(cmd: SchemaCommand, ctx: &Context) -> Result<()> {
    let (master, remote) = ctx.master_and_remote().await?;
    let sync = SchemaSync::with_exclusions(master, remote, ctx.exclusions());
    let mut session = sync.prepare().await?;
    print_session(&session, &sync);

    match cmd {
        SchemaCommand::Diff => {}
        SchemaCommand::Apply { diff } => {
            let loaded = match diff {
                Some(path) => Some(load_diff(&path).await?),
                None => None,
            };
            match sync.apply(&mut session, loaded.as_ref()).await {
                Ok(report) => {
                    println!(
                        "Applied {} change(s); skipped {} on protected collections",
                        report.applied(),
                        report.excluded
                    );
                }
                Err(SyncError::NotApplicable) => {
                    println!("Nothing to apply");
                }
                Err(e) => return Err(e.into()),
            }
        }
        SchemaCommand::SaveDiff { file } => {
            let Some(diff) = session.diff() else {
                bail!("Schemas already match; there is no diff to save");
            };
            let json = serde_json::to_string_pretty(diff)?;
            tokio::fs::write(&file, json)
                .await
                .with_context(|| format!("Failed to write {}", file.display()))?;
            info!("Saved diff to {}", file.display());
        }
    }

    Ok(())
}

fn print_session(session: &SchemaSession, sync: &SchemaSync) {
    println!(
        "{} -> {}: {}",
        sync.source().name(),
        sync.target().name(),
        session.state()
    );
    if let Some(diff) = session.diff() {
        for (category, count) in diff.summary() {
            println!("  {:<12} {}", category, count);
        }
        let protected: Vec<&str> = diff
            .collections()
            .into_iter()
            .filter(|c| sync.exclusions().is_excluded(c))
            .collect();
        if !protected.is_empty() {
            println!("  protected (not applied): {}", protected.join(", "));
        }
    }
    println!("Can apply: {}", if session.can_apply() { "yes" } else { "no" });
}

async fn load_diff(path: &Path) -> Result<SchemaDiff> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read diff file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid diff file: {}", path.display()))
}
