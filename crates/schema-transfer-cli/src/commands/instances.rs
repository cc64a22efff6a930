use anyhow::{bail, Result};
use tracing::info;

use super::Context;

pub fn list(ctx: &Context) -> Result<()> {
    let master = ctx.master_record()?.id.clone();
    let remote = ctx.remote_record().ok().map(|r| r.id.clone());

    for record in &ctx.config.instances {
        let role = if record.id == master {
            "master"
        } else if Some(&record.id) == remote.as_ref() {
            "remote"
        } else {
            ""
        };
        println!(
            "{:<8} {:<16} {:<24} {}",
            role,
            record.id,
            record.display_name(),
            record.url
        );
    }
    Ok(())
}

pub fn select_remote(ctx: &Context, id: &str) -> Result<()> {
    if !ctx.config.remotes().any(|r| r.id == id) {
        bail!("'{}' is not a configured remote instance", id);
    }
    ctx.preferences.set_remote_instance(id)?;
    info!(
        "Remote instance set to '{}' ({})",
        id,
        ctx.preferences.path().display()
    );
    Ok(())
}
