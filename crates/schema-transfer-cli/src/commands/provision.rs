use anyhow::Result;
use futures::future::try_join;
use schema_transfer_core::schema::{ensure_bookkeeping_collection, BOOKKEEPING_COLLECTION};
use schema_transfer_core::Instance;

use super::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let (master, remote) = ctx.master_and_remote().await?;
    let (on_master, on_remote) = try_join(
        ensure_bookkeeping_collection(master.as_ref()),
        ensure_bookkeeping_collection(remote.as_ref()),
    )
    .await?;

    report(master.as_ref(), on_master);
    report(remote.as_ref(), on_remote);
    Ok(())
}

fn report(instance: &dyn Instance, created: bool) {
    let status = if created { "created" } else { "already present" };
    println!("{}: {} {}", instance.name(), BOOKKEEPING_COLLECTION, status);
}
