use anyhow::Result;
use schema_transfer_core::model::split_collections;
use schema_transfer_core::schema::{attach_last_sync_dates, read_sync_dates};
use schema_transfer_core::ActivityAggregator;
use tracing::warn;

use super::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let master = ctx.master().await?;
    let (mut user, _system) = split_collections(&master.read_collections().await?);

    match read_sync_dates(master.as_ref()).await {
        Ok(dates) => attach_last_sync_dates(&mut user, &dates),
        Err(e) => warn!("No sync dates available (run `provision` first?): {}", e),
    }

    let activity = ActivityAggregator::new(ctx.config.sync.activities_per_request)
        .changed_items(master.as_ref(), None)
        .await?;
    let changed = activity.changed_collections(&user);

    for collection in &user {
        let flag = if changed.contains(&collection.collection.as_str()) {
            "changed"
        } else {
            ""
        };
        println!(
            "{:<32} {:<28} {}",
            collection.collection,
            collection.synced_at().unwrap_or("-"),
            flag
        );
    }
    Ok(())
}
