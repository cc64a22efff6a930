use anyhow::Result;
use schema_transfer_core::ActivityAggregator;

use super::Context;

pub async fn run(ctx: &Context, collection: Option<&str>) -> Result<()> {
    let master = ctx.master().await?;
    let index = ActivityAggregator::new(ctx.config.sync.activities_per_request)
        .changed_items(master.as_ref(), collection)
        .await?;

    if index.is_empty() {
        println!("No changes recorded");
        return Ok(());
    }

    for (name, items) in index.item_counts() {
        println!(
            "{:<32} {:>6} item(s)  last change {}",
            name,
            items,
            index.latest_timestamp(name).unwrap_or("-")
        );
    }
    println!("{} activity record(s)", index.len());
    Ok(())
}
