use anyhow::Result;
use clap::Args;
use schema_transfer_core::model::Collection;
use schema_transfer_core::{redaction_plan, Instance, SnapshotIndex, Transfer};
use std::path::PathBuf;
use tracing::info;

use super::Context;

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Collection to copy
    pub collection: String,

    /// Clear relational fields (and the collection's excluded fields) before import
    #[arg(long)]
    pub redact_relations: bool,

    /// Also write the exported JSON into this directory
    #[arg(long)]
    pub save: Option<PathBuf>,
}

pub async fn run(args: TransferArgs, ctx: &Context) -> Result<()> {
    let (master, remote) = ctx.master_and_remote().await?;
    let transfer = Transfer::new(ctx.config.sync.stamp_imported_at);

    let mut payload = transfer
        .export_collection(master.as_ref(), &args.collection)
        .await?;

    if args.redact_relations {
        let fields = fields_to_redact(master.as_ref(), &args.collection).await?;
        if !fields.is_empty() {
            info!("Clearing {} before import", fields.join(", "));
            payload = payload.redacted(&fields)?;
        }
    }

    if let Some(dir) = &args.save {
        let path = payload.write_to(dir).await?;
        println!("Saved export to {}", path.display());
    }

    let report = transfer
        .import_collection(&args.collection, &payload, remote.as_ref())
        .await?;
    println!(
        "Imported {} ({} byte(s)) into {}",
        report.collection,
        report.bytes,
        remote.name()
    );
    if let Some(at) = &report.imported_at {
        println!("imported_at = {}", at);
    }
    Ok(())
}

async fn fields_to_redact(source: &dyn Instance, collection: &str) -> Result<Vec<String>> {
    let snapshot = source.schema_snapshot().await?;
    let index = SnapshotIndex::build(&snapshot);
    let record = index
        .collections
        .get(collection)
        .cloned()
        .unwrap_or_else(|| Collection::new(collection));
    Ok(redaction_plan(&index.fields, &record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_transfer_core::model::{Field, SchemaSnapshot};
    use schema_transfer_core::test_utils::MockInstance;

    #[tokio::test]
    async fn redaction_uses_source_schema() {
        let snapshot = SchemaSnapshot::empty()
            .with_collections(&[Collection::new("posts")])
            .with_fields(&[
                Field::new("posts", "id").with_type("uuid"),
                Field::new("posts", "author").with_special(&["m2o"]),
                Field::new("posts", "title").with_type("string"),
            ]);
        let source = MockInstance::new("master").with_snapshot(snapshot);

        let fields = fields_to_redact(&source, "posts").await.unwrap();

        assert_eq!(fields, vec!["author".to_string()]);
    }

    #[tokio::test]
    async fn unknown_collection_has_nothing_to_redact() {
        let source = MockInstance::new("master");
        assert!(fields_to_redact(&source, "ghost").await.unwrap().is_empty());
    }
}
