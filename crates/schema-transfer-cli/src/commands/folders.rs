use anyhow::Result;
use schema_transfer_core::model::{build_folder_tree, Folder};

use super::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let master = ctx.master().await?;
    let tree = build_folder_tree(&master.read_folders().await?);
    for line in render_tree(&tree) {
        println!("{}", line);
    }
    Ok(())
}

fn render_tree(folders: &[Folder]) -> Vec<String> {
    let mut lines = Vec::new();
    for folder in folders {
        render(folder, 0, &mut lines);
    }
    lines
}

fn render(folder: &Folder, depth: usize, lines: &mut Vec<String>) {
    lines.push(format!("{}{}/", "  ".repeat(depth), folder.name));
    for child in &folder.children {
        render(child, depth + 1, lines);
    }
}
