use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Folder as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRaw {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Folder with its nested children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Folder>,
}

/// Assemble a flat folder listing into a forest.
///
/// Folders whose parent is not in the listing are treated as roots. Sibling
/// order follows the listing order. A parent cycle has no root; its first
/// listed member is promoted to a root so no folder is lost.
pub fn build_folder_tree(folders: &[FolderRaw]) -> Vec<Folder> {
    let known: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();
    let mut children: HashMap<&str, Vec<&FolderRaw>> = HashMap::new();
    let mut roots = Vec::new();

    for folder in folders {
        match folder.parent.as_deref() {
            Some(parent) if known.contains(parent) && parent != folder.id => {
                children.entry(parent).or_default().push(folder)
            }
            _ => roots.push(folder),
        }
    }

    let mut visited = HashSet::new();
    let mut tree: Vec<Folder> = roots
        .into_iter()
        .map(|root| attach(root, &children, &mut visited))
        .collect();

    for folder in folders {
        if !visited.contains(folder.id.as_str()) {
            warn!(
                "Folder '{}' is part of a parent cycle; listing it as a root",
                folder.id
            );
            tree.push(attach(folder, &children, &mut visited));
        }
    }
    tree
}

fn attach<'a>(
    raw: &'a FolderRaw,
    children: &HashMap<&str, Vec<&'a FolderRaw>>,
    visited: &mut HashSet<&'a str>,
) -> Folder {
    visited.insert(raw.id.as_str());
    let mut nested = Vec::new();
    for &child in children.get(raw.id.as_str()).into_iter().flatten() {
        if !visited.contains(child.id.as_str()) {
            nested.push(attach(child, children, visited));
        }
    }

    Folder {
        id: raw.id.clone(),
        name: raw.name.clone(),
        parent: raw.parent.clone(),
        children: nested,
    }
}
