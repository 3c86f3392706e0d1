//! Remote file-system objects: items, folders and their CRUD calls.
//!
//! A [`Folder`] is an [`Item`] with children. It holds the item as a field and forwards the
//! item accessors explicitly, so an item's identity is never copied into a second structure.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::contract::{decode_first, decode_records, lenient, params, Params, Session};
use crate::error::{PutlinkError, Result};

/// The id of the account's root folder.
pub const ROOT_FOLDER_ID: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(deserialize_with = "lenient::u64_or_zero", default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub parent_id: Option<u64>,
    #[serde(default, rename = "size", deserialize_with = "lenient::opt_u64")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_dir: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    item: Item,
    children: Vec<Folder>,
}

impl Folder {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn id(&self) -> u64 {
        self.item.id
    }

    pub fn name(&self) -> &str {
        &self.item.name
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.item.parent_id
    }

    pub fn children(&self) -> &[Folder] {
        &self.children
    }

    /// Depth-first lookup by id, including this folder.
    pub fn find(&self, id: u64) -> Option<&Folder> {
        if self.id() == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Nest flat folder records under a synthetic root by `parent_id`. Records whose parent is
/// unknown hang off the root, and so do folders caught in a parent cycle.
pub fn build_tree(items: Vec<Item>) -> Folder {
    let mut by_parent: HashMap<u64, Vec<Item>> = HashMap::new();
    let known: HashSet<u64> = items.iter().map(|i| i.id).collect();
    for item in items {
        if item.id == ROOT_FOLDER_ID {
            continue;
        }
        let parent = item
            .parent_id
            .filter(|p| *p == ROOT_FOLDER_ID || known.contains(p))
            .unwrap_or_else(|| {
                warn!(item_id = item.id, parent_id = ?item.parent_id, "Folder parent unknown, attaching to root");
                ROOT_FOLDER_ID
            });
        by_parent.entry(parent).or_default().push(item);
    }

    fn attach(folder: &mut Folder, by_parent: &mut HashMap<u64, Vec<Item>>) {
        if let Some(children) = by_parent.remove(&folder.id()) {
            for item in children {
                let mut child = Folder::new(item);
                attach(&mut child, by_parent);
                folder.children.push(child);
            }
        }
    }

    let mut root = Folder::new(Item {
        id: ROOT_FOLDER_ID,
        name: "root".to_string(),
        parent_id: None,
        size_bytes: None,
        content_type: None,
        is_dir: true,
        created_at: None,
    });
    attach(&mut root, &mut by_parent);
    // Whatever is left is unreachable from the root. Break each cycle at its lowest parent id.
    while let Some(parent) = by_parent.keys().min().copied() {
        let members = by_parent.remove(&parent).unwrap_or_default();
        warn!(parent_id = parent, folders = members.len(), "Folder parent cycle, attaching to root");
        for item in members {
            let mut child = Folder::new(item);
            attach(&mut child, &mut by_parent);
            root.children.push(child);
        }
    }
    root
}

pub struct Files<'a, S: Session + ?Sized> {
    session: &'a S,
}

impl<'a, S: Session + ?Sized> Files<'a, S> {
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    async fn call(&self, operation: &str, call: Params) -> Result<Vec<serde_json::Value>> {
        info!(resource = "files", operation, "Invoking files operation");
        let records = self
            .session
            .invoke("files", operation, call)
            .await
            .map_err(|e| {
                error!(error = %e, operation, "Files operation failed");
                e
            })?;
        Ok(records)
    }

    pub async fn list(&self, parent_id: u64) -> Result<Vec<Item>> {
        let records = self
            .call("list", params([("parent_id", json!(parent_id))]))
            .await?;
        decode_records("files", "list", records)
    }

    pub async fn info(&self, id: u64) -> Result<Item> {
        let records = self.call("info", params([("id", json!(id))])).await?;
        decode_first("files", "info", records)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Item>> {
        let records = self.call("search", params([("query", json!(query))])).await?;
        decode_records("files", "search", records)
    }

    pub async fn rename(&self, id: u64, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(PutlinkError::InvalidInput("new name must not be empty".into()));
        }
        self.call("rename", params([("id", json!(id)), ("name", json!(name))]))
            .await?;
        Ok(())
    }

    pub async fn move_items(&self, ids: &[u64], parent_id: u64) -> Result<()> {
        if ids.is_empty() {
            return Err(PutlinkError::InvalidInput("no items to move".into()));
        }
        self.call(
            "move",
            params([("id", json!(ids)), ("parent_id", json!(parent_id))]),
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Err(PutlinkError::InvalidInput("no items to delete".into()));
        }
        self.call("delete", params([("id", json!(ids))])).await?;
        Ok(())
    }

    pub async fn create_folder(&self, name: &str, parent_id: u64) -> Result<Item> {
        if name.trim().is_empty() {
            return Err(PutlinkError::InvalidInput("folder name must not be empty".into()));
        }
        let records = self
            .call(
                "create_dir",
                params([("name", json!(name)), ("parent_id", json!(parent_id))]),
            )
            .await?;
        decode_first("files", "create_dir", records)
    }

    /// The whole folder hierarchy, rooted at the account root.
    pub async fn folder_tree(&self) -> Result<Folder> {
        let records = self.call("dirmap", Params::new()).await?;
        let items: Vec<Item> = decode_records("files", "dirmap", records)?;
        Ok(build_tree(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: u64, parent: u64) -> Item {
        Item {
            id,
            name: format!("f{id}"),
            parent_id: Some(parent),
            size_bytes: None,
            content_type: None,
            is_dir: true,
            created_at: None,
        }
    }

    #[test]
    fn test_build_tree_nests_by_parent() {
        let tree = build_tree(vec![folder(1, 0), folder(2, 1), folder(3, 1), folder(4, 2)]);
        assert_eq!(tree.id(), ROOT_FOLDER_ID);
        assert_eq!(tree.children().len(), 1);
        let one = tree.find(1).unwrap();
        assert_eq!(one.children().len(), 2);
        assert_eq!(tree.find(4).unwrap().parent_id(), Some(2));
    }

    #[test]
    fn test_parent_cycle_attaches_to_root() {
        let tree = build_tree(vec![folder(1, 0), folder(5, 6), folder(6, 5)]);
        assert_eq!(tree.children().len(), 2);
        let six = tree.find(6).expect("cycle member kept");
        assert_eq!(six.children().len(), 1);
        assert_eq!(six.children()[0].id(), 5);
        assert!(tree.find(5).is_some());
    }

    #[test]
    fn test_unknown_parent_attaches_to_root() {
        let tree = build_tree(vec![folder(7, 99)]);
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].name(), "f7");
    }
}
