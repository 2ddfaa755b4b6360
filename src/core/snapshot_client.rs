/*
 * Runtime client serving a recorded snapshot instead of a live runtime.
 * The snapshot is a JSON document with the image listing and, optionally, full inspect
 * documents keyed by image id:
 *
 * { "images": [ { "id": "...", "repository": "...", ... } ], "details": { "<id>": { ... } } }
 *
 * Used by the demo binary (`--snapshot`) and by the integration tests.
 */
use super::models::{InspectDocument, ItemDescriptor, ListOptions};
use super::runtime_client::{Result, RuntimeClientOperations};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    pub images: Vec<ItemDescriptor>,
    #[serde(default)]
    pub details: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct SnapshotClient {
    snapshot: Snapshot,
}

impl SnapshotClient {
    pub fn new(snapshot: Snapshot) -> Self {
        SnapshotClient { snapshot }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        log::debug!(
            "SnapshotClient: Loaded {} images from {:?}.",
            snapshot.images.len(),
            path
        );
        Ok(Self::new(snapshot))
    }
}

impl RuntimeClientOperations for SnapshotClient {
    async fn list(&self, options: &ListOptions) -> Result<Vec<ItemDescriptor>> {
        let exclude_dangling = options.include_filtered == Some(false);
        Ok(self
            .snapshot
            .images
            .iter()
            .filter(|item| !(exclude_dangling && item.is_dangling()))
            .cloned()
            .collect())
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<InspectDocument>> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            let raw = match self.snapshot.details.get(id) {
                Some(detail) => serde_json::to_string(detail)?,
                None => match self.snapshot.images.iter().find(|item| &item.id == id) {
                    Some(item) => serde_json::to_string(item)?,
                    None => continue,
                },
            };
            documents.push(InspectDocument {
                id: id.clone(),
                raw,
            });
        }
        Ok(documents)
    }
}
