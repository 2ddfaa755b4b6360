use resource_explorer::core::registry;
use resource_explorer::core::{
    CoreStateStore, ImagesKind, InMemoryStateStore, OutdatedChecker, OutdatedCheckerConfig,
    RemoteDigestOperations, RemoteReference, RenderedNode, RootTreeController, SettingChange,
    Snapshot, SnapshotClient, SortDirection, StateStoreOperations, inspect_item,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::tempdir;

const SNAPSHOT: &str = r#"{
    "images": [
        { "id": "sha256:n1", "repository": "nginx", "tag": "1.25", "size": 187000000,
          "created": "2024-02-01T10:00:00Z", "digest": "sha256:nginx-125" },
        { "id": "sha256:n2", "repository": "nginx", "tag": "latest", "size": 192000000,
          "created": "2024-05-01T10:00:00Z", "digest": "sha256:nginx-old" },
        { "id": "sha256:r1", "repository": "redis", "tag": "7", "size": 117000000,
          "created": "2024-03-15T10:00:00Z", "digest": "sha256:redis-7" },
        { "id": "sha256:d1", "repository": "<none>", "tag": "<none>", "size": 5000,
          "created": "2024-01-01T10:00:00Z" }
    ],
    "details": { "sha256:r1": { "Id": "sha256:r1", "Architecture": "amd64" } }
}"#;

struct FixedRegistry {
    digests: HashMap<String, String>,
}

impl FixedRegistry {
    fn new() -> Self {
        let digests = [
            ("library/nginx:1.25", "sha256:nginx-125"),
            ("library/nginx:latest", "sha256:nginx-new"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        FixedRegistry { digests }
    }
}

impl RemoteDigestOperations for FixedRegistry {
    async fn resolve_digest(&self, reference: &RemoteReference) -> registry::Result<Option<String>> {
        Ok(self
            .digests
            .get(&format!("{}:{}", reference.path, reference.tag))
            .cloned())
    }
}

type Tree = RootTreeController<ImagesKind<SnapshotClient, FixedRegistry>>;

fn tree(store: Arc<dyn StateStoreOperations>) -> Tree {
    let snapshot: Snapshot = serde_json::from_str(SNAPSHOT).unwrap();
    let kind = ImagesKind::new(
        SnapshotClient::new(snapshot),
        OutdatedChecker::new(FixedRegistry::new(), OutdatedCheckerConfig::default()),
    );
    RootTreeController::new(kind, store)
}

fn labels(nodes: &[RenderedNode]) -> Vec<String> {
    nodes.iter().map(|n| n.label.clone()).collect()
}

#[tokio::test]
async fn test_default_tree_groups_by_repository_newest_first() {
    // Arrange
    let tree = tree(Arc::new(InMemoryStateStore::new()));

    // Act
    let nodes = tree.get_children().await.unwrap();

    // Assert: dangling image excluded by default, groups in listing order.
    assert_eq!(labels(&nodes), vec!["nginx", "redis"]);
    assert_eq!(labels(&nodes[0].children), vec!["latest", "1.25"]);
    assert!(nodes[0].outdated);
    let outdated: Vec<bool> = nodes[0].children.iter().map(|c| c.outdated).collect();
    assert_eq!(outdated, vec![true, false]);
    assert!(!nodes[1].outdated);
}

#[tokio::test]
async fn test_including_dangling_adds_placeholder_group() {
    let tree = tree(Arc::new(InMemoryStateStore::new()));

    tree.set_dangling_included(true).unwrap();
    let nodes = tree.get_children().await.unwrap();

    assert_eq!(labels(&nodes), vec!["nginx", "redis", "<none>"]);
    assert_eq!(labels(&nodes[2].children), vec!["<none>"]);
}

#[tokio::test]
async fn test_flat_list_sorted_by_size() {
    let tree = tree(Arc::new(InMemoryStateStore::new()));
    tree.configure(SettingChange::GroupBy(Some("None".to_string()))).unwrap();
    tree.configure(SettingChange::Label("RepositoryNameAndTag".to_string())).unwrap();
    tree.configure(SettingChange::SortBy("Size".to_string())).unwrap();
    tree.configure(SettingChange::SortDirection(SortDirection::Ascending)).unwrap();

    let nodes = tree.get_children().await.unwrap();

    assert_eq!(labels(&nodes), vec!["redis:7", "nginx:1.25", "nginx:latest"]);
    assert!(nodes.iter().all(|n| !n.is_group()));
}

#[tokio::test]
async fn test_settings_persist_across_controllers() {
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("state.json");

    {
        let store: Arc<dyn StateStoreOperations> = Arc::new(CoreStateStore::at_path(state_file.clone()));
        let tree = tree(store);
        tree.configure(SettingChange::GroupBy(None)).unwrap();
        tree.set_dangling_included(true).unwrap();
    }

    let store: Arc<dyn StateStoreOperations> = Arc::new(CoreStateStore::at_path(state_file));
    let tree = tree(store);
    let nodes = tree.get_children().await.unwrap();

    assert_eq!(nodes.len(), 4);
    assert_eq!(tree.child_label(), "image");
}

#[tokio::test]
async fn test_inspect_returns_pretty_document() {
    let tree = tree(Arc::new(InMemoryStateStore::new()));

    let text = inspect_item(tree.kind().client(), "sha256:r1").await.unwrap();

    assert!(text.contains("\"Architecture\": \"amd64\""));
    assert!(inspect_item(tree.kind().client(), "sha256:zz").await.is_err());
}
