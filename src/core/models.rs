use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// Repository/tag placeholder the runtime reports for untagged (dangling) images.
pub const NONE_PLACEHOLDER: &str = "<none>";

/*
 * One image as reported by the runtime client's listing.
 * The `outdated` flag is never part of the listing itself; it is derived afterwards
 * by the outdated checker, which is the only code that ever sets it.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
    pub id: String,
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    // Local repository digest (`sha256:...`), if the image was pulled from a registry.
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(skip)]
    pub outdated: bool,
}

impl ItemDescriptor {
    pub fn new(id: impl Into<String>, created: OffsetDateTime) -> Self {
        ItemDescriptor {
            id: id.into(),
            repository: None,
            tag: None,
            size: 0,
            created,
            digest: None,
            outdated: false,
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /*
     * An image is dangling when the runtime no longer associates it with a
     * repository:tag pair. Placeholder values count as missing.
     */
    pub fn is_dangling(&self) -> bool {
        let missing = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.is_empty() || v == NONE_PLACEHOLDER)
                .unwrap_or(true)
        };
        missing(&self.repository) || missing(&self.tag)
    }
}

/*
 * Minimal contract the root tree needs from any listed resource.
 * Images implement it through `ItemDescriptor`; other resource kinds only need an id.
 */
pub trait TreeItem: Clone {
    fn id(&self) -> &str;

    // Identity of the rendered node; unique within one listing.
    fn node_id(&self) -> String {
        self.id().to_string()
    }

    fn is_outdated(&self) -> bool {
        false
    }
}

impl TreeItem for ItemDescriptor {
    fn id(&self) -> &str {
        &self.id
    }

    // The runtime lists an image once per repository:tag, all rows sharing one id.
    fn node_id(&self) -> String {
        match (&self.repository, &self.tag) {
            (Some(repository), Some(tag)) if !self.is_dangling() => {
                format!("{}{repository}:{tag}", self.id)
            }
            _ => self.id.clone(),
        }
    }

    fn is_outdated(&self) -> bool {
        self.outdated
    }
}

// Options handed to the runtime client's `list`. The key is always serialized, `null` included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    pub include_filtered: Option<bool>,
}

/*
 * Raw result of inspecting a single resource. `raw` is the unparsed JSON text as
 * produced by the runtime, kept verbatim so hosts can display it read-only.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct InspectDocument {
    pub id: String,
    pub raw: String,
}

/// A node produced by the grouping engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode<T> {
    Item(T),
    Group(GroupNode<T>),
}

/*
 * Synthetic node aggregating items whose grouping property resolved to the same value.
 * Rebuilt on every render pass.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode<T> {
    pub label: String,
    pub property: String,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn as_item(&self) -> Option<&T> {
        match self {
            TreeNode::Item(item) => Some(item),
            TreeNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode<T>> {
        match self {
            TreeNode::Item(_) => None,
            TreeNode::Group(group) => Some(group),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Item,
    Group,
}

/*
 * What the tree host receives: display strings only, plus enough identity to
 * route commands (inspect, remove, ...) back to the item.
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNode {
    pub kind: NodeKind,
    pub id: String,
    pub label: String,
    pub description: String,
    pub context_value: String,
    pub outdated: bool,
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_item_descriptor_new_defaults() {
        let created = datetime!(2024-03-01 10:00 UTC);
        let item = ItemDescriptor::new("sha256:abc", created);
        assert_eq!(item.id, "sha256:abc");
        assert_eq!(item.repository, None);
        assert_eq!(item.tag, None);
        assert_eq!(item.size, 0);
        assert_eq!(item.digest, None);
        assert!(!item.outdated);
    }

    #[test]
    fn test_is_dangling_for_placeholders_and_missing_values() {
        let created = datetime!(2024-03-01 10:00 UTC);
        let tagged = ItemDescriptor::new("1", created)
            .with_repository("nginx")
            .with_tag("latest");
        let untagged = ItemDescriptor::new("2", created)
            .with_repository(NONE_PLACEHOLDER)
            .with_tag(NONE_PLACEHOLDER);
        let no_tag = ItemDescriptor::new("3", created).with_repository("nginx");

        assert!(!tagged.is_dangling());
        assert!(untagged.is_dangling());
        assert!(no_tag.is_dangling());
    }

    #[test]
    fn test_node_id_distinguishes_tags_of_one_image() {
        let created = datetime!(2024-03-01 10:00 UTC);
        let latest = ItemDescriptor::new("sha256:1", created)
            .with_repository("nginx")
            .with_tag("latest");
        let stable = latest.clone().with_tag("stable");
        let dangling = ItemDescriptor::new("sha256:2", created);

        assert_eq!(latest.node_id(), "sha256:1nginx:latest");
        assert_ne!(latest.node_id(), stable.node_id());
        assert_eq!(dangling.node_id(), "sha256:2");
    }

    #[test]
    fn test_list_options_never_omit_include_filtered() {
        let include_all = serde_json::to_string(&ListOptions {
            include_filtered: None,
        })
        .unwrap();
        let exclude = serde_json::to_string(&ListOptions {
            include_filtered: Some(false),
        })
        .unwrap();

        assert_eq!(include_all, r#"{"includeFiltered":null}"#);
        assert_eq!(exclude, r#"{"includeFiltered":false}"#);
    }

    #[test]
    fn test_item_descriptor_deserializes_without_outdated_flag() {
        let json = r#"{
            "id": "sha256:1",
            "repository": "redis",
            "tag": "7",
            "size": 42,
            "created": "2024-01-02T03:04:05Z"
        }"#;
        let item: ItemDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(item.repository.as_deref(), Some("redis"));
        assert_eq!(item.created, datetime!(2024-01-02 03:04:05 UTC));
        assert!(!item.outdated);
        assert_eq!(item.digest, None);
    }
}
