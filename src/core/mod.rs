/*
 * This module consolidates the core, host-agnostic logic of the resource explorer.
 * It re-exports the root tree controller and the abstractions it is composed from
 * (`ResourceKind`, `RuntimeClientOperations`, `RemoteDigestOperations`,
 * `StateStoreOperations`), the property catalog with its grouping and sort engines,
 * the dangling filter, the outdated checker and the per-tree settings command.
 */
pub mod dangling_filter;
pub mod docker_cli;
pub mod errors;
pub mod grouping;
pub mod image_properties;
pub mod images_kind;
pub mod inspect;
pub mod models;
pub mod outdated_checker;
pub mod path_utils;
pub mod properties;
pub mod registry;
pub mod resource_kind;
pub mod root_tree;
pub mod runtime_client;
pub mod snapshot_client;
pub mod sorting;
pub mod state_store;
pub mod tree_settings;

// Re-export key structures and enums
pub use errors::{Result, TreeError};
pub use models::{
    GroupNode, InspectDocument, ItemDescriptor, ListOptions, NodeKind, RenderedNode, TreeItem,
    TreeNode,
};

// Re-export the tree and its pluggable parts
pub use images_kind::{IMAGES_TREE_PREFIX, ImagesKind};
pub use resource_kind::{FetchContext, ResourceKind};
pub use root_tree::RootTreeController;

// Re-export client and registry related items
pub use docker_cli::DockerCliClient;
pub use registry::{HubRegistry, HubRegistryConfig, RemoteDigestOperations, RemoteReference};
pub use runtime_client::{ClientError, RuntimeClientOperations};
pub use snapshot_client::{Snapshot, SnapshotClient};

// Re-export property, grouping and sorting items
pub use image_properties::image_catalog;
pub use properties::{PropertyCatalog, PropertyDef, PropertyRole};
pub use sorting::SortDirection;

// Re-export state and configuration items
pub use dangling_filter::DanglingFilter;
pub use inspect::inspect_item;
pub use outdated_checker::{OutdatedChecker, OutdatedCheckerConfig};
pub use state_store::{CoreStateStore, InMemoryStateStore, StateError, StateStoreOperations};
pub use tree_settings::{SettingChange, TreeSettings};
