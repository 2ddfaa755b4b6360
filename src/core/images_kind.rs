/*
 * The images resource kind: lists images through the runtime client and runs the
 * outdated checker over the listing before handing it to the tree.
 */
use super::errors::Result;
use super::image_properties::image_catalog;
use super::models::{ItemDescriptor, NodeKind, TreeItem};
use super::outdated_checker::OutdatedChecker;
use super::properties::PropertyCatalog;
use super::registry::RemoteDigestOperations;
use super::resource_kind::{FetchContext, ResourceKind};
use super::runtime_client::RuntimeClientOperations;
use super::sorting::SortDirection;
use super::tree_settings::TreeSettings;
use std::collections::HashSet;

pub const IMAGES_TREE_PREFIX: &str = "images";

pub struct ImagesKind<C: RuntimeClientOperations, R: RemoteDigestOperations> {
    client: C,
    checker: OutdatedChecker<R>,
    catalog: PropertyCatalog<ItemDescriptor>,
}

impl<C: RuntimeClientOperations, R: RemoteDigestOperations> ImagesKind<C, R> {
    pub fn new(client: C, checker: OutdatedChecker<R>) -> Self {
        ImagesKind {
            client,
            checker,
            catalog: image_catalog(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn checker(&self) -> &OutdatedChecker<R> {
        &self.checker
    }
}

impl<C: RuntimeClientOperations, R: RemoteDigestOperations> ResourceKind for ImagesKind<C, R> {
    type Item = ItemDescriptor;

    fn tree_prefix(&self) -> &str {
        IMAGES_TREE_PREFIX
    }

    fn display_name(&self) -> &str {
        "Images"
    }

    fn catalog(&self) -> &PropertyCatalog<ItemDescriptor> {
        &self.catalog
    }

    fn default_settings(&self) -> TreeSettings {
        TreeSettings {
            label_property: "Tag".to_string(),
            description_properties: vec!["CreatedTime".to_string()],
            group_by_property: Some("Repository".to_string()),
            sort_by: "CreatedTime".to_string(),
            sort_direction: SortDirection::Descending,
        }
    }

    async fn fetch(&self, context: &FetchContext) -> Result<Vec<ItemDescriptor>> {
        let listed = self.client.list(&context.list_options).await?;
        let listed_count = listed.len();

        let mut seen = HashSet::new();
        let mut items: Vec<ItemDescriptor> = listed
            .into_iter()
            .filter(|item| seen.insert(item.node_id()))
            .collect();
        if items.len() != listed_count {
            log::debug!(
                "ImagesKind: Dropped {} duplicate rows from the listing.",
                listed_count - items.len()
            );
        }

        self.checker.mark_outdated(&mut items).await;
        log::debug!(
            "ImagesKind: Fetched {} images ({} outdated).",
            items.len(),
            items.iter().filter(|i| i.outdated).count()
        );
        Ok(items)
    }

    fn child_label(&self, grouped: bool) -> &'static str {
        if grouped { "image group" } else { "image" }
    }

    fn context_value(&self, kind: NodeKind) -> String {
        match kind {
            NodeKind::Item => "image".to_string(),
            NodeKind::Group => "imageGroup".to_string(),
        }
    }
}
