/*
 * The capability set a resource kind (images, containers, volumes, ...) plugs into the
 * root tree controller: how to fetch its items, how to resolve their properties, and
 * how to name its nodes. The controller owns caching, grouping and sorting and is
 * shared by every kind.
 */
use super::dangling_filter::DanglingFilter;
use super::errors::Result;
use super::models::{ListOptions, NodeKind, TreeItem};
use super::properties::PropertyCatalog;
use super::state_store::StateStoreOperations;
use super::tree_settings::{self, TreeSettings};
use std::future::Future;

/*
 * Persisted state captured once at the start of a fetch cycle. Everything a cycle
 * reads from the process-wide state store goes through this value.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct FetchContext {
    pub list_options: ListOptions,
    pub settings: TreeSettings,
}

impl FetchContext {
    pub fn capture<K: ResourceKind>(kind: &K, store: &dyn StateStoreOperations) -> Self {
        let prefix = kind.tree_prefix();
        let list_options = DanglingFilter::for_tree(store, prefix).list_options();
        let settings =
            tree_settings::load_settings(store, prefix, kind.catalog(), &kind.default_settings());
        log::trace!("FetchContext: Captured for '{prefix}': {list_options:?}, {settings:?}");
        FetchContext {
            list_options,
            settings,
        }
    }
}

pub trait ResourceKind {
    type Item: TreeItem;

    /// Key prefix under which this tree's state is persisted, e.g. `images`.
    fn tree_prefix(&self) -> &str;

    fn display_name(&self) -> &str;

    fn catalog(&self) -> &PropertyCatalog<Self::Item>;

    fn default_settings(&self) -> TreeSettings;

    /*
     * Lists the items for one cycle, enrichment included. Must honor
     * `context.list_options` and return only after every derived flag has settled.
     */
    fn fetch(&self, context: &FetchContext) -> impl Future<Output = Result<Vec<Self::Item>>>;

    fn property_value(&self, item: &Self::Item, property: &str) -> Result<String> {
        self.catalog().value(item, property)
    }

    // Noun used by hosts for the children ("image" vs "image group").
    fn child_label(&self, grouped: bool) -> &'static str;

    fn context_value(&self, kind: NodeKind) -> String;
}
