/*
 * The root tree controller. Owns the cached rendering of one resource tree and runs
 * fetch cycles for it: capture persisted state, fetch (and enrich) through the
 * resource kind, group, sort, render.
 *
 * At most one cycle is in flight per controller. Callers arriving while a cycle runs
 * queue on `fetch_gate`; if a cycle completed successfully while they waited, they
 * return its rendering instead of fetching again. A failed cycle leaves the previous
 * rendering in place (marked stale) so hosts can keep showing it next to an error.
 */
use super::dangling_filter::DanglingFilter;
use super::errors::{Result, TreeError};
use super::grouping;
use super::models::{NodeKind, RenderedNode, TreeItem, TreeNode};
use super::properties::{PropertyDef, PropertyRole, SORT_BY_LABEL};
use super::resource_kind::{FetchContext, ResourceKind};
use super::sorting;
use super::state_store::StateStoreOperations;
use super::tree_settings::{self, SettingChange, TreeSettings};
use futures::future::{AbortHandle, Abortable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DESCRIPTION_SEPARATOR: &str = " - ";

#[derive(Default)]
struct CacheState {
    rendered: Option<Arc<Vec<RenderedNode>>>,
    valid: bool,
    // Number of successful cycles; lets queued callers detect a cycle they can join.
    completed_fetches: u64,
    // Bumped on every settings change. A cycle marks the cache valid only if this
    // still matches the value it saw when it captured its FetchContext.
    settings_generation: u64,
}

pub struct RootTreeController<K: ResourceKind> {
    kind: K,
    store: Arc<dyn StateStoreOperations>,
    fetch_gate: tokio::sync::Mutex<()>,
    cache: Mutex<CacheState>,
    in_flight: Mutex<Option<AbortHandle>>,
    disposed: AtomicBool,
}

impl<K: ResourceKind> RootTreeController<K> {
    pub fn new(kind: K, store: Arc<dyn StateStoreOperations>) -> Self {
        RootTreeController {
            kind,
            store,
            fetch_gate: tokio::sync::Mutex::new(()),
            cache: Mutex::new(CacheState::default()),
            in_flight: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn label(&self) -> &str {
        self.kind.display_name()
    }

    pub fn settings(&self) -> TreeSettings {
        tree_settings::load_settings(
            self.store.as_ref(),
            self.kind.tree_prefix(),
            self.kind.catalog(),
            &self.kind.default_settings(),
        )
    }

    pub fn child_label(&self) -> &'static str {
        self.kind.child_label(self.settings().is_grouped())
    }

    /*
     * Serves the children of the tree root. A valid cached rendering is returned as is.
     * Otherwise a fetch cycle runs: list, enrich, group, sort and render. A caller that
     * finds a cycle already running waits for it and reuses its result when that cycle
     * succeeded under the current settings.
     *
     * Returns:
     * - `Ok(Arc<Vec<RenderedNode>>)` with the top-level nodes, shared with the cache.
     * - `Err(TreeError::Fetch)` if the runtime listing failed; the previous rendering is kept.
     * - `Err(TreeError::Configuration)` if the persisted settings name an unusable property.
     * - `Err(TreeError::Cancelled)` once the controller has been disposed.
     */
    pub async fn get_children(&self) -> Result<Arc<Vec<RenderedNode>>> {
        self.ensure_active()?;
        {
            let cache = self.cache();
            if cache.valid
                && let Some(rendered) = &cache.rendered
            {
                log::trace!("RootTree: Serving cached '{}' children.", self.kind.tree_prefix());
                return Ok(Arc::clone(rendered));
            }
        }
        self.fetch_joined().await
    }

    /// Invalidates and re-fetches, joining a cycle that is already running.
    pub async fn refresh(&self) -> Result<Arc<Vec<RenderedNode>>> {
        self.invalidate();
        self.fetch_joined().await
    }

    pub fn invalidate(&self) {
        self.cache().valid = false;
        log::debug!("RootTree: '{}' cache invalidated.", self.kind.tree_prefix());
    }

    /// Last successful rendering, valid or stale.
    pub fn cached_children(&self) -> Option<Arc<Vec<RenderedNode>>> {
        self.cache().rendered.clone()
    }

    /*
     * Abandons the in-flight cycle, if any, and refuses all later ones. Items already
     * enriched by the abandoned cycle are dropped with it; the cache is not touched.
     */
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.in_flight_slot().take() {
            log::debug!("RootTree: Aborting in-flight '{}' fetch.", self.kind.tree_prefix());
            handle.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Applies a configuration change and invalidates the tree on success.
    pub fn configure(&self, change: SettingChange) -> Result<TreeSettings> {
        let settings = tree_settings::configure(
            self.store.as_ref(),
            self.kind.tree_prefix(),
            self.kind.catalog(),
            &self.kind.default_settings(),
            change,
        )?;
        self.settings_changed();
        Ok(settings)
    }

    pub fn reset_settings(&self) -> Result<()> {
        tree_settings::reset(self.store.as_ref(), self.kind.tree_prefix())?;
        self.settings_changed();
        Ok(())
    }

    pub fn dangling_filter(&self) -> DanglingFilter<'_> {
        DanglingFilter::for_tree(self.store.as_ref(), self.kind.tree_prefix())
    }

    pub fn set_dangling_included(&self, included: bool) -> Result<()> {
        self.dangling_filter().set_included(included)?;
        self.settings_changed();
        Ok(())
    }

    // A cycle already running read the old settings; its result must not be served as valid.
    fn settings_changed(&self) {
        let mut cache = self.cache();
        cache.valid = false;
        cache.settings_generation += 1;
        log::debug!(
            "RootTree: '{}' settings changed, cache invalidated (generation {}).",
            self.kind.tree_prefix(),
            cache.settings_generation
        );
    }

    async fn fetch_joined(&self) -> Result<Arc<Vec<RenderedNode>>> {
        let observed = self.cache().completed_fetches;
        let _gate = self.fetch_gate.lock().await;
        self.ensure_active()?;

        {
            let cache = self.cache();
            if cache.completed_fetches != observed
                && cache.valid
                && let Some(rendered) = &cache.rendered
            {
                log::debug!(
                    "RootTree: Joined the '{}' fetch that completed while waiting.",
                    self.kind.tree_prefix()
                );
                return Ok(Arc::clone(rendered));
            }
        }

        let started_generation = self.cache().settings_generation;
        let (handle, registration) = AbortHandle::new_pair();
        *self.in_flight_slot() = Some(handle.clone());
        if self.is_disposed() {
            handle.abort();
        }

        let outcome = Abortable::new(self.run_cycle(), registration).await;
        self.in_flight_slot().take();

        let rendered = match outcome {
            Err(_aborted) => {
                log::debug!("RootTree: '{}' fetch was cancelled.", self.kind.tree_prefix());
                return Err(TreeError::Cancelled);
            }
            Ok(Err(e)) => {
                log::warn!(
                    "RootTree: '{}' fetch failed, keeping previous children: {e}",
                    self.kind.tree_prefix()
                );
                return Err(e);
            }
            Ok(Ok(rendered)) => Arc::new(rendered),
        };

        let mut cache = self.cache();
        cache.rendered = Some(Arc::clone(&rendered));
        cache.valid = cache.settings_generation == started_generation;
        cache.completed_fetches += 1;
        if !cache.valid {
            log::debug!(
                "RootTree: '{}' settings changed during the fetch, result kept as stale.",
                self.kind.tree_prefix()
            );
        }
        Ok(rendered)
    }

    async fn run_cycle(&self) -> Result<Vec<RenderedNode>> {
        let context = FetchContext::capture(&self.kind, self.store.as_ref());
        let items = self.kind.fetch(&context).await?;
        log::debug!(
            "RootTree: '{}' fetched {} items.",
            self.kind.tree_prefix(),
            items.len()
        );
        self.render(items, &context.settings)
    }

    fn render(&self, items: Vec<K::Item>, settings: &TreeSettings) -> Result<Vec<RenderedNode>> {
        let catalog = self.kind.catalog();
        let label = catalog.resolve(&settings.label_property, PropertyRole::Label)?;
        let descriptions = settings
            .description_properties
            .iter()
            .map(|name| catalog.resolve(name, PropertyRole::Description))
            .collect::<Result<Vec<_>>>()?;
        let group_by = settings
            .group_by_property
            .as_deref()
            .map(|name| catalog.resolve(name, PropertyRole::GroupBy))
            .transpose()?;
        let sort_role = if settings.sort_by == SORT_BY_LABEL {
            PropertyRole::Label
        } else {
            PropertyRole::SortBy
        };
        let sort_by = catalog.resolve(settings.effective_sort_property(), sort_role)?;

        let mut nodes = grouping::group(items, group_by);
        sorting::sort_nodes(&mut nodes, sort_by, settings.sort_direction);

        let renderer = NodeRenderer {
            kind: &self.kind,
            label,
            descriptions: &descriptions,
        };
        Ok(nodes.iter().map(|node| renderer.render(node)).collect())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(TreeError::Cancelled);
        }
        Ok(())
    }

    fn cache(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight_slot(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct NodeRenderer<'a, K: ResourceKind> {
    kind: &'a K,
    label: &'a PropertyDef<K::Item>,
    descriptions: &'a [&'a PropertyDef<K::Item>],
}

impl<K: ResourceKind> NodeRenderer<'_, K> {
    fn render(&self, node: &TreeNode<K::Item>) -> RenderedNode {
        match node {
            TreeNode::Item(item) => RenderedNode {
                kind: NodeKind::Item,
                id: item.node_id(),
                label: self.label.value(item),
                description: self
                    .descriptions
                    .iter()
                    .map(|property| property.value(item))
                    .collect::<Vec<_>>()
                    .join(DESCRIPTION_SEPARATOR),
                context_value: self.kind.context_value(NodeKind::Item),
                outdated: item.is_outdated(),
                children: Vec::new(),
            },
            TreeNode::Group(group) => {
                let children: Vec<RenderedNode> =
                    group.children.iter().map(|child| self.render(child)).collect();
                RenderedNode {
                    kind: NodeKind::Group,
                    id: format!("{}.{}.{}", self.kind.tree_prefix(), group.property, group.label),
                    label: group.label.clone(),
                    description: String::new(),
                    context_value: self.kind.context_value(NodeKind::Group),
                    outdated: children.iter().any(|child| child.outdated),
                    children,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::images_kind::ImagesKind;
    use crate::core::images_kind::test_support::{MockRegistry, MockRuntimeClient};
    use crate::core::models::{ItemDescriptor, ListOptions};
    use crate::core::outdated_checker::{OutdatedChecker, OutdatedCheckerConfig};
    use crate::core::runtime_client::ClientError;
    use crate::core::sorting::SortDirection;
    use crate::core::state_store::InMemoryStateStore;
    use std::time::Duration;
    use time::macros::datetime;

    type ImagesTree = RootTreeController<ImagesKind<MockRuntimeClient, MockRegistry>>;

    fn image(id: &str, repository: &str, tag: &str, size: u64) -> ItemDescriptor {
        ItemDescriptor::new(id, datetime!(2024-05-01 12:00 UTC))
            .with_repository(repository)
            .with_tag(tag)
            .with_size(size)
            .with_digest("sha256:local")
    }

    fn scenario_items() -> Vec<ItemDescriptor> {
        vec![
            image("1", "a", "v1", 10),
            image("2", "a", "v2", 20),
            image("3", "b", "v1", 5),
        ]
    }

    fn tree_with(client: MockRuntimeClient, registry: MockRegistry) -> ImagesTree {
        let kind = ImagesKind::new(
            client,
            OutdatedChecker::new(registry, OutdatedCheckerConfig::default()),
        );
        RootTreeController::new(kind, Arc::new(InMemoryStateStore::new()))
    }

    fn tree(client: MockRuntimeClient) -> ImagesTree {
        tree_with(client, MockRegistry::default())
    }

    fn group_summary(nodes: &[RenderedNode]) -> Vec<(String, Vec<String>)> {
        nodes
            .iter()
            .map(|group| {
                let labels = group.children.iter().map(|c| c.label.clone()).collect();
                (group.label.clone(), labels)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_repository_grouping_then_size_sort_scenario() {
        // Arrange
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));

        // Act: default settings group by Repository; equal creation times keep input order.
        let grouped = tree.get_children().await.unwrap();

        // Assert
        assert_eq!(
            group_summary(&grouped),
            vec![
                ("a".to_string(), vec!["v1".to_string(), "v2".to_string()]),
                ("b".to_string(), vec!["v1".to_string()]),
            ]
        );
        assert!(grouped.iter().all(|n| n.is_group() && n.context_value == "imageGroup"));

        // Act: sort by size, descending.
        tree.configure(SettingChange::SortBy("Size".to_string())).unwrap();
        tree.configure(SettingChange::SortDirection(SortDirection::Descending)).unwrap();
        let sorted = tree.get_children().await.unwrap();

        // Assert
        assert_eq!(
            group_summary(&sorted),
            vec![
                ("a".to_string(), vec!["v2".to_string(), "v1".to_string()]),
                ("b".to_string(), vec!["v1".to_string()]),
            ]
        );
        assert_eq!(tree.child_label(), "image group");
    }

    #[tokio::test]
    async fn test_flat_list_renders_items_with_descriptions() {
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));
        tree.configure(SettingChange::GroupBy(None)).unwrap();
        tree.configure(SettingChange::Label("FullTag".to_string())).unwrap();
        tree.configure(SettingChange::Description(vec!["Size".to_string(), "ImageId".to_string()]))
            .unwrap();
        tree.configure(SettingChange::SortBy("Size".to_string())).unwrap();
        tree.configure(SettingChange::SortDirection(SortDirection::Ascending)).unwrap();

        let nodes = tree.get_children().await.unwrap();

        let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["b:v1", "a:v1", "a:v2"]);
        assert_eq!(nodes[0].description, "5 B - 3");
        assert_eq!(nodes[0].context_value, "image");
        assert!(nodes.iter().all(|n| n.children.is_empty()));
        assert_eq!(tree.child_label(), "image");
    }

    #[tokio::test]
    async fn test_cache_is_served_until_invalidated() {
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));

        let first = tree.get_children().await.unwrap();
        let second = tree.get_children().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(tree.kind().client().list_call_count(), 1);

        tree.invalidate();
        tree.get_children().await.unwrap();
        assert_eq!(tree.kind().client().list_call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_issue_a_single_list_call() {
        // Arrange
        let client = MockRuntimeClient {
            list_delay: Some(Duration::from_millis(20)),
            ..MockRuntimeClient::default()
        };
        client.push_listing(Ok(scenario_items()));
        let tree = tree(client);

        // Act
        let (a, b) = futures::join!(tree.refresh(), tree.refresh());

        // Assert
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(tree.kind().client().list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_loads_issue_a_single_list_call() {
        let client = MockRuntimeClient {
            list_delay: Some(Duration::from_millis(20)),
            ..MockRuntimeClient::default()
        };
        client.push_listing(Ok(scenario_items()));
        let tree = tree(client);

        let (a, b, c) = futures::join!(tree.get_children(), tree.get_children(), tree.refresh());

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(tree.kind().client().list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_configuration_change_during_fetch_is_not_lost() {
        // Arrange
        let client = MockRuntimeClient {
            list_delay: Some(Duration::from_millis(50)),
            ..MockRuntimeClient::default()
        };
        client.push_listing(Ok(scenario_items()));
        let tree = tree(client);

        // Act
        let (first, _) = futures::join!(tree.get_children(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tree.configure(SettingChange::GroupBy(None)).unwrap();
        });
        let after = tree.get_children().await.unwrap();

        // Assert: the running cycle finished with the old grouping, the next call re-fetches.
        assert!(first.unwrap().iter().all(|node| node.is_group()));
        assert_eq!(after.len(), 3);
        assert!(after.iter().all(|node| !node.is_group()));
        assert_eq!(tree.kind().client().list_call_count(), 2);
    }

    #[tokio::test]
    async fn test_queued_caller_does_not_join_a_cycle_with_old_settings() {
        // Arrange
        let client = MockRuntimeClient {
            list_delay: Some(Duration::from_millis(50)),
            ..MockRuntimeClient::default()
        };
        client.push_listing(Ok(scenario_items()));
        let tree = tree(client);

        // Act
        let (_, queued) = futures::join!(tree.get_children(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tree.set_dangling_included(true).unwrap();
            tree.get_children().await
        });

        // Assert
        assert!(queued.is_ok());
        let calls = tree.kind().client().list_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ListOptions { include_filtered: Some(false) },
                ListOptions { include_filtered: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_rendering() {
        let client = MockRuntimeClient::default();
        client.push_listing(Ok(scenario_items()));
        client.push_listing(Err(ClientError::Parse("daemon not running".to_string())));
        let tree = tree(client);
        let first = tree.get_children().await.unwrap();

        let result = tree.refresh().await;

        assert!(matches!(result, Err(TreeError::Fetch(_))));
        let cached = tree.cached_children().unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
    }

    #[tokio::test]
    async fn test_dangling_toggle_reaches_the_lister() {
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));

        tree.get_children().await.unwrap();
        tree.set_dangling_included(true).unwrap();
        tree.get_children().await.unwrap();

        let calls = tree.kind().client().list_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ListOptions { include_filtered: Some(false) },
                ListOptions { include_filtered: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_outdated_items_are_flagged_in_rendering() {
        let registry = MockRegistry::default().with_digest("library/a:v2", "sha256:newer");
        let tree = tree_with(MockRuntimeClient::with_items(scenario_items()), registry);

        let nodes = tree.get_children().await.unwrap();

        let group_a = &nodes[0];
        assert!(group_a.outdated);
        let flagged: Vec<&str> = group_a
            .children
            .iter()
            .filter(|c| c.outdated)
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(flagged, vec!["v2"]);
        assert!(!nodes[1].outdated);
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_rejected_and_keeps_cache() {
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));
        tree.get_children().await.unwrap();

        let result = tree.configure(SettingChange::GroupBy(Some("Size".to_string())));

        assert!(matches!(result, Err(TreeError::Configuration(_))));
        tree.get_children().await.unwrap();
        assert_eq!(tree.kind().client().list_call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_cancels_in_flight_and_later_fetches() {
        let client = MockRuntimeClient {
            list_delay: Some(Duration::from_millis(50)),
            ..MockRuntimeClient::default()
        };
        client.push_listing(Ok(scenario_items()));
        let tree = tree(client);

        let (result, _) = futures::join!(tree.get_children(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tree.dispose();
        });

        assert!(matches!(result, Err(TreeError::Cancelled)));
        assert!(tree.cached_children().is_none());
        assert!(matches!(tree.get_children().await, Err(TreeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_reset_settings_restores_defaults() {
        let tree = tree(MockRuntimeClient::with_items(scenario_items()));
        tree.configure(SettingChange::GroupBy(None)).unwrap();
        assert!(!tree.settings().is_grouped());

        tree.reset_settings().unwrap();

        assert_eq!(tree.settings(), tree.kind().default_settings());
        assert_eq!(tree.label(), "Images");
    }
}
