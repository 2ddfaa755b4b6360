/*
 * The dangling/visibility toggle. A persisted boolean (default false) decides whether
 * the lister is asked to exclude the filtered subset.
 *
 * The option handed to the client is tri-state:
 * `None` means "include everything", `Some(false)` asks for explicit exclusion. The two
 * are not interchangeable and the key is never omitted from `ListOptions`.
 */
use super::errors::Result;
use super::models::ListOptions;
use super::state_store::{self, StateStoreOperations};

pub struct DanglingFilter<'a> {
    store: &'a dyn StateStoreOperations,
    key: String,
}

impl<'a> DanglingFilter<'a> {
    pub fn for_tree(store: &'a dyn StateStoreOperations, tree_prefix: &str) -> Self {
        DanglingFilter {
            store,
            key: format!("{tree_prefix}.includeDangling"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn currently_included(&self) -> bool {
        match state_store::load_typed::<bool>(self.store, &self.key) {
            Ok(value) => value.unwrap_or(false),
            Err(e) => {
                log::warn!(
                    "DanglingFilter: Could not read '{}': {e}. Treating as not included.",
                    self.key
                );
                false
            }
        }
    }

    pub fn build_option(&self) -> Option<bool> {
        if self.currently_included() {
            None
        } else {
            Some(false)
        }
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            include_filtered: self.build_option(),
        }
    }

    /// The toggle command: persists the new flag.
    pub fn set_included(&self, included: bool) -> Result<()> {
        state_store::save_typed(self.store, &self.key, &included)?;
        log::debug!("DanglingFilter: '{}' set to {included}.", self.key);
        Ok(())
    }
}
