/*
 * Per-tree view settings (label, description, grouping, sorting) and the configuration
 * command that changes them.
 *
 * Settings are persisted in the state store under `<tree prefix>.settings`. They are
 * only ever changed through `configure`/`reset`, which validate the new value against
 * the resource kind's property catalog before writing it. A fetch cycle reads the
 * settings once, at its start.
 */
use super::errors::{Result, TreeError};
use super::properties::{GROUP_BY_NONE, PropertyCatalog, PropertyRole, SORT_BY_LABEL};
use super::sorting::SortDirection;
use super::state_store::{self, StateStoreOperations};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSettings {
    pub label_property: String,
    pub description_properties: Vec<String>,
    pub group_by_property: Option<String>,
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

impl TreeSettings {
    /*
     * Checks every configured name against the catalog and its roles.
     * `sort_by` additionally accepts the `Label` pseudo-property.
     */
    pub fn validate<T>(&self, catalog: &PropertyCatalog<T>) -> Result<()> {
        catalog.resolve(&self.label_property, PropertyRole::Label)?;
        for name in &self.description_properties {
            catalog.resolve(name, PropertyRole::Description)?;
        }
        if let Some(name) = &self.group_by_property {
            catalog.resolve(name, PropertyRole::GroupBy)?;
        }
        if self.sort_by != SORT_BY_LABEL {
            catalog.resolve(&self.sort_by, PropertyRole::SortBy)?;
        }
        Ok(())
    }

    /// Name of the property items are actually ordered by.
    pub fn effective_sort_property(&self) -> &str {
        if self.sort_by == SORT_BY_LABEL {
            &self.label_property
        } else {
            &self.sort_by
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_by_property.is_some()
    }
}

/// One user-initiated change to a tree's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    Label(String),
    Description(Vec<String>),
    // `None` (or the `"None"` sentinel) switches to a flat list.
    GroupBy(Option<String>),
    SortBy(String),
    SortDirection(SortDirection),
}

pub fn settings_key(tree_prefix: &str) -> String {
    format!("{tree_prefix}.settings")
}

/*
 * Loads the persisted settings for a tree, falling back to `defaults` when nothing was
 * stored or the stored value is unreadable. A stored value naming properties the
 * catalog no longer knows is also replaced by the defaults.
 */
pub fn load_settings<T>(
    store: &dyn StateStoreOperations,
    tree_prefix: &str,
    catalog: &PropertyCatalog<T>,
    defaults: &TreeSettings,
) -> TreeSettings {
    let key = settings_key(tree_prefix);
    match state_store::load_typed::<TreeSettings>(store, &key) {
        Ok(Some(settings)) => match settings.validate(catalog) {
            Ok(()) => settings,
            Err(e) => {
                log::warn!("TreeSettings: Stored settings for '{tree_prefix}' are invalid ({e}); using defaults.");
                defaults.clone()
            }
        },
        Ok(None) => {
            log::trace!("TreeSettings: No stored settings for '{tree_prefix}', using defaults.");
            defaults.clone()
        }
        Err(e) => {
            log::warn!("TreeSettings: Failed to read settings for '{tree_prefix}': {e}; using defaults.");
            defaults.clone()
        }
    }
}

/*
 * The configuration command: applies `change` on top of the current settings,
 * validates the result and persists it. Returns the new settings; the caller is
 * expected to invalidate the tree so the next fetch picks them up.
 */
pub fn configure<T>(
    store: &dyn StateStoreOperations,
    tree_prefix: &str,
    catalog: &PropertyCatalog<T>,
    defaults: &TreeSettings,
    change: SettingChange,
) -> Result<TreeSettings> {
    let mut settings = load_settings(store, tree_prefix, catalog, defaults);
    match change {
        SettingChange::Label(name) => settings.label_property = name,
        SettingChange::Description(names) => {
            if names.is_empty() {
                return Err(TreeError::configuration(
                    "At least one description property is required",
                ));
            }
            let mut unique: Vec<String> = Vec::with_capacity(names.len());
            for name in names {
                if !unique.contains(&name) {
                    unique.push(name);
                }
            }
            settings.description_properties = unique;
        }
        SettingChange::GroupBy(name) => {
            settings.group_by_property = name.filter(|n| n != GROUP_BY_NONE);
        }
        SettingChange::SortBy(name) => settings.sort_by = name,
        SettingChange::SortDirection(direction) => settings.sort_direction = direction,
    }

    settings.validate(catalog)?;
    state_store::save_typed(store, &settings_key(tree_prefix), &settings)?;
    log::debug!("TreeSettings: Saved settings for '{tree_prefix}': {settings:?}");
    Ok(settings)
}

pub fn reset(store: &dyn StateStoreOperations, tree_prefix: &str) -> Result<()> {
    store.remove_value(&settings_key(tree_prefix))?;
    log::debug!("TreeSettings: Reset settings for '{tree_prefix}' to defaults.");
    Ok(())
}
