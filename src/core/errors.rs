/*
 * Error taxonomy of the root tree.
 *
 * - `Fetch`: the runtime client's listing (or inspection) failed. Not recoverable
 *   locally; the current cycle is aborted and the previous cache is left untouched.
 * - `Enrichment`: a single item's remote lookup failed. Built and logged by the
 *   outdated checker; it never aborts a cycle.
 * - `Configuration`: an unknown property name, or a property used in a role the
 *   catalog does not allow. Indicates a catalog or settings defect; fails fast.
 * - `Cancelled`: the owning tree was disposed while a cycle was in flight.
 * - `State`: reading or writing the persisted state failed during a configuration command.
 */
use super::registry::RegistryError;
use super::runtime_client::ClientError;
use super::state_store::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Failed to fetch resources: {0}")]
    Fetch(#[from] ClientError),
    #[error("Failed to check whether '{item}' is outdated: {source}")]
    Enrichment {
        item: String,
        #[source]
        source: RegistryError,
    },
    #[error("Invalid tree configuration: {0}")]
    Configuration(String),
    #[error("Tree operation was cancelled")]
    Cancelled,
    #[error("Persisted state error: {0}")]
    State(#[from] StateError),
}

impl TreeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TreeError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
