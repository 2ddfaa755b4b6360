/*
 * This module defines the contract between the tree and the container runtime client.
 * The client is an opaque service: it can list images (honoring the tri-state
 * `include_filtered` option) and inspect a set of images by id. The concrete
 * implementations live in `docker_cli` (talks to the docker CLI) and `snapshot_client`
 * (reads a recorded JSON snapshot).
 */
use super::models::{InspectDocument, ItemDescriptor, ListOptions};
use std::future::Future;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Runtime client I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Command '{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("Could not parse runtime output: {0}")]
    Parse(String),
    #[error("Runtime JSON error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("No such resource: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/*
 * Operations the tree needs from a runtime client.
 * `list` is called exactly once per fetch cycle. When `options.include_filtered` is
 * `Some(false)` the client must exclude dangling images; `None` means no exclusion.
 */
pub trait RuntimeClientOperations {
    fn list(&self, options: &ListOptions) -> impl Future<Output = Result<Vec<ItemDescriptor>>>;

    fn inspect(&self, ids: &[String]) -> impl Future<Output = Result<Vec<InspectDocument>>>;
}
