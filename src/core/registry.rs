/*
 * Remote digest lookup used by the outdated checker.
 * A local image is compared against the digest its registry currently serves for the
 * same repository and tag. `RemoteReference` normalizes a local repository string into
 * registry + path the way the docker CLI does (bare names live under `library/` on
 * Docker Hub). `HubRegistry` is the bundled implementation; it only answers for Docker
 * Hub references and reports every other registry as unresolvable.
 */
use super::models::{ItemDescriptor, NONE_PLACEHOLDER};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub const DOCKER_HUB_REGISTRY: &str = "docker.io";
const DOCKER_HUB_ALIASES: [&str; 3] = ["docker.io", "index.docker.io", "registry-1.docker.io"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry request failed: {0}")]
    Http(String),
    #[error("Registry I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Registry response for {0} carried no digest")]
    MissingDigest(String),
    #[error("Registry lookup task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteReference {
    pub registry: String,
    pub path: String,
    pub tag: String,
}

impl RemoteReference {
    /*
     * Parses a listed repository and tag into a remote reference. A first path
     * component containing `.` or `:`, or equal to `localhost`, names the registry;
     * anything else is a Docker Hub repository. Docker Hub aliases are normalized and
     * single-component Hub paths get the `library/` namespace.
     *
     * Args:
     * - `repository`: The repository as listed, e.g. `nginx` or `ghcr.io/org/app`.
     * - `tag`: The tag as listed.
     *
     * Returns:
     * - `Some(RemoteReference)` for a usable reference.
     * - `None` for empty, untagged or `<none>` values. Those images have no remote
     *   counterpart to compare against.
     */
    pub fn parse(repository: &str, tag: &str) -> Option<Self> {
        let repository = repository.trim();
        let tag = tag.trim();
        if repository.is_empty()
            || tag.is_empty()
            || repository == NONE_PLACEHOLDER
            || tag == NONE_PLACEHOLDER
        {
            return None;
        }

        let (registry, path) = match repository.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DOCKER_HUB_REGISTRY.to_string(), repository.to_string()),
        };
        if path.is_empty() {
            return None;
        }

        let is_hub = DOCKER_HUB_ALIASES.contains(&registry.as_str());
        let registry = if is_hub {
            DOCKER_HUB_REGISTRY.to_string()
        } else {
            registry
        };
        let path = if is_hub && !path.contains('/') {
            format!("library/{path}")
        } else {
            path
        };

        Some(RemoteReference {
            registry,
            path,
            tag: tag.to_string(),
        })
    }

    /*
     * Builds the reference for an image. Items without a local digest are skipped as
     * well: there is nothing to compare the remote digest with.
     */
    pub fn from_item(item: &ItemDescriptor) -> Option<Self> {
        item.digest.as_ref().filter(|d| !d.trim().is_empty())?;
        Self::parse(item.repository.as_deref()?, item.tag.as_deref()?)
    }

    pub fn is_docker_hub(&self) -> bool {
        self.registry == DOCKER_HUB_REGISTRY
    }
}

impl fmt::Display for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.path, self.tag)
    }
}

/*
 * Resolves the digest a registry currently serves for a reference.
 * `Ok(None)` means the reference cannot be resolved (unsupported registry, unknown
 * repository or tag); errors are per-reference and must not affect other lookups.
 */
pub trait RemoteDigestOperations {
    fn resolve_digest(
        &self,
        reference: &RemoteReference,
    ) -> impl Future<Output = Result<Option<String>>>;
}

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.oci.image.index.v1+json, \
application/vnd.docker.distribution.manifest.v2+json, \
application/vnd.oci.image.manifest.v1+json";

#[derive(Debug, Clone)]
pub struct HubRegistryConfig {
    pub auth_url: String,
    pub registry_url: String,
    pub timeout: Duration,
}

impl Default for HubRegistryConfig {
    fn default() -> Self {
        HubRegistryConfig {
            auth_url: "https://auth.docker.io/token".to_string(),
            registry_url: "https://registry-1.docker.io".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/*
 * Docker Hub implementation of `RemoteDigestOperations`.
 * Uses an anonymous pull token and a HEAD request on the manifest; the digest is
 * taken from the `Docker-Content-Digest` header. The blocking HTTP call runs on
 * tokio's blocking pool.
 */
pub struct HubRegistry {
    agent: ureq::Agent,
    config: HubRegistryConfig,
}

impl HubRegistry {
    pub fn new(config: HubRegistryConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        HubRegistry { agent, config }
    }

    fn fetch_digest_blocking(
        agent: &ureq::Agent,
        config: &HubRegistryConfig,
        reference: &RemoteReference,
    ) -> Result<Option<String>> {
        let scope = format!("repository:{}:pull", reference.path);
        let token = match agent
            .get(&config.auth_url)
            .query("service", "registry.docker.io")
            .query("scope", &scope)
            .call()
        {
            Ok(response) => response.into_json::<TokenResponse>()?.token,
            Err(ureq::Error::Status(code, _)) => {
                return Err(RegistryError::Http(format!(
                    "token request for {reference} returned {code}"
                )));
            }
            Err(e) => return Err(RegistryError::Http(e.to_string())),
        };

        let url = format!(
            "{}/v2/{}/manifests/{}",
            config.registry_url, reference.path, reference.tag
        );
        match agent
            .head(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .set("Accept", MANIFEST_ACCEPT)
            .call()
        {
            Ok(response) => response
                .header("Docker-Content-Digest")
                .map(|d| Some(d.to_string()))
                .ok_or_else(|| RegistryError::MissingDigest(reference.to_string())),
            // Repository or tag no longer exists remotely (or is private).
            Err(ureq::Error::Status(401 | 403 | 404, _)) => Ok(None),
            Err(ureq::Error::Status(code, _)) => Err(RegistryError::Http(format!(
                "manifest request for {reference} returned {code}"
            ))),
            Err(e) => Err(RegistryError::Http(e.to_string())),
        }
    }
}

impl Default for HubRegistry {
    fn default() -> Self {
        Self::new(HubRegistryConfig::default())
    }
}

impl RemoteDigestOperations for HubRegistry {
    async fn resolve_digest(&self, reference: &RemoteReference) -> Result<Option<String>> {
        if !reference.is_docker_hub() {
            log::trace!("HubRegistry: {reference} is not a Docker Hub reference, skipping.");
            return Ok(None);
        }

        let agent = self.agent.clone();
        let config = self.config.clone();
        let reference = reference.clone();
        let digest = tokio::task::spawn_blocking(move || {
            Self::fetch_digest_blocking(&agent, &config, &reference)
        })
        .await
        .map_err(|e| RegistryError::Task(e.to_string()))??;
        Ok(digest)
    }
}
