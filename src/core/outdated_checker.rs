/*
 * Outdated detection. After a listing, each eligible image's local digest is compared
 * with the digest its registry currently serves for the same repository and tag; a
 * mismatch flags the image as outdated.
 *
 * Lookups run concurrently up to `max_concurrent_lookups` and `mark_outdated` only
 * returns once every lookup has settled. A failed lookup is logged and leaves that
 * item's flag as it was; it never affects the other items. Resolved digests are
 * memoized for `cache_ttl` so repeated refreshes do not hit the registry every time.
 */
use super::errors::TreeError;
use super::models::ItemDescriptor;
use super::registry::{RemoteDigestOperations, RemoteReference};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OutdatedCheckerConfig {
    pub enabled: bool,
    pub max_concurrent_lookups: usize,
    pub cache_ttl: Duration,
}

impl Default for OutdatedCheckerConfig {
    fn default() -> Self {
        OutdatedCheckerConfig {
            enabled: true,
            max_concurrent_lookups: 4,
            cache_ttl: Duration::from_secs(10 * 60),
        }
    }
}

struct CachedDigest {
    digest: Option<String>,
    resolved_at: Instant,
}

pub struct OutdatedChecker<R: RemoteDigestOperations> {
    registry: R,
    config: OutdatedCheckerConfig,
    digest_cache: Mutex<HashMap<RemoteReference, CachedDigest>>,
}

impl<R: RemoteDigestOperations> OutdatedChecker<R> {
    pub fn new(registry: R, config: OutdatedCheckerConfig) -> Self {
        OutdatedChecker {
            registry,
            config,
            digest_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn config(&self) -> &OutdatedCheckerConfig {
        &self.config
    }

    /*
     * Flags every item whose local digest differs from the digest its registry serves
     * for the same repository and tag. Items without a remote reference (dangling,
     * missing digest) are skipped. A failed lookup leaves that item untouched. Never
     * sets a flag back to false.
     *
     * Args:
     * - `items`: The listed items, updated in place.
     *
     * Returns once every issued lookup has settled. Does nothing when disabled.
     */
    pub async fn mark_outdated(&self, items: &mut [ItemDescriptor]) {
        if !self.config.enabled {
            log::trace!("OutdatedChecker: Disabled, skipping {} items.", items.len());
            return;
        }

        let limit = self.config.max_concurrent_lookups.max(1);
        log::debug!(
            "OutdatedChecker: Checking {} items with up to {limit} concurrent lookups.",
            items.len()
        );
        stream::iter(items.iter_mut())
            .for_each_concurrent(limit, |item| async move {
                self.check_item(item).await;
            })
            .await;
    }

    async fn check_item(&self, item: &mut ItemDescriptor) {
        let Some(reference) = RemoteReference::from_item(item) else {
            log::trace!("OutdatedChecker: No remote reference for '{}', skipping.", item.id);
            return;
        };

        let remote_digest = match self.cached_digest(&reference) {
            Some(digest) => digest,
            None => match self.registry.resolve_digest(&reference).await {
                Ok(digest) => {
                    self.remember_digest(&reference, digest.clone());
                    digest
                }
                Err(source) => {
                    let error = TreeError::Enrichment {
                        item: reference.to_string(),
                        source,
                    };
                    log::warn!("OutdatedChecker: {error}");
                    return;
                }
            },
        };

        let Some(remote_digest) = remote_digest else {
            log::trace!("OutdatedChecker: '{reference}' is not resolvable remotely.");
            return;
        };
        if item.digest.as_deref() != Some(remote_digest.as_str()) {
            log::debug!(
                "OutdatedChecker: '{}' ({reference}) is outdated; remote digest {remote_digest}.",
                item.id
            );
            item.outdated = true;
        }
    }

    fn cached_digest(&self, reference: &RemoteReference) -> Option<Option<String>> {
        let cache = self.digest_cache.lock().ok()?;
        cache
            .get(reference)
            .filter(|entry| entry.resolved_at.elapsed() < self.config.cache_ttl)
            .map(|entry| entry.digest.clone())
    }

    fn remember_digest(&self, reference: &RemoteReference, digest: Option<String>) {
        match self.digest_cache.lock() {
            Ok(mut cache) => {
                let ttl = self.config.cache_ttl;
                cache.retain(|_, entry| entry.resolved_at.elapsed() < ttl);
                cache.insert(
                    reference.clone(),
                    CachedDigest {
                        digest,
                        resolved_at: Instant::now(),
                    },
                );
            }
            Err(_) => log::warn!("OutdatedChecker: Digest cache lock poisoned; not caching '{reference}'."),
        }
    }
}
