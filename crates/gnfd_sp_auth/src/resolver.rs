//! Storage provider endpoint resolution.
//!
//! A read-mostly cache maps SP chain addresses to base URLs. The cache is
//! filled from one registry enumeration at client construction; a lookup
//! miss triggers exactly one re-enumeration that replaces the whole map,
//! then the lookup is retried once. There is no TTL and no background
//! refresh; staleness is corrected by the next miss.

use crate::{SpAuthError, SpAuthResult, SpInfo};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Traits related to the SP registry seam. Unless you're wiring up a new
/// chain backend, you probably don't need these.
pub mod traits {
    use super::*;

    /// Defines the chain query that enumerates registered SPs.
    pub trait AsSpRegistry: 'static + Send + Sync {
        /// List every storage provider currently registered on chain.
        fn list_storage_providers(
            &self,
        ) -> BoxFuture<'static, SpAuthResult<Vec<SpInfo>>>;
    }
}
use traits::*;

/// Concrete SP registry handle.
#[derive(Clone)]
pub struct SpRegistry(pub Arc<dyn AsSpRegistry>);

impl SpRegistry {
    /// List every storage provider currently registered on chain.
    pub fn list_storage_providers(
        &self,
    ) -> BoxFuture<'static, SpAuthResult<Vec<SpInfo>>> {
        AsSpRegistry::list_storage_providers(&*self.0)
    }
}

/// Resolves SP chain addresses to endpoint base URLs.
pub struct EndpointResolver {
    registry: SpRegistry,
    // full-replace only: writers swap the Arc, so a concurrent reader
    // always sees either the old complete map or the new complete map
    cache: RwLock<Arc<HashMap<String, Url>>>,
}

impl EndpointResolver {
    /// Construct a resolver over a registry handle with an empty cache.
    pub fn new(registry: SpRegistry) -> Self {
        Self {
            registry,
            cache: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Populate the cache with one registry enumeration.
    pub async fn prime(&self) -> SpAuthResult<()> {
        self.refresh().await
    }

    /// Resolve an SP chain address to its endpoint base URL.
    ///
    /// Cache hit returns immediately with no network call. A miss issues
    /// one registry query, rebuilds the cache wholesale, and retries the
    /// lookup once before failing with [SpAuthError::EndpointNotFound].
    pub async fn resolve(&self, sp_address: &str) -> SpAuthResult<Url> {
        if let Some(endpoint) = self.lookup(sp_address) {
            return Ok(endpoint);
        }

        tracing::debug!(%sp_address, "sp endpoint cache miss, refreshing");
        self.refresh().await?;

        self.lookup(sp_address).ok_or_else(|| {
            SpAuthError::EndpointNotFound(sp_address.to_string())
        })
    }

    fn lookup(&self, sp_address: &str) -> Option<Url> {
        let cache = self.cache.read().clone();
        cache.get(sp_address).cloned()
    }

    async fn refresh(&self) -> SpAuthResult<()> {
        let list = self.registry.list_storage_providers().await?;
        let map: HashMap<String, Url> = list
            .into_iter()
            .map(|sp| (sp.operator_address, sp.endpoint))
            .collect();
        tracing::debug!(entries = map.len(), "sp endpoint cache rebuilt");
        *self.cache.write() = Arc::new(map);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::future::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRegistry {
        calls: Arc<AtomicUsize>,
        sps: Vec<SpInfo>,
    }

    impl AsSpRegistry for CountingRegistry {
        fn list_storage_providers(
            &self,
        ) -> BoxFuture<'static, SpAuthResult<Vec<SpInfo>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let sps = self.sps.clone();
            async move { Ok(sps) }.boxed()
        }
    }

    fn registry(
        sps: Vec<(&str, &str)>,
    ) -> (SpRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sps = sps
            .into_iter()
            .map(|(addr, url)| SpInfo {
                operator_address: addr.to_string(),
                endpoint: url.parse().unwrap(),
            })
            .collect();
        (
            SpRegistry(Arc::new(CountingRegistry {
                calls: calls.clone(),
                sps,
            })),
            calls,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn miss_refreshes_once_then_hits() {
        let (registry, calls) =
            registry(vec![("0xsp1", "https://sp1.example.com")]);
        let resolver = EndpointResolver::new(registry);

        let url = resolver.resolve("0xsp1").await.unwrap();
        assert_eq!(url.as_str(), "https://sp1.example.com/");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // second resolve is a pure cache hit
        resolver.resolve("0xsp1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_sp_fails_after_single_refresh() {
        let (registry, calls) =
            registry(vec![("0xsp1", "https://sp1.example.com")]);
        let resolver = EndpointResolver::new(registry);
        resolver.prime().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = resolver.resolve("0xmissing").await.unwrap_err();
        assert!(matches!(err, SpAuthError::EndpointNotFound(ref a) if a == "0xmissing"));
        // exactly one extra refresh inside the failing call
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_replaces_map_wholesale() {
        struct SwitchingRegistry {
            calls: Arc<AtomicUsize>,
        }

        impl AsSpRegistry for SwitchingRegistry {
            fn list_storage_providers(
                &self,
            ) -> BoxFuture<'static, SpAuthResult<Vec<SpInfo>>> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    // first enumeration: sp1 only; later: sp2 only
                    let (addr, url) = if n == 0 {
                        ("0xsp1", "https://sp1.example.com")
                    } else {
                        ("0xsp2", "https://sp2.example.com")
                    };
                    Ok(vec![SpInfo {
                        operator_address: addr.to_string(),
                        endpoint: url.parse().unwrap(),
                    }])
                }
                .boxed()
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EndpointResolver::new(SpRegistry(Arc::new(
            SwitchingRegistry {
                calls: calls.clone(),
            },
        )));

        resolver.prime().await.unwrap();
        resolver.resolve("0xsp1").await.unwrap();

        // sp2 appears only in the second enumeration; resolving it forces
        // the refresh, and the old entry is gone afterwards (full replace)
        resolver.resolve("0xsp2").await.unwrap();
        let err = resolver.resolve("0xsp1").await.unwrap_err();
        assert!(matches!(err, SpAuthError::EndpointNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_resolves_share_the_cache() {
        let (registry, calls) =
            registry(vec![("0xsp1", "https://sp1.example.com")]);
        let resolver = Arc::new(EndpointResolver::new(registry));
        resolver.prime().await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            tasks.push(tokio::spawn(async move {
                resolver.resolve("0xsp1").await.unwrap()
            }));
        }
        for t in tasks {
            assert_eq!(
                t.await.unwrap().as_str(),
                "https://sp1.example.com/"
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
