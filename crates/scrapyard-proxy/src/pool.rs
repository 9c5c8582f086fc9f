use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use scrapyard_core::{Error, ErrorKind, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ProxyConfig;

/// A single proxy pool entry: navigations served so far, and whether it is
/// currently lent out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    use_count: u32,
    in_use: bool,
}

/// Use-counted registry of outbound proxy endpoints.
///
/// Grounded on `scraper/scraper/web/proxy.py::ProxyManager`: a single
/// `HashMap<String, (use_count, in_use)>` guarded by one mutex (per
/// SPEC_FULL.md §9's "pool map mutation" note), with `acquire` implemented as
/// find-and-flip rather than get-then-update.
pub struct ProxyPool {
    cfg: ProxyConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ProxyPool {
    /// Loads proxies from the configured file, optionally validating them,
    /// and builds the initial pool.
    pub async fn init(cfg: ProxyConfig) -> Result<Self> {
        let pool = Self {
            cfg,
            entries: Mutex::new(HashMap::new()),
        };

        let loaded = pool.load_proxies_from_file()?;
        let survivors = if pool.cfg.validation {
            pool.validate_proxies(loaded).await
        } else {
            loaded
        };

        let mut entries = pool.entries.lock().await;
        for proxy in survivors {
            entries.insert(
                proxy,
                Entry {
                    use_count: 0,
                    in_use: false,
                },
            );
        }
        info!(count = entries.len(), "initialized proxy pool");
        drop(entries);

        Ok(pool)
    }

    fn load_proxies_from_file(&self) -> Result<Vec<String>> {
        let contents = std::fs::read_to_string(&self.cfg.input_file)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn is_proxy_valid(&self, proxy: &str) -> bool {
        let proxy_url = self.format_proxy_url(proxy);
        let http_proxy = match reqwest::Proxy::all(&proxy_url) {
            Ok(p) => p,
            Err(e) => {
                warn!(proxy = proxy, error = %e, "invalid proxy url");
                return false;
            }
        };

        let client = match reqwest::Client::builder()
            .proxy(http_proxy)
            .timeout(self.cfg.probe_timeout)
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                warn!(proxy = proxy, error = %e, "failed to build probe client");
                return false;
            }
        };

        match client.get(&self.cfg.test_url).send().await {
            Ok(resp) => resp.status().as_u16() == 200,
            Err(e) => {
                warn!(proxy = proxy, error = %e, "proxy validation error");
                false
            }
        }
    }

    fn format_proxy_url(&self, proxy: &str) -> String {
        let protocol = self.cfg.proxy_type.to_lowercase();
        let auth = self
            .cfg
            .authentication
            .as_ref()
            .map(|a| format!("{}:{}@", a.username, a.password))
            .unwrap_or_default();
        format!("{protocol}://{auth}{proxy}")
    }

    async fn validate_proxies(&self, proxies: Vec<String>) -> Vec<String> {
        stream::iter(proxies)
            .map(|proxy| async move {
                if self.is_proxy_valid(&proxy).await {
                    Some(proxy)
                } else {
                    None
                }
            })
            .buffer_unordered(self.cfg.max_concurrent_probes.max(1))
            .filter_map(|result| async move { result })
            .collect()
            .await
    }

    /// Returns the first proxy with spare capacity, transitioning it to
    /// `(use_count + 1, in_use = true)`. Reloads from the source file once if
    /// the pool is exhausted.
    pub async fn acquire(&self) -> Result<String> {
        if let Some(proxy) = self.try_acquire().await {
            return Ok(proxy);
        }
        info!("proxy pool exhausted, reloading proxy pool...");
        self.reload().await
    }

    async fn try_acquire(&self) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let usage_limit = self.cfg.usage_limit;
        for (proxy, entry) in entries.iter_mut() {
            if entry.use_count < usage_limit && !entry.in_use {
                entry.use_count += 1;
                entry.in_use = true;
                return Some(proxy.clone());
            }
        }
        None
    }

    /// Rereads the source file, validates and inserts any proxies not
    /// already known, then retries `acquire` once.
    pub async fn reload(&self) -> Result<String> {
        let file_entries = self.load_proxies_from_file()?;
        let known: std::collections::HashSet<String> = {
            let entries = self.entries.lock().await;
            entries.keys().cloned().collect()
        };

        let fresh: Vec<String> = file_entries
            .into_iter()
            .filter(|p| !known.contains(p))
            .collect();

        if fresh.is_empty() {
            return Err(Error::new(
                ErrorKind::Proxy,
                "no new proxies available to refresh exhausted proxy pool",
            ));
        }

        let survivors = if self.cfg.validation {
            self.validate_proxies(fresh).await
        } else {
            fresh
        };

        if survivors.is_empty() {
            return Err(Error::new(ErrorKind::Proxy, "no new proxies available"));
        }

        {
            let mut entries = self.entries.lock().await;
            for proxy in survivors {
                entries.insert(
                    proxy,
                    Entry {
                        use_count: 0,
                        in_use: false,
                    },
                );
            }
            info!(count = entries.len(), "reloaded proxy pool");
        }

        self.try_acquire()
            .await
            .ok_or_else(|| Error::new(ErrorKind::Proxy, "proxy pool exhausted after reload"))
    }

    /// Increments a proxy's usage count. Evicts and raises `UsageError` if
    /// the increment would exceed the configured limit.
    pub async fn increment(&self, proxy: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(proxy) else {
            return Ok(());
        };
        if entry.use_count < self.cfg.usage_limit {
            entry.use_count += 1;
            entry.in_use = true;
            Ok(())
        } else {
            entries.remove(proxy);
            Err(Error::new(
                ErrorKind::Proxy,
                format!("proxy '{proxy}' has reached its usage limit"),
            ))
        }
    }

    /// Releases a proxy back to the pool, or evicts it silently if it has
    /// reached its usage limit.
    pub async fn release(&self, proxy: &str) {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(proxy) else {
            return;
        };
        if entry.use_count < self.cfg.usage_limit {
            entry.in_use = false;
        } else {
            entries.remove(proxy);
            info!(proxy, "proxy removed from the pool");
        }
    }

    /// Number of known proxy entries, for diagnostics and tests.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_proxies(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    async fn pool_with(lines: &[&str], usage_limit: u32) -> (ProxyPool, tempfile::NamedTempFile) {
        let file = write_proxies(lines);
        let cfg = ProxyConfig::builder()
            .with_input_file(file.path().to_path_buf())
            .with_test_url("https://example.com")
            .with_usage_limit(usage_limit)
            .with_proxy_type("HTTP")
            .with_validation(false)
            .build()
            .unwrap();
        (ProxyPool::init(cfg).await.unwrap(), file)
    }

    #[tokio::test]
    async fn acquire_flips_in_use_and_increments() {
        let (pool, _file) = pool_with(&["10.0.0.1:8080", "10.0.0.2:8080"], 5).await;
        let proxy = pool.acquire().await.unwrap();
        assert!(["10.0.0.1:8080", "10.0.0.2:8080"].contains(&proxy.as_str()));
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn increment_past_limit_evicts() {
        let (pool, _file) = pool_with(&["10.0.0.1:8080"], 1).await;
        let proxy = pool.acquire().await.unwrap();
        // Already at use_count=1 (the acquire above counted as one use).
        let result = pool.increment(&proxy).await;
        assert!(result.is_err());
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn release_under_limit_frees_entry() {
        let (pool, _file) = pool_with(&["10.0.0.1:8080"], 5).await;
        let proxy = pool.acquire().await.unwrap();
        pool.release(&proxy).await;
        // Should be acquirable again since it was freed, not evicted.
        let reacquired = pool.acquire().await.unwrap();
        assert_eq!(reacquired, proxy);
    }

    #[tokio::test]
    async fn reload_with_no_fresh_proxies_errors() {
        let (pool, _file) = pool_with(&["10.0.0.1:8080"], 1).await;
        let _ = pool.acquire().await.unwrap();
        // Usage limit reached on the only proxy; no new lines in the file.
        let result = pool.acquire().await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Proxy);
    }
}
