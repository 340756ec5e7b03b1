//! The token resolution service.
//!
//! Composes the static registry, the TTL-bounded cache, the remote metadata
//! client, and the on-chain decimals fallback behind one API. One shared
//! instance serves the whole process; `global` / `reset_global` manage its
//! lifecycle (construct on first use, reset between tests).

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lazy_static::lazy_static;
use reqwest::Client;
use tracing::{info, warn};

use crate::blockchain::rpc;
use crate::config::Config;

use super::address::{is_address_like, normalize_address};
use super::cache::TokenCache;
use super::registry;
use super::remote::{self, RemoteToken};
use super::{short_address, TokenError, TokenMeta, TokenRecord};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct TokenService {
    http: Client,
    token_api_url: String,
    /// Injected on-chain read capability; absence disables the on-chain
    /// decimals tier.
    rpc_url: Option<String>,
    cache: RwLock<TokenCache>,
}

impl TokenService {
    pub fn new(token_api_url: impl Into<String>, rpc_url: Option<String>) -> Self {
        let mut cache = TokenCache::default();
        cache.load_static(registry::static_tokens());
        info!("token cache primed with {} static tokens", cache.len());
        Self {
            http: Client::new(),
            token_api_url: token_api_url.into(),
            rpc_url,
            cache: RwLock::new(cache),
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, TokenCache> {
        self.cache.read().expect("token cache lock poisoned")
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, TokenCache> {
        self.cache.write().expect("token cache lock poisoned")
    }

    // --- Synchronous, cache-only lookups ---

    /// Resolve a symbol or address string to a normalized address.
    ///
    /// Known symbols (case-insensitive) win; otherwise address-shaped input
    /// is normalized and passed through whether or not it is cached.
    pub fn resolve_symbol(&self, input: &str) -> Result<String, TokenError> {
        let key = input.trim().to_uppercase();
        if let Some(addr) = self.read_cache().address_for_symbol(&key) {
            return Ok(addr.clone());
        }
        if is_address_like(input) {
            return normalize_address(input);
        }
        Err(TokenError::UnknownToken(input.trim().to_string()))
    }

    /// Cached decimals for an address, or `None` on miss/expiry.
    pub fn get_decimals(&self, address: &str) -> Option<u8> {
        let addr = normalize_address(address).ok()?;
        let cache = self.read_cache();
        let entry = cache.get(&addr)?;
        if entry.is_expired(now_ms()) {
            return None;
        }
        Some(entry.meta().decimals)
    }

    /// Cached record for a symbol or address, or `None` on miss/expiry.
    pub fn get_token_info(&self, token: &str) -> Option<TokenRecord> {
        let addr = self.resolve_symbol(token).ok()?;
        let cache = self.read_cache();
        let entry = cache.get(&addr)?;
        if entry.is_expired(now_ms()) {
            return None;
        }
        Some(entry.to_record())
    }

    // --- Asynchronous lookups with remote fallback ---

    /// Get a token record by address, fetching from the metadata service on
    /// cache miss or expiry.
    pub async fn get_token_by_address(&self, address: &str) -> Result<TokenRecord, TokenError> {
        let addr = normalize_address(address)?;
        if let Some(record) = self.fresh_record(&addr) {
            return Ok(record);
        }

        let fetched = remote::fetch_token_by_address(&self.http, &self.token_api_url, &addr)
            .await
            .map_err(|cause| TokenError::RemoteFetchFailed {
                what: addr.clone(),
                cause,
            })?;
        Ok(self.cache_remote(fetched, addr))
    }

    /// Get a token record by symbol, consulting only the verified remote set
    /// on cache miss or expiry.
    pub async fn get_token_by_symbol(&self, symbol: &str) -> Result<TokenRecord, TokenError> {
        let trimmed = symbol.trim();
        let key = trimmed.to_uppercase();
        {
            let cache = self.read_cache();
            if let Some(addr) = cache.address_for_symbol(&key) {
                if let Some(entry) = cache.get(addr) {
                    if !entry.is_expired(now_ms()) {
                        return Ok(entry.to_record());
                    }
                }
            }
        }

        let fetched =
            remote::fetch_verified_token_by_symbol(&self.http, &self.token_api_url, trimmed)
                .await
                .map_err(|cause| TokenError::RemoteFetchFailed {
                    what: trimmed.to_string(),
                    cause,
                })?;
        let addr = normalize_address(&fetched.address).map_err(|err| {
            TokenError::RemoteFetchFailed {
                what: trimmed.to_string(),
                cause: anyhow::Error::new(err).context("remote reported a malformed address"),
            }
        })?;
        Ok(self.cache_remote(fetched, addr))
    }

    /// Resolve a symbol or address, falling back to the verified remote set
    /// for symbols the cache does not know.
    pub async fn resolve_symbol_async(&self, input: &str) -> Result<String, TokenError> {
        match self.resolve_symbol(input) {
            Ok(addr) => Ok(addr),
            Err(_) if !is_address_like(input) => {
                Ok(self.get_token_by_symbol(input).await?.address)
            }
            Err(err) => Err(err),
        }
    }

    /// Decimals for an address via an ordered fallback chain: cache, then
    /// the remote metadata service, then an on-chain `decimals()` read.
    pub async fn get_decimals_async(&self, address: &str) -> Result<u8, TokenError> {
        let addr = normalize_address(address)?;

        if let Some(decimals) = self.get_decimals(&addr) {
            return Ok(decimals);
        }

        match remote::fetch_token_by_address(&self.http, &self.token_api_url, &addr).await {
            Ok(fetched) => {
                let record = self.cache_remote(fetched, addr);
                return Ok(record.decimals);
            }
            Err(err) => {
                warn!(
                    "remote metadata lookup failed for {}, trying on-chain: {:#}",
                    addr, err
                );
            }
        }

        let rpc_url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| TokenError::NoProviderConfigured(addr.clone()))?;
        let decimals = rpc::erc20_decimals(&self.http, rpc_url, &addr)
            .await
            .map_err(|cause| TokenError::OnChainReadFailed {
                address: addr.clone(),
                cause,
            })?;

        // Another resolution may have cached this address while the calls
        // above were in flight; the guarded insert keeps whatever landed
        // first and we report that entry's decimals.
        let meta = TokenMeta {
            address: addr.clone(),
            symbol: short_address(&addr),
            name: "Unknown Token".to_string(),
            decimals,
            logo_uri: None,
            daily_volume_usd: None,
            tags: Vec::new(),
            extensions: serde_json::Map::new(),
        };
        let record = self.write_cache().insert_if_absent(meta, now_ms());
        Ok(record.decimals)
    }

    // --- Cache management / introspection ---

    /// Drop every dynamically fetched record, leaving the static set intact.
    pub fn clear_dynamic_cache(&self) {
        self.write_cache().clear_dynamic();
        info!("dynamic token cache cleared");
    }

    pub fn cache_size(&self) -> usize {
        self.read_cache().len()
    }

    pub fn all_cached(&self) -> Vec<TokenRecord> {
        self.read_cache().records()
    }

    // --- Internals ---

    fn fresh_record(&self, addr: &str) -> Option<TokenRecord> {
        let cache = self.read_cache();
        let entry = cache.get(addr)?;
        if entry.is_expired(now_ms()) {
            return None;
        }
        Some(entry.to_record())
    }

    /// Cache a remote token under the queried (already normalized) address.
    /// Static protection applies inside the cache; the returned record is
    /// whatever actually survives at that slot.
    fn cache_remote(&self, fetched: RemoteToken, addr: String) -> TokenRecord {
        let meta = TokenMeta {
            address: addr,
            symbol: fetched.symbol,
            name: fetched.name,
            decimals: fetched.decimals,
            logo_uri: fetched.logo_uri,
            daily_volume_usd: fetched.daily_volume_usd,
            tags: fetched.tags,
            extensions: fetched.extensions,
        };
        self.write_cache().upsert_dynamic(meta, now_ms())
    }
}

// --- Process-wide shared instance ---

lazy_static! {
    static ref GLOBAL_SERVICE: RwLock<Option<Arc<TokenService>>> = RwLock::new(None);
}

/// The shared service, constructed from config on first use.
pub fn global(config: &Config) -> Arc<TokenService> {
    if let Some(service) = GLOBAL_SERVICE
        .read()
        .expect("token service lock poisoned")
        .as_ref()
    {
        return Arc::clone(service);
    }
    let mut slot = GLOBAL_SERVICE
        .write()
        .expect("token service lock poisoned");
    Arc::clone(slot.get_or_insert_with(|| {
        Arc::new(TokenService::new(
            config.token_api_url.clone(),
            config.rpc_url.clone(),
        ))
    }))
}

/// Tear down the shared service so the next `global` call rebuilds it.
/// Intended for test isolation.
pub fn reset_global() {
    GLOBAL_SERVICE
        .write()
        .expect("token service lock poisoned")
        .take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NATIVE_TOKEN_ADDRESS;

    fn service() -> TokenService {
        TokenService::new("http://127.0.0.1:9", None)
    }

    #[test]
    fn resolves_static_symbols_case_insensitively() {
        let svc = service();
        let upper = svc.resolve_symbol("ETH").unwrap();
        let lower = svc.resolve_symbol("eth").unwrap();
        let mixed = svc.resolve_symbol("Eth").unwrap();
        assert_eq!(upper, NATIVE_TOKEN_ADDRESS);
        assert_eq!(upper, lower);
        assert_eq!(upper, mixed);
    }

    #[test]
    fn passes_addresses_through_normalized() {
        let svc = service();
        let resolved = svc
            .resolve_symbol("0x0686735619287DF0f11ec4CDA22675f15A2775F2")
            .unwrap();
        assert_eq!(resolved, "0x0686735619287df0f11ec4cda22675f15a2775f2");
    }

    #[test]
    fn rejects_unknown_symbols() {
        let svc = service();
        assert!(matches!(
            svc.resolve_symbol("NOPE"),
            Err(TokenError::UnknownToken(_))
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        let svc = service();
        assert!(matches!(
            svc.resolve_symbol("0xZZZZ"),
            Err(TokenError::InvalidAddress(_))
        ));
    }

    #[test]
    fn static_decimals_are_always_available() {
        let svc = service();
        assert_eq!(svc.get_decimals(NATIVE_TOKEN_ADDRESS), Some(18));
        assert_eq!(
            svc.get_decimals("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Some(6)
        );
    }

    #[test]
    fn get_token_info_accepts_symbol_or_address() {
        let svc = service();
        let by_symbol = svc.get_token_info("usdc").unwrap();
        let by_address = svc
            .get_token_info("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
            .unwrap();
        assert_eq!(by_symbol.address, by_address.address);
        assert!(by_symbol.is_static);
    }

    #[test]
    fn uncached_address_is_a_miss_for_sync_lookups() {
        let svc = service();
        assert_eq!(
            svc.get_decimals("0x0686735619287df0f11ec4cda22675f15a2775f2"),
            None
        );
        assert!(svc
            .get_token_info("0x0686735619287df0f11ec4cda22675f15a2775f2")
            .is_none());
    }

    #[test]
    fn clear_dynamic_cache_restores_static_size() {
        let svc = service();
        let before = svc.cache_size();
        svc.clear_dynamic_cache();
        assert_eq!(svc.cache_size(), before);
        assert!(svc.resolve_symbol("USDT").is_ok());
    }

    #[tokio::test]
    async fn decimals_async_without_provider_names_the_address() {
        // Unroutable remote endpoint and no RPC provider: the chain must end
        // in NoProviderConfigured carrying the queried address.
        let svc = service();
        let addr = "0x0686735619287df0f11ec4cda22675f15a2775f2";
        match svc.get_decimals_async(addr).await {
            Err(TokenError::NoProviderConfigured(reported)) => assert_eq!(reported, addr),
            other => panic!("expected NoProviderConfigured, got {:?}", other.map(|_| ())),
        }
    }
}
