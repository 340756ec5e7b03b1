//! Token cache and symbol index.
//!
//! Static and dynamic entries are distinct enum variants rather than a flag
//! on one struct, so the write path cannot replace a static entry by
//! accident: `upsert_dynamic` has to match on the existing variant before it
//! can touch the slot.

use std::collections::HashMap;

use super::{TokenMeta, TokenRecord, STATIC_TIMESTAMP, TOKEN_TTL_MS};

#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// Built-in trusted entry; never expires, never replaced.
    Static(TokenMeta),
    /// Remotely fetched or on-chain derived entry with a write timestamp.
    Dynamic { meta: TokenMeta, last_updated: i64 },
}

impl CacheEntry {
    pub fn meta(&self) -> &TokenMeta {
        match self {
            CacheEntry::Static(meta) => meta,
            CacheEntry::Dynamic { meta, .. } => meta,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, CacheEntry::Static(_))
    }

    /// Expired entries are treated as cache misses but stay in place until
    /// refreshed or explicitly cleared.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self {
            CacheEntry::Static(_) => false,
            CacheEntry::Dynamic { last_updated, .. } => now_ms - last_updated > TOKEN_TTL_MS,
        }
    }

    pub fn to_record(&self) -> TokenRecord {
        let (meta, is_static, last_updated) = match self {
            CacheEntry::Static(meta) => (meta, true, STATIC_TIMESTAMP),
            CacheEntry::Dynamic { meta, last_updated } => (meta, false, *last_updated),
        };
        TokenRecord {
            address: meta.address.clone(),
            symbol: meta.symbol.clone(),
            name: meta.name.clone(),
            decimals: meta.decimals,
            logo_uri: meta.logo_uri.clone(),
            daily_volume_usd: meta.daily_volume_usd,
            tags: meta.tags.clone(),
            extensions: meta.extensions.clone(),
            is_static,
            last_updated,
        }
    }
}

/// Address-keyed token store plus an uppercased-symbol secondary index.
#[derive(Debug, Default)]
pub struct TokenCache {
    by_address: HashMap<String, CacheEntry>,
    symbols: HashMap<String, String>,
}

impl TokenCache {
    /// Populate the cache from the static registry. Called once at service
    /// construction, before any dynamic write.
    pub fn load_static(&mut self, tokens: Vec<TokenMeta>) {
        for meta in tokens {
            self.symbols
                .insert(meta.symbol.to_uppercase(), meta.address.clone());
            self.by_address
                .insert(meta.address.clone(), CacheEntry::Static(meta));
        }
    }

    /// Insert or refresh a dynamic record at its normalized address.
    ///
    /// A write against an address held by a static entry is silently
    /// discarded and the surviving static record is returned; ignoring an
    /// untrusted write is the correct outcome, not a fault. The symbol index
    /// follows the same precedence: a symbol currently held by a static
    /// entry is never reassigned.
    pub fn upsert_dynamic(&mut self, meta: TokenMeta, now_ms: i64) -> TokenRecord {
        if let Some(existing @ CacheEntry::Static(_)) = self.by_address.get(&meta.address) {
            return existing.to_record();
        }

        let symbol_key = meta.symbol.to_uppercase();
        let holder_is_static = self
            .symbols
            .get(&symbol_key)
            .and_then(|addr| self.by_address.get(addr))
            .map(CacheEntry::is_static)
            .unwrap_or(false);
        if !holder_is_static {
            self.symbols.insert(symbol_key, meta.address.clone());
        }

        let entry = CacheEntry::Dynamic {
            meta,
            last_updated: now_ms,
        };
        let record = entry.to_record();
        self.by_address.insert(record.address.clone(), entry);
        record
    }

    /// Insert a dynamic record only if the address is not cached at all.
    ///
    /// Used by the on-chain fallback tier, which must never clobber a record
    /// written between its remote attempt and its own completion. Returns
    /// whatever record ends up cached.
    pub fn insert_if_absent(&mut self, meta: TokenMeta, now_ms: i64) -> TokenRecord {
        if let Some(existing) = self.by_address.get(&meta.address) {
            return existing.to_record();
        }
        self.upsert_dynamic(meta, now_ms)
    }

    /// Remove every dynamic entry plus any symbol mapping that no longer
    /// resolves to a cached address. Static entries and their symbol
    /// mappings survive untouched.
    pub fn clear_dynamic(&mut self) {
        let Self {
            by_address,
            symbols,
        } = self;
        by_address.retain(|_, entry| entry.is_static());
        symbols.retain(|_, addr| by_address.contains_key(addr));
    }

    pub fn get(&self, address: &str) -> Option<&CacheEntry> {
        self.by_address.get(address)
    }

    /// Look up the address holding an (already uppercased) symbol.
    pub fn address_for_symbol(&self, symbol_key: &str) -> Option<&String> {
        self.symbols.get(symbol_key)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    pub fn records(&self) -> Vec<TokenRecord> {
        self.by_address.values().map(CacheEntry::to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::registry;

    fn meta(address: &str, symbol: &str, decimals: u8) -> TokenMeta {
        TokenMeta {
            address: address.to_string(),
            symbol: symbol.to_string(),
            name: format!("{symbol} Token"),
            decimals,
            logo_uri: None,
            daily_volume_usd: None,
            tags: Vec::new(),
            extensions: serde_json::Map::new(),
        }
    }

    fn loaded_cache() -> TokenCache {
        let mut cache = TokenCache::default();
        cache.load_static(registry::static_tokens());
        cache
    }

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const LORDS: &str = "0x0686735619287df0f11ec4cda22675f15a2775f2";

    #[test]
    fn static_entry_survives_dynamic_upsert() {
        let mut cache = loaded_cache();
        // Remote source falsely claims USDC has 8 decimals.
        let record = cache.upsert_dynamic(meta(USDC, "USDC", 8), 1_000);
        assert!(record.is_static);
        assert_eq!(record.decimals, 6);

        let cached = cache.get(USDC).unwrap();
        assert!(cached.is_static());
        assert_eq!(cached.meta().decimals, 6);
    }

    #[test]
    fn static_symbol_is_never_reassigned() {
        let mut cache = loaded_cache();
        // A dynamic token claiming the USDC ticker at a different address.
        cache.upsert_dynamic(meta(LORDS, "USDC", 18), 1_000);
        assert_eq!(cache.address_for_symbol("USDC").unwrap(), USDC);
        // The impostor is still cached under its own address.
        assert_eq!(cache.get(LORDS).unwrap().meta().decimals, 18);
    }

    #[test]
    fn dynamic_symbol_follows_latest_writer() {
        let mut cache = loaded_cache();
        cache.upsert_dynamic(meta(LORDS, "LORDS", 18), 1_000);
        let other = "0x0000000000000000000000000000000000000123";
        cache.upsert_dynamic(meta(other, "LORDS", 18), 2_000);
        assert_eq!(cache.address_for_symbol("LORDS").unwrap(), other);
    }

    #[test]
    fn dynamic_entries_expire_after_ttl() {
        let mut cache = loaded_cache();
        cache.upsert_dynamic(meta(LORDS, "LORDS", 18), 1_000);
        let entry = cache.get(LORDS).unwrap();
        assert!(!entry.is_expired(1_000 + TOKEN_TTL_MS));
        assert!(entry.is_expired(1_000 + TOKEN_TTL_MS + 1));
    }

    #[test]
    fn static_entries_never_expire() {
        let cache = loaded_cache();
        let entry = cache.get(USDC).unwrap();
        assert!(!entry.is_expired(i64::MAX));
    }

    #[test]
    fn refresh_overwrites_expired_dynamic_entry() {
        let mut cache = loaded_cache();
        cache.upsert_dynamic(meta(LORDS, "LORDS", 18), 1_000);
        let refreshed_at = 1_000 + TOKEN_TTL_MS + 5;
        let record = cache.upsert_dynamic(meta(LORDS, "LORDS", 18), refreshed_at);
        assert_eq!(record.last_updated, refreshed_at);
        assert!(!cache.get(LORDS).unwrap().is_expired(refreshed_at));
    }

    #[test]
    fn clear_dynamic_leaves_exactly_the_static_set() {
        let mut cache = loaded_cache();
        let static_count = registry::static_token_count();
        cache.upsert_dynamic(meta(LORDS, "LORDS", 18), 1_000);
        assert_eq!(cache.len(), static_count + 1);

        cache.clear_dynamic();
        assert_eq!(cache.len(), static_count);
        assert!(cache.get(LORDS).is_none());
        assert!(cache.address_for_symbol("LORDS").is_none());
        // Every static symbol still resolves.
        for token in registry::static_tokens() {
            assert_eq!(
                cache.address_for_symbol(&token.symbol.to_uppercase()).unwrap(),
                &token.address
            );
        }
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let mut cache = loaded_cache();
        cache.upsert_dynamic(meta(LORDS, "LORDS", 18), 1_000);
        // A racing on-chain read reporting different decimals loses.
        let record = cache.insert_if_absent(meta(LORDS, "0x0686...75f2", 8), 2_000);
        assert_eq!(record.decimals, 18);
        assert_eq!(record.symbol, "LORDS");
    }

    #[test]
    fn insert_if_absent_fills_empty_slot() {
        let mut cache = loaded_cache();
        let record = cache.insert_if_absent(meta(LORDS, "0x0686...75f2", 8), 2_000);
        assert_eq!(record.decimals, 8);
        assert!(!record.is_static);
    }
}
