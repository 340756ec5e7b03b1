//! Integration tests for token resolution against a mock metadata API and
//! a mock JSON-RPC endpoint.

use std::sync::{Arc, Mutex};

use agent_defi_mcp::config::Config;
use agent_defi_mcp::token::{self, registry, service, TokenError, TokenService};
use ethers_core::abi::{encode, Token};
use ethers_core::types::U256;
use mockito::{mock, Matcher};
use serde_json::json;

// The legacy mockito server is shared across the whole test binary;
// serialize tests that register mocks so matchers cannot bleed between them.
static SERVER_LOCK: Mutex<()> = Mutex::new(());

fn lock_server() -> std::sync::MutexGuard<'static, ()> {
    let guard = SERVER_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    mockito::reset();
    guard
}

fn remote_token_body(address: &str, symbol: &str, name: &str, decimals: u8) -> String {
    json!({
        "address": address,
        "symbol": symbol,
        "name": name,
        "decimals": decimals,
        "logoUri": null,
        "tags": [],
        "extensions": {}
    })
    .to_string()
}

const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
const LORDS: &str = "0x0686735619287df0f11ec4cda22675f15a2775f2";

#[tokio::test]
async fn fetching_unknown_address_caches_it_within_ttl() {
    let _guard = lock_server();
    let remote = mock("GET", format!("/v1/tokens/{}", LORDS).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(remote_token_body(LORDS, "LORDS", "Lords", 18))
        .expect(1)
        .create();

    let svc = TokenService::new(mockito::server_url(), None);

    let first = svc.get_token_by_address(LORDS).await.unwrap();
    assert!(!first.is_static);
    assert_eq!(first.decimals, 18);
    assert_eq!(first.symbol, "LORDS");

    // Second lookup within TTL is served from cache: no additional call.
    let second = svc.get_token_by_address(LORDS).await.unwrap();
    assert_eq!(second.address, first.address);
    remote.assert();

    // The record is now visible to the synchronous, cache-only API,
    // including case-insensitive symbol resolution.
    assert_eq!(svc.get_decimals(LORDS), Some(18));
    assert_eq!(svc.resolve_symbol("lords").unwrap(), LORDS);
    assert_eq!(svc.resolve_symbol("LORDS").unwrap(), LORDS);
}

#[tokio::test]
async fn lying_remote_cannot_corrupt_a_static_token() {
    let _guard = lock_server();
    // The remote falsely reports 8 decimals for USDC's address.
    let _remote = mock("GET", format!("/v1/tokens/{}", USDC).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(remote_token_body(USDC, "USDC", "Not USD Coin", 8))
        .create();

    let svc = TokenService::new(mockito::server_url(), None);
    let record = svc.get_token_by_address(USDC).await.unwrap();

    assert!(record.is_static);
    assert_eq!(record.decimals, 6);
    assert_eq!(record.name, "USD Coin");
    // Nothing was added: the static entry absorbed the write.
    assert_eq!(svc.cache_size(), registry::static_token_count());
}

#[tokio::test]
async fn symbol_lookup_consults_the_verified_set() {
    let _guard = lock_server();
    let remote = mock("GET", "/v1/tokens/verified")
        .match_query(Matcher::UrlEncoded("symbol".into(), "LORDS".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!("[{}]", remote_token_body(LORDS, "LORDS", "Lords", 18)))
        .expect(1)
        .create();

    let svc = TokenService::new(mockito::server_url(), None);
    let record = svc.get_token_by_symbol("LORDS").await.unwrap();
    assert_eq!(record.address, LORDS);
    assert!(!record.is_static);

    // resolve_symbol_async now hits the cache, not the network.
    let resolved = svc.resolve_symbol_async("lords").await.unwrap();
    assert_eq!(resolved, LORDS);
    remote.assert();
}

#[tokio::test]
async fn unverified_symbol_fails_with_the_symbol_named() {
    let _guard = lock_server();
    let _remote = mock("GET", "/v1/tokens/verified")
        .match_query(Matcher::UrlEncoded("symbol".into(), "SCAM".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create();

    let svc = TokenService::new(mockito::server_url(), None);
    match svc.get_token_by_symbol("SCAM").await {
        Err(TokenError::RemoteFetchFailed { what, .. }) => assert_eq!(what, "SCAM"),
        other => panic!("expected RemoteFetchFailed, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn decimals_prefers_remote_and_skips_the_chain_on_success() {
    let _guard = lock_server();
    let addr = "0x00000000000000000000000000000000000000c7";
    let _remote = mock("GET", format!("/v1/tokens/{}", addr).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(remote_token_body(addr, "SEVEN", "Seven Token", 7))
        .create();
    // Any eth_call mentioning this address would be an ordering violation.
    let rpc = mock("POST", "/")
        .match_body(Matcher::Regex("00000000000000000000000000000000000000c7".into()))
        .expect(0)
        .create();

    let svc = TokenService::new(mockito::server_url(), Some(mockito::server_url()));
    assert_eq!(svc.get_decimals_async(addr).await.unwrap(), 7);
    rpc.assert();
}

#[tokio::test]
async fn decimals_falls_back_to_an_onchain_read_when_remote_fails() {
    let _guard = lock_server();
    let addr = "0x00000000000000000000000000000000000000c9";
    let remote = mock("GET", format!("/v1/tokens/{}", addr).as_str())
        .with_status(404)
        .expect(1)
        .create();
    let encoded = encode(&[Token::Uint(U256::from(9u64))]);
    let _rpc = mock("POST", "/")
        .match_body(Matcher::Regex("00000000000000000000000000000000000000c9".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": format!("0x{}", hex::encode(encoded))
            })
            .to_string(),
        )
        .create();

    let svc = TokenService::new(mockito::server_url(), Some(mockito::server_url()));
    assert_eq!(svc.get_decimals_async(addr).await.unwrap(), 9);

    // The on-chain result was cached as a minimal dynamic record.
    let info = svc.get_token_info(addr).unwrap();
    assert_eq!(info.name, "Unknown Token");
    assert_eq!(info.symbol, "0x0000...00c9");
    assert!(!info.is_static);

    // A second lookup is a cache hit: the remote saw exactly one request.
    assert_eq!(svc.get_decimals_async(addr).await.unwrap(), 9);
    remote.assert();
}

#[tokio::test]
async fn clearing_the_dynamic_cache_restores_the_static_set_exactly() {
    let _guard = lock_server();
    let _remote = mock("GET", format!("/v1/tokens/{}", LORDS).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(remote_token_body(LORDS, "LORDS", "Lords", 18))
        .create();

    let svc = TokenService::new(mockito::server_url(), None);
    svc.get_token_by_address(LORDS).await.unwrap();
    assert_eq!(svc.cache_size(), registry::static_token_count() + 1);

    svc.clear_dynamic_cache();
    assert_eq!(svc.cache_size(), registry::static_token_count());
    assert_eq!(svc.get_decimals(LORDS), None);
    assert!(matches!(
        svc.resolve_symbol("LORDS"),
        Err(TokenError::UnknownToken(_))
    ));
    // Every static symbol still resolves.
    for token in registry::static_tokens() {
        assert_eq!(svc.resolve_symbol(&token.symbol).unwrap(), token.address);
    }
}

#[tokio::test]
async fn address_shaped_input_passes_through_async_resolution() {
    // No remote needed: address pass-through never touches the network.
    let svc = TokenService::new("http://127.0.0.1:9", None);
    let resolved = svc
        .resolve_symbol_async("0x00000000000000000000000000000000000000EE")
        .await
        .unwrap();
    assert_eq!(resolved, "0x00000000000000000000000000000000000000ee");

    // Malformed address-shaped input surfaces the normalizer error.
    assert!(matches!(
        svc.resolve_symbol_async("0xNOTHEX").await,
        Err(TokenError::InvalidAddress(_))
    ));
}

#[test]
fn global_service_is_shared_until_reset() {
    let config = Config::default();
    service::reset_global();

    let first = service::global(&config);
    let second = service::global(&config);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.cache_size(), registry::static_token_count());

    service::reset_global();
    let third = service::global(&config);
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn record_serialization_uses_camel_case() {
    let svc = TokenService::new("http://127.0.0.1:9", None);
    let record = svc.get_token_info("ETH").unwrap();
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["isStatic"], json!(true));
    assert_eq!(value["lastUpdated"], json!(token::STATIC_TIMESTAMP));
    assert_eq!(value["decimals"], json!(18));
}
