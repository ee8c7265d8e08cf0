//! Lifecycle tests for per-provider connection handles.
//!
//! Handles are built lazily on the first network-bound operation, shared by
//! concurrent callers, and released exactly once at shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use usdata_core::{
    ClientFactory, FixedClientFactory, Gateway, GatewayConfig, MockHttpClient, ProviderId,
    ShutdownGuard,
};

fn tickers() -> serde_json::Value {
    json!({"0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}})
}

fn gateway_with(client: MockHttpClient) -> (Gateway, Arc<FixedClientFactory>, Arc<MockHttpClient>) {
    let client = Arc::new(client);
    let factory = Arc::new(FixedClientFactory::new(client.clone()));
    let shared: Arc<dyn ClientFactory> = factory.clone();
    let gateway = Gateway::with_factory(&GatewayConfig::default(), shared).expect("gateway builds");
    (gateway, factory, client)
}

fn connected(gateway: &Gateway, id: ProviderId) -> bool {
    gateway
        .snapshots()
        .iter()
        .any(|snapshot| snapshot.id == id && snapshot.connected)
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn when_two_first_calls_race_one_handle_is_built() {
    // Given: A slow SEC upstream so both calls overlap
    let (gateway, factory, client) = gateway_with(
        MockHttpClient::new()
            .respond_json("company_tickers.json", &tickers())
            .with_delay(Duration::from_millis(50)),
    );
    let args = json!({"query": "apple"});

    // When: Two concurrent first calls reach the same adapter
    let (first, second) = tokio::join!(
        gateway.dispatch("search_company", &args),
        gateway.dispatch("search_company", &args)
    );

    // Then: Both succeed through a single constructed handle
    assert!(first.success, "{:?}", first.error);
    assert!(second.success, "{:?}", second.error);
    assert_eq!(factory.build_count(), 1);
    assert_eq!(client.call_count(), 2);
    assert!(connected(&gateway, ProviderId::Filings));
    assert!(!connected(&gateway, ProviderId::Census));
}

#[tokio::test]
async fn each_provider_builds_its_own_handle() {
    let (gateway, factory, _) = gateway_with(
        MockHttpClient::new()
            .respond_json("company_tickers.json", &tickers())
            .respond_json("drug/drugsfda.json", &json!({"results": []})),
    );

    gateway.dispatch("search_company", &json!({"query": "apple"})).await;
    gateway.dispatch("search_company", &json!({"query": "aapl"})).await;
    gateway.dispatch("search_drugs", &json!({"brand_name": "Lipitor"})).await;

    assert_eq!(factory.build_count(), 2);
    assert!(connected(&gateway, ProviderId::Drugs));
}

#[tokio::test]
async fn reference_and_rejected_calls_construct_nothing() {
    let (gateway, factory, client) = gateway_with(MockHttpClient::new());

    gateway.dispatch("get_form_types", &json!({})).await;
    gateway.dispatch("get_recall_classifications", &json!({})).await;
    gateway.dispatch("get_company_facts", &json!({})).await;
    gateway.dispatch("get_daily_filings", &json!({"date": "2024-03-01"})).await;

    assert_eq!(factory.build_count(), 0);
    assert_eq!(client.call_count(), 0);
    assert!(gateway.snapshots().iter().all(|snapshot| !snapshot.connected));
}

// =============================================================================
// Release
// =============================================================================

#[tokio::test]
async fn when_gateway_shuts_down_twice_handles_close_once() {
    // Given: One provider with a live handle
    let (gateway, _, client) =
        gateway_with(MockHttpClient::new().respond_json("company_tickers.json", &tickers()));
    gateway.dispatch("search_company", &json!({"query": "apple"})).await;

    // When: Shutdown runs twice
    let first = gateway.shutdown();
    let second = gateway.shutdown();

    // Then: Only the first pass closes anything
    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(client.close_count(), 1);
    assert!(!connected(&gateway, ProviderId::Filings));
}

#[tokio::test]
async fn when_handle_is_released_later_calls_fail_without_network() {
    let (gateway, factory, client) =
        gateway_with(MockHttpClient::new().respond_json("company_tickers.json", &tickers()));
    gateway.dispatch("search_company", &json!({"query": "apple"})).await;
    gateway.shutdown();

    let envelope = gateway.dispatch("search_company", &json!({"query": "apple"})).await;

    assert!(!envelope.success);
    assert!(envelope.error.expect("message").contains("released"));
    assert_eq!(client.call_count(), 1);
    assert_eq!(factory.build_count(), 1);
}

#[tokio::test]
async fn dropping_the_guard_releases_handles() {
    let (gateway, _, client) =
        gateway_with(MockHttpClient::new().respond_json("company_tickers.json", &tickers()));
    let gateway = Arc::new(gateway);

    {
        let guard = ShutdownGuard::new(Arc::clone(&gateway));
        guard
            .gateway()
            .dispatch("search_company", &json!({"query": "apple"}))
            .await;
        assert_eq!(client.close_count(), 0);
    }

    assert_eq!(client.close_count(), 1);
    assert_eq!(gateway.shutdown(), 0);
    assert_eq!(client.close_count(), 1);
}

#[tokio::test]
async fn shutting_down_an_idle_gateway_closes_nothing() {
    let (gateway, factory, client) = gateway_with(MockHttpClient::new());

    assert_eq!(gateway.shutdown(), 0);
    assert_eq!(factory.build_count(), 0);
    assert_eq!(client.close_count(), 0);
}
