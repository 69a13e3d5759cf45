//! End-to-end harvest against a fake DAS endpoint and IPFS gateway.

use das_core::Strategy;
use das_harvest::{Config, Harvester};
use serde_json::{json, Value};
use std::path::Path;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rpc_ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": "1", "result": result}))
}

fn config(server: &MockServer, out_dir: &Path) -> Config {
    let mut config = Config::default();
    config.rpc.url = format!("{}/", server.uri());
    config.rpc.api_key = Some("test-key".into());
    config.rpc.backoff_ms = 5;
    config.collection.sample_mint = "Sample".into();
    config.gateways.urls = vec![format!("{}/gw/ipfs/{{cid}}{{path}}", server.uri())];
    config.gateways.backoff_ms = 5;
    config.gateways.rate_limit_pause_ms = 5;
    config.download.out_dir = out_dir.to_string_lossy().into_owned();
    config.download.request_delay_ms = 0;
    config.validate().unwrap();
    config
}

fn asset(id: &str, name: &str, background: Option<&str>) -> Value {
    let attributes: Vec<Value> = background
        .map(|b| vec![json!({"trait_type": "Background", "value": b})])
        .unwrap_or_default();
    json!({
        "id": id,
        "content": {"metadata": {"name": name, "attributes": attributes}}
    })
}

async fn mount_sample_without_collection(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getAsset", "params": {"id": "Sample"}})))
        .respond_with(rpc_ok(json!({
            "id": "Sample",
            "grouping": [],
            "authorities": [{"address": "Auth", "scopes": ["full"]}],
            "creators": [{"address": "Crea", "verified": true, "share": 100}]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn downloads_only_matching_assets() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_sample_without_collection(&server).await;

    // On-chain match with a direct image link.
    let mut a1 = asset("A1", "Gorbagio #1", Some("Gorbage Truck"));
    a1["content"]["links"] = json!({"image": format!("{base}/img/1.png")});

    // No on-chain attributes; off-chain JSON matches and points at IPFS.
    let mut a2 = asset("A2", "Gorbagio #2", None);
    a2["content"]["json_uri"] = json!(format!("{base}/meta/ipfs/QmMeta/2.json"));

    // Different background, nothing off-chain.
    let a3 = asset("A3", "Gorbagio #3", Some("Dumpster"));

    // Matches but has no image anywhere.
    let a4 = asset("A4", "Gorbagio #4", Some("gorbage truck"));

    // Matches; image host is broken and not IPFS-addressed.
    let mut a5 = asset("A5", "Gorbagio #5", Some("GORBAGE TRUCK"));
    a5["content"]["links"] = json!({"image": format!("{base}/missing/5.png")});

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "getAssetsByAuthority",
            "params": {"authorityAddress": "Auth", "page": 1, "limit": 100}
        })))
        .respond_with(rpc_ok(json!({
            "total": 5, "limit": 100, "page": 1,
            "items": [a1, a2, a3, a4, a5]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-one".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meta/ipfs/QmMeta/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Gorbagio #2",
            "image": "ipfs://QmImg/2.png",
            "attributes": [{"trait_type": "backgrounds", "value": "Gorbage Truck"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gw/ipfs/QmImg/2.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-two".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("images");
    let mut harvester = Harvester::from_config(&config(&server, &out_dir)).unwrap();

    let summary = harvester.run().await.unwrap();

    assert_eq!(summary.strategy.as_deref(), Some("authority Auth"));
    assert_eq!(summary.checked, 5);
    assert_eq!(summary.matched, 4);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.metadata_cache_hits, 1);

    assert_eq!(std::fs::read(out_dir.join("gorbagio_1.png")).unwrap(), b"png-one");
    assert_eq!(std::fs::read(out_dir.join("gorbagio_2.png")).unwrap(), b"png-two");
    assert!(!out_dir.join("gorbagio_5.png").exists());
}

#[tokio::test]
async fn discover_reports_the_fallback_chain() {
    let server = MockServer::start().await;
    mount_sample_without_collection(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::from_config(&config(&server, dir.path())).unwrap();

    let chain = harvester.discover().await.unwrap();
    assert_eq!(
        chain,
        vec![
            Strategy::Authority("Auth".into()),
            Strategy::Creator("Crea".into()),
        ]
    );
}

#[tokio::test]
async fn sample_lookup_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_ok(json!({"id": "Sample"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut harvester = Harvester::from_config(&config(&server, dir.path())).unwrap();

    let err = harvester.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("Cannot enumerate the collection"));
}
