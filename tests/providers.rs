//! Provider snapshots, health checks and the control-plane batch refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rulegate::config::HealthCheckConfig;
use rulegate::control::{ControlError, ProviderRegistry};
use rulegate::health::HealthCheck;
use rulegate::metadata::Metadata;
use rulegate::provider::{
    Provider, ProxyProvider, ProxySetProvider, RuleProvider, RuleSetProvider,
};
use rulegate::proxy::{EndpointParser, HealthState, Proxy};
use rulegate::routing::Router;
use rulegate::rules::{Match, Rule, RuleParser, RuleSet};
use rulegate::Error;

mod common;
use common::{wait_for, MockProxy, MockProxyParser, MockVehicle};

const PROXIES: &[u8] = br#"
proxies:
  - { name: a, type: ss, server: 127.0.0.1, port: 1 }
  - { name: b, type: ss, server: 127.0.0.1, port: 2 }
"#;

fn manual_health_check(provider: &str) -> Arc<HealthCheck> {
    let config = HealthCheckConfig {
        enable: false,
        timeout_secs: 1,
        ..Default::default()
    };
    HealthCheck::new(provider, Vec::new(), &config)
}

fn rule_provider(dir: &std::path::Path, name: &str, body: &[u8]) -> (Arc<MockVehicle>, Arc<RuleSetProvider>) {
    rule_provider_every(dir, name, Duration::ZERO, body)
}

fn rule_provider_every(
    dir: &std::path::Path,
    name: &str,
    interval: Duration,
    body: &[u8],
) -> (Arc<MockVehicle>, Arc<RuleSetProvider>) {
    let vehicle = MockVehicle::new(dir.join(format!("{name}.list")), body);
    let provider = Arc::new(RuleSetProvider::new(
        name,
        interval,
        vehicle.clone(),
        name.to_uppercase(),
        RuleParser::new(),
    ));
    (vehicle, provider)
}

#[tokio::test]
async fn test_proxy_provider_keeps_snapshot_on_bad_update() {
    let dir = tempfile::tempdir().unwrap();
    let vehicle = MockVehicle::new(dir.path().join("sub.yaml"), PROXIES);
    let hc = manual_health_check("sub");
    let provider = ProxySetProvider::new(
        "sub",
        Duration::ZERO,
        vehicle.clone(),
        Arc::new(EndpointParser),
        hc.clone(),
    );

    provider.initial().await.unwrap();
    assert_eq!(provider.proxies().len(), 2);
    assert_eq!(hc.proxies().len(), 2);

    vehicle.set_payload(b"proxies:\n  - { name: c, type: ss, server: h, port: 3 }\n  - { name: broken }\n");
    let err = provider.update().await.unwrap_err();
    assert!(err.to_string().contains("proxy 1"), "{err}");
    let names: Vec<_> = provider.proxies().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["a", "b"]);

    vehicle.set_payload(b"proxies: []\n");
    assert!(matches!(provider.update().await, Err(Error::EmptyResource(_))));
    assert_eq!(provider.proxies().len(), 2);

    provider.destroy();
    provider.destroy();
}

#[tokio::test]
async fn test_rule_provider_drops_only_bad_lines() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"DOMAIN,a.com\nDOMAIN-SUFFIX,b.com\nIP-CIDR,not-a-cidr\nDOMAIN-KEYWORD,tracker\nUSER-AGENT,curl*\nDST-PORT,22\n";
    let (_, provider) = rule_provider(dir.path(), "mixed", body);

    provider.initial().await.unwrap();
    assert_eq!(provider.rules().len(), 6 - 2);
    assert_eq!(provider.adapter(), "MIXED");
    assert!(provider.rules().iter().all(|r| r.adapter() == "MIXED"));
}

#[tokio::test]
async fn test_rule_provider_survives_latin1_line() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"DOMAIN,a.com\n# r\xE9seau local\nDOMAIN-SUFFIX,b.com\n";
    let (_, provider) = rule_provider(dir.path(), "legacy", body);

    provider.initial().await.unwrap();
    let payloads: Vec<_> = provider.rules().iter().map(|r| r.payload().to_string()).collect();
    assert_eq!(payloads, vec!["a.com", "b.com"]);
}

#[tokio::test]
async fn test_update_before_initial() {
    let dir = tempfile::tempdir().unwrap();
    let (_, provider) = rule_provider(dir.path(), "early", b"DOMAIN,a.com\n");

    assert!(provider.rules().is_empty());
    provider.update().await.unwrap();
    assert_eq!(provider.rules().len(), 1);
}

#[tokio::test]
async fn test_rule_set_routes_through_live_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let (vehicle, ads) = rule_provider(dir.path(), "ads", b"DOMAIN-SUFFIX,ads.example\n");
    ads.initial().await.unwrap();

    let router = Router::new(vec![
        Arc::new(RuleSet::new(ads.clone())),
        Arc::new(Match::new("Proxy")),
    ]);
    let tracker = Metadata::for_host("pixel.tracker.test", 443);

    assert_eq!(router.route(&Metadata::for_host("x.ads.example", 443)).unwrap().adapter, "ADS");
    assert_eq!(router.route(&tracker).unwrap().adapter, "Proxy");

    vehicle.set_payload(b"DOMAIN-SUFFIX,ads.example\nDOMAIN-SUFFIX,tracker.test\n");
    ads.update().await.unwrap();
    assert_eq!(router.route(&tracker).unwrap().adapter, "ADS");

    let hit = router.route(&tracker).unwrap();
    let set = hit.rule.as_rule_set().unwrap();
    assert!(set.last_update().is_some());
    assert!(hit.rule.no_resolve_ip());
}

#[tokio::test]
async fn test_rule_set_no_resolve_is_per_rule() {
    let dir = tempfile::tempdir().unwrap();
    let (_, mixed) = rule_provider(dir.path(), "mixed", b"DOMAIN,a.com\nIP-CIDR,10.0.0.0/8\n");
    mixed.initial().await.unwrap();

    let rules = mixed.rules();
    assert!(rules[0].no_resolve_ip());
    assert!(!rules[1].no_resolve_ip());
    assert!(!RuleSet::new(mixed.clone()).no_resolve_ip());
}

#[tokio::test]
async fn test_concurrent_checks_with_mixed_outcomes() {
    let config = HealthCheckConfig {
        enable: false,
        timeout_secs: 1,
        ..Default::default()
    };
    let fast = MockProxy::ok("fast", Duration::from_millis(10));
    let slow = MockProxy::ok("slow", Duration::from_secs(5));
    let down = MockProxy::failing("down");
    let proxies: Vec<Arc<dyn Proxy>> = vec![fast.clone(), slow.clone(), down.clone()];
    let hc = HealthCheck::new("mixed", proxies.clone(), &config);

    let started = Instant::now();
    tokio::join!(hc.check(), async {
        hc.set_proxies(proxies.clone());
        hc.check().await
    });
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(fast.health().state(), HealthState::Healthy);
    assert_eq!(slow.health().state(), HealthState::Unhealthy);
    assert_eq!(down.health().state(), HealthState::Unhealthy);
    assert_eq!(fast.probes(), 2);
    assert_eq!(hc.proxies().len(), 3);
}

#[tokio::test]
async fn test_provider_update_triggers_health_check() {
    let dir = tempfile::tempdir().unwrap();
    let vehicle = MockVehicle::new(dir.path().join("sub.yaml"), PROXIES);
    let provider = ProxySetProvider::new(
        "sub",
        Duration::ZERO,
        vehicle,
        Arc::new(EndpointParser),
        manual_health_check("sub"),
    );
    provider.initial().await.unwrap();

    // nothing listens on ports 1 and 2
    let proxies = provider.proxies();
    assert!(
        wait_for(Duration::from_secs(3), || proxies
            .iter()
            .all(|p| p.health().state() == HealthState::Unhealthy))
        .await
    );
}

#[tokio::test]
async fn test_batch_refresh_omits_slow_providers() {
    let dir = tempfile::tempdir().unwrap();
    let deadline = Duration::from_millis(300);

    let (fast_vehicle, fast) = rule_provider(dir.path(), "fast", b"DOMAIN,a.com\n");
    let (slow_vehicle, slow) = rule_provider(dir.path(), "slow", b"DOMAIN,b.com\n");
    fast.initial().await.unwrap();
    slow.initial().await.unwrap();
    fast_vehicle.set_delay(deadline / 2);
    slow_vehicle.set_delay(deadline * 2);

    let mut registry = ProviderRegistry::new();
    registry.insert_rule_provider(fast);
    registry.insert_rule_provider(slow);

    let started = Instant::now();
    let refreshed = registry.refresh_rule_providers(deadline).await;
    let elapsed = started.elapsed();

    assert_eq!(refreshed, vec!["fast".to_string()]);
    assert!(elapsed >= deadline - Duration::from_millis(20), "{elapsed:?}");
    assert!(elapsed < deadline + Duration::from_millis(250), "{elapsed:?}");
}

#[tokio::test]
async fn test_control_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (vehicle, rules) = rule_provider(dir.path(), "rules", b"DOMAIN,a.com\n");
    rules.initial().await.unwrap();

    let mut registry = ProviderRegistry::new();
    registry.insert_rule_provider(rules);

    let err = registry.update_rule_provider("missing").await.unwrap_err();
    assert!(matches!(err, ControlError::NotFound(_)));
    assert_eq!(err.http_status(), 404);

    vehicle.set_fail(true);
    let err = registry.update_rule_provider("rules").await.unwrap_err();
    assert!(matches!(err, ControlError::Unavailable(Error::Fetch(_))));
    assert_eq!(err.http_status(), 503);

    assert!(matches!(
        registry.health_check("rules").await,
        Err(ControlError::NotFound(_))
    ));

    let json = serde_json::to_value(registry.snapshot(&Router::new(vec![]))).unwrap();
    let entry = &json["ruleProviders"]["rules"];
    assert_eq!(entry["type"], "Rule");
    assert_eq!(entry["proxy"], "RULES");
    assert!(entry.get("adapter").is_none());
    assert_eq!(entry["vehicleType"], "HTTP");
    assert_eq!(entry["rules"][0]["payload"], "a.com");
    assert!(entry["updatedAt"].is_string());
}

#[tokio::test]
async fn test_destroy_stops_refresh_and_health_loops() {
    let dir = tempfile::tempdir().unwrap();
    let interval = Duration::from_millis(40);

    let config = HealthCheckConfig {
        enable: true,
        interval_secs: 1,
        timeout_secs: 1,
        ..Default::default()
    };
    let vehicle = MockVehicle::new(dir.path().join("sub.yaml"), PROXIES);
    let parser = MockProxyParser::new();
    let hc = HealthCheck::new("sub", Vec::new(), &config);
    let proxies = ProxySetProvider::new("sub", interval, vehicle.clone(), parser.clone(), hc);
    proxies.initial().await.unwrap();

    // two from the post-update check, two from the first timed round
    assert!(wait_for(Duration::from_secs(3), || parser.url_tests() >= 4).await);

    let (rule_vehicle, rules) = rule_provider_every(dir.path(), "ads", interval, b"DOMAIN,a.com\n");
    rules.initial().await.unwrap();
    rule_vehicle.set_payload(b"DOMAIN,a.com\nDOMAIN,b.com\n");
    assert!(wait_for(Duration::from_secs(2), || rules.rules().len() == 2).await);

    proxies.destroy();
    rules.destroy();
    // let a fetch that was already in flight settle
    tokio::time::sleep(interval).await;

    let url_tests = parser.url_tests();
    let proxy_reads = vehicle.reads();
    let rule_reads = rule_vehicle.reads();
    vehicle.set_payload(b"proxies:\n  - { name: z, type: ss, server: 127.0.0.1, port: 9 }\n");
    rule_vehicle.set_payload(b"DOMAIN,c.com\n");

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(parser.url_tests(), url_tests);
    assert_eq!(vehicle.reads(), proxy_reads);
    assert_eq!(rule_vehicle.reads(), rule_reads);
    let names: Vec<_> = proxies.proxies().iter().map(|p| p.name().to_string()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(rules.rules().len(), 2);
}
