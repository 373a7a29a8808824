use crate::config::settings::Settings;

#[test]
fn test_defaults_cover_required_sections() {
    // Database URL and gateway credentials have no default on purpose;
    // inject them the way deployments do.
    std::env::set_var("RELAYRS__DATABASE__URL", "sqlite::memory:");
    std::env::set_var("RELAYRS__GATEWAY__BASE_URL", "http://localhost:8080");
    std::env::set_var("RELAYRS__GATEWAY__USERNAME", "relay");
    std::env::set_var("RELAYRS__GATEWAY__PASSWORD", "secret");

    let settings = Settings::new().expect("settings should load from defaults + env");

    assert_eq!(settings.database.url, "sqlite::memory:");
    assert_eq!(settings.gateway.identity_cache_ttl, 60);
    assert_eq!(settings.gateway.token_expiry_margin, 30);
    assert_eq!(settings.workers.reconcile_interval, 30);
    assert_eq!(settings.workers.country_code, "62");
    assert_eq!(settings.workers.group_suffix, "@g.us");
    assert!(settings.workers.post_send_delay_min <= settings.workers.post_send_delay_max);
    assert_eq!(settings.webhook.timeout_seconds, 10);
    assert_eq!(settings.server.port, 3000);
}
