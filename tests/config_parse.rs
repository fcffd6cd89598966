use std::time::Duration;
use tempfile::TempDir;
use payonrain::config::AppConfig;

#[test]
fn parses_toml_and_resolves_with_env_overrides() {
    let toml = r#"
        [server]
        port = 9090
        [oracle]
        endpoint = "http://weather.local/api"
        timeout_secs = 3
        [demo]
        deploy_delay_ms = 10
        start_block = 42
    "#;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("payonrain.toml");
    std::fs::write(&path, toml).unwrap();

    let app = AppConfig::load_from(&path).unwrap().resolved().unwrap();
    assert_eq!(app.port, 9090);
    assert_eq!(app.weather_url, "http://weather.local/api");
    assert_eq!(app.http_timeout, Duration::from_secs(3));
    assert_eq!(app.deploy_delay, Duration::from_millis(10));
    assert_eq!(app.start_block, 42);
    // untouched keys keep their defaults
    assert_eq!(app.simulate_delay, Duration::from_millis(1200));

    std::env::set_var("PAYONRAIN_PORT", "9191");
    std::env::set_var("PAYONRAIN_WEATHER_URL", "https://env.example/weather");
    std::env::set_var("PAYONRAIN_DEPLOY_DELAY_MS", "0");
    let app2 = AppConfig::load_from(&path).unwrap().resolved().unwrap();
    assert_eq!(app2.port, 9191);
    assert_eq!(app2.weather_url, "https://env.example/weather");
    assert_eq!(app2.deploy_delay, Duration::ZERO);
    assert_eq!(app2.start_block, 42);
}

#[test]
fn missing_file_and_bad_toml() {
    let dir = TempDir::new().unwrap();
    assert!(AppConfig::load_from(dir.path().join("absent.toml")).is_ok());

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[server\nport = ").unwrap();
    let err = AppConfig::load_from(&bad).unwrap_err();
    assert!(format!("{err:#}").contains("parsing"));
}
