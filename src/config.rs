use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

pub const DEFAULT_WEATHER_URL: &str = "https://api.payonrain.io/weather";
pub const DEFAULT_START_BLOCK: u64 = 8_412_047;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerCfg {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OracleCfg {
    /// Weather endpoint; the city goes in the `location` query parameter
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Artificial latencies and the block ticker. All delays in milliseconds.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DemoCfg {
    pub deploy_delay_ms: Option<u64>,
    pub weather_delay_ms: Option<u64>,
    pub fallback_delay_ms: Option<u64>,
    pub simulate_delay_ms: Option<u64>,
    pub block_tick_ms: Option<u64>,
    pub start_block: Option<u64>,
    pub block_advance_probability: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub server: Option<ServerCfg>,
    pub oracle: Option<OracleCfg>,
    pub demo: Option<DemoCfg>,
}

impl AppConfig {
    /// Read `path` if it exists; a missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            let s = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.as_ref().display()))?;
            let cfg: AppConfig = toml::from_str(&s)
                .with_context(|| format!("parsing {}", path.as_ref().display()))?;
            Ok(cfg)
        } else {
            Ok(Default::default())
        }
    }

    fn resolve_u64(env_key: &str, toml_opt: Option<u64>, default_: u64) -> u64 {
        std::env::var(env_key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| toml_opt.unwrap_or(default_))
    }

    fn resolve_string(env_key: &str, toml_opt: Option<String>, default_: &str) -> String {
        std::env::var(env_key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| toml_opt.unwrap_or_else(|| default_.to_string()))
    }

    fn delay(env_key: &str, toml_opt: Option<u64>, default_ms: u64) -> Duration {
        Duration::from_millis(Self::resolve_u64(env_key, toml_opt, default_ms))
    }

    /// Merge file values with `PAYONRAIN_*` overrides. Env beats file beats default.
    pub fn resolved(&self) -> Result<ResolvedConfig> {
        let server = self.server.clone().unwrap_or_default();
        let oracle = self.oracle.clone().unwrap_or_default();
        let demo = self.demo.clone().unwrap_or_default();

        let bind = Self::resolve_string("PAYONRAIN_BIND", server.bind, "0.0.0.0");
        let port = std::env::var("PAYONRAIN_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| server.port.unwrap_or(8080));

        let weather_url =
            Self::resolve_string("PAYONRAIN_WEATHER_URL", oracle.endpoint, DEFAULT_WEATHER_URL);
        let parsed = url::Url::parse(&weather_url)
            .with_context(|| format!("invalid weather endpoint {weather_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("weather endpoint must be http(s), got {}", parsed.scheme());
        }

        let http_timeout = Duration::from_secs(Self::resolve_u64(
            "PAYONRAIN_HTTP_TIMEOUT_SECS",
            oracle.timeout_secs,
            10,
        ));

        let block_advance_probability = demo.block_advance_probability.unwrap_or(0.7);
        if !(0.0..=1.0).contains(&block_advance_probability) {
            bail!("block_advance_probability must be within 0..=1, got {block_advance_probability}");
        }

        let block_tick = Self::delay("PAYONRAIN_BLOCK_TICK_MS", demo.block_tick_ms, 3500);
        if block_tick.is_zero() {
            bail!("block_tick_ms must be greater than zero");
        }

        Ok(ResolvedConfig {
            bind,
            port,
            weather_url,
            http_timeout,
            deploy_delay: Self::delay("PAYONRAIN_DEPLOY_DELAY_MS", demo.deploy_delay_ms, 1800),
            weather_delay: Self::delay("PAYONRAIN_WEATHER_DELAY_MS", demo.weather_delay_ms, 1200),
            fallback_delay: Self::delay("PAYONRAIN_FALLBACK_DELAY_MS", demo.fallback_delay_ms, 1000),
            simulate_delay: Self::delay("PAYONRAIN_SIMULATE_DELAY_MS", demo.simulate_delay_ms, 1200),
            block_tick,
            start_block: Self::resolve_u64(
                "PAYONRAIN_START_BLOCK",
                demo.start_block,
                DEFAULT_START_BLOCK,
            ),
            block_advance_probability,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub bind: String,
    pub port: u16,
    pub weather_url: String,
    pub http_timeout: Duration,
    pub deploy_delay: Duration,
    pub weather_delay: Duration,
    pub fallback_delay: Duration,
    pub simulate_delay: Duration,
    pub block_tick: Duration,
    pub start_block: u64,
    pub block_advance_probability: f64,
}

impl ResolvedConfig {
    /// Same settings with every artificial delay removed.
    pub fn without_delays(mut self) -> Self {
        self.deploy_delay = Duration::ZERO;
        self.weather_delay = Duration::ZERO;
        self.fallback_delay = Duration::ZERO;
        self.simulate_delay = Duration::ZERO;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_timings() {
        let cfg = AppConfig::default().resolved().unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.weather_url, DEFAULT_WEATHER_URL);
        assert_eq!(cfg.deploy_delay, Duration::from_millis(1800));
        assert_eq!(cfg.weather_delay, Duration::from_millis(1200));
        assert_eq!(cfg.fallback_delay, Duration::from_millis(1000));
        assert_eq!(cfg.block_tick, Duration::from_millis(3500));
        assert_eq!(cfg.start_block, DEFAULT_START_BLOCK);
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let cfg = AppConfig {
            oracle: Some(OracleCfg {
                endpoint: Some("ftp://weather.example/rain".into()),
                timeout_secs: None,
            }),
            ..Default::default()
        };
        assert!(cfg.resolved().is_err());
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let cfg = AppConfig {
            demo: Some(DemoCfg {
                block_advance_probability: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(cfg.resolved().is_err());
    }

    #[test]
    fn rejects_zero_block_tick() {
        let cfg = AppConfig {
            demo: Some(DemoCfg {
                block_tick_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = cfg.resolved().unwrap_err();
        assert!(err.to_string().contains("block_tick_ms"));
    }

    #[test]
    fn without_delays_zeroes_latency_only() {
        let cfg = AppConfig::default().resolved().unwrap().without_delays();
        assert_eq!(cfg.deploy_delay, Duration::ZERO);
        assert_eq!(cfg.simulate_delay, Duration::ZERO);
        assert_eq!(cfg.block_tick, Duration::from_millis(3500));
    }
}
