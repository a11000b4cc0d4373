use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Minimum aggregate units per order.
    #[serde(default = "default_minimum_units")]
    pub minimum_order_units: u32,
    /// Sales tax in basis points (875 = 8.75%).
    #[serde(default)]
    pub tax_rate_bps: i32,
    /// Flat promo discounts in cents, keyed by code.
    #[serde(default)]
    pub promo_discounts_cents: HashMap<String, i32>,
    /// Zip codes inside the delivery radius.
    #[serde(default)]
    pub served_zips: Vec<String>,
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
    #[serde(default = "default_persist_attempts")]
    pub persist_attempts: u32,
    #[serde(default = "default_route_window_min")]
    pub route_window_min: u32,
    #[serde(default = "default_route_window_max")]
    pub route_window_max: u32,
    #[serde(default)]
    pub captcha_enabled: bool,
}

fn default_minimum_units() -> u32 {
    10
}
fn default_capture_timeout_ms() -> u64 {
    10_000
}
fn default_persist_attempts() -> u32 {
    3
}
fn default_route_window_min() -> u32 {
    5
}
fn default_route_window_max() -> u32 {
    10
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `LADLE_SERVER__PORT=8080` overrides server.port
            .add_source(config::Environment::with_prefix("LADLE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
