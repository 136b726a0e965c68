use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `TRIMTRACK__` and per-field defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Weighting of the composite "overall" leaderboard score. Supplied by
/// administration, injectable rather than hard-coded; the shipped defaults
/// sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_weight_visits")]
    pub visits_weight: f64,
    #[serde(default = "default_weight_clients")]
    pub clients_weight: f64,
    #[serde(default = "default_weight_retention")]
    pub retention_weight: f64,
    #[serde(default = "default_weight_efficiency")]
    pub efficiency_weight: f64,
    #[serde(default = "default_weight_rewards")]
    pub rewards_weight: f64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_weight_visits() -> f64 {
    0.30
}
fn default_weight_clients() -> f64 {
    0.20
}
fn default_weight_retention() -> f64 {
    0.20
}
fn default_weight_efficiency() -> f64 {
    0.15
}
fn default_weight_rewards() -> f64 {
    0.15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            visits_weight: default_weight_visits(),
            clients_weight: default_weight_clients(),
            retention_weight: default_weight_retention(),
            efficiency_weight: default_weight_efficiency(),
            rewards_weight: default_weight_rewards(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("TRIMTRACK")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
