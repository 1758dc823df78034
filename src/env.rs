use clap::Parser;
use std::time::Duration;
use tracing::Level;
use url::Url;

use crate::order::TerminalMatcher;
use crate::poller::{PollStrategy, PollerConfig};
use crate::submission::IdAssignment;
use crate::tracker::TrackerConfig;
use order_backend::{HttpBackendConfig, RequestFields};

#[derive(clap::ValueEnum, Debug, Clone)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        (&log_level).into()
    }
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct Env {
    /// Order creation endpoint; status lookups go to `<base-url>/status`
    #[clap(long, env, default_value = "http://localhost:8080/api/pedidos")]
    pub base_url: Url,
    #[clap(long, env, default_value = "info")]
    pub log_level: LogLevel,
    /// Interval in seconds between order status polling cycles
    #[clap(long, env, default_value = "3", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,
    /// Maximum random delay in milliseconds before each per-order status query
    #[clap(long, env, default_value = "0")]
    pub poll_max_jitter_ms: u64,
    #[clap(long, env, value_enum, default_value = "per-order")]
    pub poll_strategy: PollStrategy,
    #[clap(long, env, value_enum, default_value = "backend")]
    pub id_assignment: IdAssignment,
    /// JSON field carrying the product name in creation requests
    #[clap(long, env, default_value = "product")]
    pub product_field: String,
    /// JSON field carrying the quantity in creation requests
    #[clap(long, env, default_value = "quantity")]
    pub quantity_field: String,
    /// Status substrings that mark an order as succeeded
    #[clap(long, env, value_delimiter = ',', default_value = "SUCESSO,SUCCESS,SUCCEED")]
    pub success_markers: Vec<String>,
    /// Status substrings that mark an order as failed
    #[clap(long, env, value_delimiter = ',', default_value = "FALHA,FAIL")]
    pub failure_markers: Vec<String>,
    /// HTTP request timeout in seconds
    #[clap(long, env, default_value = "10")]
    pub request_timeout: u64,
}

impl Env {
    pub const fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            polling_interval: Duration::from_secs(self.poll_interval),
            max_jitter: Duration::from_millis(self.poll_max_jitter_ms),
            strategy: self.poll_strategy,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poller: self.poller_config(),
            id_assignment: self.id_assignment,
            terminal: TerminalMatcher::new(&self.success_markers, &self.failure_markers),
        }
    }

    pub fn backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.base_url.clone(),
            fields: RequestFields {
                product: self.product_field.clone(),
                quantity: self.quantity_field.clone(),
            },
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}

pub fn setup_tracing(env: &Env) {
    let level: Level = (&env.log_level).into();
    let default_filter = format!("order_tracker={level},order_backend={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
