pub mod chain;
pub mod health;
pub mod provider;

pub use chain::ChainMetricsProvider;
pub use health::{check_health, metrics_report, HealthReport, TreasuryStatus};
pub use provider::{FileMetricsProvider, MetricsProvider};
