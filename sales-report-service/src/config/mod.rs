//! Configuration module for sales-report-service.

use service_core::config::{self as core_config, get_env};
use service_core::error::AppError;

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub report: ReportSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Whether searches read `sales_returns` unless the request says otherwise.
    pub fetch_returns: bool,
    pub export_prefix: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            fetch_returns: true,
            export_prefix: "sales-report".to_string(),
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let fetch_returns = get_env("REPORT_FETCH_RETURNS", Some("true"), is_prod)?;

        Ok(Self {
            service_name: get_env("SERVICE_NAME", Some("sales-report-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: std::env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            database: DatabaseConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                name: get_env("MONGODB_DATABASE", Some("erp"), is_prod)?,
            },
            report: ReportSettings {
                fetch_returns: parse_flag("REPORT_FETCH_RETURNS", &fetch_returns)?,
                export_prefix: get_env("REPORT_EXPORT_PREFIX", Some("sales-report"), is_prod)?,
            },
            common,
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got '{}'",
            key,
            other
        ))),
    }
}
