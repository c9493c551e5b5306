use std::env;
use std::fmt;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the allocation core.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub allocation: AllocationConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let gate_wait_ms = env::var("LOCKER_GATE_WAIT_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidGateWait)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            allocation: AllocationConfig {
                gate_wait: Duration::from_millis(gate_wait_ms),
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Settings controlling the serializable commit gate around mutating calls.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// How long a mutating call may wait on the commit gate before it aborts
    /// with a contention error instead of blocking.
    pub gate_wait: Duration,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidGateWait,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidGateWait => {
                write!(f, "LOCKER_GATE_WAIT_MS must be a valid millisecond count")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("LOCKER_GATE_WAIT_MS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.allocation.gate_wait, Duration::from_millis(250));
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn rejects_non_numeric_gate_wait() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LOCKER_GATE_WAIT_MS", "soon");
        let result = AppConfig::load();
        env::remove_var("LOCKER_GATE_WAIT_MS");
        assert!(matches!(result, Err(ConfigError::InvalidGateWait)));
    }

    #[test]
    fn recognizes_production_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        let config = AppConfig::load().expect("config loads");
        env::remove_var("APP_ENV");
        assert_eq!(config.environment, AppEnvironment::Production);
    }
}
