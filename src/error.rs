use crate::config::ConfigError;
use crate::locker::applies::ApplyError;
use crate::locker::engine::EngineError;
use crate::locker::forms::FormError;
use crate::locker::selection::SelectionError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Top-level error for callers embedding the allocation core.
///
/// Every variant exposes a stable code string through [`AppError::code`] so a
/// boundary layer can map failures without string-matching messages.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Form(FormError),
    Apply(ApplyError),
    Selection(SelectionError),
    Engine(EngineError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_INVALID",
            AppError::Telemetry(_) => "TELEMETRY_INIT_FAILED",
            AppError::Form(err) => err.code(),
            AppError::Apply(err) => err.code(),
            AppError::Selection(err) => err.code(),
            AppError::Engine(err) => err.code(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Form(err) => write!(f, "apply form error: {}", err),
            AppError::Apply(err) => write!(f, "application error: {}", err),
            AppError::Selection(err) => write!(f, "locker selection error: {}", err),
            AppError::Engine(err) => write!(f, "allocation error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Form(err) => Some(err),
            AppError::Apply(err) => Some(err),
            AppError::Selection(err) => Some(err),
            AppError::Engine(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<FormError> for AppError {
    fn from(value: FormError) -> Self {
        Self::Form(value)
    }
}

impl From<ApplyError> for AppError {
    fn from(value: ApplyError) -> Self {
        Self::Apply(value)
    }
}

impl From<SelectionError> for AppError {
    fn from(value: SelectionError) -> Self {
        Self::Selection(value)
    }
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
