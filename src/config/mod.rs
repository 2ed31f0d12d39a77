use crate::error::{FaultlineError, Result};
use crate::exception::Severity;
use crate::handler::DEFAULT_MEMORY_RESERVE_SIZE;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

pub const DEBUG_VAR: &str = "FAULTLINE_DEBUG";
pub const MEMORY_RESERVE_VAR: &str = "FAULTLINE_MEMORY_RESERVE";
pub const ERROR_REPORTING_VAR: &str = "FAULTLINE_ERROR_REPORTING";
pub const VIEW_PATH_VAR: &str = "FAULTLINE_VIEW_PATH";

/// Error handler configuration
///
/// Deserializable from any serde source, or read from `FAULTLINE_*`
/// environment variables with [`HandlerConfig::from_env`]:
///
/// | Variable | Values |
/// |---|---|
/// | `FAULTLINE_DEBUG` | `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off` |
/// | `FAULTLINE_MEMORY_RESERVE` | bytes; `none`, `off` or `0` disables |
/// | `FAULTLINE_ERROR_REPORTING` | bits, or names joined by `\|` (`ERROR\|FATAL`, `ALL`) |
/// | `FAULTLINE_VIEW_PATH` | directory of replacement HTML views |
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub debug: bool,
    pub memory_reserve_size: Option<usize>,
    pub error_reporting: Severity,
    pub view_path: Option<PathBuf>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            memory_reserve_size: Some(DEFAULT_MEMORY_RESERVE_SIZE),
            error_reporting: Severity::ALL,
            view_path: None,
        }
    }
}

impl HandlerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    /// Read the configuration from key/value pairs. Unrelated keys are ignored,
    /// missing keys keep their default.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let mut config = Self::default();

        if let Some(value) = vars.get(DEBUG_VAR) {
            config.debug = parse_flag(DEBUG_VAR, value)?;
        }
        if let Some(value) = vars.get(MEMORY_RESERVE_VAR) {
            config.memory_reserve_size = parse_reserve(value)?;
        }
        if let Some(value) = vars.get(ERROR_REPORTING_VAR) {
            config.error_reporting = parse_severity(value)?;
        }
        if let Some(value) = vars.get(VIEW_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            config.view_path = Some(PathBuf::from(value.trim()));
        }

        tracing::debug!(?config, "Loaded error handler configuration");
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FaultlineError::invalid_config(
            key,
            format!("expected a boolean, got {other:?}"),
        )),
    }
}

fn parse_reserve(value: &str) -> Result<Option<usize>> {
    let value = value.trim();
    if ["none", "off", "0"].iter().any(|off| value.eq_ignore_ascii_case(off)) {
        return Ok(None);
    }
    value.parse::<usize>().map(Some).map_err(|e| {
        FaultlineError::invalid_config(MEMORY_RESERVE_VAR, format!("{value:?}: {e}"))
    })
}

fn parse_severity(value: &str) -> Result<Severity> {
    let value = value.trim();
    if let Ok(bits) = value.parse::<u32>() {
        return Ok(Severity::from_bits_truncate(bits));
    }

    value.split('|').try_fold(Severity::NONE, |mask, name| {
        let bit = match name.trim().to_ascii_uppercase().as_str() {
            "FATAL" => Severity::FATAL,
            "ERROR" => Severity::ERROR,
            "WARNING" => Severity::WARNING,
            "NOTICE" => Severity::NOTICE,
            "DEPRECATED" => Severity::DEPRECATED,
            "ALL" => Severity::ALL,
            "NONE" => Severity::NONE,
            other => {
                return Err(FaultlineError::invalid_config(
                    ERROR_REPORTING_VAR,
                    format!("unknown severity {other:?}"),
                ));
            }
        };
        Ok(mask | bit)
    })
}
