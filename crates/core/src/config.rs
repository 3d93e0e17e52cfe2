//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. The
//! parsing helpers here take the raw `Option<String>` values so that they never read the process
//! environment themselves; binaries own that step.

use crate::constants::{DEFAULT_DEVICE_TIMEOUT, DEFAULT_DEVICE_URL, DEFAULT_PATIENT_DATA_DIR};
use crate::error::{DispensaryError, DispensaryResult};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where and how to reach the dispensing device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    base_url: Url,
    timeout: Duration,
}

impl DeviceConfig {
    /// Create a new `DeviceConfig`.
    ///
    /// # Errors
    ///
    /// Returns `DispensaryError::InvalidInput` if the URL is not `http`/`https` with a host, or
    /// the timeout is zero.
    pub fn new(base_url: Url, timeout: Duration) -> DispensaryResult<Self> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(DispensaryError::InvalidInput(format!(
                "device URL must be http(s) with a host, got: {base_url}"
            )));
        }
        if timeout.is_zero() {
            return Err(DispensaryError::InvalidInput(
                "device timeout must be greater than zero".into(),
            ));
        }
        Ok(Self { base_url, timeout })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    device: DeviceConfig,
}

impl CoreConfig {
    pub fn new(patient_data_dir: PathBuf, device: DeviceConfig) -> Self {
        Self {
            patient_data_dir,
            device,
        }
    }

    /// Build the configuration from raw environment values.
    ///
    /// Each argument is the value of the corresponding variable, or `None` when unset:
    /// `PATIENT_DATA_DIR`, `DISPENSARY_DEVICE_URL`, `DISPENSARY_DEVICE_TIMEOUT_SECS`.
    pub fn from_env_values(
        patient_data_dir: Option<String>,
        device_url: Option<String>,
        device_timeout_secs: Option<String>,
    ) -> DispensaryResult<Self> {
        let device = DeviceConfig::new(
            device_url_from_env_value(device_url)?,
            device_timeout_from_env_value(device_timeout_secs)?,
        )?;
        Ok(Self::new(
            patient_data_dir_from_env_value(patient_data_dir),
            device,
        ))
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the data directory, falling back to [`DEFAULT_PATIENT_DATA_DIR`].
pub fn patient_data_dir_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.into()))
}

/// Parse the device base URL.
///
/// A bare `host:port` (as written on the device's setup screen) is treated as `http://host:port`.
pub fn device_url_from_env_value(value: Option<String>) -> DispensaryResult<Url> {
    let raw = non_blank(value).unwrap_or_else(|| DEFAULT_DEVICE_URL.into());
    let with_scheme = if raw.contains("://") {
        raw
    } else {
        format!("http://{raw}")
    };
    Url::parse(&with_scheme)
        .map_err(|e| DispensaryError::InvalidInput(format!("invalid device URL: {e}")))
}

/// Parse the device timeout in whole seconds.
pub fn device_timeout_from_env_value(value: Option<String>) -> DispensaryResult<Duration> {
    match non_blank(value) {
        None => Ok(DEFAULT_DEVICE_TIMEOUT),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                DispensaryError::InvalidInput(format!(
                    "device timeout must be a whole number of seconds, got: {v}"
                ))
            }),
    }
}
