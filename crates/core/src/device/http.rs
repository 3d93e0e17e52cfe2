use super::{DeviceClient, DeviceCommand, DeviceOutcome, DeviceStatus};
use crate::config::DeviceConfig;
use crate::constants::DEVICE_STATUS_PATH;
use crate::error::{DispensaryError, DispensaryResult};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// Talks to the device over HTTP using `reqwest`.
///
/// The timeout is fixed when the client is built and bounds each whole round trip.
#[derive(Clone, Debug)]
pub struct HttpDeviceClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpDeviceClient {
    pub fn new(config: &DeviceConfig) -> DispensaryResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                DispensaryError::InvalidInput(format!("failed to build device client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url: config.base_url().clone(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url
            .join(path)
            .map_err(|e| format!("invalid device endpoint {path}: {e}"))
    }

    fn describe_transport_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("no response within {:?}", self.timeout)
        } else if err.is_connect() {
            format!("could not connect to {}: {err}", self.base_url)
        } else {
            err.to_string()
        }
    }

    async fn rejection_reason(response: Response) -> String {
        let status = response.status();
        let fallback = format!("device responded with HTTP {}", status.as_u16());
        match response.json::<ErrorBody>().await {
            Ok(body) if !body.error.trim().is_empty() => body.error,
            _ => fallback,
        }
    }

    /// Connectivity check against the device root page.
    pub async fn ping(&self) -> DispensaryResult<()> {
        let url = self.endpoint("/").map_err(DispensaryError::InvalidInput)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DispensaryError::DeviceUnreachable(self.describe_transport_error(&e)))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(DispensaryError::DeviceRejected(
                Self::rejection_reason(response).await,
            ))
        }
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn send(&self, command: &DeviceCommand) -> DeviceOutcome {
        let url = match self.endpoint(command.path()) {
            Ok(url) => url,
            Err(reason) => return DeviceOutcome::Unreachable(reason),
        };
        tracing::debug!(%url, "sending device command");

        match self.client.post(url).json(command).send().await {
            Err(e) => DeviceOutcome::Unreachable(self.describe_transport_error(&e)),
            Ok(response) if response.status() == StatusCode::OK => DeviceOutcome::Acknowledged,
            Ok(response) => DeviceOutcome::Rejected(Self::rejection_reason(response).await),
        }
    }

    async fn status(&self) -> DispensaryResult<DeviceStatus> {
        let url = self
            .endpoint(DEVICE_STATUS_PATH)
            .map_err(DispensaryError::InvalidInput)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DispensaryError::DeviceUnreachable(self.describe_transport_error(&e)))?;

        if response.status() != StatusCode::OK {
            return Err(DispensaryError::DeviceRejected(
                Self::rejection_reason(response).await,
            ));
        }
        response.json::<DeviceStatus>().await.map_err(|e| {
            if e.is_timeout() {
                DispensaryError::DeviceUnreachable(self.describe_transport_error(&e))
            } else {
                DispensaryError::DeviceRejected(format!("invalid status payload: {e}"))
            }
        })
    }
}
