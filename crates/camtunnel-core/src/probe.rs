// ── Reachability probe ──
//
// Quick "is the camera on the LAN at all" check before it is tunnelled.
// Most IP cameras serve a web UI next to RTSP, so an HTTP HEAD against the
// camera host is a cheap proxy for reachability. A 401 counts as reachable:
// the device answered, it just wants credentials.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::CoreError;
use crate::model::CameraRecord;

/// Outcome of one probe. Unreachable is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub reachable: bool,
    pub message: String,
    /// HTTP status, when the device answered at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReachabilityProbe {
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CoreError::Internal(format!("build probe HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// HEAD `http://<local_ip>/`.
    pub async fn probe(&self, camera: &CameraRecord) -> Result<ProbeReport, CoreError> {
        let host = if camera.local_ip.contains(':') {
            format!("[{}]", camera.local_ip)
        } else {
            camera.local_ip.clone()
        };
        let url = Url::parse(&format!("http://{host}/")).map_err(|e| {
            CoreError::validation(format!("invalid camera address '{}': {e}", camera.local_ip))
        })?;
        Ok(self.probe_url(&url).await)
    }

    pub async fn probe_url(&self, url: &Url) -> ProbeReport {
        debug!(%url, "probing camera");
        match self.client.head(url.clone()).send().await {
            Ok(resp) => {
                let status = resp.status();
                let reachable = status.is_success() || status == StatusCode::UNAUTHORIZED;
                let message = if reachable {
                    "Camera is reachable".to_owned()
                } else {
                    format!("Camera responded with HTTP {}", status.as_u16())
                };
                ProbeReport {
                    reachable,
                    message,
                    status: Some(status.as_u16()),
                }
            }
            Err(e) if e.is_timeout() => ProbeReport {
                reachable: false,
                message: format!("Connection timeout ({}s)", self.timeout.as_secs()),
                status: None,
            },
            Err(e) => ProbeReport {
                reachable: false,
                message: format!("Connection failed: {e}"),
                status: None,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn probe_with(status: u16) -> ProbeReport {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        let probe = ReachabilityProbe::new(Duration::from_secs(5)).unwrap();
        probe.probe_url(&Url::parse(&server.uri()).unwrap()).await
    }

    #[tokio::test]
    async fn ok_is_reachable() {
        let report = probe_with(200).await;
        assert!(report.reachable);
        assert_eq!(report.status, Some(200));
    }

    #[tokio::test]
    async fn unauthorized_still_counts_as_reachable() {
        assert!(probe_with(401).await.reachable);
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let report = probe_with(503).await;
        assert!(!report.reachable);
        assert!(report.message.contains("503"));
    }

    #[tokio::test]
    async fn slow_device_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let probe = ReachabilityProbe::new(Duration::from_millis(200)).unwrap();
        let report = probe.probe_url(&Url::parse(&server.uri()).unwrap()).await;
        assert!(!report.reachable);
        assert!(report.message.starts_with("Connection timeout"), "{}", report.message);
    }
}
