use crate::{error_stats::ErrorStats, settings::Settings};
use anyhow::{Context, Result};
use log::info;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trait_variant::make;

/// Outcome of a cloud API call: HTTP status, success flag and parsed body.
///
/// A non-success status is data, not an error; only transport-level failures
/// surface as `Err`.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status_code: u16,
    pub ok: bool,
    pub body: Value,
}

/// Cloud-side record of the printer linked to the current account.
///
/// The cloud owns the shape of this record; everything beyond the auth token
/// is carried through untouched.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LinkedPrinter {
    pub auth_token: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait CloudServiceClient {
    /// Exchange a one-time verification code. Unauthenticated.
    async fn verify_code(&self, code: &str) -> Result<ApiResponse>;

    /// Generic reachability probe, authenticated when a token is stored.
    async fn probe_status(&self) -> Result<u16>;
}

#[derive(Clone)]
pub struct PrintBeamCloudClient {
    client: Client,
    base_url: String,
    settings: Settings,
    error_stats: ErrorStats,
}

impl PrintBeamCloudClient {
    const VERIFY_ENDPOINT: &str = "/api/v1/onetimeverificationcodes/verify/";
    const PING_ENDPOINT: &str = "/api/v1/ping/";

    const SERVER_ERROR_STAT: &str = "server";

    pub fn new(base_url: &str, settings: Settings, error_stats: ErrorStats) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to create cloud HTTP client")?;

        Ok(PrintBeamCloudClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            error_stats,
        })
    }

    fn build_url(&self, path: &str) -> String {
        let normalized_path = path.trim_start_matches('/');
        format!("{}/{normalized_path}", self.base_url)
    }

    /// GET request to the cloud API. Transport failures are counted in the
    /// error stats before they propagate.
    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<reqwest::Response> {
        let url = self.build_url(path);
        info!("GET {url}");

        let mut request = self.client.get(&url).query(query);

        if authenticated {
            if let Some(token) = self.settings.auth_token() {
                request = request.header("Authorization", format!("Token {token}"));
            }
        }

        match request.send().await {
            Ok(res) => Ok(res),
            Err(e) => {
                self.error_stats.record(Self::SERVER_ERROR_STAT);
                Err(e).with_context(|| format!("failed to send GET request to {url}"))
            }
        }
    }
}

impl CloudServiceClient for PrintBeamCloudClient {
    async fn verify_code(&self, code: &str) -> Result<ApiResponse> {
        let res = self
            .get(Self::VERIFY_ENDPOINT, &[("code", code)], false)
            .await?;

        let status_code = res.status().as_u16();
        let ok = res.status().is_success();
        let body = if ok {
            res.json()
                .await
                .context("failed to parse verification response")?
        } else {
            Value::Null
        };

        Ok(ApiResponse {
            status_code,
            ok,
            body,
        })
    }

    async fn probe_status(&self) -> Result<u16> {
        let res = self.get(Self::PING_ENDPOINT, &[], true).await?;
        Ok(res.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_client(base_url: &str) -> (PrintBeamCloudClient, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let settings =
            Settings::load(&dir.path().join("printbeam.cfg")).expect("failed to load settings");
        let client = PrintBeamCloudClient::new(base_url, settings, ErrorStats::default())
            .expect("failed to create client");
        (client, dir)
    }

    mod build_url {
        use super::*;

        #[test]
        fn joins_base_and_path() {
            let (client, _dir) = create_test_client("https://cloud.printbeam.io");
            assert_eq!(
                client.build_url("/api/v1/ping/"),
                "https://cloud.printbeam.io/api/v1/ping/"
            );
        }

        #[test]
        fn strips_trailing_slash_from_base() {
            let (client, _dir) = create_test_client("https://cloud.printbeam.io/");
            assert_eq!(
                client.build_url("api/v1/ping/"),
                "https://cloud.printbeam.io/api/v1/ping/"
            );
        }
    }

    mod linked_printer {
        use super::*;

        #[test]
        fn parses_record_with_extra_metadata() {
            let printer: LinkedPrinter = serde_json::from_value(json!({
                "auth_token": "tok-1",
                "id": 42,
                "name": "voron-2.4"
            }))
            .unwrap();

            assert_eq!(printer.auth_token, "tok-1");
            assert_eq!(printer.metadata.get("name"), Some(&json!("voron-2.4")));
        }

        #[test]
        fn rejects_record_without_auth_token() {
            let result: Result<LinkedPrinter, _> =
                serde_json::from_value(json!({ "name": "voron-2.4" }));
            assert!(result.is_err());
        }

        #[test]
        fn metadata_round_trips_through_serialization() {
            let printer: LinkedPrinter = serde_json::from_value(json!({
                "auth_token": "tok-1",
                "name": "voron-2.4"
            }))
            .unwrap();

            let value = serde_json::to_value(&printer).unwrap();
            assert_eq!(value["name"], json!("voron-2.4"));
            assert_eq!(value["auth_token"], json!("tok-1"));
        }
    }
}
