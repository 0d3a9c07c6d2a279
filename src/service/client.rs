use async_trait::async_trait;
use log::debug;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::{Credentials, TagService};
use crate::error::ServiceError;
use crate::models::RawTag;

const SIGN_IN: &str = "ethAccount.asmx/Signin";
const TAG_LIST: &str = "ethClient.asmx/GetTagList2";
const BEEP: &str = "ethClient.asmx/Beep";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `.asmx` endpoints wrap their payload as `{ "d": ... }`.
#[derive(Debug, Deserialize)]
struct AsmxEnvelope<T> {
    d: T,
}

#[derive(Debug, Serialize)]
struct BeepRequest {
    id: i64,
    #[serde(rename = "beepDuration")]
    beep_duration: u32,
}

/// HTTP client for the wireless tag manager.
///
/// The session cookie handed out by `Signin` lives in the client's cookie
/// store and rides along on every later request automatically.
pub struct WirelessTagClient {
    http: reqwest::Client,
    base_url: Url,
}

impl WirelessTagClient {
    pub fn new(base_url: Url) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        WirelessTagClient { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        // Keep any path prefix on the base URL when joining.
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path)?)
    }

    async fn post(
        &self,
        endpoint: &'static str,
        body: &(impl Serialize + Sync),
    ) -> Result<reqwest::Response, ServiceError> {
        let url = self.endpoint(endpoint)?;
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Status { endpoint, status });
        }
        Ok(resp)
    }
}

#[async_trait]
impl TagService for WirelessTagClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), ServiceError> {
        let body = json!({
            "email": credentials.username,
            "password": credentials.password.expose_secret(),
        });
        self.post(SIGN_IN, &body).await?;
        debug!("Signed in as {}", credentials.username);
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Vec<RawTag>, ServiceError> {
        let resp = self.post(TAG_LIST, &json!({})).await?;
        let body = resp.text().await?;

        let envelope: AsmxEnvelope<Vec<serde_json::Value>> =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
                endpoint: TAG_LIST,
                message: e.to_string(),
            })?;

        debug!("Tag list contained {} entries", envelope.d.len());
        Ok(envelope.d.into_iter().map(RawTag).collect())
    }

    async fn beep(&self, slave_id: i64, duration: u32) -> Result<(), ServiceError> {
        let body = BeepRequest {
            id: slave_id,
            beep_duration: duration,
        };
        self.post(BEEP, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, WirelessTagClient) {
        let server = MockServer::start().await;
        let base_url = Url::parse(&server.uri()).unwrap();
        let client = WirelessTagClient::new(base_url).unwrap();
        (server, client)
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string().into(),
        }
    }

    #[tokio::test]
    async fn sign_in_posts_credentials() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethAccount.asmx/Signin"))
            .and(body_json(json!({ "email": "user@example.com", "password": "hunter2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d": null })))
            .expect(1)
            .mount(&server)
            .await;

        client.authenticate(&credentials()).await.unwrap();
    }

    #[tokio::test]
    async fn sign_in_rejection_is_an_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethAccount.asmx/Signin"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Status { endpoint: SIGN_IN, .. }),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn session_cookie_is_reused_for_tag_list() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethAccount.asmx/Signin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "WTAG=session-42; Path=/")
                    .set_body_json(json!({ "d": null })),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/ethClient.asmx/GetTagList2"))
            .and(header("cookie", "WTAG=session-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "d": [
                    { "uuid": "A", "name": "Kitchen", "slaveId": 0, "temperature": 21.6,
                      "batteryRemaining": 0.5 },
                    { "uuid": "B", "name": "Cellar", "slaveId": 1, "temperature": 12.0,
                      "batteryRemaining": 0.9, "cap": 71.2 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        client.authenticate(&credentials()).await.unwrap();
        let tags = client.fetch_snapshot().await.unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].serial_hint(), "A");
        assert_eq!(tags[1].serial_hint(), "B");
    }

    #[tokio::test]
    async fn empty_list_is_not_a_failure() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethClient.asmx/GetTagList2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d": [] })))
            .mount(&server)
            .await;

        assert!(client.fetch_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_is_distinct_from_empty() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethClient.asmx/GetTagList2"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { endpoint: TAG_LIST, .. }));
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethClient.asmx/GetTagList2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode { endpoint: TAG_LIST, .. }));
    }

    #[tokio::test]
    async fn beep_addresses_slave_id() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/ethClient.asmx/Beep"))
            .and(body_json(json!({ "id": 7, "beepDuration": 1001 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d": null })))
            .expect(1)
            .mount(&server)
            .await;

        client.beep(7, 1001).await.unwrap();
    }

    #[tokio::test]
    async fn base_url_path_prefix_is_kept() {
        let server = MockServer::start().await;
        let base_url = Url::parse(&format!("{}/proxy", server.uri())).unwrap();
        let client = WirelessTagClient::new(base_url).unwrap();

        Mock::given(method("POST"))
            .and(path("/proxy/ethClient.asmx/GetTagList2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "d": [] })))
            .expect(1)
            .mount(&server)
            .await;

        client.fetch_snapshot().await.unwrap();
    }
}
