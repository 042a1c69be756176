//! Frame claim service client
//!
//! Three endpoints make up the claim flow:
//! - `POST /authenticate` exchanges a signed challenge for a bearer token
//! - `POST /user/claim` registers the claim (201 Created on success)
//! - `GET /user` returns the current claim state for the token's account
//!
//! Any status other than the expected one is treated as a failure.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;

/// Production claim service
pub const DEFAULT_API_URL: &str = "https://claim.frame-api.xyz";

/// Default timeout for claim service requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bearer token is empty")]
    EmptyToken,

    #[error("failed to build client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to send request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("invalid status code: {0}")]
    Status(StatusCode),

    #[error("failed to unmarshal json: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Body of `POST /authenticate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticateRequest {
    pub address: String,
    pub signature: String,
}

/// Account snapshot returned by the claim service.
///
/// Missing or `null` fields decode to their zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(rename = "testnetXP", deserialize_with = "null_as_default")]
    pub testnet_xp: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub has_claimed_points: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub points_claimed: String,
    #[serde(deserialize_with = "null_as_default")]
    pub trades_made: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub volume_traded: String,
    #[serde(deserialize_with = "null_as_default")]
    pub royalties_paid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub top_percent: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub rank: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_allocation: i64,
}

/// Response of `POST /authenticate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_info: UserInfo,
}

/// Response of `POST /user/claim`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

/// Decode `null` as the type's zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The claim service as seen by the claimer.
#[async_trait]
pub trait ClaimApi: Send + Sync {
    async fn authenticate(
        &self,
        request: &AuthenticateRequest,
    ) -> Result<AuthenticateResponse, ApiError>;

    async fn claim(&self, token: &str) -> Result<ClaimResponse, ApiError>;

    async fn user(&self, token: &str) -> Result<UserInfo, ApiError>;
}

/// HTTP client for the claim service
#[derive(Debug, Clone)]
pub struct FrameClient {
    client: reqwest::Client,
    base_url: String,
}

impl FrameClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(ApiError::Request)?;

        let status = response.status();
        debug!("{} -> {}", response.url().path(), status);

        if status != expected {
            return Err(ApiError::Status(status));
        }

        response.json().await.map_err(ApiError::Decode)
    }
}

#[async_trait]
impl ClaimApi for FrameClient {
    async fn authenticate(
        &self,
        request: &AuthenticateRequest,
    ) -> Result<AuthenticateResponse, ApiError> {
        let builder = self.request(Method::POST, "/authenticate").json(request);
        self.send(builder, StatusCode::OK).await
    }

    async fn claim(&self, token: &str) -> Result<ClaimResponse, ApiError> {
        if token.is_empty() {
            return Err(ApiError::EmptyToken);
        }

        let builder = self.request(Method::POST, "/user/claim").bearer_auth(token);
        self.send(builder, StatusCode::CREATED).await
    }

    async fn user(&self, token: &str) -> Result<UserInfo, ApiError> {
        if token.is_empty() {
            return Err(ApiError::EmptyToken);
        }

        let builder = self.request(Method::GET, "/user").bearer_auth(token);
        self.send(builder, StatusCode::OK).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_authenticate_request_shape() {
        let request = AuthenticateRequest {
            address: "0xabc".to_string(),
            signature: "0x1b".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "address": "0xabc", "signature": "0x1b" })
        );
    }

    #[test]
    fn test_authenticate_response_decodes() {
        let body = json!({
            "token": "tok",
            "userInfo": {
                "address": "0xabc",
                "testnetXP": 12,
                "hasClaimedPoints": true,
                "pointsClaimed": "1000",
                "tradesMade": 3,
                "volumeTraded": "1.5",
                "royaltiesPaid": "0.1",
                "topPercent": 2.5,
                "rank": 77,
                "totalAllocation": 500
            }
        });

        let response: AuthenticateResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.token, "tok");
        assert_eq!(response.user_info.testnet_xp, 12);
        assert!(response.user_info.has_claimed_points);
        assert_eq!(response.user_info.points_claimed, "1000");
        assert_eq!(response.user_info.top_percent, 2.5);
        assert_eq!(response.user_info.total_allocation, 500);
    }

    #[test]
    fn test_user_info_missing_fields_default() {
        let info: UserInfo = serde_json::from_value(json!({ "totalAllocation": 7 })).unwrap();
        assert_eq!(info.total_allocation, 7);
        assert!(!info.has_claimed_points);
        assert_eq!(info.points_claimed, "");
    }

    #[test]
    fn test_null_fields_decode_to_zero_values() {
        let body = json!({
            "token": "tok",
            "userInfo": {
                "address": "0xabc",
                "hasClaimedPoints": null,
                "pointsClaimed": null,
                "volumeTraded": null,
                "rank": null,
                "topPercent": null,
                "totalAllocation": 300
            }
        });

        let response: AuthenticateResponse = serde_json::from_value(body).unwrap();
        let info = response.user_info;
        assert!(!info.has_claimed_points);
        assert_eq!(info.points_claimed, "");
        assert_eq!(info.volume_traded, "");
        assert_eq!(info.rank, 0);
        assert_eq!(info.top_percent, 0.0);
        assert_eq!(info.total_allocation, 300);
    }

    #[test]
    fn test_null_user_info_and_message() {
        let response: AuthenticateResponse =
            serde_json::from_value(json!({ "token": "tok", "userInfo": null })).unwrap();
        assert_eq!(response.user_info, UserInfo::default());

        let claimed: ClaimResponse = serde_json::from_value(json!({ "message": null })).unwrap();
        assert_eq!(claimed.message, "");
    }

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "invalid status code: 500 Internal Server Error");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = FrameClient::new("http://localhost:8080/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url("/user"), "http://localhost:8080/user");
    }

    #[tokio::test]
    async fn test_empty_token_rejected_locally() {
        let client = FrameClient::new("http://127.0.0.1:9", DEFAULT_TIMEOUT).unwrap();
        assert!(matches!(client.claim("").await, Err(ApiError::EmptyToken)));
        assert!(matches!(client.user("").await, Err(ApiError::EmptyToken)));
    }
}
