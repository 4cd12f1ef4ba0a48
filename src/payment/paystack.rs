//! Paystack transaction API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    GatewayError, InitializeRequest, Initialized, PaymentGateway, TransactionStatus, Verification,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Paystack gateway over HTTPS.
#[derive(Clone)]
pub struct PaystackGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl std::fmt::Debug for PaystackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Every Paystack response wraps its payload in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
}

impl PaystackGateway {
    /// Creates a client for the given API base URL and secret key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, secret_key: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tixhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        reference: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::UnknownTransaction(reference.to_string()));
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(format!("undecodable response ({status}): {e}")))?;
        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::Rejected(format!("empty response: {}", envelope.message)))
    }
}

fn map_status(status: &str) -> TransactionStatus {
    match status {
        "success" => TransactionStatus::Success,
        "failed" | "abandoned" | "reversed" => TransactionStatus::Failed,
        _ => TransactionStatus::Pending,
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(&self, request: InitializeRequest) -> Result<Initialized, GatewayError> {
        tracing::debug!(reference = %request.reference, amount = request.amount, "initializing paystack transaction");
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&InitializeBody {
                email: &request.email,
                amount: request.amount,
                reference: &request.reference,
                callback_url: &request.callback_url,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let data: InitializeData = Self::read(response, &request.reference).await?;
        Ok(Initialized {
            authorization_url: data.authorization_url,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let data: VerifyData = Self::read(response, reference).await?;
        tracing::debug!(%reference, status = %data.status, amount = data.amount, "paystack verification");
        Ok(Verification {
            status: map_status(&data.status),
            amount: data.amount,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("success"), TransactionStatus::Success);
        assert_eq!(map_status("abandoned"), TransactionStatus::Failed);
        assert_eq!(map_status("reversed"), TransactionStatus::Failed);
        assert_eq!(map_status("ongoing"), TransactionStatus::Pending);
    }

    #[test]
    fn decodes_verify_envelope() {
        let raw = r#"{"status":true,"message":"Verification successful",
            "data":{"status":"success","amount":101500,"reference":"ref-1","currency":"NGN"}}"#;
        let Ok(envelope) = serde_json::from_str::<Envelope<VerifyData>>(raw) else {
            panic!("envelope should decode");
        };
        assert!(envelope.status);
        let Some(data) = envelope.data else {
            panic!("data missing");
        };
        assert_eq!(data.amount, 101_500);
    }

    #[test]
    fn trims_base_url() {
        let Ok(gateway) = PaystackGateway::new("https://api.paystack.co/", "sk_test") else {
            panic!("client should build");
        };
        assert_eq!(gateway.base_url, "https://api.paystack.co");
    }
}
