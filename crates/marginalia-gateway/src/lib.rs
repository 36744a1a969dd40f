//! Marginalia Gateway: HTTP implementation of the payment provider port.
//!
//! Talks to a hosted-checkout API:
//!
//! * `POST {base}/v1/checkout/sessions` creates a session and returns
//!   `{id, url}`;
//! * `GET {base}/v1/checkout/sessions/{id}` returns
//!   `{id, payment_status, payment_id, metadata}`.
//!
//! Requests carry `Authorization: Bearer <api key>`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use marginalia_core::error::DomainError;
use marginalia_core::gateway::{
    CreateSessionRequest, PaymentGateway, RemotePaymentState, SessionHandle, SessionSnapshot,
};
use marginalia_core::model::MinorUnits;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Secret API key.
    pub api_key: String,
    /// Where the provider sends the customer after paying.
    pub success_url: String,
    /// Where the provider sends the customer after giving up.
    pub cancel_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Payment gateway backed by the provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    config: HttpGatewayConfig,
}

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    amount: MinorUnits,
    currency: &'a str,
    description: &'a str,
    customer_email: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RetrievedSession {
    id: String,
    payment_status: String,
    payment_id: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl HttpPaymentGateway {
    /// Builds the gateway and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the base URL is empty or the
    /// client cannot be built.
    pub fn new(mut config: HttpGatewayConfig) -> Result<Self, DomainError> {
        config.base_url = config.base_url.trim_end_matches('/').to_owned();
        if config.base_url.is_empty() {
            return Err(DomainError::Infrastructure(
                "payment API base URL not configured".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DomainError::Infrastructure(format!("payment client: {e}")))?;
        Ok(Self { client, config })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.config.base_url)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, DomainError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| DomainError::Infrastructure(format!("{operation}: bad response: {e}")));
        }
        let body = response.text().await.unwrap_or_default();
        error!(%status, operation, body = %body.chars().take(200).collect::<String>(), "payment provider call failed");
        Err(DomainError::Infrastructure(format!(
            "{operation}: provider answered {status}"
        )))
    }
}

/// Maps the provider's payment status onto the three states the core acts on.
fn remote_state(payment_status: &str) -> RemotePaymentState {
    match payment_status {
        "paid" | "no_payment_required" => RemotePaymentState::Paid,
        "failed" | "expired" | "canceled" | "cancelled" => RemotePaymentState::Failed,
        _ => RemotePaymentState::Unpaid,
    }
}

fn transport(operation: &str) -> impl FnOnce(reqwest::Error) -> DomainError + '_ {
    move |e| DomainError::Infrastructure(format!("{operation}: {e}"))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionHandle, DomainError> {
        let body = CreateSessionBody {
            amount: request.amount,
            currency: &request.currency,
            description: &request.description,
            customer_email: &request.contact_email,
            success_url: &self.config.success_url,
            cancel_url: &self.config.cancel_url,
            metadata: request.metadata.to_map(),
        };
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport("create session"))?;
        let created: CreatedSession = Self::read_json(response, "create session").await?;

        debug!(session_id = %created.id, "payment session created");
        Ok(SessionHandle {
            session_id: created.id,
            checkout_url: created.url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot, DomainError> {
        let response = self
            .client
            .get(format!("{}/{session_id}", self.sessions_url()))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(transport("retrieve session"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DomainError::not_found("checkout session", session_id));
        }
        let retrieved: RetrievedSession = Self::read_json(response, "retrieve session").await?;

        Ok(SessionSnapshot {
            state: remote_state(&retrieved.payment_status),
            session_id: retrieved.id,
            payment_id: retrieved.payment_id,
            metadata: retrieved.metadata,
        })
    }
}
