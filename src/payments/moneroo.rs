use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{
    Checkout, CheckoutRequest, GatewayError, GatewayFuture, GatewayPayment, GatewayResult,
    PaymentGateway,
};
use crate::config::GatewayConfig;

/// Gateway name used in idempotency keys.
pub const MONEROO: &str = "moneroo";

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    amount: i64,
    currency: &'a str,
    description: &'a str,
    return_url: &'a str,
    customer: InitializeCustomer<'a>,
    metadata: &'a serde_json::Value,
    #[serde(skip_serializing_if = "no_methods")]
    methods: &'a [String],
}

fn no_methods(methods: &&[String]) -> bool {
    methods.is_empty()
}

#[derive(Debug, Serialize)]
struct InitializeCustomer<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    phone: &'a str,
}

/// Moneroo wraps every response as `{ message, data, errors }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    id: String,
    checkout_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Deserialize)]
struct FieldError {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MonerooClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MonerooClient {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn api_key(&self) -> GatewayResult<String> {
        self.api_key.clone().ok_or(GatewayError::NotConfigured)
    }
}

impl PaymentGateway for MonerooClient {
    fn name(&self) -> &'static str {
        MONEROO
    }

    fn create_checkout(&self, request: CheckoutRequest) -> GatewayFuture<Checkout> {
        let client = self.client.clone();
        let url = format!("{}/payments/initialize", self.base_url);
        let api_key = self.api_key();

        Box::pin(async move {
            let api_key = api_key?;
            let body = InitializeRequest {
                amount: request.amount,
                currency: &request.currency,
                description: &request.description,
                return_url: &request.return_url,
                customer: InitializeCustomer {
                    email: request.customer.email.as_deref(),
                    first_name: request.customer.first_name.as_deref(),
                    last_name: request.customer.last_name.as_deref(),
                    phone: &request.customer.phone,
                },
                metadata: &request.metadata,
                methods: &request.methods,
            };

            let response = client
                .post(&url)
                .bearer_auth(&api_key)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(rejected(status, response).await);
            }

            let envelope: Envelope<InitializeData> = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            let data = envelope
                .data
                .ok_or_else(|| GatewayError::InvalidResponse("missing data".into()))?;

            tracing::info!(external_ref = %data.id, "Moneroo payment initialized");
            Ok(Checkout {
                external_ref: data.id,
                checkout_url: data.checkout_url,
            })
        })
    }

    fn verify_payment(&self, external_ref: &str) -> GatewayFuture<GatewayPayment> {
        let client = self.client.clone();
        let url = format!("{}/payments/{}/verify", self.base_url, external_ref);
        let api_key = self.api_key();

        Box::pin(async move {
            let api_key = api_key?;
            let response = client
                .get(&url)
                .bearer_auth(&api_key)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(rejected(status, response).await);
            }

            let envelope: Envelope<MonerooPaymentData> = response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            let data = envelope
                .data
                .ok_or_else(|| GatewayError::InvalidResponse("missing data".into()))?;

            Ok(data.into_gateway_payment())
        })
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> GatewayError {
    let message = if status == StatusCode::UNAUTHORIZED {
        "Invalid Moneroo API key".to_string()
    } else {
        response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| {
                body.message.or_else(|| {
                    body.errors
                        .and_then(|errors| errors.into_iter().find_map(|e| e.message))
                })
            })
            .unwrap_or_else(|| status.to_string())
    };
    GatewayError::Rejected {
        status: status.as_u16(),
        message,
    }
}

// ============ Webhooks ============

/// Moneroo webhook: `{ "event": "payment.success", "data": { "id": "py_...", ... } }`
#[derive(Debug, Deserialize)]
pub struct MonerooWebhookEvent {
    pub event: String,
    pub data: MonerooPaymentData,
}

/// Payment object shared by webhooks and the verify endpoint.
#[derive(Debug, Deserialize)]
pub struct MonerooPaymentData {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<MonerooCurrency>,
    #[serde(default)]
    pub capture: Option<MonerooCapture>,
}

/// Moneroo sends currency either as a code or as `{ "code": "XOF", ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MonerooCurrency {
    Code(String),
    Object { code: String },
}

#[derive(Debug, Deserialize)]
pub struct MonerooCapture {
    #[serde(default)]
    pub gateway: Option<MonerooCaptureGateway>,
}

#[derive(Debug, Deserialize)]
pub struct MonerooCaptureGateway {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl MonerooPaymentData {
    /// Mobile-money operator transaction id, when the payment was captured.
    pub fn transaction_id(&self) -> Option<String> {
        self.capture
            .as_ref()
            .and_then(|c| c.gateway.as_ref())
            .and_then(|g| g.transaction_id.clone())
    }

    fn into_gateway_payment(self) -> GatewayPayment {
        let transaction_id = self.transaction_id();
        GatewayPayment {
            amount: self
                .amount
                .as_ref()
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))),
            currency: self.currency.map(|c| match c {
                MonerooCurrency::Code(code) | MonerooCurrency::Object { code } => code,
            }),
            status: self.status.unwrap_or_default(),
            external_ref: self.id,
            transaction_id,
        }
    }
}
