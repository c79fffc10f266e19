use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::models::{CreatePayment, Customer, PaymentStatus};
use crate::payments::CheckoutRequest;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub zone_id: String,
    /// Preferred: the amount comes from the pricing tier
    #[serde(default)]
    pub pricing_id: Option<String>,
    /// Free amount, only used without a pricing tier
    #[serde(default)]
    pub amount: Option<i64>,
    pub customer: Customer,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub payment: IntentPayment,
}

#[derive(Debug, Serialize)]
pub struct IntentPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub checkout_url: String,
}

fn validate_phone(phone: &str) -> Result<()> {
    let len = phone.trim().chars().count();
    if !(8..=20).contains(&len) {
        return Err(AppError::BadRequest(msg::INVALID_PHONE.into()));
    }
    Ok(())
}

/// Create a pending payment and a hosted checkout for it.
///
/// The payment row exists before the gateway is called, but its gateway
/// reference is only stored once the checkout call returns. A webhook that
/// lands in between is answered 404 and the payment is picked up by the
/// gateway's redelivery or by the pending sweep. If the gateway call fails
/// the payment is marked failed and the customer can start over.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<IntentResponse>)> {
    validate_phone(&request.customer.phone)?;

    let (payment, description) = {
        let conn = state.db.get()?;
        let zone = queries::get_zone_by_id(&conn, &request.zone_id)?
            .or_not_found(msg::ZONE_NOT_FOUND)?;

        let (amount, pricing) = match request.pricing_id.as_deref() {
            Some(pricing_id) => {
                let pricing = queries::get_active_pricing_for_zone(&conn, pricing_id, &zone.id)?
                    .ok_or_else(|| AppError::BadRequest(msg::INVALID_PRICING.into()))?;
                (pricing.amount, Some(pricing))
            }
            None => match request.amount {
                Some(amount) if amount > 0 => (amount, None),
                Some(_) => return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into())),
                None => return Err(AppError::BadRequest(msg::AMOUNT_OR_PRICING_REQUIRED.into())),
            },
        };

        let description = request.description.clone().unwrap_or_else(|| match &pricing {
            Some(p) => format!("Wi-Fi ticket {} - {}", p.name, zone.name),
            None => format!("Wi-Fi ticket - {}", zone.name),
        });

        let payment = queries::create_payment(
            &conn,
            &CreatePayment {
                zone_id: zone.id.clone(),
                pricing_id: pricing.map(|p| p.id),
                amount,
                currency: state.currency.clone(),
                phone: Some(request.customer.phone.trim().to_string()),
            },
        )?;
        (payment, description)
    };

    let checkout = state
        .gateway
        .create_checkout(CheckoutRequest {
            amount: payment.amount,
            currency: payment.currency.clone(),
            description,
            return_url: format!("{}/payment/return?payment_id={}", state.frontend_url, payment.id),
            customer: request.customer,
            metadata: serde_json::json!({
                "payment_id": payment.id,
                "zone_id": payment.zone_id,
                "pricing_id": payment.pricing_id,
            }),
            methods: state.payment_methods.clone(),
        })
        .await;

    let conn = state.db.get()?;
    let checkout = match checkout {
        Ok(checkout) => checkout,
        Err(e) => {
            tracing::error!(payment_id = %payment.id, error = %e, "Checkout creation failed");
            queries::try_fail_payment(&conn, &payment.id)?;
            return Err(AppError::BadGateway(format!("{}: {}", msg::CHECKOUT_FAILED, e)));
        }
    };

    queries::set_payment_external_ref(&conn, &payment.id, &checkout.external_ref)?;
    tracing::info!(
        payment_id = %payment.id,
        external_ref = %checkout.external_ref,
        zone_id = %payment.zone_id,
        amount = payment.amount,
        "Payment intent created"
    );

    Ok((
        StatusCode::CREATED,
        Json(IntentResponse {
            payment: IntentPayment {
                id: payment.id,
                amount: payment.amount,
                currency: payment.currency,
                status: payment.status,
                checkout_url: checkout.checkout_url,
            },
        }),
    ))
}
