//! WhatsApp (Kapso) webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use channels::SignatureCheck;
use database::customer;
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::ledger::{self, WHATSAPP_PROVIDER};
use crate::routes::request_id;
use crate::state::AppState;

/// Handle one Kapso delivery.
///
/// Signature and payload problems are answered before the ledger is touched.
/// After a successful claim, any failure marks the event FAILED so the
/// provider's retry can reclaim it.
pub async fn whatsapp_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let request_id = request_id(&headers);
    let transport = state.whatsapp.as_ref();

    let verified = transport.verify_webhook(&headers, &body).await.unwrap_or(false);
    if !verified {
        warn!(
            request_id = %request_id,
            signature_mode = state.whatsapp_signatures.mode().as_str(),
            "whatsapp.webhook_unauthorized"
        );
        return Err(ApiError::Unauthorized);
    }
    if state.whatsapp_signatures.check(&headers, &body) == SignatureCheck::Legacy {
        warn!(request_id = %request_id, "whatsapp.webhook_legacy_signature_accepted");
    }

    let message = match transport.parse_webhook(&headers, &body).await {
        Ok(Some(message)) => message,
        Ok(None) | Err(_) => {
            warn!(request_id = %request_id, "whatsapp.webhook_invalid_payload");
            return Err(ApiError::InvalidPayload("Invalid payload".to_string()));
        }
    };

    let Some(customer) =
        customer::find_by_channel_external_id(state.db.pool(), transport.channel(), &message.user_id).await?
    else {
        warn!(request_id = %request_id, external_user_id = %message.user_id, "whatsapp.webhook_customer_not_found");
        return Err(ApiError::CustomerNotFound);
    };

    state
        .flow()
        .authorizer()
        .authorize(&customer.id, transport.channel())
        .await?;

    let event_id = ledger::event_id_for(message.provider_event_id.as_deref(), message.payload_hash.as_deref());
    let payload_hash = message.payload_hash.as_deref().unwrap_or("missing");

    let status = ledger::claim(&state.db, WHATSAPP_PROVIDER, &event_id, payload_hash, &request_id).await?;
    if !status.should_process() {
        info!(
            request_id = %request_id,
            event_id = %event_id,
            status = status.as_str(),
            "whatsapp.webhook_duplicate_ignored"
        );
        return Ok((StatusCode::OK, "ok").into_response());
    }

    let outcome = match state.router.route(&customer.id, &message, &event_id, transport).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let err = ApiError::from(e);
            ledger::failed(&state.db, WHATSAPP_PROVIDER, &event_id, &request_id, &err).await;
            return Err(err);
        }
    };

    if let Err(err) = ledger::processed(&state.db, WHATSAPP_PROVIDER, &event_id, &request_id).await {
        ledger::failed(&state.db, WHATSAPP_PROVIDER, &event_id, &request_id, &err).await;
        return Err(err);
    }

    info!(
        request_id = %request_id,
        event_id = %event_id,
        customer_id = %customer.id,
        outcome = ?outcome,
        "whatsapp.webhook_processed"
    );
    Ok((StatusCode::OK, "ok").into_response())
}
