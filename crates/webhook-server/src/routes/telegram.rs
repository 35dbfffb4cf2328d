//! Telegram webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use channels::{parse_update, TelegramInbound};
use database::{customer, IdempotencyStatus};
use expense_core::ChannelTransport;
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::ledger::{self, TELEGRAM_PROVIDER};
use crate::routes::request_id;
use crate::state::AppState;

pub const TELEGRAM_BLOCKED_MESSAGE: &str =
    "No tienes acceso habilitado para este bot. Escríbenos para activar tu cuenta.";
pub const TELEGRAM_DM_ONLY_MESSAGE: &str = "Por ahora el bot solo funciona por mensaje directo (DM).";
pub const RETRY_GUIDANCE_MESSAGE: &str =
    "Tuvimos un problema procesando tu mensaje. Intenta nuevamente en unos segundos.";

/// Handle one Telegram update.
///
/// Unknown senders and policy denials get a "not enabled" reply rather than
/// an error status, so Telegram does not redeliver them.
pub async fn telegram_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let Some(transport) = state.telegram.clone() else {
        warn!("telegram.bot_not_configured");
        return Err(ApiError::NotImplemented("Telegram bot not configured"));
    };
    let transport = transport.as_ref();
    let request_id = request_id(&headers);

    if !transport.verify_webhook(&headers, &body).await.unwrap_or(false) {
        warn!(request_id = %request_id, "telegram.webhook_unauthorized");
        return Err(ApiError::Unauthorized);
    }

    let message = match parse_update(&body) {
        Ok(TelegramInbound::Direct(message)) => message,
        Ok(TelegramInbound::NotPrivate { chat_id, event_id }) => {
            info!(request_id = %request_id, event_id = %event_id, "telegram.non_dm_ignored");
            post_best_effort(transport, &chat_id, TELEGRAM_DM_ONLY_MESSAGE).await;
            return Ok(ok());
        }
        Ok(TelegramInbound::Ignored) => return Ok(ok()),
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "telegram.webhook_invalid_payload");
            return Err(ApiError::InvalidPayload("Invalid payload".to_string()));
        }
    };
    let user_id = message.user_id.clone();

    let Some(customer) =
        customer::find_by_channel_external_id(state.db.pool(), transport.channel(), &user_id).await?
    else {
        warn!(request_id = %request_id, user_id = %user_id, "telegram.unknown_customer_blocked");
        post_best_effort(transport, &user_id, TELEGRAM_BLOCKED_MESSAGE).await;
        return Ok(ok());
    };

    if let Err(e) = state.flow().authorizer().authorize(&customer.id, transport.channel()).await {
        if !e.is_policy_denial() {
            return Err(e.into());
        }
        warn!(
            request_id = %request_id,
            customer_id = %customer.id,
            code = e.error_code(),
            "telegram.customer_access_blocked"
        );
        post_best_effort(transport, &user_id, TELEGRAM_BLOCKED_MESSAGE).await;
        return Ok(ok());
    }

    let event_id = ledger::event_id_for(message.provider_event_id.as_deref(), message.payload_hash.as_deref());
    let payload_hash = message.payload_hash.as_deref().unwrap_or("missing");

    match ledger::claim(&state.db, TELEGRAM_PROVIDER, &event_id, payload_hash, &request_id).await? {
        IdempotencyStatus::DuplicateInflight => {
            info!(request_id = %request_id, event_id = %event_id, "telegram.webhook_duplicate_inflight");
            return Ok((StatusCode::ACCEPTED, "locked").into_response());
        }
        IdempotencyStatus::DuplicateProcessed => {
            info!(request_id = %request_id, event_id = %event_id, "telegram.webhook_duplicate_ignored");
            return Ok(ok());
        }
        IdempotencyStatus::New | IdempotencyStatus::RetryAllowed => {}
    }

    if let Err(e) = state.router.route(&customer.id, &message, &event_id, transport).await {
        let err = ApiError::from(e);
        ledger::failed(&state.db, TELEGRAM_PROVIDER, &event_id, &request_id, &err).await;
        if err.status() != StatusCode::TOO_MANY_REQUESTS {
            post_best_effort(transport, &user_id, RETRY_GUIDANCE_MESSAGE).await;
        }
        return Err(err);
    }

    if let Err(err) = ledger::processed(&state.db, TELEGRAM_PROVIDER, &event_id, &request_id).await {
        ledger::failed(&state.db, TELEGRAM_PROVIDER, &event_id, &request_id, &err).await;
        return Err(err);
    }

    Ok(ok())
}

fn ok() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn post_best_effort(transport: &dyn ChannelTransport, chat_id: &str, text: &str) {
    if let Err(e) = transport.send_message(chat_id, text).await {
        warn!(chat_id = %chat_id, error = %e, "telegram.post_failed");
    }
}
