//! Inbound email endpoint.
//!
//! A mail relay posts each bank notification as JSON. The recipient address
//! selects the customer; the expense question goes to the customer's primary
//! WhatsApp number.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use database::customer;
use pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::ledger::{self, EMAIL_PROVIDER};
use crate::routes::request_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    pub to: String,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    /// `Message-ID` header, used as the delivery id when present.
    pub message_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailResponse {
    pub expense_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Render an email as extractor input, capped to `max_chars` characters.
///
/// The plain-text body wins over HTML.
pub fn email_to_input(email: &InboundEmail, max_chars: usize) -> String {
    let mut lines = vec![
        format!("From: {}", email.from.as_deref().unwrap_or_default()),
        format!("To: {}", email.to),
        format!("Subject: {}", email.subject.as_deref().unwrap_or_default()),
        format!("Date: {}", email.date.as_deref().unwrap_or_default()),
    ];

    let text = email.text.as_deref().filter(|t| !t.trim().is_empty());
    let html = email.html.as_deref().filter(|h| !h.trim().is_empty());
    if let Some(text) = text {
        lines.push(String::new());
        lines.push("Body:".to_string());
        lines.push(text.to_string());
    } else if let Some(html) = html {
        lines.push(String::new());
        lines.push("Body (HTML):".to_string());
        lines.push(html.to_string());
    }

    lines.join("\n").chars().take(max_chars).collect()
}

pub async fn inbound_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EmailResponse>> {
    let request_id = request_id(&headers);

    if !state.email_signatures.verify(&headers, &body) {
        warn!(request_id = %request_id, "email.webhook_unauthorized");
        return Err(ApiError::Unauthorized);
    }

    let email: InboundEmail = serde_json::from_slice(&body).map_err(|e| {
        warn!(request_id = %request_id, error = %e, "email.invalid_payload");
        ApiError::InvalidPayload(e.to_string())
    })?;

    let db = state.db.pool();
    let Some(customer_id) = customer::resolve_customer_by_recipient_email(db, &email.to).await? else {
        warn!(request_id = %request_id, "email.customer_not_found");
        return Err(ApiError::CustomerNotFound);
    };

    let transport = state.whatsapp.as_ref();
    let Some(user_id) = customer::get_primary_external_user_id(db, &customer_id, transport.channel()).await? else {
        warn!(request_id = %request_id, customer_id = %customer_id, "email.primary_channel_missing");
        return Err(ApiError::Unprocessable("Customer has no primary WhatsApp number".to_string()));
    };

    let payload_hash = hex::encode(Sha256::digest(&body));
    let event_id = ledger::event_id_for(email.message_id.as_deref(), Some(&payload_hash));
    let status = ledger::claim(&state.db, EMAIL_PROVIDER, &event_id, &payload_hash, &request_id).await?;
    if !status.should_process() {
        info!(request_id = %request_id, event_id = %event_id, status = status.as_str(), "email.duplicate_ignored");
        return Ok(Json(EmailResponse {
            expense_id: None,
            duplicate: true,
        }));
    }

    let flow = state.flow();
    let input = email_to_input(&email, flow.config().max_input_chars);

    match flow.ingest(&customer_id, &input, transport, &user_id).await {
        Ok(created) => {
            if let Err(err) = ledger::processed(&state.db, EMAIL_PROVIDER, &event_id, &request_id).await {
                ledger::failed(&state.db, EMAIL_PROVIDER, &event_id, &request_id, &err).await;
                return Err(err);
            }
            let expense_id = created.map(|e| e.id);
            info!(
                request_id = %request_id,
                customer_id = %customer_id,
                expense_id = ?expense_id,
                "email.processed"
            );
            Ok(Json(EmailResponse {
                expense_id,
                duplicate: false,
            }))
        }
        Err(e @ PipelineError::InvalidTransaction(_)) => {
            // The same email will never validate; do not invite a retry.
            if let Err(err) = ledger::processed(&state.db, EMAIL_PROVIDER, &event_id, &request_id).await {
                ledger::failed(&state.db, EMAIL_PROVIDER, &event_id, &request_id, &err).await;
                return Err(err);
            }
            warn!(request_id = %request_id, customer_id = %customer_id, error = %e, "email.invalid_transaction");
            Err(e.into())
        }
        Err(e) => {
            let err = ApiError::from(e);
            ledger::failed(&state.db, EMAIL_PROVIDER, &event_id, &request_id, &err).await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(text: Option<&str>, html: Option<&str>) -> InboundEmail {
        InboundEmail {
            to: "ana@in.gastos.pe".to_string(),
            from: Some("notificaciones@bcp.com.pe".to_string()),
            subject: Some("Consumo".to_string()),
            date: None,
            text: text.map(str::to_string),
            html: html.map(str::to_string),
            message_id: None,
        }
    }

    #[test]
    fn test_email_to_input_prefers_text() {
        let input = email_to_input(&email(Some("S/ 50 en Tambo"), Some("<p>x</p>")), 6000);
        assert_eq!(
            input,
            "From: notificaciones@bcp.com.pe\nTo: ana@in.gastos.pe\nSubject: Consumo\nDate: \n\nBody:\nS/ 50 en Tambo"
        );
    }

    #[test]
    fn test_email_to_input_falls_back_to_html() {
        let input = email_to_input(&email(Some("  "), Some("<b>S/ 50</b>")), 6000);
        assert!(input.ends_with("Body (HTML):\n<b>S/ 50</b>"));
    }

    #[test]
    fn test_email_to_input_is_capped() {
        let input = email_to_input(&email(Some("ñ".repeat(100).as_str()), None), 10);
        assert_eq!(input.chars().count(), 10);
    }
}
