//! Receipt image archive: fetch, store, index and expire.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use database::clock::{days_from, format_timestamp};
use database::{chat_media, ChatMedia, Database, NewChatMedia};
use expense_core::{ChannelTransport, IncomingAttachment, MediaPayload, ObjectStore, PortError};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::PipelineError;

/// Rows handled per sweep.
pub const DEFAULT_SWEEP_LIMIT: i64 = 200;

/// Where a stored image came from.
#[derive(Debug, Clone, Copy)]
pub struct MediaOrigin<'a> {
    pub customer_id: &'a str,
    pub channel: &'a str,
    pub user_id: &'a str,
    pub event_id: &'a str,
}

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Stores receipt images in an object store and indexes them in the database.
#[derive(Clone)]
pub struct MediaArchive {
    db: Database,
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    retention_days: i64,
}

impl MediaArchive {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, retention_days: i64) -> Self {
        Self {
            db,
            store,
            http: reqwest::Client::new(),
            retention_days,
        }
    }

    /// Get the bytes behind an attachment.
    ///
    /// Inline bytes win, then the transport's own resolution, then a plain
    /// download of the attachment URL.
    pub async fn fetch(
        &self,
        attachment: &IncomingAttachment,
        transport: &dyn ChannelTransport,
    ) -> Result<Option<MediaPayload>, PipelineError> {
        if let Some(data) = attachment.data.as_ref().filter(|d| !d.is_empty()) {
            return Ok(Some(MediaPayload {
                data: data.clone(),
                mime_type: attachment.mime_type.clone(),
            }));
        }

        if let Some(payload) = transport
            .resolve_attachment(attachment)
            .await
            .map_err(PipelineError::Ocr)?
        {
            return Ok(Some(payload));
        }

        let Some(url) = attachment.url.as_deref() else {
            return Ok(None);
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Ocr(PortError::Transport(e.to_string())))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "chat.media_download_failed");
            return Ok(None);
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Ocr(PortError::Transport(e.to_string())))?;

        Ok(Some(MediaPayload {
            data: data.to_vec(),
            mime_type: attachment.mime_type.clone().or(header_mime),
        }))
    }

    /// Store an image and index it. `index` numbers images within one event.
    pub async fn store(
        &self,
        origin: MediaOrigin<'_>,
        index: usize,
        payload: &MediaPayload,
        ocr_text: Option<&str>,
    ) -> Result<ChatMedia, PipelineError> {
        let now = Utc::now();
        let object_key = object_key(&origin, index, payload.mime_type.as_deref(), now);

        self.store
            .put(&object_key, &payload.data, payload.mime_type.as_deref())
            .await
            .map_err(PipelineError::ObjectStore)?;

        let media = chat_media::create(
            self.db.pool(),
            &NewChatMedia {
                customer_id: origin.customer_id.to_string(),
                channel: origin.channel.to_string(),
                external_user_id: origin.user_id.to_string(),
                provider_event_id: origin.event_id.to_string(),
                object_key: object_key.clone(),
                mime_type: payload.mime_type.clone(),
                size_bytes: payload.data.len() as i64,
                sha256: hex::encode(Sha256::digest(&payload.data)),
                ocr_text: ocr_text.map(str::to_string),
                created_at: format_timestamp(now),
                expires_at: days_from(now, self.retention_days),
            },
        )
        .await
        .map_err(|source| PipelineError::MediaPersistence { op: "create", source })?;

        info!(
            customer_id = origin.customer_id,
            channel = origin.channel,
            media_id = %media.id,
            object_key = %object_key,
            "chat.media_stored"
        );

        Ok(media)
    }

    /// Point stored media at the expense it produced.
    pub async fn link_expense(&self, media_ids: &[String], expense_id: &str) -> Result<(), PipelineError> {
        for media_id in media_ids {
            chat_media::link_expense(self.db.pool(), media_id, expense_id)
                .await
                .map_err(|source| PipelineError::MediaPersistence {
                    op: "linkExpense",
                    source,
                })?;
        }
        Ok(())
    }

    /// Delete media whose retention ran out, payload first, then the row.
    ///
    /// A row whose payload could not be deleted is kept for the next sweep.
    pub async fn sweep(&self, now: DateTime<Utc>, limit: i64) -> Result<SweepReport, PipelineError> {
        let expired = chat_media::list_expired(self.db.pool(), &format_timestamp(now), limit)
            .await
            .map_err(|source| PipelineError::MediaPersistence {
                op: "deleteExpired",
                source,
            })?;

        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };

        for media in expired {
            if let Err(e) = self.store.delete(&media.object_key).await {
                warn!(media_id = %media.id, error = %e, "chat.media_object_delete_failed");
                report.failed += 1;
                continue;
            }

            chat_media::delete_by_id(self.db.pool(), &media.id)
                .await
                .map_err(|source| PipelineError::MediaPersistence {
                    op: "deleteExpired",
                    source,
                })?;
            report.deleted += 1;
        }

        Ok(report)
    }
}

/// `receipts/{customer}/{channel}/{yyyy}/{mm}/{event}[-{n}].{ext}`
fn object_key(origin: &MediaOrigin<'_>, index: usize, mime_type: Option<&str>, at: DateTime<Utc>) -> String {
    let suffix = if index == 0 {
        String::new()
    } else {
        format!("-{}", index)
    };

    format!(
        "receipts/{}/{}/{:04}/{:02}/{}{}.{}",
        origin.customer_id,
        origin.channel,
        at.year(),
        at.month(),
        origin.event_id,
        suffix,
        image_extension(mime_type)
    )
}

/// File extension for an image MIME type.
pub fn image_extension(mime_type: Option<&str>) -> &'static str {
    match mime_type {
        Some(m) if m.contains("jpeg") => "jpg",
        Some(m) if m.contains("png") => "png",
        Some(m) if m.contains("webp") => "webp",
        Some(m) if m.contains("gif") => "gif",
        _ => "bin",
    }
}
