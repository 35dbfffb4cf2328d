//! Channel authorization policy.
//!
//! A customer may use a channel when the channel is globally active, the
//! customer is provisioned on it (strict mode) and enabled, and the customer's
//! effective plan includes the `channels.<channel>` feature.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use database::{channel_policy, subscription, Database, Plan};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::PipelineError;

/// Plan used when a customer has no usable subscription.
pub const FREE_PLAN_ID: &str = "free";

/// Entries beyond this count flush the cache.
const CACHE_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct CachedEntitlement {
    enabled: bool,
    expires_at: Instant,
}

/// Decides whether a customer may use a channel.
#[derive(Debug, Clone)]
pub struct ChannelAuthorizer {
    db: Database,
    strict_mode: bool,
    cache_ttl: Duration,
    cache: Arc<Mutex<HashMap<String, CachedEntitlement>>>,
}

impl ChannelAuthorizer {
    pub fn new(db: Database, strict_mode: bool, cache_ttl: Duration) -> Self {
        Self {
            db,
            strict_mode,
            cache_ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    /// Authorize a customer on a channel, or return the denial.
    pub async fn authorize(&self, customer_id: &str, channel: &str) -> Result<(), PipelineError> {
        if !self.is_channel_enabled(customer_id, channel).await? {
            warn!(customer_id, channel, "channel.disabled");
            return Err(PipelineError::ChannelDisabled {
                customer_id: customer_id.to_string(),
                channel: channel.to_string(),
            });
        }

        let feature_key = format!("channels.{}", channel);
        if !self.is_feature_enabled(customer_id, &feature_key).await? {
            warn!(customer_id, feature_key = %feature_key, "subscription.feature_blocked");
            return Err(PipelineError::FeatureBlocked {
                customer_id: customer_id.to_string(),
                feature_key,
            });
        }

        Ok(())
    }

    /// Global switch plus the customer's own setting.
    ///
    /// Returns `Ok(false)` for a disabled channel and
    /// `Err(ChannelSettingMissing)` in strict mode when the customer was
    /// never provisioned.
    async fn is_channel_enabled(&self, customer_id: &str, channel: &str) -> Result<bool, PipelineError> {
        let global = channel_policy::get_channel(self.db.pool(), channel)
            .await
            .map_err(|source| PipelineError::ChannelPolicy {
                op: "getChannel",
                source,
            })?;

        if !global.map(|c| c.is_active()).unwrap_or(false) {
            return Ok(false);
        }

        let setting = channel_policy::get_customer_channel_setting(self.db.pool(), customer_id, channel)
            .await
            .map_err(|source| PipelineError::ChannelPolicy {
                op: "getCustomerChannelSetting",
                source,
            })?;

        match setting {
            Some(setting) => Ok(setting.enabled),
            None if self.strict_mode => {
                warn!(customer_id, channel, "channel.setting_missing");
                Err(PipelineError::ChannelSettingMissing {
                    customer_id: customer_id.to_string(),
                    channel: channel.to_string(),
                })
            }
            None => Ok(true),
        }
    }

    /// Whether the customer's effective plan grants a feature, cached briefly.
    pub async fn is_feature_enabled(&self, customer_id: &str, feature_key: &str) -> Result<bool, PipelineError> {
        let cache_key = format!("entitlement:{}:{}", customer_id, feature_key);
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(&cache_key) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.enabled);
                }
            }
        }

        let enabled = self.lookup_feature(customer_id, feature_key).await.map_err(|source| {
            PipelineError::FeaturePolicy {
                feature_key: feature_key.to_string(),
                source,
            }
        })?;

        let mut cache = self.cache.lock().await;
        if cache.len() >= CACHE_MAX_ENTRIES {
            cache.clear();
        }
        cache.insert(
            cache_key,
            CachedEntitlement {
                enabled,
                expires_at: Instant::now() + self.cache_ttl,
            },
        );

        Ok(enabled)
    }

    /// Drop every cached entitlement.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    async fn lookup_feature(&self, customer_id: &str, feature_key: &str) -> database::Result<bool> {
        let Some(plan) = self.resolve_plan(customer_id).await? else {
            return Ok(false);
        };

        let feature = subscription::get_plan_feature(self.db.pool(), &plan.id, feature_key).await?;
        Ok(feature.map(|f| f.is_enabled()).unwrap_or(false))
    }

    /// The customer's active effective plan, else the free plan.
    async fn resolve_plan(&self, customer_id: &str) -> database::Result<Option<Plan>> {
        let pool = self.db.pool();

        if let Some(sub) = subscription::get_effective_subscription(pool, customer_id).await? {
            if let Some(plan) = subscription::get_plan(pool, &sub.plan_id).await? {
                if plan.is_active() {
                    return Ok(Some(plan));
                }
            }
        }

        // The free plan applies whatever its own status.
        subscription::get_plan(pool, FREE_PLAN_ID).await
    }
}
