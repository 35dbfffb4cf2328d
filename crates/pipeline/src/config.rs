//! Configuration for the expense pipeline.

use std::env;
use std::time::Duration;

/// Global confidence gate used when a customer has no override.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Tunables for authorization, conversation state and media retention.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deny customers without an explicit channel setting.
    pub strict_policy_mode: bool,

    /// Minimum classifier confidence to apply a category.
    pub confidence_threshold: f64,

    /// How long an open question waits for a reply.
    pub conversation_ttl: Duration,

    /// How long receipt images are kept.
    pub media_retention_days: i64,

    /// How long an entitlement decision is cached.
    pub entitlement_cache_ttl: Duration,

    /// Input cap for the extractor.
    pub max_input_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strict_policy_mode: true,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            conversation_ttl: Duration::from_secs(24 * 60 * 60),
            media_retention_days: 90,
            entitlement_cache_ttl: Duration::from_secs(300),
            max_input_chars: 6000,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `STRICT_POLICY_MODE` - `false` enables compatibility mode (default: strict)
    /// - `CONFIDENCE_THRESHOLD` - Global confidence gate (default: 0.75)
    /// - `CONVERSATION_TTL_SECS` - Conversation state TTL (default: 86400)
    /// - `MEDIA_RETENTION_DAYS` - Receipt retention, positive integer (default: 90)
    /// - `AI_MAX_INPUT_CHARS` - Extractor input cap (default: 6000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let strict_policy_mode = env::var("STRICT_POLICY_MODE")
            .map(|v| v.trim().to_lowercase() != "false")
            .unwrap_or(true);

        let confidence_threshold = env::var("CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| is_valid_threshold(*v))
            .unwrap_or(defaults.confidence_threshold);

        let conversation_ttl = env::var("CONVERSATION_TTL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.conversation_ttl);

        let media_retention_days = env::var("MEDIA_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.media_retention_days);

        let max_input_chars = env::var("AI_MAX_INPUT_CHARS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_input_chars);

        Self {
            strict_policy_mode,
            confidence_threshold,
            conversation_ttl,
            media_retention_days,
            max_input_chars,
            ..defaults
        }
    }

    /// The gate for a customer: its own threshold when valid, else the global one.
    pub fn threshold_for(&self, customer_override: Option<f64>) -> f64 {
        customer_override
            .filter(|v| is_valid_threshold(*v))
            .unwrap_or(self.confidence_threshold)
    }
}

fn is_valid_threshold(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.strict_policy_mode);
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.conversation_ttl, Duration::from_secs(86400));
        assert_eq!(config.media_retention_days, 90);
    }

    #[test]
    fn test_threshold_for() {
        let config = PipelineConfig::default();
        assert_eq!(config.threshold_for(None), 0.75);
        assert_eq!(config.threshold_for(Some(0.9)), 0.9);
        assert_eq!(config.threshold_for(Some(1.0)), 1.0);
        assert_eq!(config.threshold_for(Some(0.0)), 0.75);
        assert_eq!(config.threshold_for(Some(1.5)), 0.75);
        assert_eq!(config.threshold_for(Some(f64::NAN)), 0.75);
    }

    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        let vars = [
            "STRICT_POLICY_MODE",
            "CONFIDENCE_THRESHOLD",
            "CONVERSATION_TTL_SECS",
            "MEDIA_RETENTION_DAYS",
            "AI_MAX_INPUT_CHARS",
        ];
        for var in vars {
            env::remove_var(var);
        }

        let config = PipelineConfig::from_env();
        assert!(config.strict_policy_mode);
        assert_eq!(config.media_retention_days, 90);

        env::set_var("STRICT_POLICY_MODE", "false");
        env::set_var("CONFIDENCE_THRESHOLD", "0.6");
        env::set_var("CONVERSATION_TTL_SECS", "600");
        env::set_var("MEDIA_RETENTION_DAYS", "-3");
        env::set_var("AI_MAX_INPUT_CHARS", "abc");

        let config = PipelineConfig::from_env();
        assert!(!config.strict_policy_mode);
        assert_eq!(config.confidence_threshold, 0.6);
        assert_eq!(config.conversation_ttl, Duration::from_secs(600));
        assert_eq!(config.media_retention_days, 90);
        assert_eq!(config.max_input_chars, 6000);

        for var in vars {
            env::remove_var(var);
        }
    }
}
