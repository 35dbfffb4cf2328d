//! Extracted transaction candidates and their validation rules.

use serde::{Deserialize, Serialize};

use crate::currency::normalize_currency;

/// Minimum trimmed length of a currency code.
const MIN_CURRENCY_LEN: usize = 3;

/// Minimum trimmed length of a merchant name.
const MIN_MERCHANT_LEN: usize = 2;

/// A structured transaction as returned by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTransaction {
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    /// When the transaction happened, as reported by the source.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    /// Bank or source label.
    #[serde(default = "unknown_bank")]
    pub bank: String,
    #[serde(default)]
    pub raw_text: String,
}

fn unknown_bank() -> String {
    "unknown".to_string()
}

impl ExtractedTransaction {
    /// Copy of this candidate with its currency normalized and text fields trimmed.
    pub fn normalized(&self) -> Self {
        Self {
            currency: normalize_currency(&self.currency),
            merchant: self.merchant.trim().to_string(),
            ..self.clone()
        }
    }
}

/// Why a candidate failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRejection {
    /// Amount was not finite or not strictly positive.
    Amount(f64),
    /// Currency shorter than three characters after trimming.
    Currency(String),
    /// Merchant shorter than two characters after trimming.
    Merchant(String),
}

impl std::fmt::Display for CandidateRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateRejection::Amount(amount) => write!(f, "invalid amount: {}", amount),
            CandidateRejection::Currency(currency) => write!(f, "invalid currency: {:?}", currency),
            CandidateRejection::Merchant(merchant) => write!(f, "invalid merchant: {:?}", merchant),
        }
    }
}

/// Check that a candidate can become a pending expense.
pub fn validate_candidate(candidate: &ExtractedTransaction) -> Result<(), CandidateRejection> {
    if !candidate.amount.is_finite() || candidate.amount <= 0.0 {
        return Err(CandidateRejection::Amount(candidate.amount));
    }

    if candidate.currency.trim().chars().count() < MIN_CURRENCY_LEN {
        return Err(CandidateRejection::Currency(candidate.currency.clone()));
    }

    if candidate.merchant.trim().chars().count() < MIN_MERCHANT_LEN {
        return Err(CandidateRejection::Merchant(candidate.merchant.clone()));
    }

    Ok(())
}
