//! Turns receipt text into transaction candidates.
//!
//! The language model is asked for a JSON array first. If that fails in any
//! way (call error, no JSON, nothing valid in it) a few ordered regex patterns
//! look for a payable amount and synthesise a single transaction.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::llm::Completion;
use crate::schema::ExtractedTransaction;

pub const FALLBACK_DESCRIPTION: &str = "Transaction";
pub const FALLBACK_MERCHANT: &str = "Unknown Merchant";

/// Amount patterns tried in order. The first capture group is the amount.
/// Digits are ASCII only so the capture always parses as `f64`.
const FALLBACK_AMOUNT_PATTERNS: &[(&str, &str)] = &[
    ("amount_payable", r"amount payable[\s:]*(?:rs\.?)?\s*([0-9]+(?:\.[0-9]{2})?)"),
    ("total", r"total[\s:]*(?:rs\.?)?\s*([0-9]+(?:\.[0-9]{2})?)"),
    ("currency_prefix", r"(?:rs\.?|₹)\s*([0-9]+(?:\.[0-9]{2})?)"),
];

struct AmountPattern {
    id: &'static str,
    regex: Regex,
}

/// Extracts transactions from plain text with an LLM and a regex fallback.
pub struct TransactionExtractor {
    completion: Arc<dyn Completion>,
    amount_patterns: Vec<AmountPattern>,
}

impl TransactionExtractor {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        let mut amount_patterns = Vec::new();
        for &(id, pattern) in FALLBACK_AMOUNT_PATTERNS {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => amount_patterns.push(AmountPattern { id, regex }),
                Err(e) => warn!("Skipping invalid amount pattern '{}': {}", id, e),
            }
        }

        Self {
            completion,
            amount_patterns,
        }
    }

    /// Never fails: model and parsing errors fall back to pattern matching,
    /// which may itself legitimately find nothing.
    pub async fn extract_transactions(&self, text: &str) -> Vec<ExtractedTransaction> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.extract_with_model(text).await {
            Ok(transactions) => transactions,
            Err(e) => {
                error!("{} extraction failed: {:#}", self.completion.name(), e);
                info!("Using pattern fallback");
                self.fallback_transactions(text)
            }
        }
    }

    async fn extract_with_model(&self, text: &str) -> Result<Vec<ExtractedTransaction>> {
        let prompt = build_prompt(text);
        let response = self.completion.complete(&prompt).await?;
        debug!("Raw model response length: {} chars", response.len());

        let transactions = parse_model_response(&response)?;
        if transactions.is_empty() {
            anyhow::bail!("No valid transactions found in model response");
        }
        Ok(transactions)
    }

    /// Single synthetic transaction from the first amount pattern that matches
    /// with a positive value.
    pub fn fallback_transactions(&self, text: &str) -> Vec<ExtractedTransaction> {
        for pattern in &self.amount_patterns {
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            let Some(amount) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
                continue;
            };
            if amount > 0.0 {
                info!("Found amount {} via '{}' pattern", amount, pattern.id);
                return vec![ExtractedTransaction {
                    amount,
                    description: FALLBACK_DESCRIPTION.to_string(),
                    date: today(),
                    merchant: FALLBACK_MERCHANT.to_string(),
                }];
            }
        }

        info!("Could not extract transaction details");
        Vec::new()
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"
Extract transaction information from this invoice/receipt text.

Text: "{text}"

Find the main transaction details:
- Total payable amount (look for "Amount Payable", "Total", final amount)
- Transaction/invoice date
- Company/merchant name
- Service description

Return ONLY a JSON array:
[{{"amount": <number>, "description": "<service>", "date": "YYYY-MM-DD", "merchant": "<company>"}}]
"#
    )
}

/// Locate the JSON array in a model response and keep only valid entries.
fn parse_model_response(response: &str) -> Result<Vec<ExtractedTransaction>> {
    let cleaned = strip_code_fences(response.trim());

    let start = cleaned.find('[').context("No JSON array in model response")?;
    let end = cleaned.rfind(']').context("No JSON array in model response")?;
    if end <= start {
        anyhow::bail!("No JSON array in model response");
    }

    let entries: Vec<Value> = serde_json::from_str(&cleaned[start..=end]).with_context(|| {
        format!(
            "Invalid JSON array: {}",
            cleaned[start..=end].chars().take(200).collect::<String>()
        )
    })?;

    Ok(entries.iter().filter_map(candidate_from_value).collect())
}

fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        rest = rest.strip_prefix("json").unwrap_or(rest);
        rest = rest.trim_start();
    }
    out.push_str(rest);
    out
}

/// A model entry survives only with a positive amount and non-empty
/// description and merchant.
fn candidate_from_value(value: &Value) -> Option<ExtractedTransaction> {
    let obj = value.as_object()?;

    let amount = match obj.get("amount")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let description = non_empty_str(obj.get("description"))?;
    let merchant = non_empty_str(obj.get("merchant"))?;
    let date = non_empty_str(obj.get("date")).unwrap_or_else(today);

    let transaction = ExtractedTransaction {
        amount,
        description,
        date,
        merchant,
    };
    transaction.is_valid().then_some(transaction)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
