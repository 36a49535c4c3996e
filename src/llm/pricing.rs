use serde::Serialize;

use crate::providers::traits::TokenUsage;

/// USD per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

const FALLBACK_MODEL: &str = "gpt-4.1-mini";

const MODEL_PRICING: &[(&str, ModelPrice)] = &[
    ("gpt-4.1", ModelPrice { input: 0.002, output: 0.008 }),
    ("gpt-4.1-mini", ModelPrice { input: 0.0004, output: 0.0016 }),
    ("gpt-4.1-nano", ModelPrice { input: 0.0001, output: 0.0004 }),
    ("gpt-4o", ModelPrice { input: 0.0025, output: 0.01 }),
    ("gpt-4o-mini", ModelPrice { input: 0.00015, output: 0.0006 }),
    ("gpt-5-mini", ModelPrice { input: 0.00025, output: 0.002 }),
];

/// Exact name first, then the longest table entry the name starts with
/// (dated snapshots like `gpt-4o-mini-2024-07-18`), then the fallback.
pub fn price_for(model: &str) -> ModelPrice {
    let lookup = |name: &str| {
        MODEL_PRICING
            .iter()
            .find(|(m, _)| *m == name)
            .map(|(_, price)| *price)
    };

    lookup(model)
        .or_else(|| {
            MODEL_PRICING
                .iter()
                .filter(|(m, _)| model.starts_with(m))
                .max_by_key(|(m, _)| m.len())
                .map(|(_, price)| *price)
        })
        .or_else(|| lookup(FALLBACK_MODEL))
        .unwrap_or(ModelPrice { input: 0.0, output: 0.0 })
}

pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let price = price_for(model);
    usage.prompt_tokens as f64 * price.input / 1000.0
        + usage.completion_tokens as f64 * price.output / 1000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct CostInfo {
    pub model_name: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
    pub latency_secs: f64,
}

impl CostInfo {
    pub fn new(model_name: &str, usage: TokenUsage, latency_secs: f64) -> Self {
        Self {
            model_name: model_name.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost_usd: estimate_cost(model_name, &usage),
            latency_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn cost_uses_per_thousand_rates() {
        let cost = estimate_cost("gpt-4.1-mini", &usage(1000, 500));
        assert!((cost - (0.0004 + 0.0008)).abs() < 1e-12);
    }

    #[test]
    fn dated_snapshots_match_their_family() {
        assert_eq!(price_for("gpt-4o-mini-2024-07-18"), price_for("gpt-4o-mini"));
        assert_eq!(price_for("gpt-4.1-2025-04-14"), price_for("gpt-4.1"));
    }

    #[test]
    fn unknown_models_fall_back() {
        assert_eq!(price_for("some-local-model"), price_for(FALLBACK_MODEL));
        let info = CostInfo::new("some-local-model", usage(2000, 0), 1.5);
        assert_eq!(info.total_tokens, 2000);
        assert!((info.cost_usd - 0.0008).abs() < 1e-12);
    }
}
