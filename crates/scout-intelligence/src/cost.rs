//! Token usage accounting and cost estimates across queries.

use serde::{Deserialize, Serialize};

use scout_harness::provider::Usage;

// ---------------------------------------------------------------------------
// Model Pricing
// ---------------------------------------------------------------------------

/// Per-model pricing in USD per 1M tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub input_cost_per_1m: f64,
    pub output_cost_per_1m: f64,
    /// Prompt plus completion tokens the model accepts in one request.
    pub context_window: u64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::gpt_4o()
    }
}

impl ModelPricing {
    pub fn gpt_4o() -> Self {
        Self {
            model: "gpt-4o".into(),
            input_cost_per_1m: 2.50,
            output_cost_per_1m: 10.0,
            context_window: 128_000,
        }
    }

    /// Known pricing for `model`, if any.
    pub fn for_model(model: &str) -> Option<Self> {
        let (input, output, context_window) = match model {
            m if m.starts_with("gpt-4o-mini") => (0.15, 0.60, 128_000),
            m if m.starts_with("gpt-4o") => (2.50, 10.0, 128_000),
            m if m.starts_with("o3-mini") => (1.10, 4.40, 200_000),
            _ => return None,
        };
        Some(Self {
            model: model.to_string(),
            input_cost_per_1m: input,
            output_cost_per_1m: output,
            context_window,
        })
    }

    pub fn input_cost(&self, input_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_1m
    }

    pub fn output_cost(&self, output_tokens: u64) -> f64 {
        (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_1m
    }

    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.input_cost(input_tokens) + self.output_cost(output_tokens)
    }
}

// ---------------------------------------------------------------------------
// UsageTracker
// ---------------------------------------------------------------------------

/// Cumulative token usage across model round trips.
///
/// "Request" tokens are the prompt side, "response" tokens the completion side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTracker {
    pub request_tokens: u64,
    pub response_tokens: u64,
    pub requests: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one round trip. Responses without usage still count as a request.
    pub fn record(&mut self, usage: Option<Usage>) {
        let usage = usage.unwrap_or_default();
        self.request_tokens += usage.input_tokens;
        self.response_tokens += usage.output_tokens;
        self.requests += 1;
    }

    /// Fold another tracker into this one.
    pub fn merge(&mut self, other: &UsageTracker) {
        self.request_tokens += other.request_tokens;
        self.response_tokens += other.response_tokens;
        self.requests += other.requests;
    }

    pub fn total_tokens(&self) -> u64 {
        self.request_tokens + self.response_tokens
    }

    pub fn average_tokens_per_request(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_tokens() as f64 / self.requests as f64
        }
    }

    pub fn estimated_cost(&self, pricing: &ModelPricing) -> f64 {
        pricing.calculate_cost(self.request_tokens, self.response_tokens)
    }

    /// Share of the model's context window consumed by the tokens so far.
    pub fn context_fraction(&self, pricing: &ModelPricing) -> f64 {
        if pricing.context_window == 0 {
            0.0
        } else {
            self.total_tokens() as f64 / pricing.context_window as f64
        }
    }
}
