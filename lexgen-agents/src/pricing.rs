//! Model selection defaults and itemised cost accounting.

use lexgen_core::AgentKind;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Default model per agent kind when the tenant expresses no preference.
pub fn default_model_for(agent: AgentKind) -> &'static str {
    match agent {
        AgentKind::Analyser => "gpt-4o-mini",
        AgentKind::Researcher => "gpt-4o-mini",
        AgentKind::Drafter => "gpt-4o",
        AgentKind::Critic => "gpt-4o",
        AgentKind::Formatter => "gpt-4o-mini",
    }
}

/// Per-1k-token price pair for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPrice {
    pub input_per_1k: Decimal,
    pub output_per_1k: Decimal,
}

/// Price table in the fixed currency, six decimal places.
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
    fallback: ModelPrice,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut prices = HashMap::new();
        prices.insert(
            "gpt-4o-mini".to_string(),
            ModelPrice {
                input_per_1k: Decimal::new(150, 6),   // 0.000150
                output_per_1k: Decimal::new(600, 6),  // 0.000600
            },
        );
        prices.insert(
            "gpt-4o".to_string(),
            ModelPrice {
                input_per_1k: Decimal::new(2_500, 6),  // 0.002500
                output_per_1k: Decimal::new(10_000, 6), // 0.010000
            },
        );
        Self {
            prices,
            // Unknown models are billed at the heavier tier.
            fallback: ModelPrice {
                input_per_1k: Decimal::new(2_500, 6),
                output_per_1k: Decimal::new(10_000, 6),
            },
        }
    }
}

impl PriceTable {
    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn price_of(&self, model: &str) -> ModelPrice {
        self.prices.get(model).copied().unwrap_or(self.fallback)
    }

    /// Itemised cost of one call, rounded to six decimal places.
    pub fn cost_of(&self, model: &str, input_tokens: i64, output_tokens: i64) -> Decimal {
        let price = self.price_of(model);
        let thousand = Decimal::new(1_000, 0);
        let cost = Decimal::from(input_tokens) * price.input_per_1k / thousand
            + Decimal::from(output_tokens) * price.output_per_1k / thousand;
        cost.round_dp(6)
    }
}

// ============================================================================
// TESTS
// ============================================================================
