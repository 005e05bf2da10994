use rand::Rng;

use crate::config::PricingConfig;

/// Lowest price a task may carry.
pub const MIN_PRICE: f64 = 5.0;
/// Highest price a task may carry.
pub const MAX_PRICE: f64 = 50.0;

pub trait PriceGenerator: Send + Sync {
    fn next_price(&self) -> f64;
}

/// Uniform draw over `[min, max]`, rounded to one decimal place. The range
/// is narrowed to [`MIN_PRICE`, `MAX_PRICE`].
pub struct RandomPrice {
    min: f64,
    max: f64,
}

impl RandomPrice {
    pub fn new(min: f64, max: f64) -> Self {
        let min = min.clamp(MIN_PRICE, MAX_PRICE);
        let max = max.clamp(min, MAX_PRICE);
        Self { min, max }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self::new(config.min, config.max)
    }
}

impl Default for RandomPrice {
    fn default() -> Self {
        Self::new(MIN_PRICE, MAX_PRICE)
    }
}

impl PriceGenerator for RandomPrice {
    fn next_price(&self) -> f64 {
        let raw = rand::rng().random_range(self.min..=self.max);
        round_to_tenth(raw).clamp(self.min, self.max)
    }
}

/// Always the same price. Useful for deterministic tests and demos.
pub struct FixedPrice(pub f64);

impl PriceGenerator for FixedPrice {
    fn next_price(&self) -> f64 {
        self.0
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
