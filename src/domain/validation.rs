/// Order Validator - request checks done before a book sees anything
///
/// ## Validation Rules
/// - Price must satisfy `0 < price < max_price`
/// - Amount must be positive
/// - Pair symbols must be non-empty
///
/// A failed check is reported synchronously and never reaches a book's stream.
///
/// ## Usage
/// ```rust
/// use matching_engine::domain::validation::{OrderValidator, ValidationError};
///
/// let validator = OrderValidator::new(100);
/// assert!(validator.validate_order(50, 10).is_ok());
/// assert_eq!(validator.validate_order(0, 10), Err(ValidationError::ZeroPrice));
/// ```

use crate::shared::error::EngineError;
use crate::shared::protocol::{Request, TradingPair, DEFAULT_MAX_PRICE};

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("price must be positive")]
    ZeroPrice,

    #[error("price {price} must be below {max_price}")]
    PriceOutOfRange { price: u32, max_price: u32 },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("trading pair symbols must be non-empty")]
    EmptySymbol,
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}

/// Validation configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Exclusive upper bound for prices
    pub max_price: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_price: DEFAULT_MAX_PRICE,
        }
    }
}

/// Order validator
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderValidator {
    config: ValidationConfig,
}

impl OrderValidator {
    pub fn new(max_price: u32) -> Self {
        Self::with_config(ValidationConfig { max_price })
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn max_price(&self) -> u32 {
        self.config.max_price
    }

    /// Checks price and amount of an incoming order.
    pub fn validate_order(&self, price: u32, amount: u32) -> Result<(), ValidationError> {
        if price == 0 {
            return Err(ValidationError::ZeroPrice);
        }
        if price >= self.config.max_price {
            return Err(ValidationError::PriceOutOfRange {
                price,
                max_price: self.config.max_price,
            });
        }
        if amount == 0 {
            return Err(ValidationError::ZeroAmount);
        }
        Ok(())
    }

    pub fn validate_pair(&self, pair: &TradingPair) -> Result<(), ValidationError> {
        if pair.base.trim().is_empty() || pair.quote.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        Ok(())
    }

    /// Checks the parts of a request that do not depend on engine state.
    pub fn validate(&self, request: &Request) -> Result<(), ValidationError> {
        match request {
            Request::Submit { pair, price, amount, .. } => {
                self.validate_pair(pair)?;
                self.validate_order(*price, *amount)
            }
            Request::Cancel { pair, .. } | Request::Shutdown { pair } => self.validate_pair(pair),
            Request::ShutdownAll => Ok(()),
        }
    }
}
