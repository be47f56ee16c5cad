//! Unified error types for the ledger, the store operations and the reconciliation pipeline.

use thiserror::Error;

/// Every failure the crate can surface to a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// The underlying store rejected or failed a call
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure while reading or writing a workbook
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV sheet could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON workbook or share preference blob could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A consumption, giveaway or purchase quantity that is not allowed
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// A price or budget figure that is negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Any other rejected input
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// The referenced product does not exist for this user
    #[error("Product not found: {name}")]
    ProductNotFound {
        /// Name or id of the product that was looked up
        name: String,
    },

    /// A product with the same name already exists for this user
    #[error("Product already exists: {name}")]
    DuplicateProduct {
        /// The conflicting name
        name: String,
    },

    /// The referenced consumption entry does not exist for this user
    #[error("Consumption entry not found: {id}")]
    ConsumptionNotFound {
        /// Id that was looked up
        id: i64,
    },

    /// A giveaway would remove more than is currently in stock
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        /// Stock at the time of the request
        available: f64,
        /// Quantity the caller tried to give away
        requested: f64,
    },

    /// The share token is unknown or has been revoked
    #[error("Share link not found or revoked")]
    ShareNotFound,

    /// A date or time value that cannot be turned into a timestamp
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp {
        /// The raw value that failed to decode
        value: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
