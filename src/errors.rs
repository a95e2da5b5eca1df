//! Unified error type for the pricing core.
//!
//! Validation and not-found errors are surfaced synchronously to the caller.
//! Failures inside a cascade are wrapped in [`Error::Recompute`] so the
//! offending entity id travels with the cause.

use thiserror::Error;

/// All errors produced by the crate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Input rejected before any write happened
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// Component id did not resolve
    #[error("Component not found: {id}")]
    ComponentNotFound {
        /// Missing component id
        id: i64,
    },

    /// Product id did not resolve
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Missing product id
        id: i64,
    },

    /// Project id did not resolve
    #[error("Project not found: {id}")]
    ProjectNotFound {
        /// Missing project id
        id: i64,
    },

    /// Project-product link id did not resolve
    #[error("Project line not found: {id}")]
    LinkNotFound {
        /// Missing link id
        id: i64,
    },

    /// Stored or supplied project status is not one of the known values
    #[error("Invalid project status: {value}")]
    InvalidStatus {
        /// The rejected value
        value: String,
    },

    /// Decimal arithmetic overflowed
    #[error("Arithmetic overflow while computing {what}")]
    Arithmetic {
        /// Which quantity was being computed
        what: &'static str,
    },

    /// A dependent entity could not be recomputed during a cascade
    #[error("Recompute of {entity} {id} failed: {source}")]
    Recompute {
        /// Entity kind ("product", "component")
        entity: &'static str,
        /// Entity id
        id: i64,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A background cascade task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wraps `self` as a cascade recompute failure for the given entity.
    #[must_use]
    pub fn recompute(self, entity: &'static str, id: i64) -> Self {
        Self::Recompute {
            entity,
            id,
            source: Box::new(self),
        }
    }

    /// True for errors caused by a referenced entity no longer existing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ComponentNotFound { .. }
            | Self::ProductNotFound { .. }
            | Self::ProjectNotFound { .. }
            | Self::LinkNotFound { .. } => true,
            Self::Recompute { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recompute_wraps_source() {
        let err = Error::ProductNotFound { id: 7 }.recompute("product", 7);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Recompute of product 7 failed: Product not found: 7"
        );
    }

    #[test]
    fn test_validation_is_not_not_found() {
        let err = Error::validation("Quantity must be at least 1");
        assert!(!err.is_not_found());
        assert!(matches!(err, Error::Validation { message: _ }));
    }
}
