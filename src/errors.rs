use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use thiserror::Error;

use crate::entities::order::OrderStatus;

/// Error taxonomy shared by every service in the crate.
///
/// All variants are terminal for the operation that raised them: the engine
/// never retries internally and never masks storage errors.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: cannot change order from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Excess payment: {amount} exceeds the outstanding balance of {outstanding}")]
    ExcessPayment {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Concurrent modification: order {0}")]
    ConcurrentModification(i32),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// True when the error is caused by bad caller input rather than by
    /// infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::InvalidTransition { .. }
                | Self::ExcessPayment { .. }
                | Self::ValidationError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn invalid_transition_names_both_states() {
        let err = ServiceError::InvalidTransition {
            from: OrderStatus::Pendiente,
            to: OrderStatus::Entregado,
        };
        let msg = err.to_string();
        assert!(msg.contains("pendiente"));
        assert!(msg.contains("entregado"));
    }

    #[test]
    fn excess_payment_reports_amounts() {
        let err = ServiceError::ExcessPayment {
            amount: dec!(150.00),
            outstanding: dec!(100.00),
        };
        assert!(err.to_string().contains("150.00"));
        assert!(err.is_client_error());
    }

    #[test]
    fn database_errors_are_not_client_errors() {
        let err = ServiceError::DatabaseError(DbErr::Custom("boom".into()));
        assert!(!err.is_client_error());
    }
}
