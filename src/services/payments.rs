use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    entities::transaction::{self, TransactionMethod, TransactionStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

use super::orders::save_order_guarded;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPaymentRequest {
    pub amount: Decimal,
    pub method: TransactionMethod,
    /// Employee who received the money, for the audit trail.
    pub employee_id: Option<i32>,
    pub notes: Option<String>,
    /// Deposits are exempt from the outstanding-balance check and replace
    /// the order's `deposit_received`.
    #[serde(default)]
    pub is_deposit: bool,
}

/// Append-only payment ledger against orders.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Records one monetary movement against an order.
    ///
    /// Non-deposit payments may not exceed the outstanding balance
    /// (`total - deposit_received`); a payment that settles the balance
    /// marks the order paid. Payment never touches the lifecycle state:
    /// an order can be delivered unpaid, or paid while still in production.
    #[instrument(
        skip(self, request),
        fields(order_id = %order_id, amount = %request.amount, is_deposit = request.is_deposit)
    )]
    pub async fn register_payment(
        &self,
        order_id: i32,
        request: RegisterPaymentRequest,
    ) -> Result<transaction::Model, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be positive".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for payment");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to fetch order for payment");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id, "Order not found for payment");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let outstanding = order.outstanding_balance();
        if !request.is_deposit && request.amount > outstanding {
            return Err(ServiceError::ExcessPayment {
                amount: request.amount,
                outstanding,
            });
        }

        let now = Utc::now();

        let saved = transaction::ActiveModel {
            order_id: Set(order_id),
            method: Set(request.method.clone()),
            status: Set(TransactionStatus::Completada),
            amount: Set(request.amount),
            received_by: Set(request.employee_id),
            notes: Set(request.notes.clone()),
            is_deposit: Set(request.is_deposit),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id, "Failed to persist transaction");
            ServiceError::DatabaseError(e)
        })?;

        let loaded_version = order.version;
        let mut active: order::ActiveModel = order.into();
        if request.is_deposit {
            // The deposit replaces any previous one; it is not accumulated.
            active.deposit_received = Set(request.amount);
        } else {
            let remaining = outstanding - request.amount;
            if remaining <= Decimal::ZERO {
                active.paid = Set(true);
                active.payment_date = Set(Some(now));
            }
        }
        active.updated_at = Set(Some(now));
        active.version = Set(loaded_version + 1);

        save_order_guarded(&txn, active, order_id, loaded_version).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit payment transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id,
            transaction_id = saved.id,
            amount = %saved.amount,
            is_deposit = saved.is_deposit,
            "Payment registered"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentRegistered {
                    order_id,
                    transaction_id: saved.id,
                    amount: saved.amount,
                    is_deposit: saved.is_deposit,
                })
                .await
            {
                warn!(error = %e, order_id, "Failed to send payment registered event");
            }
        }

        Ok(saved)
    }
}
