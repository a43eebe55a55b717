use std::sync::Arc;

use chrono::{Local, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    ActiveValue::Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};

use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity, ProductionStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

use super::orders::save_order_guarded;

/// The order lifecycle edge table. Only these transitions are legal; any
/// other pair, including a self-transition, is rejected.
pub fn is_valid_transition(from: &OrderStatus, to: &OrderStatus) -> bool {
    match (from, to) {
        // From quotation
        (OrderStatus::Cotizacion, OrderStatus::Pendiente) => true,
        (OrderStatus::Cotizacion, OrderStatus::Cancelado) => true,

        // From pending
        (OrderStatus::Pendiente, OrderStatus::Confirmado) => true,
        (OrderStatus::Pendiente, OrderStatus::Cancelado) => true,

        // From confirmed
        (OrderStatus::Confirmado, OrderStatus::EnProduccion) => true,
        (OrderStatus::Confirmado, OrderStatus::Cancelado) => true,

        // From in production
        (OrderStatus::EnProduccion, OrderStatus::ControlCalidad) => true,
        (OrderStatus::EnProduccion, OrderStatus::Cancelado) => true,

        // Quality control may bounce the order back to the floor
        (OrderStatus::ControlCalidad, OrderStatus::Terminado) => true,
        (OrderStatus::ControlCalidad, OrderStatus::EnProduccion) => true,

        // Tail of the happy path
        (OrderStatus::Terminado, OrderStatus::ListoRetiro) => true,
        (OrderStatus::ListoRetiro, OrderStatus::Entregado) => true,

        // Entregado and Cancelado are terminal
        _ => false,
    }
}

/// Applies a validated transition to a loaded order inside the caller's
/// transaction, running the per-state side effects:
///
/// - `EnProduccion`: every line item still pending advances to design and
///   gets its production-start stamp.
/// - `Entregado`: the actual delivery date is set to today.
///
/// The order row is saved with an optimistic version guard.
pub(crate) async fn apply_transition(
    txn: &DatabaseTransaction,
    order: OrderModel,
    new_status: OrderStatus,
) -> Result<OrderModel, ServiceError> {
    if !is_valid_transition(&order.status, &new_status) {
        return Err(ServiceError::InvalidTransition {
            from: order.status,
            to: new_status,
        });
    }

    if new_status == OrderStatus::EnProduccion {
        start_pending_items(txn, order.id).await?;
    }

    let order_id = order.id;
    let loaded_version = order.version;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(new_status.clone());
    if new_status == OrderStatus::Entregado {
        active.actual_delivery_date = Set(Some(Local::now().date_naive()));
    }
    active.updated_at = Set(Some(Utc::now()));
    active.version = Set(loaded_version + 1);

    save_order_guarded(txn, active, order_id, loaded_version).await
}

/// Moves every line item still in `Pendiente` onto the production floor.
/// Items already past `Pendiente` are untouched, so re-entering production
/// after a quality-control bounce is idempotent.
async fn start_pending_items(
    txn: &DatabaseTransaction,
    order_id: i32,
) -> Result<(), ServiceError> {
    let pending = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .filter(order_item::Column::ProductionStatus.eq(ProductionStatus::Pendiente))
        .all(txn)
        .await?;

    let now = Utc::now();
    for item in pending {
        let item_id = item.id;
        let mut active: order_item::ActiveModel = item.into();
        active.production_status = Set(ProductionStatus::Diseno);
        active.production_started_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.update(txn).await.map_err(|e| {
            error!(error = %e, order_id, item_id, "Failed to start production for line item");
            ServiceError::DatabaseError(e)
        })?;
    }

    Ok(())
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order along its lifecycle. The only legal way to change
    /// order state; every call validates against the edge table and the
    /// whole operation commits atomically.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: i32,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for status update");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to fetch order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id, "Order not found for status update");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let old_status = order.status.clone();
        let updated = apply_transition(&txn, order, new_status.clone()).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit status update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, %old_status, %new_status, "Order status updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::OrderStatusChanged {
                    order_id,
                    old_status,
                    new_status,
                })
                .await
            {
                warn!(error = %e, order_id, "Failed to send order status changed event");
            }
        }

        Ok(updated)
    }

    /// Gets the current lifecycle state of an order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_status(&self, order_id: i32) -> Result<OrderStatus, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        Ok(order.status)
    }
}
