use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, TransactionTrait,
};
use tracing::{error, info, instrument, warn};

use crate::{
    db::DbPool,
    entities::order::{Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity, ProductionStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

use super::order_status::apply_transition;

/// Tracks per-line-item progress across the production floor.
#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductionService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Sets the production state of one line item.
    ///
    /// Entering `Diseno` stamps the production start, reaching `Terminado`
    /// stamps the end; notes overwrite the previous value. When the last
    /// sibling of an order in `EnProduccion` reaches `Terminado`, the order
    /// automatically advances to `ControlCalidad` in the same transaction,
    /// the only non-caller-initiated transition in the system.
    #[instrument(
        skip(self, notes),
        fields(order_id = %order_id, item_id = %item_id, new_status = %new_status)
    )]
    pub async fn update_production_status(
        &self,
        order_id: i32,
        item_id: i32,
        new_status: ProductionStatus,
        notes: Option<String>,
    ) -> Result<order_item::Model, ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, item_id, "Failed to start transaction for production update");
            ServiceError::DatabaseError(e)
        })?;

        let item = OrderItemEntity::find_by_id(item_id)
            .filter(order_item::Column::OrderId.eq(order_id))
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, item_id, "Failed to fetch line item");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id, item_id, "Line item not found for order");
                ServiceError::NotFound(format!(
                    "Order item {} not found for order {}",
                    item_id, order_id
                ))
            })?;

        let now = Utc::now();
        let mut active: order_item::ActiveModel = item.into();
        active.production_status = Set(new_status.clone());
        if let Some(notes) = notes {
            active.notes = Set(Some(notes));
        }
        match new_status {
            ProductionStatus::Diseno => active.production_started_at = Set(Some(now)),
            ProductionStatus::Terminado => active.production_finished_at = Set(Some(now)),
            _ => {}
        }
        active.updated_at = Set(Some(now));

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id, item_id, "Failed to update line item production status");
            ServiceError::DatabaseError(e)
        })?;

        let completed_order = check_order_completion(&txn, order_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, item_id, "Failed to commit production update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, item_id, %new_status, "Line item production status updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::ProductionStatusChanged {
                    order_id,
                    item_id,
                    new_status,
                })
                .await
            {
                warn!(error = %e, order_id, item_id, "Failed to send production status event");
            }

            if let Some(order) = completed_order {
                info!(order_id, "All line items finished; order moved to quality control");
                if let Err(e) = event_sender
                    .send(Event::OrderStatusChanged {
                        order_id,
                        old_status: OrderStatus::EnProduccion,
                        new_status: order.status,
                    })
                    .await
                {
                    warn!(error = %e, order_id, "Failed to send order status changed event");
                }
            }
        } else if completed_order.is_some() {
            info!(order_id, "All line items finished; order moved to quality control");
        }

        Ok(updated)
    }
}

/// When every sibling line item is `Terminado` and the order itself is
/// still `EnProduccion`, advances the order to `ControlCalidad`. Runs in
/// the caller's transaction so the sibling read and the order write cannot
/// interleave with another completion.
async fn check_order_completion(
    txn: &DatabaseTransaction,
    order_id: i32,
) -> Result<Option<OrderModel>, ServiceError> {
    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(txn)
        .await?;

    let all_finished = !items.is_empty()
        && items
            .iter()
            .all(|item| item.production_status == ProductionStatus::Terminado);
    if !all_finished {
        return Ok(None);
    }

    let Some(order) = OrderEntity::find_by_id(order_id).one(txn).await? else {
        return Ok(None);
    };
    if order.status != OrderStatus::EnProduccion {
        return Ok(None);
    }

    let updated = apply_transition(txn, order, OrderStatus::ControlCalidad).await?;
    Ok(Some(updated))
}
