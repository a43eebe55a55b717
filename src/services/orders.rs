use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, Iterable,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::order::{
        self, compute_totals, Entity as OrderEntity, OrderPriority, OrderStatus, PaymentMethod,
        DEFAULT_PICKUP_ADDRESS,
    },
    entities::order_item::{
        self, compute_subtotal, Entity as OrderItemEntity, ProductionStatus,
    },
    entities::transaction::{self, Entity as TransactionEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: i32,
    pub employee_id: Option<i32>,
    /// Supplied by the caller or generated by [`generate_order_number`].
    #[validate(length(
        min = 1,
        max = 20,
        message = "Order number must be between 1 and 20 characters"
    ))]
    pub order_number: Option<String>,
    /// Initial lifecycle state; only `cotizacion` or `pendiente` are
    /// accepted. Defaults to `pendiente`.
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub discount: Option<Decimal>,
    pub priority: Option<OrderPriority>,
    pub pickup_address: Option<String>,
    pub estimated_delivery_date: Option<chrono::NaiveDate>,
    pub production_notes: Option<String>,
    #[validate]
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderItemRequest {
    pub product_id: i32,
    pub size_id: i32,
    pub customization_id: Option<i32>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub customization_price: Decimal,
    pub notes: Option<String>,
}

/// An order together with its owned line items and its ledger.
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub transactions: Vec<transaction::Model>,
}

/// Filtering and paging options for [`OrderService::list_orders`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<i32>,
    pub employee_id: Option<i32>,
    /// Creation-date range; applied only when both bounds are present.
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Restrict to urgent and express orders.
    #[serde(default)]
    pub urgent_only: bool,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

/// Aggregate counters for the workshop dashboard.
#[derive(Debug, Serialize)]
pub struct OrderStatistics {
    pub total_orders: u64,
    /// Orders per lifecycle state, keyed by the state's wire name.
    pub orders_by_status: BTreeMap<String, u64>,
    /// Revenue across all non-cancelled orders.
    pub total_revenue: Decimal,
    /// Revenue of non-cancelled orders created in the current calendar
    /// month (local time).
    pub current_month_revenue: Decimal,
    /// Average days between creation and actual delivery, across delivered
    /// orders.
    pub average_delivery_days: f64,
}

/// Explicit order-number factory: `SR<year>-<4-digit suffix>`, the suffix
/// taken from the creation timestamp.
pub fn generate_order_number() -> String {
    let now = Local::now();
    let suffix = now.timestamp_millis().rem_euclid(10_000);
    format!("SR{}-{:04}", now.year(), suffix)
}

/// Persists an order update guarded by the optimistic version column: the
/// UPDATE is filtered on the version loaded in this transaction and bumps
/// it, so a concurrent writer makes the statement match zero rows.
pub(crate) async fn save_order_guarded<C: ConnectionTrait>(
    conn: &C,
    active: order::ActiveModel,
    order_id: i32,
    expected_version: i32,
) -> Result<order::Model, ServiceError> {
    let result = OrderEntity::update_many()
        .set(active)
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(order_id, expected_version, "Optimistic lock conflict on order update");
        return Err(ServiceError::ConcurrentModification(order_id));
    }

    OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

/// Service managing order creation, querying and cleanup.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new order with its line items in a single transaction.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderDetails, ServiceError> {
        request.validate()?;

        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }

        let discount = request.discount.unwrap_or(Decimal::ZERO);
        if discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount cannot be negative".to_string(),
            ));
        }
        for item in &request.items {
            if item.unit_price < Decimal::ZERO || item.customization_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Item prices cannot be negative".to_string(),
                ));
            }
        }

        let status = request.status.clone().unwrap_or(OrderStatus::Pendiente);
        if !matches!(status, OrderStatus::Cotizacion | OrderStatus::Pendiente) {
            return Err(ServiceError::ValidationError(format!(
                "New orders must start as 'cotizacion' or 'pendiente', got '{}'",
                status
            )));
        }

        let item_subtotals: Vec<Decimal> = request
            .items
            .iter()
            .map(|item| compute_subtotal(item.quantity, item.unit_price, item.customization_price))
            .collect();
        let totals = compute_totals(&item_subtotals, discount);

        let order_number = request
            .order_number
            .clone()
            .unwrap_or_else(generate_order_number);
        let now = Utc::now();

        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_model = order::ActiveModel {
            order_number: Set(order_number),
            customer_id: Set(request.customer_id),
            employee_id: Set(request.employee_id),
            status: Set(status),
            payment_method: Set(request
                .payment_method
                .clone()
                .unwrap_or(PaymentMethod::Presencial)),
            subtotal: Set(totals.subtotal),
            discount: Set(discount),
            taxes: Set(totals.taxes),
            total: Set(totals.total),
            deposit_received: Set(Decimal::ZERO),
            paid: Set(false),
            payment_date: Set(None),
            pickup_address: Set(request
                .pickup_address
                .clone()
                .unwrap_or_else(|| DEFAULT_PICKUP_ADDRESS.to_string())),
            estimated_delivery_date: Set(request.estimated_delivery_date),
            actual_delivery_date: Set(None),
            priority: Set(request.priority.clone().unwrap_or(OrderPriority::Normal)),
            production_notes: Set(request.production_notes.clone()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(request.items.len());
        for (item, subtotal) in request.items.iter().zip(item_subtotals) {
            let saved = order_item::ActiveModel {
                order_id: Set(order_model.id),
                product_id: Set(item.product_id),
                size_id: Set(item.size_id),
                customization_id: Set(item.customization_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                customization_price: Set(item.customization_price),
                subtotal: Set(subtotal),
                production_status: Set(ProductionStatus::Pendiente),
                notes: Set(item.notes.clone()),
                production_started_at: Set(None),
                production_finished_at: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = order_model.id, "Failed to create order line item");
                ServiceError::DatabaseError(e)
            })?;
            items.push(saved);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = order_model.id,
            order_number = %order_model.order_number,
            total = %order_model.total,
            "Order created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_model.id)).await {
                warn!(error = %e, order_id = order_model.id, "Failed to send order created event");
            }
        }

        Ok(OrderDetails {
            order: order_model,
            items,
            transactions: Vec::new(),
        })
    }

    /// Retrieves an order with its line items and ledger.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to fetch order from database");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order
            .find_related(OrderItemEntity)
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;

        let transactions = order
            .find_related(TransactionEntity)
            .order_by_asc(transaction::Column::Id)
            .all(db)
            .await?;

        Ok(OrderDetails {
            order,
            items,
            transactions,
        })
    }

    /// Lists orders matching the filter, newest first, paginated.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;

        let page = filter.page.unwrap_or(1).max(1);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

        let mut query = OrderEntity::find();

        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(employee_id) = filter.employee_id {
            query = query.filter(order::Column::EmployeeId.eq(employee_id));
        }
        if filter.urgent_only {
            query = query.filter(
                order::Column::Priority.is_in([OrderPriority::Urgente, OrderPriority::Express]),
            );
        }
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            query = query.filter(order::Column::CreatedAt.between(from, to));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, limit, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Aggregates dashboard statistics across all orders.
    #[instrument(skip(self))]
    pub async fn get_statistics(&self) -> Result<OrderStatistics, ServiceError> {
        let db = &*self.db;

        let total_orders = OrderEntity::find().count(db).await?;

        let mut orders_by_status = BTreeMap::new();
        for status in OrderStatus::iter() {
            let count = OrderEntity::find()
                .filter(order::Column::Status.eq(status.clone()))
                .count(db)
                .await?;
            orders_by_status.insert(status.to_string(), count);
        }

        // Revenue excludes cancelled orders; month boundaries are the local
        // calendar month of the creation timestamp.
        let revenue_rows: Vec<(Decimal, DateTime<Utc>)> = OrderEntity::find()
            .select_only()
            .column(order::Column::Total)
            .column(order::Column::CreatedAt)
            .filter(order::Column::Status.ne(OrderStatus::Cancelado))
            .into_tuple()
            .all(db)
            .await?;

        let now = Local::now();
        let mut total_revenue = Decimal::ZERO;
        let mut current_month_revenue = Decimal::ZERO;
        for (total, created_at) in revenue_rows {
            total_revenue += total;
            let local = created_at.with_timezone(&Local);
            if local.year() == now.year() && local.month() == now.month() {
                current_month_revenue += total;
            }
        }

        let delivered: Vec<(DateTime<Utc>, chrono::NaiveDate)> = OrderEntity::find()
            .select_only()
            .column(order::Column::CreatedAt)
            .column(order::Column::ActualDeliveryDate)
            .filter(order::Column::ActualDeliveryDate.is_not_null())
            .into_tuple()
            .all(db)
            .await?;

        let average_delivery_days = if delivered.is_empty() {
            0.0
        } else {
            let total_days: i64 = delivered
                .iter()
                .map(|(created_at, delivered_on)| {
                    (*delivered_on - created_at.date_naive()).num_days()
                })
                .sum();
            total_days as f64 / delivered.len() as f64
        };

        Ok(OrderStatistics {
            total_orders,
            orders_by_status,
            total_revenue,
            current_month_revenue,
            average_delivery_days,
        })
    }

    /// Administrative removal of an order: deletes the line items it owns,
    /// then the order row. Ledger transactions are intentionally left in
    /// place as the audit trail. Normal operation cancels orders instead.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for order deletion");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to delete order line items");
                ServiceError::DatabaseError(e)
            })?;

        order.delete(&txn).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to delete order");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit order deletion transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, "Order deleted; ledger transactions retained");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderDeleted(order_id)).await {
                warn!(error = %e, order_id, "Failed to send order deleted event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_format() {
        let number = generate_order_number();
        let year = Local::now().year().to_string();

        assert!(number.starts_with("SR"));
        assert!(number[2..].starts_with(&year));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn filter_defaults_to_first_page() {
        let filter = OrderFilter::default();
        assert_eq!(filter.page, None);
        assert_eq!(filter.limit, None);
        assert!(!filter.urgent_only);
    }
}
