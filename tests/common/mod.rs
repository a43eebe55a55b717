#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

use serigraf_api::db::DbPool;
use serigraf_api::migrator::Migrator;
use serigraf_api::services::order_status::OrderStatusService;
use serigraf_api::services::orders::{CreateOrderItemRequest, CreateOrderRequest, OrderService};
use serigraf_api::services::payments::PaymentService;
use serigraf_api::services::production::ProductionService;

/// Fully wired engine against a fresh in-memory SQLite database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub orders: OrderService,
    pub status: OrderStatusService,
    pub production: ProductionService,
    pub payments: PaymentService,
}

impl TestApp {
    pub async fn new() -> Self {
        // A single connection so every query sees the same in-memory
        // database.
        let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
        options.max_connections(1).sqlx_logging(false);

        let db = Database::connect(options)
            .await
            .expect("connect to in-memory sqlite");
        Migrator::up(&db, None).await.expect("apply migrations");

        let db = Arc::new(db);
        Self {
            orders: OrderService::new(db.clone(), None),
            status: OrderStatusService::new(db.clone(), None),
            production: ProductionService::new(db.clone(), None),
            payments: PaymentService::new(db.clone(), None),
            db,
        }
    }
}

pub fn item(
    quantity: i32,
    unit_price: Decimal,
    customization_price: Decimal,
) -> CreateOrderItemRequest {
    CreateOrderItemRequest {
        product_id: 1,
        size_id: 2,
        customization_id: None,
        quantity,
        unit_price,
        customization_price,
        notes: None,
    }
}

pub fn order_with_items(items: Vec<CreateOrderItemRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: 1,
        employee_id: Some(9),
        order_number: None,
        status: None,
        payment_method: None,
        discount: None,
        priority: None,
        pickup_address: None,
        estimated_delivery_date: None,
        production_notes: None,
        items,
    }
}
