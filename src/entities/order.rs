use chrono::Local;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// IVA rate applied to the post-discount subtotal.
pub const TAX_RATE: Decimal = dec!(0.19);

/// Default pickup location printed on receipts.
pub const DEFAULT_PICKUP_ADDRESS: &str = "Local principal";

/// Enum representing the lifecycle states of an order.
///
/// Only the edges encoded in `services::order_status::is_valid_transition`
/// are legal; `Entregado` and `Cancelado` are terminal.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "cotizacion")]
    Cotizacion,
    #[sea_orm(string_value = "pendiente")]
    Pendiente,
    #[sea_orm(string_value = "confirmado")]
    Confirmado,
    #[sea_orm(string_value = "en_produccion")]
    EnProduccion,
    #[sea_orm(string_value = "control_calidad")]
    ControlCalidad,
    #[sea_orm(string_value = "terminado")]
    Terminado,
    #[sea_orm(string_value = "listo_retiro")]
    ListoRetiro,
    #[sea_orm(string_value = "entregado")]
    Entregado,
    #[sea_orm(string_value = "cancelado")]
    Cancelado,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }
}

/// How the customer settles the order.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash paid at the store counter.
    #[sea_orm(string_value = "efectivo")]
    Efectivo,
    /// Cash collected when the order is picked up or delivered.
    #[sea_orm(string_value = "presencial")]
    Presencial,
}

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderPriority {
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "urgente")]
    Urgente,
    #[sea_orm(string_value = "express")]
    Express,
}

/// The `orders` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique human-readable order number, `SR<year>-<suffix>`.
    #[sea_orm(unique)]
    pub order_number: String,

    pub customer_id: i32,

    /// Employee assigned to the order, when any.
    pub employee_id: Option<i32>,

    pub status: OrderStatus,
    pub payment_method: PaymentMethod,

    /// Sum of line-item subtotals minus the discount.
    pub subtotal: Decimal,
    pub discount: Decimal,
    /// 19% of the post-discount subtotal, rounded to two decimals.
    pub taxes: Decimal,
    /// `subtotal + taxes`.
    pub total: Decimal,
    /// Deposit (seña) collected up front; replaced, not accumulated.
    pub deposit_received: Decimal,

    pub paid: bool,
    pub payment_date: Option<DateTimeUtc>,

    pub pickup_address: String,
    pub estimated_delivery_date: Option<Date>,
    pub actual_delivery_date: Option<Date>,

    pub priority: OrderPriority,
    pub production_notes: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,

    /// Optimistic-concurrency column; bumped on every write.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Amount still owed: total minus the deposit received, zero once the
    /// order is settled. Always derived, never stored.
    pub fn outstanding_balance(&self) -> Decimal {
        if self.paid {
            return Decimal::ZERO;
        }
        self.total - self.deposit_received
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn can_be_confirmed(&self) -> bool {
        self.status == OrderStatus::Pendiente
    }

    pub fn can_start_production(&self) -> bool {
        self.status == OrderStatus::Confirmado
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Terminado | OrderStatus::ListoRetiro | OrderStatus::Entregado
        )
    }

    /// An order leaves the shop only once production is done and it is paid.
    pub fn can_be_delivered(&self) -> bool {
        self.status == OrderStatus::ListoRetiro && self.paid
    }

    /// Days until the estimated delivery date, 0 when none is set. Negative
    /// values mean the order is overdue.
    pub fn days_until_delivery(&self) -> i64 {
        match self.estimated_delivery_date {
            Some(date) => (date - Local::now().date_naive()).num_days(),
            None => 0,
        }
    }
}

/// Monetary breakdown derived from the line items of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub taxes: Decimal,
    pub total: Decimal,
}

/// Recomputes the order-level invariant from its line-item subtotals:
/// `subtotal = Σ items - discount`, `taxes = subtotal × 19%`,
/// `total = subtotal + taxes`.
pub fn compute_totals(item_subtotals: &[Decimal], discount: Decimal) -> OrderTotals {
    let gross: Decimal = item_subtotals.iter().copied().sum();
    let subtotal = gross - discount;
    let taxes = (subtotal * TAX_RATE).round_dp(2);
    OrderTotals {
        subtotal,
        taxes,
        total: subtotal + taxes,
    }
}
