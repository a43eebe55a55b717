use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionMethod {
    /// Cash received at the store counter.
    #[sea_orm(string_value = "efectivo_local")]
    EfectivoLocal,
    /// Cash received on delivery or pickup.
    #[sea_orm(string_value = "efectivo_entrega")]
    EfectivoEntrega,
    /// Advance deposit.
    #[sea_orm(string_value = "sena")]
    Sena,
}

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pendiente")]
    Pendiente,
    #[sea_orm(string_value = "completada")]
    Completada,
    #[sea_orm(string_value = "cancelada")]
    Cancelada,
}

/// The `transactions` table: one monetary movement against an order.
///
/// Append-only ledger: rows are never amended after creation except for a
/// status change; corrections are recorded as new transactions. The table
/// carries no foreign-key constraint on `order_id` so the audit trail
/// survives the order row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,

    pub method: TransactionMethod,
    pub status: TransactionStatus,
    pub amount: Decimal,

    /// Employee who received the money.
    pub received_by: Option<i32>,
    pub notes: Option<String>,
    pub is_deposit: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completada
    }

    pub fn is_full_payment(&self) -> bool {
        !self.is_deposit && self.is_completed()
    }

    pub fn is_completed_deposit(&self) -> bool {
        self.is_deposit && self.is_completed()
    }
}
