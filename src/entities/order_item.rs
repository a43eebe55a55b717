use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Per-item progress through the production floor, independent of the
/// order's lifecycle state. No edge table is enforced at this level: the
/// floor supervisor may set any state.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductionStatus {
    #[sea_orm(string_value = "pendiente")]
    Pendiente,
    #[sea_orm(string_value = "diseno")]
    Diseno,
    #[sea_orm(string_value = "impresion")]
    Impresion,
    #[sea_orm(string_value = "prensado")]
    Prensado,
    #[sea_orm(string_value = "control_calidad")]
    ControlCalidad,
    #[sea_orm(string_value = "terminado")]
    Terminado,
    #[sea_orm(string_value = "con_problemas")]
    ConProblemas,
}

/// The `order_items` table: one ordered product/size/customization
/// combination within an order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub size_id: i32,
    pub customization_id: Option<i32>,

    pub quantity: i32,
    pub unit_price: Decimal,
    /// Per-unit surcharge for the customization, 0 when none.
    pub customization_price: Decimal,
    /// `quantity × (unit_price + customization_price)`.
    pub subtotal: Decimal,

    pub production_status: ProductionStatus,
    /// Free-text production notes; last write wins.
    pub notes: Option<String>,
    pub production_started_at: Option<DateTimeUtc>,
    pub production_finished_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
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

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

impl Model {
    /// The item is on the production floor: design, printing or pressing.
    pub fn is_in_production(&self) -> bool {
        matches!(
            self.production_status,
            ProductionStatus::Diseno | ProductionStatus::Impresion | ProductionStatus::Prensado
        )
    }

    pub fn is_finished(&self) -> bool {
        self.production_status == ProductionStatus::Terminado
    }

    pub fn has_problems(&self) -> bool {
        self.production_status == ProductionStatus::ConProblemas
    }
}

/// Line-item pricing invariant: the base price plus the customization
/// surcharge, both weighted by quantity.
pub fn compute_subtotal(quantity: i32, unit_price: Decimal, customization_price: Decimal) -> Decimal {
    Decimal::from(quantity) * (unit_price + customization_price)
}
