//! Line-item production tracker tests: timestamps, notes, ownership checks
//! and the automatic completion cascade.

mod common;

use assert_matches::assert_matches;
use common::{item, order_with_items, TestApp};
use rust_decimal_macros::dec;
use serigraf_api::entities::order::OrderStatus;
use serigraf_api::entities::order_item::ProductionStatus;
use serigraf_api::errors::ServiceError;

#[tokio::test]
async fn design_and_finish_stamps_timestamps() {
    let app = TestApp::new().await;
    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;
    let item_id = details.items[0].id;

    let updated = app
        .production
        .update_production_status(order_id, item_id, ProductionStatus::Diseno, None)
        .await
        .expect("to design");
    assert!(updated.production_started_at.is_some());
    assert!(updated.production_finished_at.is_none());
    assert!(updated.is_in_production());

    let updated = app
        .production
        .update_production_status(order_id, item_id, ProductionStatus::Terminado, None)
        .await
        .expect("to finished");
    assert!(updated.production_finished_at.is_some());
    assert!(updated.is_finished());
}

#[tokio::test]
async fn notes_overwrite_with_last_write_wins() {
    let app = TestApp::new().await;
    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;
    let item_id = details.items[0].id;

    let updated = app
        .production
        .update_production_status(
            order_id,
            item_id,
            ProductionStatus::Diseno,
            Some("logo vectorizado".to_string()),
        )
        .await
        .expect("with notes");
    assert_eq!(updated.notes.as_deref(), Some("logo vectorizado"));

    // No notes supplied: previous value survives
    let updated = app
        .production
        .update_production_status(order_id, item_id, ProductionStatus::Impresion, None)
        .await
        .expect("no notes");
    assert_eq!(updated.notes.as_deref(), Some("logo vectorizado"));

    // A new value overwrites
    let updated = app
        .production
        .update_production_status(
            order_id,
            item_id,
            ProductionStatus::ConProblemas,
            Some("tinta corrida".to_string()),
        )
        .await
        .expect("overwrite notes");
    assert_eq!(updated.notes.as_deref(), Some("tinta corrida"));
    assert!(updated.has_problems());
}

#[tokio::test]
async fn item_of_another_order_is_not_found() {
    let app = TestApp::new().await;
    let first = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("first order");
    let second = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(20.00), dec!(0))]))
        .await
        .expect("second order");

    let err = app
        .production
        .update_production_status(
            first.order.id,
            second.items[0].id,
            ProductionStatus::Diseno,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // The item itself was not touched
    let details = app.orders.get_order(second.order.id).await.expect("reload");
    assert_eq!(details.items[0].production_status, ProductionStatus::Pendiente);
}

#[tokio::test]
async fn order_reaches_quality_control_when_last_item_finishes() {
    let app = TestApp::new().await;
    let details = app
        .orders
        .create_order(order_with_items(vec![
            item(1, dec!(10.00), dec!(0)),
            item(1, dec!(20.00), dec!(0)),
        ]))
        .await
        .expect("create order");
    let order_id = details.order.id;

    app.status
        .update_status(order_id, OrderStatus::Confirmado)
        .await
        .expect("confirm");
    app.status
        .update_status(order_id, OrderStatus::EnProduccion)
        .await
        .expect("start production");

    app.production
        .update_production_status(
            order_id,
            details.items[0].id,
            ProductionStatus::Terminado,
            None,
        )
        .await
        .expect("finish first");
    // One sibling still on the floor: no cascade yet
    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::EnProduccion
    );

    app.production
        .update_production_status(
            order_id,
            details.items[1].id,
            ProductionStatus::Terminado,
            None,
        )
        .await
        .expect("finish second");
    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::ControlCalidad
    );
}

#[tokio::test]
async fn arbitrary_production_jumps_are_permitted() {
    let app = TestApp::new().await;
    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");

    // No edge table at this level: pendiente straight to prensado
    let updated = app
        .production
        .update_production_status(
            details.order.id,
            details.items[0].id,
            ProductionStatus::Prensado,
            None,
        )
        .await
        .expect("jump");
    assert_eq!(updated.production_status, ProductionStatus::Prensado);
    assert!(updated.production_started_at.is_none());
}
