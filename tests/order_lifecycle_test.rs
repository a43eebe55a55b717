//! End-to-end tests for the order lifecycle: creation, the transition
//! table, the production cascade and the automatic quality-control move.

mod common;

use assert_matches::assert_matches;
use common::{item, order_with_items, TestApp};
use rust_decimal_macros::dec;
use serigraf_api::entities::order::{OrderStatus, DEFAULT_PICKUP_ADDRESS};
use serigraf_api::entities::order_item::ProductionStatus;
use serigraf_api::errors::ServiceError;

#[tokio::test]
async fn create_order_computes_totals() {
    let app = TestApp::new().await;

    let details = app
        .orders
        .create_order(order_with_items(vec![item(2, dec!(50.00), dec!(0))]))
        .await
        .expect("create order");

    assert_eq!(details.order.subtotal, dec!(100.00));
    assert_eq!(details.order.taxes, dec!(19.00));
    assert_eq!(details.order.total, dec!(119.00));
    assert_eq!(details.order.status, OrderStatus::Pendiente);
    assert_eq!(details.order.pickup_address, DEFAULT_PICKUP_ADDRESS);
    assert!(details.order.order_number.starts_with("SR"));

    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].subtotal, dec!(100.00));
    assert_eq!(details.items[0].production_status, ProductionStatus::Pendiente);
    assert!(details.transactions.is_empty());
}

#[tokio::test]
async fn create_order_applies_discount_before_tax() {
    let app = TestApp::new().await;

    let mut request = order_with_items(vec![item(1, dec!(60.00), dec!(0)), item(1, dec!(40.00), dec!(0))]);
    request.discount = Some(dec!(10.00));

    let details = app.orders.create_order(request).await.expect("create order");

    assert_eq!(details.order.subtotal, dec!(90.00));
    assert_eq!(details.order.taxes, dec!(17.10));
    assert_eq!(details.order.total, dec!(107.10));
}

#[tokio::test]
async fn create_order_rejects_non_initial_status() {
    let app = TestApp::new().await;

    let mut request = order_with_items(vec![item(1, dec!(10.00), dec!(0))]);
    request.status = Some(OrderStatus::Confirmado);

    let err = app.orders.create_order(request).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut quotation = order_with_items(vec![item(1, dec!(10.00), dec!(0))]);
    quotation.status = Some(OrderStatus::Cotizacion);
    let details = app.orders.create_order(quotation).await.expect("quotation");
    assert_eq!(details.order.status, OrderStatus::Cotizacion);
}

#[tokio::test]
async fn create_order_rejects_empty_items() {
    let app = TestApp::new().await;

    let err = app
        .orders
        .create_order(order_with_items(vec![]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn full_lifecycle_to_delivery() {
    let app = TestApp::new().await;

    let details = app
        .orders
        .create_order(order_with_items(vec![item(2, dec!(50.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;
    let item_id = details.items[0].id;

    // Pendiente -> Confirmado -> EnProduccion
    app.status
        .update_status(order_id, OrderStatus::Confirmado)
        .await
        .expect("confirm");
    let order = app
        .status
        .update_status(order_id, OrderStatus::EnProduccion)
        .await
        .expect("start production");
    assert_eq!(order.status, OrderStatus::EnProduccion);

    // Entering production moved the pending item to design
    let details = app.orders.get_order(order_id).await.expect("reload");
    assert_eq!(details.items[0].production_status, ProductionStatus::Diseno);
    assert!(details.items[0].production_started_at.is_some());
    assert!(details.items[0].production_finished_at.is_none());

    // Finishing the only item auto-moves the order to quality control
    let finished = app
        .production
        .update_production_status(order_id, item_id, ProductionStatus::Terminado, None)
        .await
        .expect("finish item");
    assert!(finished.production_finished_at.is_some());
    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::ControlCalidad
    );

    // Settle the balance
    let payment = app
        .payments
        .register_payment(
            order_id,
            serigraf_api::services::payments::RegisterPaymentRequest {
                amount: dec!(119.00),
                method: serigraf_api::entities::transaction::TransactionMethod::EfectivoLocal,
                employee_id: Some(9),
                notes: None,
                is_deposit: false,
            },
        )
        .await
        .expect("pay");
    assert!(payment.is_full_payment());

    let details = app.orders.get_order(order_id).await.expect("reload");
    assert!(details.order.paid);
    assert_eq!(details.order.outstanding_balance(), dec!(0));
    assert!(details.order.payment_date.is_some());

    // ControlCalidad -> Terminado -> ListoRetiro -> Entregado
    app.status
        .update_status(order_id, OrderStatus::Terminado)
        .await
        .expect("qc pass");
    app.status
        .update_status(order_id, OrderStatus::ListoRetiro)
        .await
        .expect("ready");
    let delivered = app
        .status
        .update_status(order_id, OrderStatus::Entregado)
        .await
        .expect("deliver");
    assert_eq!(delivered.status, OrderStatus::Entregado);
    assert!(delivered.actual_delivery_date.is_some());

    // Entregado is terminal
    let err = app
        .status
        .update_status(order_id, OrderStatus::Cancelado)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidTransition {
            from: OrderStatus::Entregado,
            to: OrderStatus::Cancelado,
        }
    );
}

#[tokio::test]
async fn illegal_transition_leaves_state_untouched() {
    let app = TestApp::new().await;

    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;

    let err = app
        .status
        .update_status(order_id, OrderStatus::Entregado)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidTransition {
            from: OrderStatus::Pendiente,
            to: OrderStatus::Entregado,
        }
    );

    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::Pendiente
    );
}

#[tokio::test]
async fn update_status_on_missing_order_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .status
        .update_status(999, OrderStatus::Pendiente)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn entering_production_only_advances_pending_items() {
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
    let ahead_id = details.items[1].id;

    app.status
        .update_status(order_id, OrderStatus::Confirmado)
        .await
        .expect("confirm");

    // The floor already started this one out of band
    app.production
        .update_production_status(order_id, ahead_id, ProductionStatus::Impresion, None)
        .await
        .expect("start early");

    app.status
        .update_status(order_id, OrderStatus::EnProduccion)
        .await
        .expect("start production");

    let details = app.orders.get_order(order_id).await.expect("reload");
    assert_eq!(details.items[0].production_status, ProductionStatus::Diseno);
    assert!(details.items[0].production_started_at.is_some());
    assert_eq!(details.items[1].production_status, ProductionStatus::Impresion);
    assert!(details.items[1].production_started_at.is_none());
}

#[tokio::test]
async fn no_auto_transition_outside_production() {
    let app = TestApp::new().await;

    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;
    let item_id = details.items[0].id;

    app.status
        .update_status(order_id, OrderStatus::Confirmado)
        .await
        .expect("confirm");

    // All items finished, but the order is not in production
    app.production
        .update_production_status(order_id, item_id, ProductionStatus::Terminado, None)
        .await
        .expect("finish item");

    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::Confirmado
    );
}

#[tokio::test]
async fn quality_control_bounce_does_not_restart_finished_items() {
    let app = TestApp::new().await;

    let details = app
        .orders
        .create_order(order_with_items(vec![item(1, dec!(10.00), dec!(0))]))
        .await
        .expect("create order");
    let order_id = details.order.id;
    let item_id = details.items[0].id;

    app.status
        .update_status(order_id, OrderStatus::Confirmado)
        .await
        .expect("confirm");
    app.status
        .update_status(order_id, OrderStatus::EnProduccion)
        .await
        .expect("start production");
    app.production
        .update_production_status(order_id, item_id, ProductionStatus::Terminado, None)
        .await
        .expect("finish item");
    assert_eq!(
        app.status.get_status(order_id).await.expect("status"),
        OrderStatus::ControlCalidad
    );

    // Defects found: bounce the order back to the floor
    app.status
        .update_status(order_id, OrderStatus::EnProduccion)
        .await
        .expect("bounce");

    // Finished items keep their state; only pending ones would restart
    let details = app.orders.get_order(order_id).await.expect("reload");
    assert_eq!(details.items[0].production_status, ProductionStatus::Terminado);
}
