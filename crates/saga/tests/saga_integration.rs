//! Integration tests for the place_order saga.

use std::sync::Arc;

use saga::place_order::{
    self, OrderItem, OrderRequest, PlaceOrderServices, STEP_CREATE, STEP_NOTIFY, STEP_PAY,
    STEP_VALIDATE,
};
use saga::services::{
    InMemoryNotificationService, InMemoryOrderStore, InMemoryPaymentService,
    InMemoryRestaurantService,
};
use saga::{ExecutionStatus, InMemoryEventPublisher, SagaOrchestrator};

struct TestHarness {
    orchestrator: SagaOrchestrator<OrderRequest>,
    restaurant: InMemoryRestaurantService,
    orders: InMemoryOrderStore,
    payments: InMemoryPaymentService,
    notifications: InMemoryNotificationService,
    publisher: InMemoryEventPublisher,
}

impl TestHarness {
    fn new() -> Self {
        let restaurant = InMemoryRestaurantService::new();
        let orders = InMemoryOrderStore::new();
        let payments = InMemoryPaymentService::new();
        let notifications = InMemoryNotificationService::new();
        let publisher = InMemoryEventPublisher::new();

        let orchestrator = SagaOrchestrator::new();
        orchestrator
            .register(place_order::definition(PlaceOrderServices {
                restaurant: Arc::new(restaurant.clone()),
                orders: Arc::new(orders.clone()),
                payments: Arc::new(payments.clone()),
                notifications: Arc::new(notifications.clone()),
                publisher: Arc::new(publisher.clone()),
            }))
            .unwrap();

        Self {
            orchestrator,
            restaurant,
            orders,
            payments,
            notifications,
            publisher,
        }
    }
}

fn order_request() -> OrderRequest {
    OrderRequest {
        customer_id: "CUST-1".to_string(),
        restaurant_id: "REST-1".to_string(),
        items: vec![
            OrderItem {
                name: "Margherita".to_string(),
                quantity: 2,
                unit_price_cents: 1200,
            },
            OrderItem {
                name: "Lemonade".to_string(),
                quantity: 1,
                unit_price_cents: 300,
            },
        ],
    }
}

#[tokio::test]
async fn test_happy_path_places_order() {
    let h = TestHarness::new();

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        result.completed_steps,
        vec![STEP_VALIDATE, STEP_CREATE, STEP_PAY, STEP_NOTIFY]
    );
    assert!(result.compensated_steps.is_empty());

    // Every step left its result in the data map.
    let data = result.data.unwrap();
    for step in [STEP_VALIDATE, STEP_CREATE, STEP_PAY, STEP_NOTIFY] {
        assert!(data.contains(step));
    }

    // Side effects landed once each.
    assert_eq!(h.restaurant.hold_count(), 1);
    assert_eq!(h.orders.order_count(), 1);
    assert_eq!(h.payments.payment_count(), 1);
    assert_eq!(h.notifications.sent_count(), 1);
    assert_eq!(
        h.notifications.messages_for("CUST-1"),
        vec!["order ORD-0001 confirmed"]
    );

    let execution = h
        .orchestrator
        .get_execution(result.execution_id)
        .await
        .unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_happy_path_publishes_domain_events() {
    let h = TestHarness::new();

    h.orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    for event_type in [
        "order.validated",
        "order.created",
        "payment.captured",
        "order.confirmed",
        "place_order.completed",
    ] {
        assert_eq!(h.publisher.events_of_type(event_type).len(), 1, "{event_type}");
    }

    let created = h.publisher.events_of_type("order.created");
    assert_eq!(created[0].correlation_id.as_deref(), Some("ORD-0001"));
    assert_eq!(created[0].payload["total_cents"], 2700);
}

#[tokio::test(start_paused = true)]
async fn test_payment_failure_compensates_in_reverse() {
    let h = TestHarness::new();
    h.payments.set_fail_on_capture(true);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.completed_steps, vec![STEP_VALIDATE, STEP_CREATE]);
    assert_eq!(result.compensated_steps, vec![STEP_CREATE, STEP_VALIDATE]);
    assert!(result.error.unwrap().contains("payment declined"));

    // Default step retries: the capture was attempted exactly 3 times.
    assert_eq!(h.payments.capture_attempts(), 3);

    // Everything is unwound; notify never ran.
    assert_eq!(h.restaurant.hold_count(), 0);
    assert_eq!(h.orders.order_count(), 0);
    assert_eq!(h.payments.payment_count(), 0);
    assert_eq!(h.notifications.sent_count(), 0);

    assert_eq!(h.publisher.events_of_type("order.cancelled").len(), 1);
    assert_eq!(h.publisher.events_of_type("place_order.failed").len(), 1);

    let execution = h
        .orchestrator
        .get_execution(result.execution_id)
        .await
        .unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Compensated);
    assert_eq!(execution.failed_step(), Some(STEP_PAY));
}

#[tokio::test(start_paused = true)]
async fn test_flaky_payment_succeeds_within_retries() {
    let h = TestHarness::new();
    h.payments.set_fail_times(2);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        result.completed_steps,
        vec![STEP_VALIDATE, STEP_CREATE, STEP_PAY, STEP_NOTIFY]
    );
    assert_eq!(h.payments.capture_attempts(), 3);
    assert_eq!(h.payments.payment_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_notification_failure_unwinds_payment_and_order() {
    let h = TestHarness::new();
    h.notifications.set_fail_on_send(true);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.completed_steps,
        vec![STEP_VALIDATE, STEP_CREATE, STEP_PAY]
    );
    assert_eq!(
        result.compensated_steps,
        vec![STEP_PAY, STEP_CREATE, STEP_VALIDATE]
    );

    assert_eq!(h.payments.payment_count(), 0);
    assert_eq!(h.orders.order_count(), 0);
    assert_eq!(h.restaurant.hold_count(), 0);
    assert_eq!(h.publisher.events_of_type("payment.refunded").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_validation_failure_needs_no_compensation() {
    let h = TestHarness::new();
    h.restaurant.set_fail_on_hold(true);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.completed_steps.is_empty());
    assert!(result.compensated_steps.is_empty());
    assert_eq!(h.orders.order_count(), 0);
    assert_eq!(h.payments.capture_attempts(), 0);

    let execution = h
        .orchestrator
        .get_execution(result.execution_id)
        .await
        .unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Compensated);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_failure_is_recorded_but_sweep_continues() {
    let h = TestHarness::new();
    h.payments.set_fail_on_capture(true);
    h.orders.set_fail_on_cancel(true);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(!result.success);
    // The order cancellation failed; the hold was still released.
    assert_eq!(result.compensated_steps, vec![STEP_VALIDATE]);
    assert_eq!(result.compensation_failures.len(), 1);
    assert_eq!(result.compensation_failures[0].step, STEP_CREATE);
    assert_eq!(h.restaurant.hold_count(), 0);
    assert_eq!(h.orders.order_count(), 1);

    let execution = h
        .orchestrator
        .get_execution(result.execution_id)
        .await
        .unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_unavailable_event_bus_does_not_affect_outcome() {
    let h = TestHarness::new();
    h.publisher.set_fail_on_publish(true);

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, order_request())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(h.publisher.event_count(), 0);
    assert_eq!(h.orders.order_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_order_fails_validation() {
    let h = TestHarness::new();
    let request = OrderRequest {
        items: Vec::new(),
        ..order_request()
    };

    let result = h
        .orchestrator
        .execute(place_order::SAGA_NAME, request)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().contains("no items"));
    assert_eq!(h.restaurant.hold_count(), 0);
}
