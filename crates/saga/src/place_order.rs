//! The place_order saga: validate → create → pay → notify.
//!
//! Each step calls one collaborator service and publishes a domain
//! event as a fire-and-forget side effect. If a step exhausts its
//! retries, the completed steps are undone in reverse: notification of
//! cancellation, refund, order cancellation, hold release.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::definition::SagaDefinition;
use crate::error::SagaError;
use crate::publisher::{EventPublisher, publish_best_effort};
use crate::services::notification::NotificationService;
use crate::services::orders::{OrderRecord, OrderStore};
use crate::services::payment::{PaymentCapture, PaymentService};
use crate::services::restaurant::RestaurantService;
use crate::step::SagaStep;

/// The saga name used for registration.
pub const SAGA_NAME: &str = "place_order";

/// Step name: validate the order and place a kitchen hold.
pub const STEP_VALIDATE: &str = "validate";

/// Step name: create the order record.
pub const STEP_CREATE: &str = "create";

/// Step name: capture payment.
pub const STEP_PAY: &str = "pay";

/// Step name: notify the customer.
pub const STEP_NOTIFY: &str = "notify";

/// The caller-supplied context for one place_order run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
}

/// One line item of the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderRequest {
    /// Returns the order total in cents.
    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i64::from(i.quantity) * i.unit_price_cents)
            .sum()
    }
}

/// Result of the validate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub hold_id: String,
    pub total_cents: i64,
}

/// The collaborator services the saga steps call.
#[derive(Clone)]
pub struct PlaceOrderServices {
    pub restaurant: Arc<dyn RestaurantService>,
    pub orders: Arc<dyn OrderStore>,
    pub payments: Arc<dyn PaymentService>,
    pub notifications: Arc<dyn NotificationService>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Builds the place_order definition over the given services.
pub fn definition(services: PlaceOrderServices) -> SagaDefinition<OrderRequest> {
    SagaDefinition::new(SAGA_NAME)
        .step(validate_step(&services))
        .step(create_step(&services))
        .step(pay_step(&services))
        .step(notify_step(&services))
        .on_complete({
            let publisher = services.publisher.clone();
            move |_ctx, results| {
                let publisher = publisher.clone();
                async move {
                    let order_id = results
                        .get::<OrderRecord>(STEP_CREATE)
                        .ok()
                        .flatten()
                        .map(|o| o.order_id);
                    publish_best_effort(
                        publisher.as_ref(),
                        "place_order.completed",
                        json!({ "order_id": order_id.clone() }),
                        order_id,
                        Some(SAGA_NAME.to_string()),
                    )
                    .await;
                }
            }
        })
        .on_fail({
            let publisher = services.publisher.clone();
            move |_ctx, error, completed| {
                let publisher = publisher.clone();
                async move {
                    publish_best_effort(
                        publisher.as_ref(),
                        "place_order.failed",
                        json!({ "error": error, "completed_steps": completed }),
                        None,
                        Some(SAGA_NAME.to_string()),
                    )
                    .await;
                }
            }
        })
}

fn validate_step(services: &PlaceOrderServices) -> SagaStep<OrderRequest> {
    let restaurant = services.restaurant.clone();
    let publisher = services.publisher.clone();
    let release = services.restaurant.clone();

    SagaStep::new(STEP_VALIDATE, move |ctx: Arc<OrderRequest>, _prior| {
        let restaurant = restaurant.clone();
        let publisher = publisher.clone();
        async move {
            if ctx.items.is_empty() {
                return Err(SagaError::step(STEP_VALIDATE, "order has no items"));
            }

            let hold = restaurant
                .place_hold(&ctx.restaurant_id, &ctx.items)
                .await?;
            publish_best_effort(
                publisher.as_ref(),
                "order.validated",
                json!({ "restaurant_id": ctx.restaurant_id, "hold_id": hold.hold_id }),
                None,
                Some(SAGA_NAME.to_string()),
            )
            .await;

            Ok(Validation {
                hold_id: hold.hold_id,
                total_cents: ctx.total_cents(),
            })
        }
    })
    .with_compensation(move |_ctx, result, _results| {
        let restaurant = release.clone();
        async move {
            let validation: Validation = serde_json::from_value(result)?;
            restaurant.release_hold(&validation.hold_id).await
        }
    })
}

fn create_step(services: &PlaceOrderServices) -> SagaStep<OrderRequest> {
    let orders = services.orders.clone();
    let publisher = services.publisher.clone();
    let cancel_orders = services.orders.clone();
    let cancel_publisher = services.publisher.clone();

    SagaStep::new(STEP_CREATE, move |ctx: Arc<OrderRequest>, prior| {
        let orders = orders.clone();
        let publisher = publisher.clone();
        async move {
            let validation: Validation = prior.require(STEP_VALIDATE)?;
            let record = orders
                .create(&ctx.customer_id, &ctx.restaurant_id, validation.total_cents)
                .await?;
            publish_best_effort(
                publisher.as_ref(),
                "order.created",
                json!({ "order_id": record.order_id, "total_cents": validation.total_cents }),
                Some(record.order_id.clone()),
                Some(SAGA_NAME.to_string()),
            )
            .await;
            Ok(record)
        }
    })
    .with_compensation(move |_ctx, result, _results| {
        let orders = cancel_orders.clone();
        let publisher = cancel_publisher.clone();
        async move {
            let record: OrderRecord = serde_json::from_value(result)?;
            orders.cancel(&record.order_id).await?;
            publish_best_effort(
                publisher.as_ref(),
                "order.cancelled",
                json!({ "order_id": record.order_id }),
                Some(record.order_id.clone()),
                Some(SAGA_NAME.to_string()),
            )
            .await;
            Ok(())
        }
    })
}

fn pay_step(services: &PlaceOrderServices) -> SagaStep<OrderRequest> {
    let payments = services.payments.clone();
    let publisher = services.publisher.clone();
    let refund_payments = services.payments.clone();
    let refund_publisher = services.publisher.clone();

    SagaStep::new(STEP_PAY, move |_ctx: Arc<OrderRequest>, prior| {
        let payments = payments.clone();
        let publisher = publisher.clone();
        async move {
            let validation: Validation = prior.require(STEP_VALIDATE)?;
            let record: OrderRecord = prior.require(STEP_CREATE)?;

            // The order ID doubles as the idempotency key, so a retried
            // capture settles on the same payment.
            let capture = payments
                .capture(&record.order_id, validation.total_cents, &record.order_id)
                .await?;
            publish_best_effort(
                publisher.as_ref(),
                "payment.captured",
                json!({ "order_id": record.order_id, "payment_id": capture.payment_id }),
                Some(record.order_id.clone()),
                Some(SAGA_NAME.to_string()),
            )
            .await;
            Ok(capture)
        }
    })
    .with_compensation(move |_ctx, result, _results| {
        let payments = refund_payments.clone();
        let publisher = refund_publisher.clone();
        async move {
            let capture: PaymentCapture = serde_json::from_value(result)?;
            payments.refund(&capture.payment_id).await?;
            publish_best_effort(
                publisher.as_ref(),
                "payment.refunded",
                json!({ "payment_id": capture.payment_id }),
                None,
                Some(SAGA_NAME.to_string()),
            )
            .await;
            Ok(())
        }
    })
}

fn notify_step(services: &PlaceOrderServices) -> SagaStep<OrderRequest> {
    let notifications = services.notifications.clone();
    let publisher = services.publisher.clone();
    let cancel_notifications = services.notifications.clone();

    SagaStep::new(STEP_NOTIFY, move |ctx: Arc<OrderRequest>, prior| {
        let notifications = notifications.clone();
        let publisher = publisher.clone();
        async move {
            let record: OrderRecord = prior.require(STEP_CREATE)?;
            let receipt = notifications
                .send(
                    &ctx.customer_id,
                    &format!("order {} confirmed", record.order_id),
                )
                .await?;
            publish_best_effort(
                publisher.as_ref(),
                "order.confirmed",
                json!({ "order_id": record.order_id }),
                Some(record.order_id),
                Some(SAGA_NAME.to_string()),
            )
            .await;
            Ok(receipt)
        }
    })
    .with_compensation(move |ctx: Arc<OrderRequest>, _result, results| {
        let notifications = cancel_notifications.clone();
        async move {
            let record: OrderRecord = results.require(STEP_CREATE)?;
            notifications
                .send(
                    &ctx.customer_id,
                    &format!("order {} cancelled", record.order_id),
                )
                .await?;
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_cents() {
        let request = OrderRequest {
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
        };
        assert_eq!(request.total_cents(), 2700);
    }

    #[test]
    fn test_definition_shape() {
        use crate::publisher::InMemoryEventPublisher;
        use crate::services::{
            InMemoryNotificationService, InMemoryOrderStore, InMemoryPaymentService,
            InMemoryRestaurantService,
        };

        let definition = definition(PlaceOrderServices {
            restaurant: Arc::new(InMemoryRestaurantService::new()),
            orders: Arc::new(InMemoryOrderStore::new()),
            payments: Arc::new(InMemoryPaymentService::new()),
            notifications: Arc::new(InMemoryNotificationService::new()),
            publisher: Arc::new(InMemoryEventPublisher::new()),
        });

        assert_eq!(definition.name(), SAGA_NAME);
        assert_eq!(
            definition.step_names(),
            vec![STEP_VALIDATE, STEP_CREATE, STEP_PAY, STEP_NOTIFY]
        );
        assert!(definition.steps().iter().all(|s| s.has_compensation()));
    }
}
