//! Collaborator service traits and in-memory implementations for saga
//! steps.
//!
//! These are the domain dependencies the `place_order` saga calls out
//! to. Each comes as a trait plus an in-memory fake with failure
//! toggles for tests and local runs.

pub mod notification;
pub mod orders;
pub mod payment;
pub mod resilient;
pub mod restaurant;

pub use notification::{InMemoryNotificationService, NotificationReceipt, NotificationService};
pub use orders::{InMemoryOrderStore, OrderRecord, OrderStore};
pub use payment::{InMemoryPaymentService, PaymentCapture, PaymentService};
pub use resilient::ResilientPaymentService;
pub use restaurant::{InMemoryRestaurantService, KitchenHold, RestaurantService};
