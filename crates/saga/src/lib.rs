//! Saga orchestration engine.
//!
//! This crate coordinates multi-step business transactions: a registered
//! saga definition is an ordered list of steps with execute/compensate
//! pairs, and every execution either completes all steps or unwinds the
//! completed ones through their compensations in reverse order. Each
//! step runs under per-attempt timeout and retry with backoff; circuit
//! breaking is deliberately left to the services a step calls (see the
//! `resilience` crate).
//!
//! Executions are tracked in an in-memory registry only. There is no
//! durable saga log: an in-flight execution is lost on process crash,
//! with no recovery. That limitation is part of the design, not an
//! oversight to patch around.

pub mod definition;
pub mod error;
pub mod execution;
pub mod orchestrator;
pub mod place_order;
pub mod publisher;
pub mod registry;
pub mod services;
pub mod state;
pub mod step;

pub use definition::SagaDefinition;
pub use error::SagaError;
pub use execution::{CompensationFailure, SagaExecution, SagaResult};
pub use orchestrator::SagaOrchestrator;
pub use publisher::{EventPublisher, InMemoryEventPublisher, PublishedEvent};
pub use registry::ExecutionRegistry;
pub use state::ExecutionStatus;
pub use step::{SagaStep, StepResults};
