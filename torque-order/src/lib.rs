//! Maintenance order workflow.
//!
//! [`OrderService`] owns the order lifecycle: idempotent creation keyed by
//! a client-supplied request id, status transitions, and cancellation with
//! stock restoration. It composes the repository traits from `torque-core`
//! with the image storage capability from `torque-storage`.

pub mod service;

pub use service::{CreateOrderInput, ImagePayload, OrderError, OrderLineRequest, OrderService};
