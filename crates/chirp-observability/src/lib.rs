//! Chirp Observability
//!
//! This crate provides:
//! - Metrics collection (Prometheus)
//! - Health endpoints (`/healthz`, `/readyz`, `/metrics`)

pub mod health;
pub mod metrics;

pub use health::{
    ComponentStatus, HealthResponse, HealthState, ReadinessChecker, ReadinessResponse,
    health_router,
};
pub use metrics::{DeleteRejection, LoginOutcome, Metrics};
