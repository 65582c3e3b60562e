//! # Fleetops Runtime
//!
//! The imperative shell around `fleetops-core`.
//!
//! ## Core Components
//!
//! - **`EventHub`**: tenant-scoped, non-blocking fan-out of change notifications
//!   with slow-consumer eviction
//! - **`CargoLifecycle`**: transactional cargo state machine coupled to truck status
//! - **`CargoLedger`**: read side of the append-only cargo history
//! - **`TrackingService`**: tracking views, truck manifests and nearby search
//! - **`TruckTelemetry`**: truck position reports
//!
//! ## Example
//!
//! ```ignore
//! use fleetops_runtime::{CargoLifecycle, EventHub, HubConfig};
//! use fleetops_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let hub = EventHub::new(HubConfig::default());
//! let lifecycle = CargoLifecycle::new(store, hub.clone(), Arc::new(SystemClock));
//!
//! let mut subscription = hub.subscribe(actor.tenant_id);
//! let cargo = lifecycle.create(&actor, draft).await?;
//! let created = subscription.recv().await;
//! ```

/// Tenant-scoped fan-out of change notifications
pub mod hub;

/// Cargo lifecycle service
pub mod lifecycle;

/// Cargo history queries
pub mod ledger;

/// Tracking views and fleet queries
pub mod tracking;

/// Truck position reports
pub mod telemetry;

/// Readiness reporting
pub mod health;

/// Prometheus metrics for observability
pub mod metrics;

pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use hub::{DeliveryReport, EventHub, HubConfig, Observer, ObserverId, Subscription};
pub use ledger::CargoLedger;
pub use lifecycle::CargoLifecycle;
pub use tracking::{TrackingConfig, TrackingService, TrackingView};
pub use telemetry::{TelemetryFix, TruckTelemetry};
