//! HTTP and websocket surface for fleetops.
//!
//! A thin imperative shell over `fleetops-runtime`: handlers extract the
//! caller and the request body, call one runtime operation, and map the
//! result (or [`LifecycleError`](fleetops_core::lifecycle::LifecycleError))
//! to a response.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, websockets
//! │  - Actor from gateway headers           │  ← correlation id, CORS, gzip
//! │  - Request parsing / error mapping      │
//! ├─────────────────────────────────────────┤
//! │         fleetops-runtime                │
//! │  - CargoLifecycle, TrackingService      │  ← transactions, EventHub
//! ├─────────────────────────────────────────┤
//! │         fleetops-core                   │
//! │  - CargoReducer                         │  ← pure, no I/O
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. The correlation layer opens a span and assigns a correlation id
//! 2. [`Actor`] reads the tenant, user and role the gateway verified
//! 3. The handler calls the runtime service
//! 4. Committed changes are broadcast to the tenant's websocket observers
//! 5. The result, or an [`AppError`], becomes the response
//!
//! # Example
//!
//! ```ignore
//! use fleetops_web::{build_router, AppState};
//!
//! let state = AppState::new(store, EventHub::default(), Arc::new(SystemClock), TrackingConfig::default());
//! axum::serve(listener, build_router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use extractors::{Actor, CorrelationId, TENANT_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};
pub use router::{api_router, build_router};
pub use state::AppState;
