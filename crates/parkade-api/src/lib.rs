//! JSON REST API for Parkade.
//!
//! Exposes an axum [`Router`] backed by any [`parkade_core::store::ParkingStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", parkade_api::api_router(store.clone()))
//! ```

pub mod capacity;
pub mod error;
pub mod lots;
pub mod spots;
pub mod status;
pub mod zones;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use parkade_core::store::ParkingStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ParkingStore + 'static,
{
  Router::new()
    // Lots
    .route("/lots", get(lots::list::<S>).post(lots::create::<S>))
    .route("/lots/{lot_id}", get(lots::get_one::<S>))
    // Zones
    .route(
      "/lots/{lot_id}/zones",
      get(zones::list::<S>).post(zones::create::<S>),
    )
    // Capacity
    .route(
      "/lots/{lot_id}/capacity",
      get(capacity::summary::<S>).put(capacity::sync::<S>),
    )
    // Spots
    .route("/lots/{lot_id}/spots/{number}/state", put(spots::set_state::<S>))
    // Subscriptions and status
    .route("/lots/{lot_id}/sweep", post(status::sweep::<S>))
    .route("/lots/{lot_id}/status", get(status::project::<S>))
    .with_state(store)
}
