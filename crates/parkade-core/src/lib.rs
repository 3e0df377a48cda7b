//! Core types, store traits, and inventory operations for Parkade.
//!
//! This crate has no HTTP or database dependencies. The
//! operations in [`provision`], [`reconcile`], [`sweep`] and [`projection`]
//! are generic over the store traits in [`store`]; backends such as
//! `parkade-store-sqlite` implement those traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod lot;
pub mod occupation;
pub mod operator;
pub mod projection;
pub mod provision;
pub mod reconcile;
pub mod spot;
pub mod store;
pub mod subscription;
pub mod sweep;
pub mod zone;

pub use error::{Error, ErrorKind, Result};
pub use lot::LotId;
