//! Shopcart storefront client library.
//!
//! Keeps a shopping cart consistent across local storage, an in-memory store
//! and the backend's per-user cart.
//!
//! # Architecture
//!
//! - [`cart::CartStore`] is the single source of truth for cart contents
//! - [`storage`] persists one cart slot per user, plus an anonymous slot
//! - [`remote::HttpCartClient`] talks to the backend's `/cart` and `/orders`
//! - [`session::SessionProvider`] publishes sign-in and sign-out transitions
//! - [`state::Storefront`] wires everything from a [`config::StorefrontConfig`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod state;
pub mod storage;
pub mod telemetry;
