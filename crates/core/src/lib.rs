//! Shopcart Core - Shared types library.
//!
//! This crate provides the types used across all Shopcart components:
//! - `storefront` - Cart store, backend client and local persistence
//! - `cli` - Terminal storefront client
//!
//! # Architecture
//!
//! The core crate contains only types and pure transitions - no I/O, no
//! storage, no HTTP clients. Every cart mutation is a function from one
//! [`CartState`] to the next, which keeps the totals impossible to desync.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money and cart state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
