//! Core types for Shopcart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod money;

pub use cart::{
    CartError, CartLineItem, CartState, CartTotals, DecrementPolicy, ProductRef, QuantityChange,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{DEFAULT_TAX_RATE, format_money, format_percent};
