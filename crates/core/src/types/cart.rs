//! Cart line items, cart state and the pure transitions between states.
//!
//! A [`CartState`] stores only its line items and tax rate. The selected item
//! count, subtotal, tax and grand total are computed from the items every time
//! they are read, so no transition can leave a stale total behind.
//!
//! Transitions are copy-on-write: each `with_*` method borrows the current
//! state and returns the next one. Callers holding an older snapshot never
//! observe a mutation.
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use shopcart_core::{CartState, ProductRef, QuantityChange, DecrementPolicy};
//!
//! let shirt = ProductRef::new("A", "Linen shirt", Decimal::new(100, 0));
//! let cart = CartState::default()
//!     .with_item_added(&shirt)?
//!     .with_item_added(&shirt)?;
//!
//! assert_eq!(cart.items().len(), 1);
//! assert_eq!(cart.selected_item_count(), 2);
//! assert_eq!(cart.grand_total(), Decimal::new(210, 0));
//!
//! let cart = cart.with_quantity_changed(
//!     &"A".into(),
//!     QuantityChange::Decrement,
//!     DecrementPolicy::FloorAtOne,
//! );
//! assert_eq!(cart.subtotal(), Decimal::new(100, 0));
//! # Ok::<(), shopcart_core::CartError>(())
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::money::DEFAULT_TAX_RATE;

/// Errors raised by cart transitions.
///
/// A rejected transition never changes the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product reference cannot become a line item.
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// Tax rate outside `0 <= rate < 1`.
    #[error("invalid tax rate {0}: must be at least 0 and below 1")]
    InvalidTaxRate(Decimal),
}

/// A catalog product as handed to the cart by the product pages.
///
/// Only the fields the cart snapshots at add-time are kept; the wire names
/// match the backend's product documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(
        rename = "image",
        alias = "image1",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<String>,
}

impl ProductRef {
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            image_ref: None,
        }
    }

    /// Attach a display image reference.
    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    fn validate(&self) -> Result<(), CartError> {
        if self.id.is_blank() {
            return Err(CartError::InvalidProduct("missing product id".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(CartError::InvalidProduct(format!(
                "product {} has no name",
                self.id
            )));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(CartError::InvalidProduct(format!(
                "product {} has non-positive price {}",
                self.id, self.unit_price
            )));
        }
        Ok(())
    }
}

/// One product entry in the cart.
///
/// `name`, `unit_price` and `image_ref` are captured when the product is
/// first added and are not refreshed from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(
        rename = "image",
        alias = "image1",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<String>,
    /// Always at least 1 inside a [`CartState`].
    pub quantity: u32,
}

impl CartLineItem {
    /// `quantity × unit_price`, saturating at [`Decimal::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }

    fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Whether a line loaded from storage or the backend may enter a cart.
    fn is_admissible(&self) -> bool {
        self.quantity > 0 && !self.id.is_blank() && self.unit_price > Decimal::ZERO
    }

    fn from_product(product: &ProductRef) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            image_ref: product.image_ref.clone(),
            quantity: 1,
        }
    }
}

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityChange {
    Increment,
    Decrement,
}

/// What a decrement does to a line item whose quantity is already 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecrementPolicy {
    /// Quantity stays at 1; removal is only possible through an explicit remove.
    #[default]
    FloorAtOne,
    /// The line item is removed.
    RemoveAtZero,
}

/// Totals derived from a cart's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub selected_item_count: u64,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
}

/// The cart: ordered line items plus the tax rate applied to them.
///
/// Item order is insertion order and doubles as display order. Product IDs
/// are unique, every quantity is at least 1, every price is positive and the
/// grand total fits in a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    items: Vec<CartLineItem>,
    tax_rate: Decimal,
}

impl Default for CartState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            tax_rate: DEFAULT_TAX_RATE,
        }
    }
}

impl CartState {
    /// Create an empty cart with the given tax rate.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidTaxRate`] unless `0 <= tax_rate < 1`.
    pub fn new(tax_rate: Decimal) -> Result<Self, CartError> {
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(CartError::InvalidTaxRate(tax_rate));
        }
        Ok(Self {
            items: Vec::new(),
            tax_rate,
        })
    }

    /// Replace the items of this cart with ones loaded from storage or the
    /// backend.
    ///
    /// Loaded data is untrusted: lines with quantity 0, a blank id, a price
    /// of zero or less, or an amount that would overflow the totals are
    /// dropped. Repeated product IDs are folded into the first occurrence.
    #[must_use]
    pub fn with_items(&self, items: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut next = self.cleared();
        for item in items {
            if item.is_admissible() {
                next.absorb(item);
            }
        }
        next
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    #[must_use]
    pub const fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up the line item for a product.
    #[must_use]
    pub fn item(&self, id: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn selected_item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of `quantity × unit_price` over all items.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.totals().subtotal
    }

    #[must_use]
    pub fn tax(&self) -> Decimal {
        self.totals().tax
    }

    #[must_use]
    pub fn grand_total(&self) -> Decimal {
        self.totals().grand_total
    }

    /// All derived totals in one pass.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        // Transitions refuse lines that would overflow, so nothing saturates here.
        let subtotal = self.checked_subtotal().unwrap_or(Decimal::MAX);
        let tax = subtotal.saturating_mul(self.tax_rate);
        CartTotals {
            selected_item_count: self.selected_item_count(),
            subtotal,
            tax,
            grand_total: subtotal.saturating_add(tax),
        }
    }

    fn checked_subtotal(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |sum, item| {
            sum.checked_add(item.checked_line_total()?)
        })
    }

    /// Add one unit of a product.
    ///
    /// An existing line for the same product gets its quantity incremented;
    /// otherwise a new line with quantity 1 is appended.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidProduct`] for a blank id or name, a price
    /// that is not strictly positive, or one more unit that would overflow
    /// the cart total.
    pub fn with_item_added(&self, product: &ProductRef) -> Result<Self, CartError> {
        product.validate()?;
        let mut next = self.clone();
        if !next.absorb(CartLineItem::from_product(product)) {
            return Err(CartError::InvalidProduct(format!(
                "one more {} would overflow the cart total",
                product.id
            )));
        }
        Ok(next)
    }

    /// Remove the line for a product. Absent products are a no-op.
    #[must_use]
    pub fn with_item_removed(&self, id: &ProductId) -> Self {
        let mut next = self.clone();
        next.items.retain(|item| &item.id != id);
        next
    }

    /// Increment or decrement the quantity of a product's line.
    ///
    /// Absent products are a no-op, as is an increment that would overflow
    /// the cart total. A decrement at quantity 1 follows `policy`; the
    /// quantity never reaches 0.
    #[must_use]
    pub fn with_quantity_changed(
        &self,
        id: &ProductId,
        change: QuantityChange,
        policy: DecrementPolicy,
    ) -> Self {
        let mut next = self.clone();
        let Some(pos) = next.items.iter().position(|item| &item.id == id) else {
            return next;
        };

        match (change, next.items.get(pos).map(|item| item.quantity)) {
            (QuantityChange::Decrement, Some(1)) => {
                if policy == DecrementPolicy::RemoveAtZero {
                    next.items.remove(pos);
                }
            }
            (_, None) => {}
            (QuantityChange::Increment, Some(_)) => {
                if let Some(item) = next.items.get(pos).cloned() {
                    next.absorb(CartLineItem { quantity: 1, ..item });
                }
            }
            (QuantityChange::Decrement, Some(_)) => {
                if let Some(item) = next.items.get_mut(pos) {
                    item.quantity -= 1;
                }
            }
        }
        next
    }

    /// An empty cart with the same tax rate.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self {
            items: Vec::new(),
            tax_rate: self.tax_rate,
        }
    }

    /// Union this cart with another list of items.
    ///
    /// Lines for the same product have their quantities summed and keep this
    /// cart's price snapshot; products only present in `other` are appended
    /// in their original order. Lines [`with_items`](Self::with_items) would
    /// drop are skipped.
    #[must_use]
    pub fn merged_with(&self, other: &[CartLineItem]) -> Self {
        let mut next = self.clone();
        for item in other {
            if item.is_admissible() {
                next.absorb(item.clone());
            }
        }
        next
    }

    /// Fold a line into the cart. Returns `false`, leaving the cart as it
    /// was, if the quantity or the grand total would overflow.
    fn absorb(&mut self, incoming: CartLineItem) -> bool {
        let Some(subtotal) = self.checked_subtotal() else {
            return false;
        };
        let tax_rate = self.tax_rate;
        let fits = |unit_price: Decimal, quantity: u32| {
            unit_price
                .checked_mul(Decimal::from(quantity))
                .and_then(|added| subtotal.checked_add(added))
                .and_then(|subtotal| subtotal.checked_add(subtotal.checked_mul(tax_rate)?))
                .is_some()
        };

        match self.items.iter_mut().find(|item| item.id == incoming.id) {
            Some(existing) => {
                let Some(quantity) = existing.quantity.checked_add(incoming.quantity) else {
                    return false;
                };
                if !fits(existing.unit_price, incoming.quantity) {
                    return false;
                }
                existing.quantity = quantity;
            }
            None => {
                if !fits(incoming.unit_price, incoming.quantity) {
                    return false;
                }
                self.items.push(incoming);
            }
        }
        true
    }
}
