//! Cart commands and the order summary.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use shopcart_core::{CartError, CartState, ProductId, ProductRef, QuantityChange, format_money, format_percent};
use shopcart_storefront::cart::{CartStore, SyncMode};

/// Add one unit of a product.
pub fn add(
    store: &CartStore,
    id: String,
    name: String,
    price: Decimal,
    image: Option<String>,
) -> Result<(), CartError> {
    let mut product = ProductRef::new(id, name, price);
    if let Some(image) = image {
        product = product.with_image(image);
    }
    store.add_item(&product)?;
    println!("Added {}", product.name);
    Ok(())
}

pub fn increment(store: &CartStore, id: &ProductId) {
    change(store, id, QuantityChange::Increment);
}

pub fn decrement(store: &CartStore, id: &ProductId) {
    change(store, id, QuantityChange::Decrement);
}

fn change(store: &CartStore, id: &ProductId, change: QuantityChange) {
    if store.state().item(id).is_none() {
        eprintln!("warning: {id} is not in the cart");
        return;
    }
    store.change_quantity(id, change);
}

pub fn print_summary(state: &CartState, mode: SyncMode) {
    print!("{}", summary(state, mode));
}

/// Render the cart lines followed by the order summary block.
fn summary(state: &CartState, mode: SyncMode) -> String {
    let mut out = String::new();
    let owner = match mode {
        SyncMode::AnonymousLocal => "guest",
        SyncMode::AuthenticatedSyncing => "signed in",
    };

    if state.is_empty() {
        let _ = writeln!(out, "Cart ({owner}) is empty");
    } else {
        let _ = writeln!(out, "Cart ({owner})");
        for item in state.items() {
            let _ = writeln!(
                out,
                "  {} x {} [{}]  {} each  {}",
                item.quantity,
                item.name,
                item.id,
                format_money(item.unit_price),
                format_money(item.line_total())
            );
        }
    }

    let totals = state.totals();
    let _ = writeln!(out, "Selected Items: {}", totals.selected_item_count);
    let _ = writeln!(out, "Total Price: {}", format_money(totals.subtotal));
    let _ = writeln!(
        out,
        "Tax ({}): {}",
        format_percent(state.tax_rate()),
        format_money(totals.tax)
    );
    let _ = writeln!(out, "Grand Total: {}", format_money(totals.grand_total));
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_block() {
        let shirt = ProductRef::new("A", "Shirt", Decimal::new(100, 0));
        let hat = ProductRef::new("B", "Hat", Decimal::new(50, 0));
        let state = CartState::default()
            .with_item_added(&shirt)
            .and_then(|cart| cart.with_item_added(&shirt))
            .and_then(|cart| cart.with_item_added(&hat))
            .unwrap();

        let text = summary(&state, SyncMode::AuthenticatedSyncing);
        assert!(text.starts_with("Cart (signed in)\n"));
        assert!(text.contains("  2 x Shirt [A]  $100.00 each  $200.00\n"));
        assert!(text.ends_with(
            "Selected Items: 3\nTotal Price: $250.00\nTax (5%): $12.50\nGrand Total: $262.50\n"
        ));
    }

    #[test]
    fn test_empty_summary() {
        let text = summary(&CartState::default(), SyncMode::AnonymousLocal);
        assert!(text.starts_with("Cart (guest) is empty\n"));
        assert!(text.contains("Grand Total: $0.00"));
    }
}
