//! Checkout command.

use clap::Args;
use shopcart_storefront::checkout::{DeliveryInfo, OrderReceipt, PaymentMethod};

/// Delivery details and payment choice for `shopcart checkout`.
#[derive(Debug, Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub street: String,
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub state: String,
    #[arg(long)]
    pub zipcode: String,
    #[arg(long)]
    pub country: String,
    #[arg(long)]
    pub phone: String,

    /// Payment method (`cod`, `stripe`, `razorpay`)
    #[arg(long, default_value_t = PaymentMethod::Cod)]
    pub payment: PaymentMethod,
}

impl CheckoutArgs {
    pub fn into_delivery(self) -> DeliveryInfo {
        DeliveryInfo {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            street: self.street,
            city: self.city,
            state: self.state,
            zipcode: self.zipcode,
            country: self.country,
            phone: self.phone,
        }
    }
}

pub fn print_receipt(receipt: &OrderReceipt, payment: PaymentMethod) {
    match &receipt.order_id {
        Some(id) => println!("Order {id} placed ({payment})"),
        None => println!("Order placed ({payment})"),
    }
    if let Some(message) = &receipt.message {
        println!("{message}");
    }
}
