//! Shopcart CLI - a terminal storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Add two shirts and a hat while signed out
//! shopcart add --id A --name Shirt --price 100
//! shopcart inc A
//! shopcart add --id B --name Hat --price 50
//!
//! # Sign in; the anonymous cart is merged into the user's backend cart
//! shopcart login --user 64f1c2 --token "$TOKEN"
//!
//! # Place a cash-on-delivery order
//! shopcart checkout --first-name Ada --last-name Lovelace --email ada@example.com \
//!     --street "12 Analytical Way" --city London --state "Greater London" \
//!     --zipcode "N1 9GU" --country UK --phone "+44 20 7946 0000"
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add`, `remove`, `inc`, `dec`, `clear` - Change the cart
//! - `login`, `logout` - Start or end a session
//! - `resync` - Push the cart to the backend and adopt its answer
//! - `checkout` - Place an order for the signed-in cart
//!
//! Configuration comes from `SHOPCART_*` environment variables (a `.env` file
//! is honoured). Cart and session files live in `SHOPCART_DATA_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]
// A terminal client: stdout is the user interface.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use shopcart_core::ProductId;
use shopcart_storefront::config::StorefrontConfig;
use shopcart_storefront::error::ShopcartError;
use shopcart_storefront::state::Storefront;
use shopcart_storefront::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "shopcart")]
#[command(author, version, about = "Shopcart storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart and its totals
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        #[arg(long)]
        id: String,

        /// Product display name
        #[arg(long)]
        name: String,

        /// Unit price, e.g. 19.99
        #[arg(long)]
        price: Decimal,

        /// Product image URL
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove a product's line
    Remove { id: String },
    /// Increase a product's quantity by one
    Inc { id: String },
    /// Decrease a product's quantity by one
    Dec { id: String },
    /// Empty the cart
    Clear,
    /// Start a session and switch to the user's cart
    Login {
        /// Backend user ID
        #[arg(short, long)]
        user: String,

        /// Bearer token issued by the backend
        #[arg(short, long)]
        token: String,
    },
    /// End the session
    Logout,
    /// Push the cart to the backend now
    Resync,
    /// Place an order for the signed-in cart
    Checkout(commands::checkout::CheckoutArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _sentry_guard = telemetry::init(&config);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let e = e.reported();
            tracing::debug!(error = %e, "Command failed");
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), ShopcartError> {
    let shop = Storefront::new(config)?;
    let mut notices = shop.store().subscribe();
    shop.resume().await?;

    let store = shop.store();
    match cli.command {
        Commands::Show => {}
        Commands::Add {
            id,
            name,
            price,
            image,
        } => commands::cart::add(store, id, name, price, image)?,
        Commands::Remove { id } => {
            store.remove_item(&ProductId::new(id));
        }
        Commands::Inc { id } => commands::cart::increment(store, &ProductId::new(id)),
        Commands::Dec { id } => commands::cart::decrement(store, &ProductId::new(id)),
        Commands::Clear => {
            store.clear();
        }
        Commands::Login { user, token } => commands::session::login(&shop, user, token).await?,
        Commands::Logout => commands::session::logout(&shop)?,
        Commands::Resync => commands::session::resync(&shop).await?,
        Commands::Checkout(args) => {
            let payment = args.payment;
            let receipt = shop.place_order(&args.into_delivery(), payment).await?;
            commands::checkout::print_receipt(&receipt, payment);
        }
    }

    // Pushes run in the background; let them land before the process exits.
    store.flush().await;
    commands::print_notices(&mut notices);
    commands::cart::print_summary(&store.state(), store.mode());
    Ok(())
}

