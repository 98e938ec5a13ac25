//! Session commands.

use shopcart_storefront::error::ShopcartError;
use shopcart_storefront::session::AuthSession;
use shopcart_storefront::state::Storefront;

/// Sign in and merge the local cart as configured.
pub async fn login(shop: &Storefront, user: String, token: String) -> Result<(), ShopcartError> {
    let session = AuthSession::new(user, token);
    let user_id = session.user_id().clone();
    shop.login(session).await?;
    println!("Signed in as {user_id}");
    Ok(())
}

/// Sign out. The backend keeps the user's cart for next time.
pub fn logout(shop: &Storefront) -> Result<(), ShopcartError> {
    if shop.store().session().is_none() {
        println!("Not signed in");
        return Ok(());
    }
    shop.logout()?;
    println!("Signed out");
    Ok(())
}

pub async fn resync(shop: &Storefront) -> Result<(), ShopcartError> {
    if shop.store().session().is_none() {
        println!("Not signed in; the cart is only stored on this device");
        return Ok(());
    }
    shop.store().resync().await?;
    println!("Cart synced");
    Ok(())
}
