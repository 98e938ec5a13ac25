//! Command implementations and terminal output.

pub mod cart;
pub mod checkout;
pub mod session;

use shopcart_storefront::cart::CartNotice;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Print warnings for failure notices published while the command ran.
pub fn print_notices(notices: &mut broadcast::Receiver<CartNotice>) {
    for notice in drain_failures(notices) {
        eprintln!("warning: {}", notice.user_message());
    }
}

/// Failure notices still queued, oldest first. Notices dropped because the
/// receiver fell behind are skipped, not the ones after them.
fn drain_failures(notices: &mut broadcast::Receiver<CartNotice>) -> Vec<CartNotice> {
    let mut failures = Vec::new();
    loop {
        match notices.try_recv() {
            Ok(notice) if notice.is_failure() => failures.push(notice),
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Cart notices dropped before they were printed");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_after_lag_are_kept() {
        let (tx, mut rx) = broadcast::channel(2);
        for _ in 0..5 {
            tx.send(CartNotice::Synced { item_count: 1 }).ok();
        }
        tx.send(CartNotice::SyncFailed {
            message: "backend down".to_string(),
        })
        .ok();
        tx.send(CartNotice::StorageFailed {
            message: "disk full".to_string(),
        })
        .ok();

        let failures = drain_failures(&mut rx);
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures.first(), Some(CartNotice::SyncFailed { .. })));
        assert!(matches!(failures.get(1), Some(CartNotice::StorageFailed { .. })));
    }
}
