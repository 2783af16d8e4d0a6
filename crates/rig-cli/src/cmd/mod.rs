//! Subcommand implementations.

pub mod install;
pub mod update_checksum;

use tokio_util::sync::CancellationToken;

/// A token cancelled on Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            child.cancel();
        }
    });
    token
}
