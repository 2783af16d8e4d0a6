//! `rig update-checksum`

use std::path::Path;

use anyhow::{Context, Result};
use rig_core::{BackfillOptions, ChecksumBackfillController};

/// Fill the checksum manifest of the resolved config, and of the global
/// configs with `--all`.
pub async fn update_checksum(config: Option<&Path>, opts: BackfillOptions) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    ChecksumBackfillController::new()
        .with_cancellation(super::cancel_on_ctrl_c())
        .update_checksum(&cwd, config, opts)
        .await?;
    Ok(())
}
