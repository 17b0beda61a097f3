//! # Release delivery for a freshly connected worker.
//!
//! Step one of the post-connect handshake: establish the control channel,
//! fetch the release artifact, push it to the worker, and invoke the
//! worker's entry point. The worker then performs step two on its own by
//! calling [`Overseer::pair`](crate::Overseer::pair) with its control
//! endpoint.
//!
//! This sequence runs on a background task spawned by the controller; its
//! outcome is posted back into the controller mailbox, never applied
//! directly. Failures here are retryable: the controller re-drives the
//! sequence with backoff until its retry budget runs out.

use std::sync::Arc;

use crate::adapters::Adapter;
use crate::error::LoadError;
use crate::labor::Labor;
use crate::release::{self, Release};

/// Runs one delivery attempt against `labor`.
///
/// Remote artifacts are staged locally first and the staging copy is
/// removed once the push completes, successful or not.
pub(crate) async fn load_release(
    adapter: Arc<dyn Adapter>,
    release: Arc<Release>,
    labor: Labor,
) -> Result<(), LoadError> {
    adapter.connect(&labor).await?;

    let staged = release::fetch(&release.source).await?;
    let pushed = adapter.push_release(&labor, staged.path()).await;
    staged.cleanup().await;
    pushed?;

    adapter
        .start_release(&labor, release.entry_point.as_ref())
        .await?;
    Ok(())
}
