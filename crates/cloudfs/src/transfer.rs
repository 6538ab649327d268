//! Move/rename orchestration.
//!
//! A backend with atomic rename gets one call. Everyone else gets the
//! long way around: optionally lease the source, start a server-side
//! copy, poll its status at a fixed interval until it leaves Pending,
//! then delete the source. The poll is bounded — an unbounded wait on an
//! eventually-consistent backend is a hang, not a feature. The lease is
//! released in a final step no matter how the copy went, and a failed
//! release never masks the primary outcome.

use diagnostics::{log_debug, log_info, log_warn};
use tokio_util::sync::CancellationToken;

use crate::backend::{CopyState, ObjectBackend};
use crate::config::FileStoreOptions;
use crate::error::{Error, Result};
use crate::path;

pub(crate) async fn move_object(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    cancel: &CancellationToken,
    old_abs: &[String],
    new_abs: &[String],
) -> Result<()> {
    let caps = backend.capabilities();
    if caps.hierarchical && new_abs.len() > 1 {
        ensure_directory_path(backend, &new_abs[..new_abs.len() - 1]).await?;
    }

    let src = path::join(old_abs);
    let dest = path::join(new_abs);

    if caps.supports_atomic_rename {
        backend.rename_object(&src, &dest).await?;
        log_info!("renamed {src} to {dest}");
        return Ok(());
    }

    let lease = if caps.supports_lease {
        Some(backend.acquire_lease(&src).await?)
    } else {
        None
    };

    let outcome = copy_until_terminal(backend, options, cancel, &src, &dest).await;

    // Best-effort release, attempted regardless of how the copy ended.
    // A release failure is logged and swallowed so it cannot mask the
    // primary result.
    if let Some(lease) = lease {
        if let Err(err) = backend.release_lease(&src, &lease).await {
            let err = err.to_string();
            log_warn!("lease release on {src} failed: {err}", #[emit::as_display] err);
        }
    }

    outcome?;
    backend.delete_object(&src).await?;
    log_info!("moved {src} to {dest}");
    Ok(())
}

/// Issues the copy and, where the backend reports copy progress, polls at
/// the configured interval until a terminal state — bounded by the
/// configured timeout and by the cancellation token.
async fn copy_until_terminal(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    cancel: &CancellationToken,
    src: &str,
    dest: &str,
) -> Result<()> {
    backend.copy_object(src, dest).await?;
    if !backend.capabilities().supports_copy_status {
        // The copy call itself was terminal.
        return Ok(());
    }

    let started = tokio::time::Instant::now();
    loop {
        match backend.copy_status(dest).await? {
            CopyState::Success => return Ok(()),
            CopyState::Failed(description) | CopyState::Aborted(description) => {
                return Err(Error::CopyFailed(description));
            }
            CopyState::Pending => {
                let waited = started.elapsed();
                if waited >= options.copy_poll_timeout {
                    return Err(Error::ConsistencyTimeout {
                        key: dest.to_string(),
                        waited,
                    });
                }
                log_debug!("copy of {dest} still pending");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(options.copy_poll_interval) => {}
                }
            }
        }
    }
}

/// Creates every missing level of a destination directory path, in order.
///
/// The walk is iterative by design: one idempotent create per segment,
/// bounded stack depth, easy to cancel between levels. A segment created
/// concurrently by someone else reports `AlreadyExists` and counts as
/// success; a segment occupied by a file is a conflict the caller must
/// resolve.
pub(crate) async fn ensure_directory_path(
    backend: &dyn ObjectBackend,
    segments: &[String],
) -> Result<()> {
    for depth in 1..=segments.len() {
        let key = path::join(&segments[..depth]);
        match backend.object_metadata(&key).await? {
            Some(meta) if meta.is_directory => continue,
            Some(_) => {
                return Err(Error::conflict(key, "path segment exists but is a file"));
            }
            None => match backend.make_directory(&key).await {
                Ok(()) => log_debug!("created directory {key}"),
                Err(Error::AlreadyExists(_)) => {}
                Err(err) => return Err(err),
            },
        }
    }
    Ok(())
}
