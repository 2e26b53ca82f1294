//! Watcher glue: filesystem events into sync cycles
//!
//! The debouncer coalesces raw notifications into change events on a
//! single-producer channel; the handler loop is the single consumer and
//! runs one full sync cycle per event. A successful cycle is signalled on
//! the done channel; a failed cycle is terminal, because the per-cycle
//! caches cannot be resumed mid-stream.

use crate::error::{Error, Result};
use crate::service::SyncClient;
use crate::vfs::VirtualFilesystem;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// A coalesced change notification; carries no detail because every
/// cycle rescans the whole tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent;

/// Keeps the underlying watcher alive; dropping it stops event delivery
pub struct WatcherHandle {
    _debouncer: notify_debouncer_full::Debouncer<
        notify::RecommendedWatcher,
        notify_debouncer_full::FileIdMap,
    >,
}

/// Watch a directory tree recursively, delivering debounced change
/// events into the returned channel. The handle must outlive the loop
/// consuming the events.
pub fn spawn_watcher(
    root: &Path,
    debounce: Duration,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<ChangeEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                if events.iter().any(is_relevant) {
                    // the receiver dropping just means the loop is done
                    let _ = tx.send(ChangeEvent);
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(error = %error, "watch error");
                }
            }
        }
    })
    .map_err(|e| Error::watch(format!("creating watcher: {e}")))?;

    debouncer
        .watcher()
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| Error::watch(format!("watching {}: {e}", root.display())))?;
    debouncer.cache().add_root(root, RecursiveMode::Recursive);

    tracing::info!(root = %root.display(), "watching for changes");
    Ok((WatcherHandle { _debouncer: debouncer }, rx))
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    use notify::EventKind;
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Consume change events, running one sync cycle per event. Every
/// successful cycle is signalled on `done`; the first failing cycle ends
/// the loop with the error, and dropping `done` tells listeners the loop
/// is over.
pub async fn watch_loop<F: VirtualFilesystem>(
    client: &mut SyncClient<F>,
    events: &mut mpsc::UnboundedReceiver<ChangeEvent>,
    done: mpsc::UnboundedSender<()>,
) -> Result<()> {
    while let Some(ChangeEvent) = events.recv().await {
        match client.sync_cycle().await {
            Ok(stats) => {
                tracing::debug!(commands = stats.commands, "change synchronized");
                // nobody listening on done is fine
                let _ = done.send(());
            }
            Err(e) => {
                tracing::error!(error = %e, "sync cycle failed, stopping watch loop");
                return Err(e);
            }
        }
    }
    Ok(())
}
