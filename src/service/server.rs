//! The server side of the sync service
//!
//! The server holds the tree being mirrored and the content cache that
//! outlives individual cycles: hash references in a push resolve against
//! content the manifest pass revealed, in this cycle or an earlier one.
//! Each accepted connection is served by its own task; the cache sits
//! behind a mutex so manifest production and command application never
//! interleave their mutations.

use super::{framed, recv_frame, send_frame, ClientFrame, FramedStream, ServerFrame};
use crate::cache::BlockCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::signature::HashGenerator;
use crate::sync::apply_commands;
use crate::types::AdjustmentCommand;
use crate::vfs::{list_server_files, VirtualFilesystem};
use crate::wire::WireHashedFile;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

/// The sync service server. Cloning yields another handle onto the same
/// tree, cache, and shutdown signal.
pub struct SyncServer<F> {
    config: Config,
    fs: F,
    content_cache: Arc<Mutex<BlockCache>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<F> Clone for SyncServer<F>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            fs: self.fs.clone(),
            content_cache: Arc::clone(&self.content_cache),
            shutdown_tx: self.shutdown_tx.clone(),
            shutdown_rx: self.shutdown_rx.clone(),
        }
    }
}

impl<F> SyncServer<F>
where
    F: VirtualFilesystem + Clone + Send + Sync + 'static,
{
    pub fn new(config: Config, fs: F) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            fs,
            content_cache: Arc::new(Mutex::new(BlockCache::new())),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind the configured address and serve until [`SyncServer::stop`]
    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.address)
            .await
            .map_err(|e| Error::transport(format!("binding {}: {e}", self.config.address)))?;
        tracing::info!(address = %self.config.address, "server listening");
        self.serve_on(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        let mut tasks = JoinSet::new();
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted
                        .map_err(|e| Error::transport(format!("accepting connection: {e}")))?;
                    tracing::debug!(%peer, "connection accepted");
                    let server = self.clone();
                    tasks.spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            tracing::warn!(%peer, error = %e, "connection failed");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        // graceful stop: let in-flight connections finish
        tracing::info!("server stopping, waiting for in-flight connections");
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    /// Signal the accept loop to stop taking connections
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Serve one connection until the client hangs up. A connection can
    /// carry any number of sync cycles, each a pull followed by a push.
    async fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let mut stream = framed(stream);
        let mut shutdown = self.shutdown_rx.clone();
        let mut pending: Vec<AdjustmentCommand> = Vec::new();

        loop {
            let frame = tokio::select! {
                frame = recv_frame::<ClientFrame>(&mut stream) => frame?,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                    continue;
                }
            };

            match frame {
                None => return Ok(()),
                Some(ClientFrame::PullManifest) => {
                    if let Err(e) = self.send_manifest(&mut stream).await {
                        send_frame(&mut stream, &ServerFrame::Error(e.to_string())).await?;
                        return Err(e);
                    }
                }
                Some(ClientFrame::Command(command)) => {
                    match AdjustmentCommand::try_from(command) {
                        Ok(command) => pending.push(command),
                        Err(e) => {
                            send_frame(&mut stream, &ServerFrame::Error(e.to_string())).await?;
                            return Err(e);
                        }
                    }
                }
                Some(ClientFrame::CommandsDone) => {
                    let commands = std::mem::take(&mut pending);
                    match self.apply(commands).await {
                        Ok(bytes_written) => {
                            send_frame(&mut stream, &ServerFrame::PushAck { bytes_written })
                                .await?;
                        }
                        Err(e) => {
                            send_frame(&mut stream, &ServerFrame::Error(e.to_string())).await?;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// List and hash the tree, feed the content cache, stream the entries
    async fn send_manifest(&self, stream: &mut FramedStream) -> Result<()> {
        let manifest = {
            let mut cache = self.content_cache.lock().await;
            let mut generator = HashGenerator::new(self.config.block_size);
            list_server_files(&self.fs, &mut generator, &mut cache)?
        };

        tracing::debug!(files = manifest.len(), "sending manifest");
        for file in &manifest {
            send_frame(stream, &ServerFrame::ManifestEntry(WireHashedFile::from(file))).await?;
        }
        send_frame(stream, &ServerFrame::ManifestDone).await
    }

    /// Run the applier over an accumulated command stream
    async fn apply(&self, commands: Vec<AdjustmentCommand>) -> Result<u64> {
        let mut cache = self.content_cache.lock().await;
        let bytes_written = apply_commands(&commands, &self.fs, &mut cache)?;
        tracing::info!(
            commands = commands.len(),
            bytes = bytes_written,
            "applied command stream"
        );
        Ok(bytes_written)
    }
}
