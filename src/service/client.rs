//! The client side of the sync service
//!
//! One sync cycle is a pull followed by a push on the same connection:
//! collect the server's manifest, scan the local tree against it, stream
//! the resulting commands, and wait for the acknowledgement. A new cycle
//! never starts before the previous acknowledgement arrives.

use super::{framed, recv_frame, send_frame, ClientFrame, FramedStream, ServerFrame};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::compare_trees;
use crate::types::{AdjustmentCommand, CycleStats, HashedFile};
use crate::vfs::{list_client_files, VirtualFilesystem};
use crate::wire::WireCommand;
use tokio::net::TcpStream;

/// The sync service client, holding the local tree and the connection
pub struct SyncClient<F> {
    config: Config,
    fs: F,
    stream: Option<FramedStream>,
}

impl<F> SyncClient<F>
where
    F: VirtualFilesystem,
{
    pub fn new(config: Config, fs: F) -> Self {
        Self {
            config,
            fs,
            stream: None,
        }
    }

    /// Connect to the configured server address
    pub async fn dial(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.config.address)
            .await
            .map_err(|e| Error::transport(format!("dialing {}: {e}", self.config.address)))?;
        tracing::debug!(address = %self.config.address, "connected");
        self.stream = Some(framed(stream));
        Ok(())
    }

    /// Tear down the connection
    pub fn close(&mut self) {
        self.stream = None;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut FramedStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::transport("client is not connected"))
    }

    /// Pull the server's hashed manifest
    pub async fn pull_manifest(&mut self) -> Result<Vec<HashedFile>> {
        let stream = self.stream()?;
        send_frame(stream, &ClientFrame::PullManifest).await?;

        let mut manifest = Vec::new();
        loop {
            match recv_frame::<ServerFrame>(stream).await? {
                Some(ServerFrame::ManifestEntry(entry)) => {
                    manifest.push(HashedFile::try_from(entry)?);
                }
                Some(ServerFrame::ManifestDone) => break,
                Some(ServerFrame::Error(message)) => {
                    return Err(Error::transport(format!("server: {message}")));
                }
                Some(frame) => {
                    return Err(Error::protocol(format!(
                        "unexpected frame during manifest pull: {frame:?}"
                    )));
                }
                None => {
                    return Err(Error::transport("connection closed during manifest pull"));
                }
            }
        }

        tracing::debug!(files = manifest.len(), "manifest received");
        Ok(manifest)
    }

    /// Push a command stream and wait for the acknowledgement
    /// (close-and-receive). Returns the bytes the server wrote.
    pub async fn push_commands(&mut self, commands: &[AdjustmentCommand]) -> Result<u64> {
        let stream = self.stream()?;
        for command in commands {
            send_frame(stream, &ClientFrame::Command(WireCommand::from(command))).await?;
        }
        send_frame(stream, &ClientFrame::CommandsDone).await?;

        match recv_frame::<ServerFrame>(stream).await? {
            Some(ServerFrame::PushAck { bytes_written }) => Ok(bytes_written),
            Some(ServerFrame::Error(message)) => {
                Err(Error::transport(format!("server: {message}")))
            }
            Some(frame) => Err(Error::protocol(format!(
                "unexpected frame during push: {frame:?}"
            ))),
            None => Err(Error::transport("connection closed during push")),
        }
    }

    /// Run one full sync cycle: pull, compare, push, acknowledge
    pub async fn sync_cycle(&mut self) -> Result<CycleStats> {
        let manifest = self.pull_manifest().await?;
        let client_files = list_client_files(&self.fs)?;
        let commands = compare_trees(client_files, &manifest, self.config.block_size);

        let mut stats = CycleStats::default();
        for command in &commands {
            stats.record(command);
        }

        stats.applied_bytes = self.push_commands(&commands).await?;

        tracing::info!(
            commands = stats.commands,
            hashed_blocks = stats.hashed_blocks,
            content_blocks = stats.content_blocks,
            literal_bytes = stats.literal_bytes,
            reused_bytes = stats.reused_bytes,
            savings_percent = stats.savings_percent(),
            "sync cycle complete"
        );
        Ok(stats)
    }
}
