//! The sync service: one bidirectional framed connection per client
//!
//! Two operations ride on the connection. The client pulls the hashed
//! manifest (a stream of manifest entries closed by a done marker) and
//! then pushes the adjustment command stream, closed by a done marker the
//! server answers with a single acknowledgement. Frames are
//! length-delimited bincode payloads over TCP.

pub mod client;
pub mod server;

pub use client::SyncClient;
pub use server::SyncServer;

use crate::error::{Error, Result};
use crate::wire::{WireCommand, WireHashedFile};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientFrame {
    /// Ask for the manifest of the server tree
    PullManifest,
    /// One adjustment command of the push stream
    Command(WireCommand),
    /// End of the push stream; the server applies and acknowledges
    CommandsDone,
}

/// Frames sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerFrame {
    /// One manifest entry of the pull stream
    ManifestEntry(WireHashedFile),
    /// End of the manifest
    ManifestDone,
    /// The push stream was applied in full
    PushAck { bytes_written: u64 },
    /// The request failed on the server; the connection is unusable for
    /// further cycles
    Error(String),
}

pub(crate) type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

pub(crate) fn framed(stream: TcpStream) -> FramedStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

/// Encode and send one frame
pub(crate) async fn send_frame<T: Serialize>(stream: &mut FramedStream, frame: &T) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    stream
        .send(Bytes::from(payload))
        .await
        .map_err(|e| Error::transport(format!("sending frame: {e}")))
}

/// Receive and decode one frame; `None` means the peer closed the
/// connection cleanly
pub(crate) async fn recv_frame<T: DeserializeOwned>(
    stream: &mut FramedStream,
) -> Result<Option<T>> {
    match stream.next().await {
        None => Ok(None),
        Some(Err(e)) => Err(Error::transport(format!("receiving frame: {e}"))),
        Some(Ok(payload)) => Ok(Some(bincode::deserialize(&payload)?)),
    }
}
