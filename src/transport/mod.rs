//! # Command Transport Module
//!
//! Owns the persistent Bluetooth RFCOMM link to the robot.
//!
//! This module handles:
//! - Connecting once to the fixed remote address and channel
//! - Writing the command token on every button press
//! - Closing the link on shutdown
//!
//! There is no reconnect and no acknowledgment. A link that failed to
//! connect, or failed a write, stays failed for the rest of the process.

pub mod link;

use bytes::Bytes;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};
use link::{LinkConnector, LinkStream};

/// Bluetooth device address of the robot
pub const REMOTE_ADDRESS: &str = "3C:71:BF:A6:E3:5E";

/// RFCOMM channel the robot listens on
pub const REMOTE_CHANNEL: u8 = 1;

/// The only payload ever written to the link, sent verbatim
pub const COMMAND_TOKEN: &[u8] = b"send";

/// Returns the command token as a cheaply clonable buffer
pub fn command_token() -> Bytes {
    Bytes::from_static(COMMAND_TOKEN)
}

/// Fixed device identifier plus RFCOMM channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    device: String,
    channel: u8,
}

impl RemoteAddress {
    pub fn new(device: impl Into<String>, channel: u8) -> Self {
        Self {
            device: device.into(),
            channel,
        }
    }

    /// The address of the robot this harness drives
    pub fn robot() -> Self {
        Self::new(REMOTE_ADDRESS, REMOTE_CHANNEL)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel {}", self.device, self.channel)
    }
}

/// Lifecycle of the link
///
/// ```text
/// Disconnected ──► Connecting ──► Connected ──► Closed
///                      │              │
///                      └──► Failed ◄──┘ (write error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// Persistent link that forwards discrete commands to the robot
pub struct CommandTransport<C: LinkConnector> {
    connector: C,
    remote: RemoteAddress,
    state: LinkState,
    stream: Option<C::Stream>,
    commands_sent: u64,
}

impl<C: LinkConnector> fmt::Debug for CommandTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTransport")
            .field("remote", &self.remote)
            .field("state", &self.state)
            .field("commands_sent", &self.commands_sent)
            .finish_non_exhaustive()
    }
}

impl<C: LinkConnector> CommandTransport<C> {
    /// Create a transport in the `Disconnected` state
    pub fn new(connector: C, remote: RemoteAddress) -> Self {
        Self {
            connector,
            remote,
            state: LinkState::Disconnected,
            stream: None,
            commands_sent: 0,
        }
    }

    /// Bring the link up
    ///
    /// Must be called exactly once, before the control loop starts.
    ///
    /// # Errors
    ///
    /// - `Connection` if the remote is unreachable, refuses, or the channel is busy.
    ///   The transport is `Failed` afterwards and cannot be retried.
    /// - `InvalidState` if called in any state other than `Disconnected`
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != LinkState::Disconnected {
            return Err(HarnessError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }

        self.state = LinkState::Connecting;
        debug!("Connecting to {}", self.remote);

        match self.connector.connect(&self.remote).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = LinkState::Connected;
                info!("Bluetooth link connected to {}", self.remote);
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Failed;
                Err(HarnessError::Connection {
                    address: self.remote.device().to_string(),
                    channel: self.remote.channel(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write one command payload to the link
    ///
    /// The write is awaited inline; a stalled remote stalls the caller.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the link is `Connected`
    /// - `Transport` if the write fails; the link is `Failed` afterwards
    pub async fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        let stream = match (self.state, self.stream.as_mut()) {
            (LinkState::Connected, Some(stream)) => stream,
            _ => {
                return Err(HarnessError::InvalidState {
                    operation: "send command",
                    state: self.state,
                })
            }
        };

        let written = match stream.write_all(payload).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            self.state = LinkState::Failed;
            return Err(HarnessError::Transport(format!(
                "Failed to write command to {}: {}",
                self.remote, e
            )));
        }

        self.commands_sent += 1;
        debug!("Sent command ({} bytes, {} total)", payload.len(), self.commands_sent);
        Ok(())
    }

    /// Tear the link down
    ///
    /// Idempotent once `Closed`. Shutting down a `Failed` link is best-effort.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the link was never connected
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            LinkState::Closed => return Ok(()),
            LinkState::Disconnected => {
                return Err(HarnessError::InvalidState {
                    operation: "close",
                    state: self.state,
                })
            }
            LinkState::Connecting | LinkState::Connected | LinkState::Failed => {}
        }

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error while shutting down link to {}: {}", self.remote, e);
            }
        }

        self.state = LinkState::Closed;
        info!(
            "Bluetooth link to {} closed after {} commands",
            self.remote, self.commands_sent
        );
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn remote(&self) -> &RemoteAddress {
        &self.remote
    }

    /// Number of commands written successfully so far
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }
}
