//! Trait abstraction for the radio byte stream to enable testing

use async_trait::async_trait;
use std::io;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use super::RemoteAddress;

/// Serial settings the RFCOMM TTY is opened with. The line rate is
/// nominal for RFCOMM but the driver still expects a valid value.
pub const RFCOMM_BAUD_RATE: u32 = 115_200;

/// Trait for an established bidirectional byte stream
#[async_trait]
pub trait LinkStream: Send {
    /// Write all data to the stream
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Shut the stream down
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Trait for establishing a [`LinkStream`] to a remote address
#[async_trait]
pub trait LinkConnector: Send + Sync {
    type Stream: LinkStream;

    /// Open the stream. Blocks the caller until the link is up or refused.
    async fn connect(&self, remote: &RemoteAddress) -> io::Result<Self::Stream>;
}

/// RFCOMM link exposed by the kernel as a TTY node
///
/// The node is bound to the remote once, outside this program, e.g.
/// `rfcomm bind 0 3C:71:BF:A6:E3:5E 1`. Opening the node brings the
/// radio link up.
#[derive(Debug, Clone)]
pub struct RfcommTty {
    tty_path: String,
    baud_rate: u32,
}

impl RfcommTty {
    pub fn new(tty_path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            tty_path: tty_path.into(),
            baud_rate,
        }
    }

    /// Path of the TTY node this connector opens
    pub fn tty_path(&self) -> &str {
        &self.tty_path
    }
}

#[async_trait]
impl LinkConnector for RfcommTty {
    type Stream = RfcommStream;

    async fn connect(&self, remote: &RemoteAddress) -> io::Result<RfcommStream> {
        debug!("Opening {} for {}", self.tty_path, remote);

        let port = tokio_serial::new(&self.tty_path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(io::Error::from)?;

        Ok(RfcommStream { port })
    }
}

/// Wrapper around tokio_serial::SerialStream that implements LinkStream
pub struct RfcommStream {
    port: tokio_serial::SerialStream,
}

#[async_trait]
impl LinkStream for RfcommStream {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.shutdown().await
    }
}
