use log::{debug, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::device::commands::Command;
use crate::error::DeviceError;

/// The write half of an open RFCOMM connection. The prop never answers, so
/// the read direction is not kept.
pub type CommandSink = Box<dyn AsyncWrite + Send + Unpin>;

/// What happened to a command handed to [`Transport::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No connection is open. Commands are dropped silently in this state;
    /// the resync after the next connect brings the prop back in line.
    NotConnected,
}

/// What to do with the stream after a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteErrorPolicy {
    /// Keep the stream; later sends retry on the same socket.
    #[default]
    KeepStream,
    /// Drop the stream; later sends report `NotConnected` until a reconnect.
    DropStream,
}

/// Owns at most one open command stream to the prop.
pub struct Transport {
    sink: Option<CommandSink>,
    write_error_policy: WriteErrorPolicy,
}

impl Transport {
    pub fn new(write_error_policy: WriteErrorPolicy) -> Self {
        Transport { sink: None, write_error_policy }
    }

    /// Install a freshly connected stream, replacing nothing: callers close
    /// any previous stream through [`Transport::close`] first.
    pub fn attach(&mut self, sink: CommandSink) {
        self.sink = Some(sink);
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Write one command to the stream. With no stream open this is a no-op,
    /// not an error. A failed write is reported to the caller as a typed
    /// error; whether the stream survives it is decided by the configured
    /// [`WriteErrorPolicy`].
    pub async fn send(&mut self, command: &Command) -> Result<SendOutcome, DeviceError> {
        let Some(sink) = self.sink.as_mut() else {
            debug!("No connection open, dropping command {:?}", command);
            return Ok(SendOutcome::NotConnected);
        };

        match sink.write_all(command.encode().as_bytes()).await {
            Ok(()) => {
                debug!("Sent {:?}", command);
                Ok(SendOutcome::Sent)
            },
            Err(source) => {
                if self.write_error_policy == WriteErrorPolicy::DropStream {
                    self.sink = None;
                }
                Err(DeviceError::Send { source })
            },
        }
    }

    /// Close the stream if one is open. Returns whether a stream was actually
    /// closed, so callers can tell a real teardown from a no-op.
    pub async fn close(&mut self) -> bool {
        match self.sink.take() {
            None => false,
            Some(mut sink) => {
                if let Err(err) = sink.shutdown().await {
                    warn!("Failed to shut down connection: {:?}", err);
                }
                true
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::commands::Channel;
    use crate::device::testing::{FailingSink, RecordingSink};

    #[tokio::test]
    async fn send_without_connection_is_a_silent_noop() {
        let mut transport = Transport::new(WriteErrorPolicy::KeepStream);

        let outcome = transport.send(&Command::Set(Channel::Eyes, 9)).await.unwrap();

        assert_eq!(outcome, SendOutcome::NotConnected);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn send_writes_the_encoded_line() {
        let (sink, probe) = RecordingSink::new();
        let mut transport = Transport::new(WriteErrorPolicy::KeepStream);
        transport.attach(Box::new(sink));

        let outcome = transport.send(&Command::Set(Channel::Soulstone, 200)).await.unwrap();
        transport.send(&Command::Off).await.unwrap();

        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(probe.written_string(), "s=200\noff\n");
    }

    #[tokio::test]
    async fn keep_stream_policy_retries_on_the_same_socket() {
        let mut transport = Transport::new(WriteErrorPolicy::KeepStream);
        transport.attach(Box::new(FailingSink));

        let result = transport.send(&Command::Off).await;

        assert!(matches!(result, Err(DeviceError::Send { .. })));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn drop_stream_policy_discards_the_socket() {
        let mut transport = Transport::new(WriteErrorPolicy::DropStream);
        transport.attach(Box::new(FailingSink));

        let result = transport.send(&Command::Off).await;
        assert!(matches!(result, Err(DeviceError::Send { .. })));
        assert!(!transport.is_connected());

        let outcome = transport.send(&Command::Off).await.unwrap();
        assert_eq!(outcome, SendOutcome::NotConnected);
    }

    #[tokio::test]
    async fn close_reports_whether_a_stream_was_open() {
        let (sink, probe) = RecordingSink::new();
        let mut transport = Transport::new(WriteErrorPolicy::KeepStream);
        transport.attach(Box::new(sink));

        assert!(transport.close().await);
        assert_eq!(probe.shutdown_count(), 1);
        assert!(!transport.close().await);
    }
}
