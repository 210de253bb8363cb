//! In-memory stand-ins for the bluetooth stack, used by the unit tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bluer::Address;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;

use crate::device::manager::BluetoothStack;
use crate::device::transport::CommandSink;
use crate::device::types::PairedDevice;
use crate::error::DeviceError;

/// Observer half of a [`RecordingSink`], kept by the test.
#[derive(Clone)]
pub struct SinkProbe {
    written: Arc<Mutex<Vec<u8>>>,
    shutdowns: Arc<AtomicUsize>,
    connected: Arc<Mutex<Option<Address>>>,
}

impl SinkProbe {
    pub fn written_string(&self) -> String {
        String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// The address the mock stack dialed when it handed out this sink.
    pub fn connected_to(&self) -> Option<Address> {
        *self.connected.lock().unwrap()
    }
}

/// An `AsyncWrite` that records everything written to it.
pub struct RecordingSink {
    written: Arc<Mutex<Vec<u8>>>,
    shutdowns: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn new() -> (RecordingSink, SinkProbe) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let probe = SinkProbe {
            written: written.clone(),
            shutdowns: shutdowns.clone(),
            connected: Arc::new(Mutex::new(None)),
        };
        (RecordingSink { written, shutdowns }, probe)
    }
}

impl AsyncWrite for RecordingSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// An `AsyncWrite` whose writes always fail.
pub struct FailingSink;

impl AsyncWrite for FailingSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

enum ConnectScript {
    Sink(RecordingSink, SinkProbe),
    Fail,
    Gated(oneshot::Receiver<()>, RecordingSink, SinkProbe),
}

/// Scripted [`BluetoothStack`]: each connect attempt consumes the next
/// scripted outcome.
pub struct MockStack {
    devices: Vec<PairedDevice>,
    script: Mutex<VecDeque<ConnectScript>>,
}

impl MockStack {
    /// A stack that hands out `count` recording sinks, one per connect.
    pub fn with_sinks(count: usize) -> (MockStack, Vec<SinkProbe>) {
        let mut script = VecDeque::new();
        let mut probes = Vec::new();
        for _ in 0..count {
            let (sink, probe) = RecordingSink::new();
            probes.push(probe.clone());
            script.push_back(ConnectScript::Sink(sink, probe));
        }
        (MockStack { devices: Vec::new(), script: Mutex::new(script) }, probes)
    }

    /// A stack whose single connect blocks until `gate` fires.
    pub fn with_gated_sink(gate: oneshot::Receiver<()>) -> (MockStack, SinkProbe) {
        let (sink, probe) = RecordingSink::new();
        let script = VecDeque::from([ConnectScript::Gated(gate, sink, probe.clone())]);
        (MockStack { devices: Vec::new(), script: Mutex::new(script) }, probe)
    }

    /// A stack whose first connect fails, followed by `count` recording sinks.
    pub fn failing_then_sinks(count: usize) -> (MockStack, Vec<SinkProbe>) {
        let (stack, probes) = Self::with_sinks(count);
        stack.script.lock().unwrap().push_front(ConnectScript::Fail);
        (stack, probes)
    }

    pub fn with_devices(mut self, devices: Vec<PairedDevice>) -> Self {
        self.devices = devices;
        self
    }
}

#[async_trait]
impl BluetoothStack for MockStack {
    async fn paired_devices(&self) -> Result<Vec<PairedDevice>, DeviceError> {
        Ok(self.devices.clone())
    }

    async fn open_rfcomm(&self, address: Address) -> Result<CommandSink, DeviceError> {
        let entry = self.script.lock().unwrap().pop_front();

        match entry {
            None => Err(DeviceError::Connect {
                source: io::Error::new(io::ErrorKind::Other, "no scripted connection left"),
            }),
            Some(ConnectScript::Fail) => Err(DeviceError::Connect {
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }),
            Some(ConnectScript::Sink(sink, probe)) => {
                *probe.connected.lock().unwrap() = Some(address);
                Ok(Box::new(sink))
            },
            Some(ConnectScript::Gated(gate, sink, probe)) => {
                let _ = gate.await;
                *probe.connected.lock().unwrap() = Some(address);
                Ok(Box::new(sink))
            },
        }
    }
}
