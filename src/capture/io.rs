use crate::error::CaptureError;
use bytes::Bytes;
use chrono::{DateTime, Local};
use log::info;
use pcap::{Activated, Active, Capture, PacketHeader};

/// Per-frame information reported by the capture facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureMetadata {
    pub timestamp: DateTime<Local>,
    /// Bytes actually captured
    pub caplen: u32,
    /// Length of the frame on the wire
    pub len: u32,
}

impl CaptureMetadata {
    #[cfg(test)]
    pub fn now(len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        Self {
            timestamp: Local::now(),
            caplen: len,
            len,
        }
    }
}

impl From<&PacketHeader> for CaptureMetadata {
    fn from(header: &PacketHeader) -> Self {
        let secs = i64::from(header.ts.tv_sec);
        let nanos = u32::try_from(i64::from(header.ts.tv_usec) * 1_000).unwrap_or(0);
        let timestamp = DateTime::from_timestamp(secs, nanos)
            .map(DateTime::<Local>::from)
            .unwrap_or_else(Local::now);

        Self {
            timestamp,
            caplen: header.caplen,
            len: header.len,
        }
    }
}

/// Result of a single blocking read.
#[derive(Debug)]
pub enum SourceEvent {
    Frame(Bytes, CaptureMetadata),
    /// The read timed out without a frame; callers use this to poll for
    /// cancellation.
    Idle,
    /// No further frames will ever arrive.
    Exhausted,
}

pub trait FrameSource {
    /// Blocks until a frame arrives, the read times out, or the source ends.
    fn read_frame(&mut self) -> Result<SourceEvent, CaptureError>;
}

pub trait FrameSink: Send {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), CaptureError>;
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), CaptureError> {
        (**self).send_frame(frame)
    }
}

/// Reads frames from a live interface or an offline savefile.
pub struct PcapSource<T: Activated + ?Sized> {
    capture: Capture<T>,
}

impl<T: Activated + ?Sized> PcapSource<T> {
    pub fn new(capture: Capture<T>) -> Self {
        Self { capture }
    }
}

impl<T: Activated + ?Sized> FrameSource for PcapSource<T> {
    fn read_frame(&mut self) -> Result<SourceEvent, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(SourceEvent::Frame(
                Bytes::copy_from_slice(packet.data),
                CaptureMetadata::from(packet.header),
            )),
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Exhausted),
            Err(e) => Err(CaptureError::Read(e)),
        }
    }
}

/// Injects frames on a live interface.
pub struct PcapSink {
    interface: String,
    capture: Capture<Active>,
}

impl PcapSink {
    pub fn new(interface: impl Into<String>, capture: Capture<Active>) -> Self {
        Self {
            interface: interface.into(),
            capture,
        }
    }
}

impl FrameSink for PcapSink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), CaptureError> {
        self.capture
            .sendpacket(frame)
            .map_err(|source| CaptureError::Write {
                interface: self.interface.clone(),
                source,
            })
    }
}

/// Dry-run sink: reports what would have been injected.
pub struct LogSink {
    label: String,
}

impl LogSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl FrameSink for LogSink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), CaptureError> {
        info!("[dry-run] {}: would inject {} bytes", self.label, frame.len());
        Ok(())
    }
}
