mod io;
mod loader;

pub use io::{CaptureMetadata, FrameSink, FrameSource, LogSink, PcapSink, PcapSource, SourceEvent};
pub use loader::CaptureLoader;
