use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use canmux_frame::{CanFrame, FrameError, FrameReader};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::CanTransport;

/// Read-only transport that plays back a capture stream.
///
/// Each `read_one_frame` decodes the next record. The end of the capture is
/// reported as "no data", so a dispatcher simply goes idle.
pub struct ReplayTransport<R> {
    reader: Mutex<FrameReader<R>>,
    exhausted: AtomicBool,
}

impl<R: Read + Send> ReplayTransport<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: Mutex::new(FrameReader::new(inner)),
            exhausted: AtomicBool::new(false),
        }
    }

    /// True once the end of the capture has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

impl ReplayTransport<BufReader<File>> {
    /// Open a capture file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened capture for replay");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read + Send> CanTransport for ReplayTransport<R> {
    fn read_one_frame(&self) -> Result<Option<CanFrame>> {
        if self.is_exhausted() {
            return Ok(None);
        }

        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        match reader.read_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(FrameError::EndOfStream) => {
                debug!(frames = reader.frames_read(), "capture replay finished");
                self.exhausted.store(true, Ordering::SeqCst);
                Ok(None)
            }
            Err(err) => {
                self.exhausted.store(true, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    fn send_one_frame(&self, _frame: &CanFrame) -> Result<()> {
        Err(TransportError::ReadOnly)
    }

    fn name(&self) -> &str {
        "replay"
    }
}
