use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, RECORD_SIZE};
use crate::error::{FrameError, Result};
use crate::frame::CanFrame;

/// Writes complete capture records to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(RECORD_SIZE),
            frames_written: 0,
        }
    }

    /// Encode and write one frame (blocking). Does not flush.
    pub fn write_frame(&mut self, frame: &CanFrame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.frames_written = self.frames_written.saturating_add(1);
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
