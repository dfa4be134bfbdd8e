// A `Write` sink that checks everything written against an expected stream.
//
// Divination pipes trial recompression through this so a wrong parameter set
// is rejected at the first differing byte instead of after a full compress.

use std::io::{self, Read, Write};

/// Outcome of a failed comparison.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("match buffer size must be greater than 0")]
    InvalidBufferSize,
    #[error("written bytes do not match the expected stream")]
    Mismatch,
    #[error("expected stream read failed: {0}")]
    Io(#[from] io::Error),
}

impl MatchError {
    /// Recover a `MatchError` that travelled through an `io::Error`.
    pub fn from_io(e: &io::Error) -> Option<&MatchError> {
        e.get_ref().and_then(|inner| inner.downcast_ref::<MatchError>())
    }
}

/// Compares written bytes with the bytes of `expected`, in order.
#[derive(Debug)]
pub struct MatchingWriter<R> {
    expected: R,
    buffer: Vec<u8>,
}

impl<R: Read> MatchingWriter<R> {
    /// `buffer_size` bounds how many expected bytes are read per comparison.
    pub fn new(expected: R, buffer_size: usize) -> Result<Self, MatchError> {
        if buffer_size == 0 {
            return Err(MatchError::InvalidBufferSize);
        }
        Ok(Self {
            expected,
            buffer: vec![0u8; buffer_size],
        })
    }

    /// Succeeds only if the expected stream has been consumed exactly.
    pub fn expect_eof(&mut self) -> Result<(), MatchError> {
        let mut trailing = [0u8; 1];
        loop {
            match self.expected.read(&mut trailing) {
                Ok(0) => return Ok(()),
                Ok(_) => return Err(MatchError::Mismatch),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(MatchError::Io(e)),
            }
        }
    }

    fn compare(&mut self, data: &[u8]) -> Result<(), MatchError> {
        for piece in data.chunks(self.buffer.len()) {
            let expected = &mut self.buffer[..piece.len()];
            match self.expected.read_exact(expected) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(MatchError::Mismatch);
                }
                Err(e) => return Err(MatchError::Io(e)),
            }
            if expected != piece {
                return Err(MatchError::Mismatch);
            }
        }
        Ok(())
    }
}

impl<R: Read> Write for MatchingWriter<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.compare(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
