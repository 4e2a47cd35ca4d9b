//! Keyed single-byte XOR transform for obfuscated `.arc` containers.
//!
//! An `.arc` file is a standard ZIP container whose every byte has been
//! combined with [`ARC_KEY`] by bitwise exclusive-or. [`XorStream`] applies the
//! transform on the fly so an unmodified ZIP reader or writer can operate on
//! the wrapped stream.
//!
//! # Not encryption
//!
//! This is a reversible obfuscation that keeps casual inspection tools from
//! recognizing the container. It offers no confidentiality: anyone who knows
//! (or guesses) the single key byte recovers the plain container. Use
//! password protection ([`crate::crypto`]) for secrecy.
//!
//! # Properties
//!
//! - Applying the transform twice is the identity, so encoding and decoding
//!   are the same operation.
//! - The transform is position-independent: seeking needs no state, and any
//!   slice can be transformed in isolation.
//!
//! ```rust
//! use zipup::cipher::{apply_key, ARC_KEY};
//!
//! let mut data = *b"PK\x03\x04";
//! apply_key(&mut data, ARC_KEY);
//! assert_ne!(&data, b"PK\x03\x04");
//! apply_key(&mut data, ARC_KEY);
//! assert_eq!(&data, b"PK\x03\x04");
//! ```

use std::io::{self, Read, Seek, SeekFrom, Write};

/// The fixed key byte used by `.arc` containers.
pub const ARC_KEY: u8 = 0x5A;

/// Chunk size used when transforming outgoing writes.
const WRITE_CHUNK: usize = 8192;

/// XORs every byte of `buf` with `key` in place.
#[inline]
pub fn apply_key(buf: &mut [u8], key: u8) {
    for byte in buf.iter_mut() {
        *byte ^= key;
    }
}

/// A stream adapter that XORs all bytes passing through it.
///
/// Reads are transformed after they leave the inner stream, writes before
/// they enter it. `seek` and `stream_position` pass through unchanged.
#[derive(Debug)]
pub struct XorStream<S> {
    inner: S,
    key: u8,
}

impl<S> XorStream<S> {
    /// Wraps `inner` using the `.arc` key.
    pub fn new(inner: S) -> Self {
        Self::with_key(inner, ARC_KEY)
    }

    /// Wraps `inner` using an explicit key byte.
    pub fn with_key(inner: S, key: u8) -> Self {
        Self { inner, key }
    }

    /// Returns the key byte.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Returns a reference to the wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the wrapped stream.
    ///
    /// Bytes written directly to the inner stream bypass the transform.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read> Read for XorStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        apply_key(&mut buf[..n], self.key);
        Ok(n)
    }
}

impl<S: Write> Write for XorStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Transform a bounded copy; report only what the inner stream accepted.
        let len = buf.len().min(WRITE_CHUNK);
        let mut chunk = buf[..len].to_vec();
        apply_key(&mut chunk, self.key);
        self.inner.write(&chunk)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: Seek> Seek for XorStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }
}
