//! sealstream implements a provably secure authenticated encryption
//! scheme for continuous byte streams.
//!
//! An AEAD - like AES-GCM or ChaCha20-Poly1305 - protects one atomic
//! message. This crate turns such an AEAD into a secure channel for
//! byte streams of arbitrary length: a [`Stream`] splits the plaintext
//! into fixed-size fragments and seals every fragment with a nonce
//! that binds the stream identity, the fragment's position and whether
//! it is the final one. A tampered, truncated, reordered or replayed
//! ciphertext fails verification, and no unverified plaintext is ever
//! handed out.
//!
//! Encryption and decryption are available in push form
//! ([`EncWriter`] / [`DecWriter`]), in pull form ([`EncReader`] /
//! [`DecReader`]) and - for decryption - with random access
//! ([`DecReaderAt`]).
//!
//! ```
//! use std::io::Write;
//! use sealstream::ring::AES_256_GCM;
//! use sealstream::{Algorithm, Stream, BUF_SIZE};
//!
//! let key = [0; AES_256_GCM::KEY_LEN]; // Don't use this key for anything real.
//! let stream = Stream::new(AES_256_GCM::new(&key).unwrap(), BUF_SIZE);
//!
//! let nonce = [0; 8]; // Must be unique for the same key.
//! let mut ciphertext = Vec::new();
//! let mut writer = stream.encrypt_writer(&mut ciphertext, &nonce, b"");
//! writer.write_all(b"some plaintext").unwrap();
//! writer.close().unwrap();
//! ```

pub use self::aead::Algorithm;
pub use self::error::{Exceeded, Invalid, NotAuthentic};
pub use self::reader::{DecReader, DecReaderAt, EncReader};
pub use self::utils::{Close, NopCloser, ReadAt, SectionReader};
pub use self::writer::{DecWriter, EncWriter};

mod aead;
mod error;
mod reader;
mod utils;
mod writer;

#[cfg(feature = "chacha")]
pub mod chacha;
#[cfg(feature = "ring")]
pub mod ring;

use self::aead::Counter;
use std::io::{Read, Write};

/// The maximum fragment size of a stream.
pub const MAX_BUF_SIZE: usize = (1 << 24) - 1;

/// The recommended fragment size for streams.
pub const BUF_SIZE: usize = 1 << 14;

/// A factory for encrypted and authenticated byte streams.
///
/// A `Stream` binds an [`Algorithm`] to a fragment size and hands out
/// the encryption and decryption adapters. It is important to always
/// use the same fragment size for encrypting and decrypting: trying to
/// decrypt data that has been encrypted with a different fragment size
/// fails. Therefore, the fragment size is usually fixed for one (kind
/// of) application.
pub struct Stream<A: Algorithm> {
    cipher: A,
    buf_size: usize,
}

impl<A: Algorithm> Stream<A> {
    /// Creates a new `Stream` that encrypts or decrypts data streams
    /// with `cipher`, splitting them into fragments of `buf_size`
    /// bytes. If you don't have special requirements just use
    /// [`BUF_SIZE`].
    ///
    /// # Panics
    ///
    /// Panics if the nonce of `cipher` is smaller than 5 bytes or if
    /// `buf_size` is not within `1..=MAX_BUF_SIZE`.
    pub fn new(cipher: A, buf_size: usize) -> Self {
        assert!(
            A::NONCE_LEN >= 5,
            "sealstream: nonce of cipher is too small"
        );
        assert!(buf_size > 0, "sealstream: buf_size is too small");
        assert!(buf_size <= MAX_BUF_SIZE, "sealstream: buf_size is too large");
        Stream { cipher, buf_size }
    }

    /// Returns the size of the unique nonce that must be provided when
    /// encrypting or decrypting a data stream.
    ///
    /// The remaining four bytes of the cipher's nonce hold the
    /// fragment sequence counter.
    pub fn nonce_size(&self) -> usize {
        A::NONCE_LEN - 4
    }

    /// Returns the overhead added when encrypting a data stream of the
    /// given length: one authentication tag per fragment, where the
    /// final fragment exists even for an empty stream.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the data limit of
    /// `buf_size * (2³² - 1)` bytes.
    pub fn overhead(&self, len: u64) -> u64 {
        assert!(
            len <= self.buf_size as u64 * u64::from(u32::MAX),
            "sealstream: length exceeds data limit"
        );

        let overhead = A::TAG_LEN as u64;
        if len == 0 {
            return overhead;
        }
        let fragments = len / self.buf_size as u64;
        if len % self.buf_size as u64 > 0 {
            fragments * overhead + overhead
        } else {
            fragments * overhead
        }
    }

    /// Returns a new [`EncWriter`] that wraps `inner` and encrypts and
    /// authenticates everything written to it.
    ///
    /// The nonce must be [`nonce_size`](Stream::nonce_size) bytes long
    /// and unique for the same key. The associated data is
    /// authenticated but neither encrypted nor written to `inner`, and
    /// must be provided again to decrypt the data.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` has the wrong length.
    pub fn encrypt_writer<W: Write + Close>(
        &self,
        inner: W,
        nonce: &[u8],
        associated_data: &[u8],
    ) -> EncWriter<'_, A, W> {
        let (counter, prefix) = self.init(nonce, associated_data);
        EncWriter::new(inner, &self.cipher, self.buf_size, counter, prefix)
    }

    /// Returns a new [`DecWriter`] that wraps `inner` and decrypts and
    /// verifies everything written to it. The nonce and associated
    /// data must match the values used when encrypting the data.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` has the wrong length.
    pub fn decrypt_writer<W: Write + Close>(
        &self,
        inner: W,
        nonce: &[u8],
        associated_data: &[u8],
    ) -> DecWriter<'_, A, W> {
        let (counter, prefix) = self.init(nonce, associated_data);
        DecWriter::new(inner, &self.cipher, self.buf_size, counter, prefix)
    }

    /// Returns a new [`EncReader`] that wraps `inner` and encrypts and
    /// authenticates everything it reads.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` has the wrong length.
    pub fn encrypt_reader<R: Read>(
        &self,
        inner: R,
        nonce: &[u8],
        associated_data: &[u8],
    ) -> EncReader<'_, A, R> {
        let (counter, prefix) = self.init(nonce, associated_data);
        EncReader::new(inner, &self.cipher, self.buf_size, counter, prefix)
    }

    /// Returns a new [`DecReader`] that wraps `inner` and decrypts and
    /// verifies everything it reads. The nonce and associated data
    /// must match the values used when encrypting the data.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` has the wrong length.
    pub fn decrypt_reader<R: Read>(
        &self,
        inner: R,
        nonce: &[u8],
        associated_data: &[u8],
    ) -> DecReader<'_, A, R> {
        let (counter, prefix) = self.init(nonce, associated_data);
        DecReader::new(inner, &self.cipher, self.buf_size, counter, prefix)
    }

    /// Returns a new [`DecReaderAt`] that wraps `inner` and decrypts
    /// and verifies everything it reads, starting at arbitrary
    /// plaintext offsets. The nonce and associated data must match the
    /// values used when encrypting the data.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` has the wrong length.
    pub fn decrypt_reader_at<R: ReadAt>(
        &self,
        inner: R,
        nonce: &[u8],
        associated_data: &[u8],
    ) -> DecReaderAt<'_, A, R> {
        let (_, prefix) = self.init(nonce, associated_data);
        DecReaderAt::new(inner, &self.cipher, self.buf_size, Box::from(nonce), prefix)
    }

    /// Seals the caller's associated data into the per-fragment
    /// associated-data prefix, consuming sequence number 0. Every
    /// fragment of the stream authenticates this prefix, so a stream
    /// can only be opened with the associated data it was sealed with.
    fn init(&self, nonce: &[u8], associated_data: &[u8]) -> (Counter, Box<[u8]>) {
        assert!(
            nonce.len() == self.nonce_size(),
            "sealstream: nonce has invalid length"
        );
        let mut counter = Counter::new(A::NONCE_LEN, nonce);
        counter.advance().unwrap();

        let mut prefix = vec![0; 1 + A::TAG_LEN].into_boxed_slice();
        self.cipher
            .seal_in_place(counter.as_bytes(), associated_data, &mut prefix[1..])
            .unwrap();
        (counter, prefix)
    }
}
