// Copyright (c) 2019 Andreas Auernhammer. All rights reserved.
// Use of this source code is governed by a license that can be
// found in the LICENSE file.

use crate::aead::{Algorithm, Counter};
use crate::error::{Latched, NotAuthentic};
use crate::utils::{read_full, Close};
use std::io;
use std::io::{Read, Write};

/// Wraps a writer and encrypts and authenticates everything written
/// to it.
///
/// `EncWriter` splits data into fixed-size fragments and encrypts and
/// authenticates each fragment separately. It appends any remaining
/// data to its in-memory buffer until it has gathered a complete
/// fragment. Therefore, using an `std::io::BufWriter` in addition
/// usually does not improve the performance of write calls. The only
/// exception may be cases when the buffer size of the `BufWriter` is
/// significantly larger than the fragment size of the `EncWriter`.
///
/// An `EncWriter` must be closed to mark the last fragment as the
/// final one. Not closing it produces ciphertext that cannot be
/// decrypted reliably: without a final fragment the decoder detects
/// the stream as truncated. Calling any write operation after `close`
/// is a logical error and panics.
///
/// # Examples
///
/// Let's encrypt a string and store the ciphertext in memory:
///
/// ```
/// use std::io::Write;
/// use sealstream::ring::CHACHA20_POLY1305;
/// use sealstream::{Algorithm, Stream, BUF_SIZE};
///
/// // Load your secret keys from a secure location or derive
/// // them using a secure (password-based) key-derivation-function, like Argon2id.
/// // Obviously, don't use this all-zeros key for anything real.
/// let key = [0; CHACHA20_POLY1305::KEY_LEN];
/// let stream = Stream::new(CHACHA20_POLY1305::new(&key).unwrap(), BUF_SIZE);
///
/// // Make sure you use an unique key-nonce combination!
/// // Reusing a nonce value for the same secret key breaks
/// // the security of the encryption algorithm.
/// let nonce = [0; 8];
///
/// // You must be able to re-generate this aad to decrypt
/// // the ciphertext again. Usually, it's stored together with
/// // the encrypted data.
/// let aad = "Some authenticated but not encrypted data".as_bytes();
///
/// let mut ciphertext: Vec<u8> = Vec::default(); // Store the ciphertext in memory.
/// let mut writer = stream.encrypt_writer(&mut ciphertext, &nonce, aad);
///
/// writer.write_all("Some example plaintext".as_bytes()).unwrap();
/// writer.close().unwrap(); // Complete the encryption process explicitly.
/// ```
pub struct EncWriter<'a, A: Algorithm, W: Write + Close> {
    inner: W,
    algorithm: &'a A,
    buf_size: usize,
    nonce: Counter,
    associated_data: Box<[u8]>,
    buffer: Box<[u8]>,
    pos: usize,

    // If an error occurs, we must fail any subsequent write or flush
    // operation. The latched value replays the first error.
    err: Option<Latched>,
    closed: bool,
}

impl<'a, A: Algorithm, W: Write + Close> EncWriter<'a, A, W> {
    pub(crate) fn new(
        inner: W,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Counter,
        associated_data: Box<[u8]>,
    ) -> Self {
        EncWriter {
            inner,
            algorithm,
            buf_size,
            nonce,
            associated_data,
            buffer: vec![0; buf_size + A::TAG_LEN].into_boxed_slice(),
            pos: 0,
            err: None,
            closed: false,
        }
    }

    /// Returns true once the final fragment has been written.
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encrypts and authenticates `b` as part of the current fragment.
    ///
    /// It returns [`Exceeded`](crate::Exceeded) when no more data can
    /// be encrypted securely. Must not be called after `close`.
    pub fn write_byte(&mut self, b: u8) -> io::Result<()> {
        if self.closed {
            panic!("sealstream: EncWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if self.pos < self.buf_size {
            self.buffer[self.pos] = b;
            self.pos += 1;
            return Ok(());
        }
        self.seal_buffer(self.buf_size)?;
        self.buffer[0] = b;
        self.pos = 1;
        Ok(())
    }

    /// Reads from `r` until the end of the stream, encrypting and
    /// authenticating everything before writing it to the inner
    /// writer.
    ///
    /// This is the bulk counterpart of `write`: it reads one byte
    /// beyond each fragment so the end of the input identifies the
    /// final fragment, which is then written by an implicit `close`.
    /// Returns the number of bytes read from `r`.
    pub fn read_from<R: Read + ?Sized>(&mut self, r: &mut R) -> io::Result<u64> {
        if self.closed {
            panic!("sealstream: EncWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }

        let (nn, eof) = match read_full(r, &mut self.buffer[..self.buf_size + 1]) {
            Ok(v) => v,
            Err(err) => {
                self.err = Some(Latched::from(&err));
                return Err(err);
            }
        };
        if eof {
            self.pos = nn;
            return self.close().and(Ok(nn as u64));
        }

        let mut n = nn as u64;
        let mut carry = self.buffer[self.buf_size];
        self.seal_buffer(self.buf_size)?;
        loop {
            self.buffer[0] = carry;
            let (nn, eof) = match read_full(r, &mut self.buffer[1..1 + self.buf_size]) {
                Ok(v) => v,
                Err(err) => {
                    self.err = Some(Latched::from(&err));
                    return Err(err);
                }
            };
            if eof {
                self.pos = 1 + nn;
                return self.close().and(Ok(n + nn as u64));
            }
            carry = self.buffer[self.buf_size];
            self.seal_buffer(self.buf_size)?;
            n += self.buf_size as u64;
        }
    }

    /// Completes the encryption process: the buffered data - up to one
    /// fragment - is encrypted and authenticated as the final fragment
    /// and written out, then the inner writer is closed.
    ///
    /// It is safe to call `close` multiple times; only the first call
    /// performs work. `close` also succeeds when a previous write
    /// returned [`Exceeded`](crate::Exceeded): the final fragment
    /// consumes the last sequence value.
    pub fn close(&mut self) -> io::Result<()> {
        match self.err {
            None | Some(Latched::Exceeded) => {}
            Some(err) => return Err(err.to_io_error()),
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.associated_data[0] = 0x80; // For the final fragment change the AAD.
        self.nonce.stamp();
        let len = self.pos;
        let ciphertext = match self.algorithm.seal_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..len + A::TAG_LEN],
        ) {
            Ok(ciphertext) => ciphertext,
            Err(err) => {
                self.err = Some(Latched::Invalid(err));
                return Err(err.into());
            }
        };
        if let Err(err) = self.inner.write_all(ciphertext) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        match self.inner.close() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.err = Some(Latched::from(&err));
                Err(err)
            }
        }
    }

    /// Encrypt and authenticate the first `len` buffered plaintext
    /// bytes and write the ciphertext fragment to the inner writer.
    fn seal_buffer(&mut self, len: usize) -> io::Result<()> {
        if let Err(err) = self.nonce.advance() {
            self.err = Some(Latched::Exceeded);
            return Err(err.into());
        }
        let ciphertext = match self.algorithm.seal_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..len + A::TAG_LEN],
        ) {
            Ok(ciphertext) => ciphertext,
            Err(err) => {
                self.err = Some(Latched::Invalid(err));
                return Err(err.into());
            }
        };
        if let Err(err) = self.inner.write_all(ciphertext) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        Ok(())
    }
}

impl<A: Algorithm, W: Write + Close> Write for EncWriter<'_, A, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            panic!("sealstream: EncWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }

        let n = buf.len();
        let remaining = self.buf_size - self.pos;
        if n <= remaining {
            self.buffer[self.pos..self.pos + n].copy_from_slice(buf);
            self.pos += n;
            return Ok(n);
        }

        self.buffer[self.pos..self.buf_size].copy_from_slice(&buf[..remaining]);
        self.seal_buffer(self.buf_size)?;
        self.pos = 0;
        let buf = &buf[remaining..];

        let chunks = buf.chunks(self.buf_size);
        chunks
            .clone()
            .take(chunks.len() - 1) // Since we take only n-1 elements...
            .try_for_each(|chunk| {
                self.buffer[..self.buf_size].copy_from_slice(chunk);
                self.seal_buffer(self.buf_size)
            })?;

        let last = chunks.last().unwrap(); // ... there is always a last one.
        self.buffer[..last.len()].copy_from_slice(last);
        self.pos = last.len();
        Ok(n)
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write(buf).and(Ok(()))
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        match self.inner.flush() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.err = Some(Latched::from(&err));
                Err(err)
            }
        }
    }
}

impl<A: Algorithm, W: Write + Close> Close for EncWriter<'_, A, W> {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        EncWriter::close(self)
    }
}

/// Wraps a writer and decrypts and verifies everything written to it.
///
/// `DecWriter` splits data into fixed-size ciphertext fragments,
/// produced by [`EncWriter`], and decrypts and verifies each fragment
/// separately. A fragment is only opened once at least one byte beyond
/// it has arrived - the byte that proves the fragment is not the final
/// one. The still-buffered last fragment is opened by `close` as the
/// final fragment.
///
/// A `DecWriter` must be closed. Not closing it means the final
/// fragment is never verified, and the data written so far is an
/// unauthenticated prefix of the stream. Calling any write operation
/// after `close` is a logical error and panics.
///
/// # Examples
///
/// Let's decrypt a string and store the plaintext in memory:
///
/// ```
/// use std::io::Write;
/// use sealstream::ring::CHACHA20_POLY1305;
/// use sealstream::{Algorithm, Stream, BUF_SIZE};
///
/// // Load your secret keys from a secure location or derive
/// // them using a secure (password-based) key-derivation-function, like Argon2id.
/// // Obviously, don't use this all-zeros key for anything real.
/// let key = [0; CHACHA20_POLY1305::KEY_LEN];
/// let stream = Stream::new(CHACHA20_POLY1305::new(&key).unwrap(), BUF_SIZE);
///
/// // Use the same nonce that was used during encryption.
/// let nonce = [0; 8];
///
/// // Use the same associated data (AAD) that was used during encryption.
/// let aad = "Some authenticated but not encrypted data".as_bytes();
///
/// # let ciphertext = {
/// #     let mut ciphertext: Vec<u8> = Vec::default();
/// #     let mut writer = stream.encrypt_writer(&mut ciphertext, &nonce, aad);
/// #     writer.write_all("Some example plaintext".as_bytes()).unwrap();
/// #     writer.close().unwrap();
/// #     drop(writer);
/// #     ciphertext
/// # };
/// let mut plaintext: Vec<u8> = Vec::default(); // Store the plaintext in memory.
/// let mut writer = stream.decrypt_writer(&mut plaintext, &nonce, aad);
///
/// writer.write_all(&ciphertext).unwrap();
/// writer.close().unwrap(); // Complete the decryption process explicitly!
/// # drop(writer);
/// # assert_eq!(plaintext, "Some example plaintext".as_bytes());
/// ```
pub struct DecWriter<'a, A: Algorithm, W: Write + Close> {
    inner: W,
    algorithm: &'a A,
    buf_size: usize,
    nonce: Counter,
    associated_data: Box<[u8]>,
    buffer: Box<[u8]>,
    pos: usize,

    err: Option<Latched>,
    closed: bool,
}

impl<'a, A: Algorithm, W: Write + Close> DecWriter<'a, A, W> {
    pub(crate) fn new(
        inner: W,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Counter,
        associated_data: Box<[u8]>,
    ) -> Self {
        DecWriter {
            inner,
            algorithm,
            buf_size,
            nonce,
            associated_data,
            // One extra byte so the bulk path can look one byte beyond
            // a complete ciphertext fragment.
            buffer: vec![0; 1 + buf_size + A::TAG_LEN].into_boxed_slice(),
            pos: 0,
            err: None,
            closed: false,
        }
    }

    /// Returns true once the final fragment has been opened.
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Decrypts and verifies `b` as part of the current ciphertext
    /// fragment.
    ///
    /// It returns [`NotAuthentic`] when a completed fragment fails
    /// verification and [`Exceeded`](crate::Exceeded) when no more
    /// data can be decrypted securely. Must not be called after
    /// `close`.
    pub fn write_byte(&mut self, b: u8) -> io::Result<()> {
        if self.closed {
            panic!("sealstream: DecWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if self.pos < self.buf_size + A::TAG_LEN {
            self.buffer[self.pos] = b;
            self.pos += 1;
            return Ok(());
        }
        // A byte beyond a complete fragment: the buffered fragment is
        // not the final one.
        self.open_buffer(self.buf_size + A::TAG_LEN)?;
        self.buffer[0] = b;
        self.pos = 1;
        Ok(())
    }

    /// Reads from `r` until the end of the stream, decrypting and
    /// verifying everything before writing it to the inner writer.
    ///
    /// The end of the input identifies the final fragment, which is
    /// then opened by an implicit `close`. Returns the number of bytes
    /// read from `r`.
    pub fn read_from<R: Read + ?Sized>(&mut self, r: &mut R) -> io::Result<u64> {
        if self.closed {
            panic!("sealstream: DecWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }

        let ciphertext_len = self.buf_size + A::TAG_LEN;
        let (nn, eof) = match read_full(r, &mut self.buffer[..1 + ciphertext_len]) {
            Ok(v) => v,
            Err(err) => {
                self.err = Some(Latched::from(&err));
                return Err(err);
            }
        };
        if eof {
            self.pos = nn;
            return self.close().and(Ok(nn as u64));
        }

        let mut n = nn as u64;
        let mut carry = self.buffer[ciphertext_len];
        self.open_buffer(ciphertext_len)?;
        loop {
            self.buffer[0] = carry;
            let (nn, eof) = match read_full(r, &mut self.buffer[1..1 + ciphertext_len]) {
                Ok(v) => v,
                Err(err) => {
                    self.err = Some(Latched::from(&err));
                    return Err(err);
                }
            };
            if eof {
                self.pos = 1 + nn;
                return self.close().and(Ok(n + nn as u64));
            }
            carry = self.buffer[ciphertext_len];
            self.open_buffer(ciphertext_len)?;
            n += ciphertext_len as u64;
        }
    }

    /// Completes the decryption process: the buffered data is opened
    /// as the final fragment and the plaintext is written out, then
    /// the inner writer is closed.
    ///
    /// It returns [`NotAuthentic`] when the final fragment fails
    /// verification - in particular when the stream was truncated. It
    /// is safe to call `close` multiple times; only the first call
    /// performs work.
    pub fn close(&mut self) -> io::Result<()> {
        match self.err {
            None | Some(Latched::Exceeded) => {}
            Some(err) => return Err(err.to_io_error()),
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.associated_data[0] = 0x80; // For the final fragment change the AAD.
        self.nonce.stamp();
        let len = self.pos;
        let plaintext = match self.algorithm.open_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..len],
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                self.err = Some(Latched::NotAuthentic);
                return Err(NotAuthentic.into());
            }
        };
        if let Err(err) = self.inner.write_all(plaintext) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        match self.inner.close() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.err = Some(Latched::from(&err));
                Err(err)
            }
        }
    }

    /// Decrypt and verify the first `len` buffered ciphertext bytes
    /// and write the plaintext to the inner writer.
    fn open_buffer(&mut self, len: usize) -> io::Result<()> {
        if let Err(err) = self.nonce.advance() {
            self.err = Some(Latched::Exceeded);
            return Err(err.into());
        }
        let plaintext = match self.algorithm.open_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..len],
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                self.err = Some(Latched::NotAuthentic);
                return Err(NotAuthentic.into());
            }
        };
        if let Err(err) = self.inner.write_all(plaintext) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        Ok(())
    }
}

impl<A: Algorithm, W: Write + Close> Write for DecWriter<'_, A, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            panic!("sealstream: DecWriter is closed");
        }
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }

        let n = buf.len();
        let ciphertext_len = self.buf_size + A::TAG_LEN;
        let remaining = ciphertext_len - self.pos;
        if n <= remaining {
            self.buffer[self.pos..self.pos + n].copy_from_slice(buf);
            self.pos += n;
            return Ok(n);
        }

        self.buffer[self.pos..ciphertext_len].copy_from_slice(&buf[..remaining]);
        self.open_buffer(ciphertext_len)?;
        self.pos = 0;
        let buf = &buf[remaining..];

        let chunks = buf.chunks(ciphertext_len);
        chunks
            .clone()
            .take(chunks.len() - 1) // Since we take only n-1 elements...
            .try_for_each(|chunk| {
                self.buffer[..ciphertext_len].copy_from_slice(chunk);
                self.open_buffer(ciphertext_len)
            })?;

        let last = chunks.last().unwrap(); // ... there is always a last one.
        self.buffer[..last.len()].copy_from_slice(last);
        self.pos = last.len();
        Ok(n)
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write(buf).and(Ok(()))
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        match self.inner.flush() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.err = Some(Latched::from(&err));
                Err(err)
            }
        }
    }
}

impl<A: Algorithm, W: Write + Close> Close for DecWriter<'_, A, W> {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        DecWriter::close(self)
    }
}
