// Copyright (c) 2019 Andreas Auernhammer. All rights reserved.
// Use of this source code is governed by a license that can be
// found in the LICENSE file.

use crate::aead::{Algorithm, Counter};
use crate::error::{Exceeded, Latched, NotAuthentic};
use crate::utils::{read_full, ReadAt, SectionReader};
use std::io;
use std::io::{Read, Write};
use std::sync::Mutex;

/// Wraps a reader and encrypts and authenticates everything it reads
/// from it.
///
/// `EncReader` reads one byte beyond each plaintext fragment. The
/// extra byte - the carry - tells it whether another fragment follows
/// before it commits to a fragment's authentication flag. A short read
/// from the wrapped reader therefore marks the current fragment as the
/// final one; afterwards `read` returns `Ok(0)`.
///
/// # Examples
///
/// ```
/// use std::io::Read;
/// use sealstream::ring::AES_256_GCM;
/// use sealstream::{Algorithm, Stream, BUF_SIZE};
///
/// // Load your secret keys from a secure location or derive
/// // them using a secure (password-based) key-derivation-function, like Argon2id.
/// // Obviously, don't use this all-zeros key for anything real.
/// let key = [0; AES_256_GCM::KEY_LEN];
/// let stream = Stream::new(AES_256_GCM::new(&key).unwrap(), BUF_SIZE);
///
/// let plaintext = "Some example plaintext".as_bytes();
/// let mut ciphertext = Vec::new();
/// stream
///     .encrypt_reader(plaintext, &[0; 8], b"")
///     .read_to_end(&mut ciphertext)
///     .unwrap();
///
/// let overhead = stream.overhead(plaintext.len() as u64);
/// assert_eq!(ciphertext.len() as u64, plaintext.len() as u64 + overhead);
/// ```
pub struct EncReader<'a, A: Algorithm, R: Read> {
    inner: R,
    algorithm: &'a A,
    buf_size: usize,
    nonce: Counter,
    associated_data: Box<[u8]>,

    buffer: Box<[u8]>,
    buffered: usize,
    pos: usize,

    err: Option<Latched>,
    carry: u8,
    first_read: bool,
    closed: bool,
}

impl<'a, A: Algorithm, R: Read> EncReader<'a, A, R> {
    pub(crate) fn new(
        inner: R,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Counter,
        associated_data: Box<[u8]>,
    ) -> Self {
        EncReader {
            inner,
            algorithm,
            buf_size,
            nonce,
            associated_data,
            buffer: vec![0; 1 + buf_size + A::TAG_LEN].into_boxed_slice(),
            buffered: 0,
            pos: 0,
            err: None,
            carry: 0,
            first_read: true,
            closed: false,
        }
    }

    /// Reads from the wrapped reader and returns one encrypted and
    /// authenticated byte, or `None` at the end of the stream.
    ///
    /// It returns [`Exceeded`](crate::Exceeded) when no more bytes can
    /// be encrypted securely.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if self.first_read {
            self.first_read = false;
            self.read_fragment(&mut [], 0)?;
            self.pos = 1;
            return Ok(Some(self.buffer[0]));
        }
        if self.pos < self.buffered {
            let b = self.buffer[self.pos];
            self.pos += 1;
            return Ok(Some(b));
        }
        if self.closed {
            return Ok(None);
        }
        self.read_fragment(&mut [], 1)?;
        self.pos = 1;
        Ok(Some(self.buffer[0]))
    }

    /// Keeps reading from the wrapped reader until the end of the
    /// stream, encrypting and authenticating everything before writing
    /// it to `w`. Returns the number of ciphertext bytes written.
    ///
    /// It returns [`Exceeded`](crate::Exceeded) when no more data can
    /// be encrypted securely.
    pub fn write_to<W: Write + ?Sized>(&mut self, w: &mut W) -> io::Result<u64> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        let mut n = 0u64;
        if self.first_read {
            self.first_read = false;
            self.read_fragment(&mut [], 0)?;
        }
        if self.pos < self.buffered {
            n += self.flush_buffered(w)? as u64;
        }
        if self.closed {
            return Ok(n);
        }
        loop {
            self.read_fragment(&mut [], 1)?;
            n += self.flush_buffered(w)? as u64;
            if self.closed {
                return Ok(n);
            }
        }
    }

    fn flush_buffered<W: Write + ?Sized>(&mut self, w: &mut W) -> io::Result<usize> {
        let n = self.buffered - self.pos;
        if let Err(err) = w.write_all(&self.buffer[self.pos..self.buffered]) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        self.pos = self.buffered;
        Ok(n)
    }

    /// Processes the next plaintext fragment: reads it - plus the
    /// look-ahead byte - from the wrapped reader, seals it, and
    /// delivers as much ciphertext into `p` as fits. Whatever does not
    /// fit stays buffered for subsequent calls.
    ///
    /// `first_read_offset` is 0 for the very first fragment and 1
    /// afterwards, when slot 0 already holds the carry byte.
    fn read_fragment(&mut self, p: &mut [u8], first_read_offset: usize) -> io::Result<usize> {
        if let Err(err) = self.nonce.advance_wrapping() {
            self.err = Some(Latched::Exceeded);
            return Err(err.into());
        }

        self.buffer[0] = self.carry;
        let (n, eof) = match read_full(
            &mut self.inner,
            &mut self.buffer[first_read_offset..1 + self.buf_size],
        ) {
            Ok(v) => v,
            Err(err) => {
                self.err = Some(Latched::from(&err));
                return Err(err);
            }
        };
        let fragment_len = if eof {
            self.closed = true;
            self.associated_data[0] = 0x80;
            first_read_offset + n
        } else {
            self.carry = self.buffer[self.buf_size];
            self.buf_size
        };

        let sealed_len = fragment_len + A::TAG_LEN;
        if p.len() >= sealed_len {
            // Fast path: seal directly into the caller's buffer.
            p[..fragment_len].copy_from_slice(&self.buffer[..fragment_len]);
            if let Err(err) = self.algorithm.seal_in_place(
                self.nonce.as_bytes(),
                &self.associated_data,
                &mut p[..sealed_len],
            ) {
                self.err = Some(Latched::Invalid(err));
                return Err(err.into());
            }
            self.buffered = 0;
            self.pos = 0;
            return Ok(sealed_len);
        }

        if let Err(err) = self.algorithm.seal_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..sealed_len],
        ) {
            self.err = Some(Latched::Invalid(err));
            return Err(err.into());
        }
        self.buffered = sealed_len;
        self.pos = p.len();
        p.copy_from_slice(&self.buffer[..p.len()]);
        Ok(self.pos)
    }
}

impl<A: Algorithm, R: Read> Read for EncReader<'_, A, R> {
    fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if p.is_empty() {
            return Ok(0);
        }

        let mut n = 0;
        if self.first_read {
            self.first_read = false;
            n = self.read_fragment(p, 0)?;
            if n == p.len() {
                return Ok(n);
            }
        }
        if self.pos < self.buffered {
            let nn = (p.len() - n).min(self.buffered - self.pos);
            p[n..n + nn].copy_from_slice(&self.buffer[self.pos..self.pos + nn]);
            self.pos += nn;
            n += nn;
            if n == p.len() {
                return Ok(n);
            }
        }
        if self.closed {
            return Ok(n);
        }
        let nn = self.read_fragment(&mut p[n..], 1)?;
        Ok(n + nn)
    }
}

/// Wraps a reader and decrypts and verifies everything it reads from
/// it.
///
/// Like [`EncReader`], a `DecReader` reads one byte beyond each
/// ciphertext fragment; a short read marks the buffered fragment as
/// the final one. No plaintext byte is handed to the caller before the
/// fragment it belongs to has been verified, and the first failure -
/// [`NotAuthentic`], [`Exceeded`](crate::Exceeded) or an I/O error -
/// is permanent.
///
/// # Examples
///
/// ```
/// use std::io::{Read, Write};
/// use sealstream::ring::AES_256_GCM;
/// use sealstream::{Algorithm, Stream, BUF_SIZE};
///
/// let key = [0; AES_256_GCM::KEY_LEN];
/// let stream = Stream::new(AES_256_GCM::new(&key).unwrap(), BUF_SIZE);
///
/// # let ciphertext = {
/// #     let mut ciphertext = Vec::new();
/// #     let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], b"");
/// #     writer.write_all("Some example plaintext".as_bytes()).unwrap();
/// #     writer.close().unwrap();
/// #     drop(writer);
/// #     ciphertext
/// # };
/// let mut plaintext = Vec::new();
/// stream
///     .decrypt_reader(ciphertext.as_slice(), &[0; 8], b"")
///     .read_to_end(&mut plaintext)
///     .unwrap();
/// assert_eq!(plaintext, "Some example plaintext".as_bytes());
/// ```
pub struct DecReader<'a, A: Algorithm, R: Read> {
    inner: R,
    algorithm: &'a A,
    buf_size: usize,
    nonce: Counter,
    associated_data: Box<[u8]>,

    buffer: Box<[u8]>,
    buffered: usize,
    pos: usize,

    err: Option<Latched>,
    carry: u8,
    first_read: bool,
    closed: bool,
}

impl<'a, A: Algorithm, R: Read> DecReader<'a, A, R> {
    pub(crate) fn new(
        inner: R,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Counter,
        associated_data: Box<[u8]>,
    ) -> Self {
        let buffer = vec![0; 1 + buf_size + A::TAG_LEN].into_boxed_slice();
        Self::from_parts(inner, algorithm, buf_size, nonce, associated_data, buffer)
    }

    /// Assembles a `DecReader` around a caller-provided buffer, so
    /// [`DecReaderAt`] can recycle buffers across `read_at` calls. The
    /// buffer must be `1 + buf_size + TAG_LEN` bytes.
    pub(crate) fn from_parts(
        inner: R,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Counter,
        associated_data: Box<[u8]>,
        buffer: Box<[u8]>,
    ) -> Self {
        DecReader {
            inner,
            algorithm,
            buf_size,
            nonce,
            associated_data,
            buffer,
            buffered: 0,
            pos: 0,
            err: None,
            carry: 0,
            first_read: true,
            closed: false,
        }
    }

    pub(crate) fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }

    /// Reads from the wrapped reader and returns one decrypted and
    /// verified byte, or `None` at the end of the stream.
    ///
    /// It returns [`NotAuthentic`] if the read data is not authentic
    /// and [`Exceeded`](crate::Exceeded) when no more bytes can be
    /// decrypted securely.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if self.first_read {
            self.first_read = false;
            self.read_fragment(&mut [], 0)?;
            if self.buffered == 0 {
                return Ok(None); // empty stream: a single empty final fragment
            }
            self.pos = 1;
            return Ok(Some(self.buffer[0]));
        }
        if self.pos < self.buffered {
            let b = self.buffer[self.pos];
            self.pos += 1;
            return Ok(Some(b));
        }
        if self.closed {
            return Ok(None);
        }
        self.read_fragment(&mut [], 1)?;
        if self.buffered == 0 {
            return Ok(None); // empty final fragment
        }
        self.pos = 1;
        Ok(Some(self.buffer[0]))
    }

    /// Keeps reading from the wrapped reader until the end of the
    /// stream, decrypting and verifying everything before writing it
    /// to `w`. Returns the number of plaintext bytes written.
    ///
    /// It returns [`NotAuthentic`] if the read data is not authentic
    /// and [`Exceeded`](crate::Exceeded) when no more data can be
    /// decrypted securely.
    pub fn write_to<W: Write + ?Sized>(&mut self, w: &mut W) -> io::Result<u64> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        let mut n = 0u64;
        if self.first_read {
            self.first_read = false;
            self.read_fragment(&mut [], 0)?;
        }
        if self.pos < self.buffered {
            n += self.flush_buffered(w)? as u64;
        }
        if self.closed {
            return Ok(n);
        }
        loop {
            self.read_fragment(&mut [], 1)?;
            n += self.flush_buffered(w)? as u64;
            if self.closed {
                return Ok(n);
            }
        }
    }

    fn flush_buffered<W: Write + ?Sized>(&mut self, w: &mut W) -> io::Result<usize> {
        let n = self.buffered - self.pos;
        if let Err(err) = w.write_all(&self.buffer[self.pos..self.buffered]) {
            self.err = Some(Latched::from(&err));
            return Err(err);
        }
        self.pos = self.buffered;
        Ok(n)
    }

    /// Processes the next ciphertext fragment: reads it - plus the
    /// look-ahead byte - from the wrapped reader, opens it, and
    /// delivers as much plaintext into `p` as fits. Whatever does not
    /// fit stays buffered for subsequent calls.
    fn read_fragment(&mut self, p: &mut [u8], first_read_offset: usize) -> io::Result<usize> {
        if let Err(err) = self.nonce.advance_wrapping() {
            self.err = Some(Latched::Exceeded);
            return Err(err.into());
        }

        let ciphertext_len = self.buf_size + A::TAG_LEN;
        self.buffer[0] = self.carry;
        let (n, eof) = match read_full(
            &mut self.inner,
            &mut self.buffer[first_read_offset..1 + ciphertext_len],
        ) {
            Ok(v) => v,
            Err(err) => {
                self.err = Some(Latched::from(&err));
                return Err(err);
            }
        };
        let fragment_len = if eof {
            if first_read_offset + n < A::TAG_LEN {
                // No fragment this short can carry a valid tag.
                self.err = Some(Latched::NotAuthentic);
                return Err(NotAuthentic.into());
            }
            self.closed = true;
            self.associated_data[0] = 0x80;
            first_read_offset + n
        } else {
            self.carry = self.buffer[ciphertext_len];
            ciphertext_len
        };

        let plaintext_len = match self.algorithm.open_in_place(
            self.nonce.as_bytes(),
            &self.associated_data,
            &mut self.buffer[..fragment_len],
        ) {
            Ok(plaintext) => plaintext.len(),
            Err(_) => {
                self.err = Some(Latched::NotAuthentic);
                return Err(NotAuthentic.into());
            }
        };

        if p.len() >= plaintext_len {
            p[..plaintext_len].copy_from_slice(&self.buffer[..plaintext_len]);
            self.buffered = 0;
            self.pos = 0;
            return Ok(plaintext_len);
        }
        self.buffered = plaintext_len;
        self.pos = p.len();
        p.copy_from_slice(&self.buffer[..p.len()]);
        Ok(self.pos)
    }
}

impl<A: Algorithm, R: Read> Read for DecReader<'_, A, R> {
    fn read(&mut self, p: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.err {
            return Err(err.to_io_error());
        }
        if p.is_empty() {
            return Ok(0);
        }

        let mut n = 0;
        if self.first_read {
            self.first_read = false;
            n = self.read_fragment(p, 0)?;
            if n == p.len() {
                return Ok(n);
            }
        }
        if self.pos < self.buffered {
            let nn = (p.len() - n).min(self.buffered - self.pos);
            p[n..n + nn].copy_from_slice(&self.buffer[self.pos..self.pos + nn]);
            self.pos += nn;
            n += nn;
            if n == p.len() {
                return Ok(n);
            }
        }
        if self.closed {
            return Ok(n);
        }
        let nn = self.read_fragment(&mut p[n..], 1)?;
        Ok(n + nn)
    }
}

/// Wraps a random-access reader and decrypts and verifies everything
/// it reads from it, starting at arbitrary plaintext offsets.
///
/// For every `read_at` call the `DecReaderAt` re-derives the sequence
/// number of the fragment containing the requested offset and streams
/// the ciphertext from that fragment forward through an ephemeral
/// [`DecReader`]; the stream construction itself then discovers the
/// final fragment. `DecReaderAt` holds no mutable state apart from a
/// pool of fragment buffers, so `read_at` may be called concurrently
/// from multiple threads as long as the wrapped reader and the
/// algorithm support concurrent use.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use sealstream::ring::AES_256_GCM;
/// use sealstream::{Algorithm, Stream, BUF_SIZE};
///
/// let key = [0; AES_256_GCM::KEY_LEN];
/// let stream = Stream::new(AES_256_GCM::new(&key).unwrap(), BUF_SIZE);
///
/// let mut ciphertext = Vec::new();
/// let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], b"");
/// writer.write_all(b"some plaintext").unwrap();
/// writer.close().unwrap();
/// # drop(writer);
///
/// let reader = stream.decrypt_reader_at(ciphertext.as_slice(), &[0; 8], b"");
/// let mut buf = [0; 9];
/// reader.read_at(&mut buf, 5).unwrap();
/// assert_eq!(&buf, b"plaintext");
/// ```
pub struct DecReaderAt<'a, A: Algorithm, R: ReadAt> {
    inner: R,
    algorithm: &'a A,
    buf_size: usize,
    nonce: Box<[u8]>,
    associated_data: Box<[u8]>,
    pool: BufferPool,
}

impl<'a, A: Algorithm, R: ReadAt> DecReaderAt<'a, A, R> {
    pub(crate) fn new(
        inner: R,
        algorithm: &'a A,
        buf_size: usize,
        nonce: Box<[u8]>,
        associated_data: Box<[u8]>,
    ) -> Self {
        DecReaderAt {
            inner,
            algorithm,
            buf_size,
            nonce,
            associated_data,
            pool: BufferPool::new(1 + buf_size + A::TAG_LEN),
        }
    }

    /// Reads decrypted and verified plaintext into `p`, starting at
    /// the absolute plaintext offset `offset`.
    ///
    /// `p` is filled completely unless the stream ends first, in which
    /// case the number of bytes before the end is returned - reading
    /// at or beyond the end returns `Ok(0)`.
    ///
    /// It returns [`NotAuthentic`] if the read data is not authentic
    /// and [`Exceeded`](crate::Exceeded) when `offset` lies beyond the
    /// data limit.
    pub fn read_at(&self, p: &mut [u8], offset: u64) -> io::Result<usize> {
        let fragment = offset / self.buf_size as u64;
        if fragment + 1 > u64::from(u32::MAX) {
            return Err(Exceeded.into());
        }
        let ciphertext_len = (self.buf_size + A::TAG_LEN) as u64;

        let mut nonce = Counter::new(A::NONCE_LEN, &self.nonce);
        nonce.seq_num = 1 + fragment as u32;

        let mut reader = DecReader::from_parts(
            SectionReader::new(&self.inner, fragment * ciphertext_len),
            self.algorithm,
            self.buf_size,
            nonce,
            self.associated_data.clone(),
            self.pool.get(),
        );

        let result = read_section(&mut reader, p, offset % self.buf_size as u64);
        self.pool.put(reader.into_buffer());
        result
    }
}

impl<A: Algorithm, R: ReadAt> ReadAt for DecReaderAt<'_, A, R> {
    #[inline(always)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        DecReaderAt::read_at(self, buf, offset)
    }
}

/// Discards the first `discard` plaintext bytes of the fragment the
/// ephemeral reader is positioned on, then fills `p`.
fn read_section<A: Algorithm, R: Read>(
    reader: &mut DecReader<'_, A, R>,
    p: &mut [u8],
    discard: u64,
) -> io::Result<usize> {
    if discard > 0 {
        let skipped = io::copy(&mut reader.by_ref().take(discard), &mut io::sink())?;
        if skipped < discard {
            return Ok(0); // offset is past the end of the stream
        }
    }
    let (n, _) = read_full(reader, p)?;
    Ok(n)
}

/// A free list of fragment buffers, shared by the ephemeral decoders
/// of one [`DecReaderAt`] so concurrent `read_at` calls do not
/// allocate per call.
struct BufferPool {
    buf_len: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

impl BufferPool {
    fn new(buf_len: usize) -> Self {
        BufferPool {
            buf_len,
            free: Mutex::new(Vec::new()),
        }
    }

    fn get(&self) -> Box<[u8]> {
        let buffer = self.free.lock().unwrap_or_else(|err| err.into_inner()).pop();
        buffer.unwrap_or_else(|| vec![0; self.buf_len].into_boxed_slice())
    }

    fn put(&self, buffer: Box<[u8]>) {
        self.free
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(buffer);
    }
}

#[cfg(all(test, feature = "ring"))]
mod tests {
    use super::*;
    use crate::ring::AES_256_GCM;
    use crate::Stream;

    fn stream(buf_size: usize) -> Stream<AES_256_GCM> {
        Stream::new(AES_256_GCM::new(&[0; AES_256_GCM::KEY_LEN]).unwrap(), buf_size)
    }

    fn encrypt(stream: &Stream<AES_256_GCM>, plaintext: &[u8]) -> Vec<u8> {
        let mut ciphertext = Vec::new();
        let mut writer = stream.encrypt_writer(&mut ciphertext, &[0; 8], &[]);
        writer.write_all(plaintext).unwrap();
        writer.close().unwrap();
        drop(writer);
        ciphertext
    }

    #[test]
    fn reader_exhaustion_after_wraparound() {
        let stream = stream(4);
        let ciphertext = encrypt(&stream, &[0; 16]);

        let mut reader = stream.decrypt_reader(ciphertext.as_slice(), &[0; 8], &[]);
        reader.nonce.seq_num = 0; // as if the counter had wrapped
        let err = reader.read(&mut [0; 4]).unwrap_err();
        assert!(err.get_ref().unwrap().is::<Exceeded>());

        // The error is latched.
        let err = reader.read(&mut [0; 4]).unwrap_err();
        assert!(err.get_ref().unwrap().is::<Exceeded>());
    }

    #[test]
    fn enc_reader_uses_every_sequence_value() {
        let stream = stream(4);
        let plaintext = [7u8; 4];

        // The final fragment may consume the very last sequence value.
        let mut ciphertext = Vec::new();
        let mut reader = stream.encrypt_reader(&plaintext[..], &[0; 8], &[]);
        reader.nonce.seq_num = u32::MAX;
        reader.write_to(&mut ciphertext).unwrap();

        let mut decrypted = Vec::new();
        let mut reader = stream.decrypt_reader(ciphertext.as_slice(), &[0; 8], &[]);
        reader.nonce.seq_num = u32::MAX;
        reader.write_to(&mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn enc_reader_exhaustion_mid_stream() {
        let stream = stream(4);

        // Two fragments: the second read wraps the counter to 0.
        let mut reader = stream.encrypt_reader(&[7u8; 9][..], &[0; 8], &[]);
        reader.nonce.seq_num = u32::MAX;
        let mut ciphertext = Vec::new();
        let err = reader.write_to(&mut ciphertext).unwrap_err();
        assert!(err.get_ref().unwrap().is::<Exceeded>());
    }
}
