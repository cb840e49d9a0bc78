use std::io;
use std::io::{Read, Write};

/// A trait for writers that must be told when the stream of writes is
/// complete.
///
/// Any writer wrapped by [`EncWriter`](crate::EncWriter) or
/// [`DecWriter`](crate::DecWriter) must implement `Close`: closing the
/// outer writer seals or opens the final fragment and then closes the
/// inner writer, so that completion travels down a whole chain of
/// writers. Writers without any cleanup logic can be wrapped with
/// [`NopCloser`].
///
/// `close` must be callable more than once; only the first call may
/// perform work.
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

impl<T: Close + ?Sized> Close for &mut T {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        Close::close(*self)
    }
}

impl<T: Close + ?Sized> Close for Box<T> {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        self.as_mut().close()
    }
}

impl Close for Vec<u8> {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Close for io::Sink {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<W: Write + Close> Close for io::BufWriter<W> {
    #[inline]
    fn close(&mut self) -> io::Result<()> {
        self.flush().and_then(|_| self.get_mut().close())
    }
}

impl<W: Write + Close> Close for io::LineWriter<W> {
    #[inline]
    fn close(&mut self) -> io::Result<()> {
        self.flush().and_then(|_| self.get_mut().close())
    }
}

/// NopCloser wraps a writer and implements the `Close` trait by
/// performing a `flush` when the `close` method is called. It should
/// only be used to wrap a writer which does not implement the `Close`
/// trait.
///
/// # Examples
///
/// ```
/// use std::io;
/// use std::io::Write;
/// use sealstream::ring::AES_256_GCM;
/// use sealstream::{Algorithm, NopCloser, Stream, BUF_SIZE};
///
/// // Load your secret keys from a secure location or derive
/// // them using a secure (password-based) key-derivation-function, like Argon2id.
/// // Obviously, don't use this all-zeros key for anything real.
/// let key = [0; AES_256_GCM::KEY_LEN];
/// let stream = Stream::new(AES_256_GCM::new(&key).unwrap(), BUF_SIZE);
///
/// // Make sure you use an unique key-nonce combination!
/// // Reusing a nonce value for the same secret key breaks
/// // the security of the encryption algorithm.
/// let nonce = [0; 8];
///
/// let mut writer = stream.encrypt_writer(
///     NopCloser::wrap(io::stdout()), // Without wrapping STDOUT the code would not compile.
///     &nonce,
///     b"Some authenticated but not encrypted data",
/// );
///
/// writer.write_all(b"Some example plaintext").expect("There could be your error handling");
///
/// // Complete the encryption process explicitly.
/// writer.close().expect("There could be your error handling");
/// ```
pub struct NopCloser<W: Write>(W);

impl<W: Write> NopCloser<W> {
    /// Wraps a writer.
    #[inline(always)]
    pub fn wrap(w: W) -> Self {
        Self(w)
    }
}

impl<W: Write> From<W> for NopCloser<W> {
    #[inline(always)]
    fn from(w: W) -> Self {
        Self::wrap(w)
    }
}

impl<W: Write> Write for NopCloser<W> {
    #[inline(always)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    #[inline(always)]
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> Close for NopCloser<W> {
    #[inline(always)]
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<W: Write> AsRef<W> for NopCloser<W> {
    #[inline(always)]
    fn as_ref(&self) -> &W {
        &self.0
    }
}

impl<W: Write> AsMut<W> for NopCloser<W> {
    #[inline(always)]
    fn as_mut(&mut self) -> &mut W {
        &mut self.0
    }
}

/// A trait for reading bytes at an absolute offset, leaving no cursor
/// state behind.
///
/// `read_at` may return fewer bytes than requested. Reading at or past
/// the end of the source returns `Ok(0)`. Implementations must support
/// concurrent calls on a shared reference if they are `Sync`, which is
/// what makes [`DecReaderAt`](crate::DecReaderAt) usable from multiple
/// threads.
pub trait ReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    #[inline(always)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let at = offset as usize;
        let n = buf.len().min(self.len() - at);
        buf[..n].copy_from_slice(&self[at..at + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    #[inline(always)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    #[inline(always)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for std::fs::File {
    #[inline(always)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

/// Adapts a [`ReadAt`] into an [`io::Read`] that starts at a fixed
/// offset and reads until the underlying source is exhausted.
pub struct SectionReader<R: ReadAt> {
    inner: R,
    offset: u64,
}

impl<R: ReadAt> SectionReader<R> {
    pub fn new(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }
}

impl<R: ReadAt> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}

/// Fills `buf` from `r`, stopping early only at the end of the stream.
///
/// Returns the number of bytes read and whether the end of the stream
/// was reached before `buf` was full. End-of-stream is data here, not
/// an error: the look-ahead logic of the stream adapters is driven by
/// exactly this distinction.
pub(crate) fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<(usize, bool)> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => return Ok((n, true)),
            Ok(nn) => n += nn,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok((n, false))
}
