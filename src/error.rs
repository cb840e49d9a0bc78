use std::error::Error;
use std::{fmt, io};

/// The error returned when a ciphertext is not authentic.
///
/// It is returned whenever the decryption of a data stream fails and
/// indicates that the data has been (maliciously) modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotAuthentic;

impl NotAuthentic {
    const fn description() -> &'static str {
        "sealstream: not authentic"
    }
}

impl Error for NotAuthentic {}

impl fmt::Display for NotAuthentic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::description())
    }
}

impl From<NotAuthentic> for io::Error {
    fn from(_: NotAuthentic) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, NotAuthentic)
    }
}

/// The error returned when no more data can be encrypted or decrypted
/// securely under the same key-nonce combination.
///
/// A stream consists of at most 2³² - 1 fragments. Once this limit is
/// reached the sequence counter would repeat and every further fragment
/// must be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Exceeded;

impl Exceeded {
    const fn description() -> &'static str {
        "sealstream: data limit exceeded"
    }
}

impl Error for Exceeded {}

impl fmt::Display for Exceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::description())
    }
}

impl From<Exceeded> for io::Error {
    fn from(_: Exceeded) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, Exceeded)
    }
}

/// The error returned when an [`Algorithm`](crate::Algorithm) rejects
/// one of its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalid {
    Key,
    Nonce,
    BufSize,
}

impl Error for Invalid {}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid::Key => write!(f, "sealstream: invalid key size"),
            Invalid::Nonce => write!(f, "sealstream: invalid nonce size"),
            Invalid::BufSize => write!(f, "sealstream: invalid buffer size"),
        }
    }
}

impl From<Invalid> for io::Error {
    fn from(err: Invalid) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

/// The terminal error recorded by an adapter.
///
/// The first failure propagates verbatim; `Latched` keeps enough of it
/// around so that every subsequent operation can return an equivalent
/// error without the adapter having to clone `io::Error` values.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Latched {
    NotAuthentic,
    Exceeded,
    Invalid(Invalid),
    Io(io::ErrorKind),
}

impl Latched {
    pub(crate) fn to_io_error(self) -> io::Error {
        match self {
            Latched::NotAuthentic => NotAuthentic.into(),
            Latched::Exceeded => Exceeded.into(),
            Latched::Invalid(err) => err.into(),
            Latched::Io(kind) => kind.into(),
        }
    }
}

impl From<&io::Error> for Latched {
    fn from(err: &io::Error) -> Self {
        match err.get_ref() {
            Some(inner) if inner.is::<NotAuthentic>() => Latched::NotAuthentic,
            Some(inner) if inner.is::<Exceeded>() => Latched::Exceeded,
            _ => Latched::Io(err.kind()),
        }
    }
}
