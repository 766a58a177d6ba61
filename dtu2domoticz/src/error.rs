use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to get any HTTP response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx status or a body that does not decode into the expected shape.
    #[error("protocol error (status {status:?}): {reason}")]
    Protocol { status: Option<u16>, reason: String },

    /// Well-formed response that carries no device entries.
    #[error("response holds no inverter data")]
    DataAbsent,

    #[error("persistence error: {0}")]
    Persistence(#[from] io::Error),

    #[error("unable to encode registry: {0}")]
    Encode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn protocol(status: Option<u16>, reason: impl Into<String>) -> Self {
        Error::Protocol {
            status,
            reason: reason.into(),
        }
    }

    /// Resource exhaustion is the only class the scheduler refuses to survive.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Persistence(e) => matches!(
                e.kind(),
                io::ErrorKind::OutOfMemory | io::ErrorKind::StorageFull
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_exhaustion_is_fatal() {
        assert!(Error::Persistence(io::Error::from(io::ErrorKind::OutOfMemory)).is_fatal());
        assert!(Error::Persistence(io::Error::from(io::ErrorKind::StorageFull)).is_fatal());
        assert!(!Error::Persistence(io::Error::from(io::ErrorKind::PermissionDenied)).is_fatal());
        assert!(!Error::DataAbsent.is_fatal());
        assert!(!Error::Transport(TransportError::Timeout("1s".into())).is_fatal());
    }
}
