//! Error types shared by the ring buffer, the bridge and the generator.

use thiserror::Error;

/// Result type alias used throughout `sg-core`.
pub type Result<T> = std::result::Result<T, SgError>;

/// Error taxonomy for the bridge/generator pipeline.
///
/// Variants line up with the error kinds in the system's error-handling
/// design: transient data errors (decode, template overflow, ring full)
/// are recoverable and become counters; transport/config errors are
/// fatal to the connection or the process.
#[derive(Error, Debug)]
pub enum SgError {
    /// I/O error from a socket or the AMQP transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ring was full at commit time; the slot was recycled and the
    /// delivery dropped. Carried as an error so callers can count it,
    /// never as a reason to abort a thread.
    #[error("ring buffer is full")]
    RingFull,

    /// A slot's bytes did not decode as a valid AMQP message, or no
    /// binary body was present.
    #[error("decode error: {reason}")]
    Decode {
        /// Reason the decode failed.
        reason: String,
    },

    /// Invalid or missing configuration (URL, socket path, CLI args).
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// AMQP transport/connection/session/link protocol error.
    #[error("AMQP protocol error: {message}")]
    Amqp {
        /// Event/condition description reported by the peer or transport.
        message: String,
    },

    /// A bounded write (ring slot append, generator template render)
    /// exceeded the capacity of its destination buffer. Replaces the
    /// original `sprintf`-into-fixed-buffer pattern: callers get a
    /// failure indicator instead of silent truncation or overflow.
    #[error("bounded write exceeded capacity ({needed} > {capacity})")]
    Overflow {
        /// Bytes the write attempted to place.
        needed: usize,
        /// Capacity of the destination buffer.
        capacity: usize,
    },

    /// Socket send/setup error carrying additional context.
    #[error("socket error: {message}")]
    Socket {
        /// Description of the socket failure.
        message: String,
    },
}

impl SgError {
    /// Create a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode { reason: reason.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an AMQP protocol error.
    pub fn amqp(message: impl Into<String>) -> Self {
        Self::Amqp { message: message.into() }
    }

    /// Create a socket error.
    pub fn socket(message: impl Into<String>) -> Self {
        Self::Socket { message: message.into() }
    }

    /// True for errors that are recorded as counters and never terminate
    /// a worker thread.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RingFull | Self::Decode { .. } | Self::Overflow { .. })
    }

    /// True for errors that should be fatal to the current connection.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Amqp { .. })
    }
}

/// Convenience macro for building configuration errors with a format string.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::SgError::config(format!($($arg)*))
    };
}

/// Convenience macro for building AMQP protocol errors with a format string.
#[macro_export]
macro_rules! amqp_error {
    ($($arg:tt)*) => {
        $crate::error::SgError::amqp(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(SgError::RingFull.is_transient());
        assert!(SgError::decode("bad body").is_transient());
        assert!(!SgError::config("missing host").is_transient());
        assert!(SgError::amqp("remote-close").is_protocol());
    }

    #[test]
    fn macros_build_expected_variants() {
        let err = config_error!("bad value: {}", 42);
        assert!(matches!(err, SgError::Config { .. }));

        let err = amqp_error!("link detached: {}", "forced");
        assert!(matches!(err, SgError::Amqp { .. }));
    }
}
