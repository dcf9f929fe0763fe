//! Error types for xrow
//!
//! Two error types live side by side:
//!
//! - **Error**: everything that can go wrong inside the library, from a body
//!   that is not XML at all to a fault-registry conflict (uses thiserror)
//! - **RpcError**: the wire-level exception, a fault kind plus a message, see
//!   [`crate::fault`]
//!
//! # Transport rejections versus faults
//!
//! Only two variants are answered below the XML-RPC layer:
//! [`Error::UnsupportedContentType`] and [`Error::MalformedXml`]. The server
//! turns them into an HTTP 400. Every other variant that surfaces while
//! handling a request becomes a fault response through
//! [`Error::into_rpc_error`].
//!
//! # Examples
//!
//! ```rust
//! use xrow_core::{Error, FaultKind};
//!
//! let err = Error::UnknownTag("float".into());
//! assert!(!err.is_transport_rejection());
//! assert_eq!(err.into_rpc_error().kind(), &FaultKind::PARSE_ERROR);
//! ```

use thiserror::Error;

use crate::fault::{FaultKind, RpcError};

/// Result type for xrow operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An exception that is already expressed as a fault kind
    #[error("{0}")]
    Rpc(#[from] RpcError),

    /// The request did not declare an XML content type
    #[error("Unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    /// The body is not a well-formed XML document
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// The document declares an encoding other than UTF-8
    #[error("Unsupported document encoding: {0}")]
    UnsupportedEncoding(String),

    /// Text contains a character XML 1.0 does not allow
    #[error("Invalid character: {0}")]
    InvalidCharacter(String),

    /// Well-formed XML that does not follow the XML-RPC grammar
    #[error("Invalid XML-RPC document: {0}")]
    InvalidDocument(String),

    #[error("Unknown value type <{0}>")]
    UnknownTag(String),

    /// Scalar text that cannot be read as its declared type
    #[error("Invalid <{tag}> value: {text:?}")]
    InvalidScalar {
        tag: &'static str,
        text: String,
    },

    /// A value with no XML-RPC representation
    #[error("Cannot encode value: {0}")]
    Unencodable(String),

    #[error("Fault code {code} is already registered to {existing}")]
    DuplicateFaultCode { code: i32, existing: FaultKind },

    #[error("Fault kind {kind} is already registered with code {existing}")]
    DuplicateFaultKind { kind: FaultKind, existing: i32 },

    #[error("Unknown fault kind: {0}")]
    UnknownFaultKind(FaultKind),

    /// Built-in kinds and the root cannot be re-parented or unregistered
    #[error("Fault kind {0} cannot be changed")]
    ProtectedFaultKind(FaultKind),

    #[error("Fault kind {0} would become its own ancestor")]
    CyclicFaultKind(FaultKind),

    #[error("A global fault registry is already installed")]
    RegistryInstalled,

    /// Transport failure on the calling side
    #[error("HTTP error: {0}")]
    Http(String),

    /// A response document that carries neither a value nor a fault
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the transport should refuse the request instead of answering it
    pub fn is_transport_rejection(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedContentType(_) | Error::MalformedXml(_)
        )
    }

    /// The exception reported to the peer for this error
    pub fn into_rpc_error(self) -> RpcError {
        let message = self.to_string();
        match self {
            Error::Rpc(err) => err,
            Error::UnsupportedEncoding(_) => RpcError::new(FaultKind::UNSUPPORTED_ENCODING, message),
            Error::InvalidCharacter(_) => RpcError::new(FaultKind::INVALID_CHARACTER, message),
            Error::UnsupportedContentType(_)
            | Error::MalformedXml(_)
            | Error::InvalidDocument(_)
            | Error::UnknownTag(_)
            | Error::InvalidScalar { .. }
            | Error::InvalidResponse(_) => RpcError::parse_error(message),
            Error::Http(_) | Error::Io(_) => RpcError::new(FaultKind::TRANSPORT_ERROR, message),
            Error::Unencodable(_)
            | Error::DuplicateFaultCode { .. }
            | Error::DuplicateFaultKind { .. }
            | Error::UnknownFaultKind(_)
            | Error::ProtectedFaultKind(_)
            | Error::CyclicFaultKind(_)
            | Error::RegistryInstalled
            | Error::Internal(_) => RpcError::generic(message),
        }
    }
}
