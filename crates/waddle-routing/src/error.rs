//! Error types for the routing core.

use jid::{BareJid, FullJid};
use thiserror::Error;
use xmpp_parsers::stanza_error::{DefinedCondition, ErrorType, StanzaError};

/// Routing core errors.
///
/// These are contract violations and configuration problems. Policy outcomes
/// such as "bounce with service-unavailable" are not errors; they are
/// [`RoutingDecision`](crate::RoutingDecision) values.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A resource with the same resourcepart is already registered
    #[error("Resource {0} is already registered")]
    DuplicateResource(FullJid),

    /// The resource is not registered
    #[error("Resource {0} is not registered")]
    UnknownResource(FullJid),

    /// The stanza carries no 'to' attribute
    #[error("Stanza has no destination")]
    MissingDestination,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoutingError {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Bare JID the error relates to, if any.
    pub fn bare_jid(&self) -> Option<BareJid> {
        match self {
            Self::DuplicateResource(jid) | Self::UnknownResource(jid) => Some(jid.to_bare()),
            _ => None,
        }
    }
}

/// Stanza error conditions produced by the routing core (RFC 6120 Section 8.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaErrorCondition {
    /// Bad request (malformed payload, wrong IQ type for the namespace)
    BadRequest,
    /// Feature not implemented
    FeatureNotImplemented,
    /// Item not found
    ItemNotFound,
    /// Remote server not found
    RemoteServerNotFound,
    /// Service unavailable
    ServiceUnavailable,
}

impl StanzaErrorCondition {
    /// Get the element name for this condition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::ItemNotFound => "item-not-found",
            Self::RemoteServerNotFound => "remote-server-not-found",
            Self::ServiceUnavailable => "service-unavailable",
        }
    }

    /// The error type RFC 6120 pairs with this condition.
    pub fn error_type(&self) -> StanzaErrorType {
        match self {
            Self::BadRequest => StanzaErrorType::Modify,
            Self::FeatureNotImplemented
            | Self::ItemNotFound
            | Self::RemoteServerNotFound
            | Self::ServiceUnavailable => StanzaErrorType::Cancel,
        }
    }

    /// Build the `<error/>` payload for this condition.
    ///
    /// No `<text/>` child is included.
    pub fn to_stanza_error(&self) -> StanzaError {
        let mut error = StanzaError::new(self.error_type().into(), (*self).into(), "en", "");
        error.texts.clear();
        error
    }
}

impl std::fmt::Display for StanzaErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<StanzaErrorCondition> for DefinedCondition {
    fn from(condition: StanzaErrorCondition) -> Self {
        match condition {
            StanzaErrorCondition::BadRequest => DefinedCondition::BadRequest,
            StanzaErrorCondition::FeatureNotImplemented => DefinedCondition::FeatureNotImplemented,
            StanzaErrorCondition::ItemNotFound => DefinedCondition::ItemNotFound,
            StanzaErrorCondition::RemoteServerNotFound => DefinedCondition::RemoteServerNotFound,
            StanzaErrorCondition::ServiceUnavailable => DefinedCondition::ServiceUnavailable,
        }
    }
}

/// XMPP stanza error types (RFC 6120 Section 8.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StanzaErrorType {
    /// Retry after providing credentials
    Auth,
    /// Do not retry (unrecoverable error)
    Cancel,
    /// Retry after changing the data sent
    Modify,
    /// Retry after waiting (temporary error)
    Wait,
}

impl StanzaErrorType {
    /// Get the type attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Cancel => "cancel",
            Self::Modify => "modify",
            Self::Wait => "wait",
        }
    }
}

impl std::fmt::Display for StanzaErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<StanzaErrorType> for ErrorType {
    fn from(error_type: StanzaErrorType) -> Self {
        match error_type {
            StanzaErrorType::Auth => ErrorType::Auth,
            StanzaErrorType::Cancel => ErrorType::Cancel,
            StanzaErrorType::Modify => ErrorType::Modify,
            StanzaErrorType::Wait => ErrorType::Wait,
        }
    }
}
