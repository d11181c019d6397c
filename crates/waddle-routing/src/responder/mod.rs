//! On-behalf-of IQ handling.
//!
//! RFC 6121 Section 8.5.2 requires the server, not the user's clients, to
//! answer IQ requests addressed to a bare JID. The [`OnBehalfResponder`]
//! looks up the payload namespace in a [`NamespaceRegistry`]; a known
//! namespace produces the handler's result or error, an unknown one leaves
//! the router to bounce `service-unavailable`.

mod disco;
mod ping;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minidom::Element;
use tracing::debug;
use xmpp_parsers::iq::{Iq, IqType};

use crate::error::StanzaErrorCondition;

pub use disco::{DiscoInfoHandler, Identity, DISCO_INFO_NS};
pub use ping::{PingHandler, PING_NS};

/// Source of IQ namespaces the server can answer for a user.
pub trait NamespaceRegistry: Send + Sync {
    /// Whether a handler exists for the namespace.
    fn can_answer(&self, namespace: &str) -> bool;

    /// Answer an IQ request whose namespace is known.
    ///
    /// Returns an IQ `result` or `error` addressed back to the requester.
    fn answer(&self, iq: &Iq) -> Iq;
}

/// Handles IQ requests for one payload namespace.
pub trait IqHandler: Send + Sync {
    /// Namespace of the payload element this handler answers.
    fn namespace(&self) -> &str;

    /// Build the response for a request whose payload is `payload`.
    fn handle(&self, iq: &Iq, payload: &Element, registry: &HandlerRegistry) -> Iq;
}

/// In-memory namespace registry.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn IqHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with XEP-0199 ping and XEP-0030 disco#info.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PingHandler));
        registry.register(Arc::new(DiscoInfoHandler::default()));
        registry
    }

    /// Register a handler, replacing any previous handler for its namespace.
    pub fn register(&mut self, handler: Arc<dyn IqHandler>) {
        let namespace = handler.namespace().to_string();
        if self.handlers.insert(namespace.clone(), handler).is_some() {
            debug!(namespace = %namespace, "Replaced IQ handler");
        } else {
            debug!(namespace = %namespace, "Registered IQ handler");
        }
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

impl NamespaceRegistry for HandlerRegistry {
    fn can_answer(&self, namespace: &str) -> bool {
        self.handlers.contains_key(namespace)
    }

    fn answer(&self, iq: &Iq) -> Iq {
        let handler = request_payload(iq)
            .and_then(|payload| self.handlers.get(&payload.ns()).map(|h| (h, payload)));

        match handler {
            Some((handler, payload)) => handler.handle(iq, payload, self),
            None => iq_error(iq, StanzaErrorCondition::ServiceUnavailable),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

/// Answers IQ requests on behalf of users.
#[derive(Clone)]
pub struct OnBehalfResponder {
    registry: Arc<dyn NamespaceRegistry>,
}

impl OnBehalfResponder {
    pub fn new(registry: Arc<dyn NamespaceRegistry>) -> Self {
        Self { registry }
    }

    /// Answer an IQ request, or `None` if its namespace is not handled.
    ///
    /// Only `get` and `set` requests carry a namespace; responses always
    /// yield `None`.
    pub fn answer(&self, iq: &Iq) -> Option<Iq> {
        let namespace = iq_namespace(iq)?;
        if !self.registry.can_answer(&namespace) {
            debug!(namespace = %namespace, id = %iq.id, "No handler for IQ namespace");
            return None;
        }
        debug!(namespace = %namespace, id = %iq.id, "Answering IQ on behalf of user");
        Some(self.registry.answer(iq))
    }
}

impl fmt::Debug for OnBehalfResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnBehalfResponder").finish_non_exhaustive()
    }
}

/// Payload element of an IQ request.
pub fn request_payload(iq: &Iq) -> Option<&Element> {
    match &iq.payload {
        IqType::Get(elem) | IqType::Set(elem) => Some(elem),
        IqType::Result(_) | IqType::Error(_) => None,
    }
}

/// Namespace of an IQ request's payload.
pub fn iq_namespace(iq: &Iq) -> Option<String> {
    request_payload(iq).map(|elem| elem.ns())
}

/// Build an IQ result answering `original`.
pub fn iq_result(original: &Iq, payload: Option<Element>) -> Iq {
    Iq {
        from: original.to.clone(),
        to: original.from.clone(),
        id: original.id.clone(),
        payload: IqType::Result(payload),
    }
}

/// Build an IQ error answering `original`.
pub fn iq_error(original: &Iq, condition: StanzaErrorCondition) -> Iq {
    Iq {
        from: original.to.clone(),
        to: original.from.clone(),
        id: original.id.clone(),
        payload: IqType::Error(condition.to_stanza_error()),
    }
}
