//! Stanza routing for locally addressed and remote destinations.
//!
//! This module provides the `StanzaRouter`, the single entry point that takes
//! an inbound stanza from the session layer and routes it per RFC 6121
//! Section 8.5.
//!
//! # Routing Logic
//!
//! For each stanza, the router:
//! 1. Extracts the destination JID from the stanza
//! 2. Classifies it against the local domains and the resource directory
//! 3. Asks the routing policy what to do with the stanza
//! 4. Executes the decision: deliver, answer on behalf of the user, bounce,
//!    drop, or hand to inter-domain routing
//!
//! # Example
//!
//! ```ignore
//! use waddle_routing::{RouterConfig, ResourceDirectory, StanzaRouter};
//!
//! let directory = Arc::new(ResourceDirectory::new());
//! let router = StanzaRouter::new(RouterConfig::new("example.com"), directory)?
//!     .with_remote_router(s2s);
//!
//! // Route a message - local delivery, error bounce or federation
//! router.route_from(message.into(), &origin_session)?;
//! ```

use std::fmt;
use std::sync::Arc;

use jid::Jid;
use tracing::{debug, info, instrument};

use crate::address::{AddressCategory, AddressClassifier, LocalDomains};
use crate::config::RouterConfig;
use crate::directory::{ResourceDirectory, SessionHandle};
use crate::executor::{DeliveryExecutor, RemoteRouter, RoutingOutcome};
use crate::metrics;
use crate::policy::{RoutingDecision, RoutingPolicy};
use crate::responder::{HandlerRegistry, NamespaceRegistry, OnBehalfResponder};
use crate::stanza::Stanza;
use crate::RoutingError;

/// Stanza router wiring classification, policy and delivery together.
pub struct StanzaRouter {
    /// Router configuration
    config: RouterConfig,
    /// Local domain check and address categories
    classifier: AddressClassifier,
    /// Available resources, shared with the session layer
    directory: Arc<ResourceDirectory>,
    /// RFC 6121 decision table with the configured policy choices
    policy: RoutingPolicy,
    /// IQ answers on behalf of users
    responder: OnBehalfResponder,
    /// Carries out decisions
    executor: DeliveryExecutor,
    /// Inter-domain routing (None if federation disabled)
    remote: Option<Arc<dyn RemoteRouter>>,
}

impl StanzaRouter {
    /// Create a new stanza router.
    ///
    /// # Arguments
    ///
    /// * `config` - Router configuration including the local domains
    /// * `directory` - Resource directory maintained by the session layer
    pub fn new(config: RouterConfig, directory: Arc<ResourceDirectory>) -> Result<Self, RoutingError> {
        config.validate()?;

        let classifier = AddressClassifier::new(LocalDomains::new(&config.local_domains));
        let registry = if config.builtin_handlers {
            HandlerRegistry::with_builtin_handlers()
        } else {
            HandlerRegistry::new()
        };
        let executor = DeliveryExecutor::new(Arc::clone(&directory), classifier.clone(), None);

        info!(
            local_domains = ?config.local_domains,
            multi_resource_policy = ?config.multi_resource_policy,
            namespaces = ?registry.namespaces(),
            "StanzaRouter initialized"
        );

        Ok(Self {
            policy: RoutingPolicy::from_config(&config),
            responder: OnBehalfResponder::new(Arc::new(registry)),
            config,
            classifier,
            directory,
            executor,
            remote: None,
        })
    }

    /// Replace the namespace registry used for IQs addressed to bare JIDs.
    pub fn with_namespace_registry(mut self, registry: Arc<dyn NamespaceRegistry>) -> Self {
        self.responder = OnBehalfResponder::new(registry);
        self
    }

    /// Enable inter-domain routing through `remote`.
    pub fn with_remote_router(mut self, remote: Arc<dyn RemoteRouter>) -> Self {
        info!("Inter-domain routing enabled");
        self.executor = DeliveryExecutor::new(
            Arc::clone(&self.directory),
            self.classifier.clone(),
            Some(Arc::clone(&remote)),
        );
        self.remote = Some(remote);
        self
    }

    /// Get the router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the resource directory.
    pub fn directory(&self) -> &Arc<ResourceDirectory> {
        &self.directory
    }

    /// Check if inter-domain routing is enabled.
    pub fn is_federation_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Classify a destination JID.
    pub fn get_destination(&self, jid: &Jid) -> AddressCategory {
        self.classifier.classify(jid, &self.directory)
    }

    /// Check if a JID is local to this server.
    pub fn is_local_jid(&self, jid: &Jid) -> bool {
        self.classifier.is_local_jid(jid)
    }

    /// Decide how a stanza would be routed, without executing anything.
    pub fn decide(&self, stanza: &Stanza) -> Result<RoutingDecision, RoutingError> {
        let to = stanza.to().ok_or(RoutingError::MissingDestination)?;
        let category = self.get_destination(to);
        let decision = self
            .policy
            .decide(stanza, &category, &self.directory, &self.responder);

        debug!(
            category = category.label(),
            decision = decision.label(),
            targets = decision.targets().len(),
            "Routing decision"
        );
        Ok(decision)
    }

    /// Route a stanza received from the session layer.
    ///
    /// Replies go to the sender's session looked up by its `from` address.
    #[instrument(
        skip(self, stanza),
        fields(from = ?stanza.sender(), to = ?stanza.to(), kind = stanza.name(), stanza_type = stanza.type_name())
    )]
    pub fn route(&self, stanza: Stanza) -> Result<RoutingOutcome, RoutingError> {
        self.route_inner(stanza, None)
    }

    /// Route a stanza, sending any reply to the session it arrived on.
    #[instrument(
        skip(self, stanza, origin),
        fields(from = ?stanza.sender(), to = ?stanza.to(), kind = stanza.name(), stanza_type = stanza.type_name())
    )]
    pub fn route_from(
        &self,
        stanza: Stanza,
        origin: &SessionHandle,
    ) -> Result<RoutingOutcome, RoutingError> {
        self.route_inner(stanza, Some(origin))
    }

    fn route_inner(
        &self,
        stanza: Stanza,
        origin: Option<&SessionHandle>,
    ) -> Result<RoutingOutcome, RoutingError> {
        let decision = self.decide(&stanza)?;
        let kind = stanza.name();
        metrics::record_decision(kind, decision.label());

        let outcome = self.executor.execute(decision, stanza, origin);
        if let RoutingOutcome::Delivered { delivered, failed } = outcome {
            metrics::record_deliveries(kind, delivered, failed);
        }

        debug!(?outcome, "Stanza routed");
        Ok(outcome)
    }
}

impl fmt::Debug for StanzaRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StanzaRouter")
            .field("config", &self.config)
            .field("directory", &self.directory)
            .field("federation_enabled", &self.is_federation_enabled())
            .finish()
    }
}
