//! # waddle-routing
//!
//! RFC 6121 Section 8 stanza routing core for Waddle Social.
//!
//! Given an inbound `<message/>`, `<presence/>` or `<iq/>` and the set of
//! currently available resources, this crate decides where the stanza goes
//! and carries that decision out against per-session send queues. It sits
//! above the XML codec and below the session layer of `waddle-xmpp`.
//!
//! ## Architecture
//!
//! - **Address Classifier**: local vs remote, bare vs full, resource match
//! - **Resource Directory**: available resources per bare JID, with priority
//! - **Routing Policy**: the RFC 6121 Section 8.5 decision table
//! - **On-Behalf Responder**: IQs to bare JIDs answered by the server
//! - **Delivery Executor**: deliver, bounce, drop or forward
//!
//! ## XEP Support
//!
//! - XEP-0030 (Service Discovery, disco#info on accounts)
//! - XEP-0199 (XMPP Ping)

pub mod address;
pub mod config;
pub mod directory;
pub mod executor;
pub mod metrics;
pub mod policy;
pub mod responder;
pub mod routing;
pub mod stanza;

mod error;

pub use address::{AddressCategory, AddressClassifier, LocalDomains};
pub use config::{MultiResourcePolicy, RouterConfig, UndeliverablePolicy};
pub use directory::{
    OutboundStanza, PresenceChange, Resource, ResourceDirectory, SendResult, SessionHandle,
};
pub use error::{RoutingError, StanzaErrorCondition, StanzaErrorType};
pub use executor::{build_error_stanza, DeliveryExecutor, RemoteRouter, RoutingOutcome};
pub use policy::{RoutingDecision, RoutingPolicy};
pub use responder::{HandlerRegistry, IqHandler, NamespaceRegistry, OnBehalfResponder};
pub use routing::StanzaRouter;
pub use stanza::{IqKind, Stanza, StanzaKind};
