//! Delivery executor.
//!
//! Carries out a [`RoutingDecision`]: enqueue the stanza on resource
//! sessions, send a synthesized error or server answer back to the sender,
//! hand the stanza to inter-domain routing, or drop it. Every action is
//! attempted once; transport failures below the session queue are not
//! visible here.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::MessageType;
use xmpp_parsers::presence::Type as PresenceType;

use crate::address::AddressClassifier;
use crate::directory::{Resource, ResourceDirectory, SendResult, SessionHandle};
use crate::error::StanzaErrorCondition;
use crate::policy::RoutingDecision;
use crate::stanza::Stanza;

/// Inter-domain (S2S) routing collaborator.
pub trait RemoteRouter: Send + Sync {
    /// Queue a stanza for delivery to a remote domain.
    fn forward(&self, domain: &str, stanza: Stanza) -> SendResult;
}

/// Result of a routing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// Stanza was enqueued on local resource(s)
    Delivered {
        /// Number of sessions that accepted the stanza
        delivered: usize,
        /// Number of sessions whose queue was full or closed
        failed: usize,
    },
    /// The server answered an IQ on behalf of the user
    Answered {
        /// Whether the answer reached the requester
        replied: bool,
    },
    /// An error stanza was returned to the sender
    Bounced {
        /// Error condition sent
        condition: StanzaErrorCondition,
        /// Whether the error reached the sender
        replied: bool,
    },
    /// Stanza was discarded
    Dropped,
    /// Stanza was handed to inter-domain routing
    Forwarded {
        /// The remote domain the stanza was sent to
        domain: String,
    },
    /// Remote destination but no inter-domain router is configured
    FederationDisabled,
}

/// Executes routing decisions against session queues.
pub struct DeliveryExecutor {
    directory: Arc<ResourceDirectory>,
    classifier: AddressClassifier,
    remote: Option<Arc<dyn RemoteRouter>>,
}

impl DeliveryExecutor {
    pub fn new(
        directory: Arc<ResourceDirectory>,
        classifier: AddressClassifier,
        remote: Option<Arc<dyn RemoteRouter>>,
    ) -> Self {
        Self {
            directory,
            classifier,
            remote,
        }
    }

    /// Execute a decision for `stanza`.
    ///
    /// `origin` is the session the stanza arrived on, used for replies when
    /// the sender is not itself an available resource.
    pub fn execute(
        &self,
        decision: RoutingDecision,
        stanza: Stanza,
        origin: Option<&SessionHandle>,
    ) -> RoutingOutcome {
        match decision {
            RoutingDecision::DeliverTo(resources) => {
                let (delivered, failed) = self.deliver_to_resources(&stanza, &resources);
                RoutingOutcome::Delivered { delivered, failed }
            }
            RoutingDecision::ServerAnswers(response) => RoutingOutcome::Answered {
                replied: self.reply(Stanza::Iq(response), origin),
            },
            RoutingDecision::BounceError(condition) => RoutingOutcome::Bounced {
                condition,
                replied: self.send_error(&stanza, condition, origin),
            },
            RoutingDecision::SilentDrop => {
                self.drop_stanza(&stanza);
                RoutingOutcome::Dropped
            }
            RoutingDecision::Forward { domain } => self.forward(domain, stanza),
        }
    }

    /// Enqueue the stanza on each resource's session, `to` left untouched.
    ///
    /// Returns `(delivered, failed)` counts. Resources whose channel turned
    /// out to be closed are removed from the directory.
    pub fn deliver_to_resources(&self, stanza: &Stanza, resources: &[Resource]) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for resource in resources {
            match resource.session().send(stanza.clone()) {
                SendResult::Sent => {
                    debug!(to = %resource.jid(), "Stanza delivered to local resource");
                    delivered += 1;
                }
                SendResult::ChannelFull => {
                    warn!(to = %resource.jid(), "Channel full, stanza dropped");
                    failed += 1;
                }
                SendResult::ChannelClosed => {
                    debug!(to = %resource.jid(), "Session closed, removing stale resource");
                    self.directory
                        .unregister_session(resource.jid(), resource.session());
                    failed += 1;
                }
            }
        }

        (delivered, failed)
    }

    /// Return an error stanza for `stanza` to its sender.
    ///
    /// Error stanzas are never answered with another error; returns whether
    /// the error reached the sender.
    pub fn send_error(
        &self,
        stanza: &Stanza,
        condition: StanzaErrorCondition,
        origin: Option<&SessionHandle>,
    ) -> bool {
        if stanza.is_error() {
            debug!(stanza_type = %stanza.name(), "Not bouncing an error stanza");
            return false;
        }
        debug!(
            stanza_type = %stanza.name(),
            condition = %condition,
            "Returning stanza error to sender"
        );
        self.reply(build_error_stanza(stanza, condition), origin)
    }

    /// Discard a stanza.
    pub fn drop_stanza(&self, stanza: &Stanza) {
        debug!(
            stanza_type = %stanza.name(),
            type_ = %stanza.type_name(),
            id = ?stanza.id(),
            "Stanza silently dropped"
        );
    }

    /// Send a server-generated stanza to the JID in its `to`.
    ///
    /// The origin session wins when given; otherwise the addressee is looked
    /// up as a local resource, then handed to inter-domain routing.
    fn reply(&self, reply: Stanza, origin: Option<&SessionHandle>) -> bool {
        if let Some(session) = origin {
            return session.send(reply) == SendResult::Sent;
        }

        let Some(to) = reply.to().cloned() else {
            debug!("Reply has no addressee and no origin session");
            return false;
        };

        if !self.classifier.is_local_jid(&to) {
            let domain = to.domain().as_str().to_string();
            return matches!(self.forward(domain, reply), RoutingOutcome::Forwarded { .. });
        }

        match to.try_into_full() {
            Ok(full) => match self.directory.session(&full) {
                Some(session) => session.send(reply) == SendResult::Sent,
                None => {
                    debug!(to = %full, "Reply addressee is not an available resource");
                    false
                }
            },
            Err(bare) => {
                debug!(to = %bare, "Reply addressed to a bare JID, discarding");
                false
            }
        }
    }

    fn forward(&self, domain: String, stanza: Stanza) -> RoutingOutcome {
        let Some(remote) = &self.remote else {
            debug!(domain = %domain, "S2S federation disabled, cannot route to remote");
            return RoutingOutcome::FederationDisabled;
        };

        match remote.forward(&domain, stanza) {
            SendResult::Sent => {
                debug!(domain = %domain, "Stanza handed to inter-domain routing");
                RoutingOutcome::Forwarded { domain }
            }
            result => {
                warn!(domain = %domain, ?result, "Inter-domain routing refused stanza");
                RoutingOutcome::Dropped
            }
        }
    }
}

impl fmt::Debug for DeliveryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryExecutor")
            .field("federation_enabled", &self.remote.is_some())
            .finish()
    }
}

/// Build the error stanza answering `stanza`.
///
/// Messages and presences are echoed back with `type='error'`, addresses
/// swapped and the `<error/>` element appended, so the sender gets its
/// original content along with the condition. IQ errors carry only the
/// `<error/>` element.
pub fn build_error_stanza(stanza: &Stanza, condition: StanzaErrorCondition) -> Stanza {
    let error = condition.to_stanza_error();

    match stanza {
        Stanza::Message(original) => {
            let mut message = original.clone();
            std::mem::swap(&mut message.from, &mut message.to);
            message.type_ = MessageType::Error;
            message.payloads.push(error.into());
            Stanza::Message(message)
        }
        Stanza::Presence(original) => {
            let mut presence = original.clone();
            std::mem::swap(&mut presence.from, &mut presence.to);
            presence.type_ = PresenceType::Error;
            presence.payloads.push(error.into());
            Stanza::Presence(presence)
        }
        Stanza::Iq(original) => Stanza::Iq(Iq {
            from: original.to.clone(),
            to: original.from.clone(),
            id: original.id.clone(),
            payload: IqType::Error(error),
        }),
    }
}
