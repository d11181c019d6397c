//! Routing policy: the RFC 6121 Section 8.5 decision table.
//!
//! [`RoutingPolicy::decide`] maps a stanza and its classified destination to
//! exactly one [`RoutingDecision`]. It only reads the directory and never
//! sends anything; the [`DeliveryExecutor`](crate::executor::DeliveryExecutor)
//! carries the decision out.
//!
//! | destination | stanza | decision |
//! |---|---|---|
//! | full, available | any | deliver to that resource |
//! | bare | message groupchat | `service-unavailable` |
//! | bare | message error | drop |
//! | bare | message headline | all resources with priority >= 0, else drop |
//! | bare | message normal/chat | "most available" resources; drop if all negative; offline policy if none |
//! | bare | presence available/unavailable | every available resource |
//! | bare | presence subscription | all resources with priority >= 0, else drop |
//! | bare | IQ get/set | answered by the server |
//! | full, unavailable | message chat | treated as bare, highest priority only |
//! | full, unavailable | message normal/groupchat/headline | unmatched-resource policy |
//! | full, unavailable | presence subscribe | treated as bare |
//! | full, unavailable | IQ get/set | `service-unavailable` |
//! | bare or full, unavailable | message/presence/IQ error, IQ result | drop |

use jid::{BareJid, FullJid};
use xmpp_parsers::iq::Iq;
use xmpp_parsers::message::MessageType;
use xmpp_parsers::presence::Type as PresenceType;

use crate::address::AddressCategory;
use crate::config::{MultiResourcePolicy, RouterConfig, UndeliverablePolicy};
use crate::directory::{Resource, ResourceDirectory};
use crate::error::StanzaErrorCondition;
use crate::responder::OnBehalfResponder;
use crate::stanza::{IqKind, Stanza};

/// What to do with one stanza.
#[derive(Debug, Clone)]
pub enum RoutingDecision {
    /// Enqueue the stanza, unmodified, on each of these resources
    DeliverTo(Vec<Resource>),
    /// The server answers on behalf of the user with this IQ
    ServerAnswers(Iq),
    /// Return an error stanza with this condition to the sender
    BounceError(StanzaErrorCondition),
    /// Discard without a trace
    SilentDrop,
    /// Hand over to inter-domain routing
    Forward {
        /// The remote domain
        domain: String,
    },
}

impl RoutingDecision {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::DeliverTo(_) => "deliver",
            RoutingDecision::ServerAnswers(_) => "server_answers",
            RoutingDecision::BounceError(_) => "bounce",
            RoutingDecision::SilentDrop => "drop",
            RoutingDecision::Forward { .. } => "forward",
        }
    }

    /// Resources the stanza will be delivered to, if any.
    pub fn targets(&self) -> &[Resource] {
        match self {
            RoutingDecision::DeliverTo(resources) => resources,
            _ => &[],
        }
    }
}

/// The implementation choices RFC 6121 leaves open, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct RoutingPolicy {
    multi_resource: MultiResourcePolicy,
    offline_message: UndeliverablePolicy,
    unmatched_resource: UndeliverablePolicy,
}

impl RoutingPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            multi_resource: config.multi_resource_policy,
            offline_message: config.offline_message_policy,
            unmatched_resource: config.unmatched_resource_policy,
        }
    }

    /// Decide how to route a stanza to an already classified destination.
    pub fn decide(
        &self,
        stanza: &Stanza,
        category: &AddressCategory,
        directory: &ResourceDirectory,
        responder: &OnBehalfResponder,
    ) -> RoutingDecision {
        match category {
            AddressCategory::NonLocal { domain } => RoutingDecision::Forward {
                domain: domain.clone(),
            },
            AddressCategory::LocalFullMatch(resource) => {
                RoutingDecision::DeliverTo(vec![resource.clone()])
            }
            AddressCategory::LocalBare(bare) => {
                self.decide_bare(stanza, bare, directory, responder)
            }
            AddressCategory::LocalFullNoMatch(full) => {
                self.decide_unmatched(stanza, full, directory, responder)
            }
        }
    }

    fn decide_bare(
        &self,
        stanza: &Stanza,
        bare: &BareJid,
        directory: &ResourceDirectory,
        responder: &OnBehalfResponder,
    ) -> RoutingDecision {
        let available = directory.available_resources(bare);

        match stanza {
            Stanza::Message(message) => match message.type_ {
                MessageType::Groupchat => {
                    RoutingDecision::BounceError(StanzaErrorCondition::ServiceUnavailable)
                }
                MessageType::Error => RoutingDecision::SilentDrop,
                MessageType::Headline => deliver_or_drop(non_negative(available)),
                MessageType::Normal | MessageType::Chat => {
                    if available.is_empty() {
                        undeliverable(self.offline_message)
                    } else {
                        deliver_or_drop(self.most_available(non_negative(available)))
                    }
                }
            },
            Stanza::Presence(presence) => match presence.type_ {
                PresenceType::None | PresenceType::Unavailable => deliver_or_drop(available),
                PresenceType::Subscribe
                | PresenceType::Subscribed
                | PresenceType::Unsubscribe
                | PresenceType::Unsubscribed => deliver_or_drop(non_negative(available)),
                PresenceType::Probe | PresenceType::Error => RoutingDecision::SilentDrop,
            },
            Stanza::Iq(iq) => answer_on_behalf(iq, responder),
        }
    }

    fn decide_unmatched(
        &self,
        stanza: &Stanza,
        full: &FullJid,
        directory: &ResourceDirectory,
        responder: &OnBehalfResponder,
    ) -> RoutingDecision {
        match stanza {
            Stanza::Message(message) => match message.type_ {
                MessageType::Error => RoutingDecision::SilentDrop,
                MessageType::Normal | MessageType::Groupchat | MessageType::Headline => {
                    undeliverable(self.unmatched_resource)
                }
                MessageType::Chat => {
                    let targets = directory.highest_priority(&full.to_bare());
                    if targets.is_empty() {
                        undeliverable(self.unmatched_resource)
                    } else {
                        RoutingDecision::DeliverTo(targets)
                    }
                }
            },
            Stanza::Presence(presence) => match presence.type_ {
                PresenceType::Subscribe => {
                    self.decide_bare(stanza, &full.to_bare(), directory, responder)
                }
                _ => RoutingDecision::SilentDrop,
            },
            Stanza::Iq(iq) => {
                if IqKind::of(iq).is_request() {
                    RoutingDecision::BounceError(StanzaErrorCondition::ServiceUnavailable)
                } else {
                    RoutingDecision::SilentDrop
                }
            }
        }
    }

    fn most_available(&self, non_negative: Vec<Resource>) -> Vec<Resource> {
        match self.multi_resource {
            MultiResourcePolicy::HighestPriority => crate::directory::highest(non_negative),
            MultiResourcePolicy::AllNonNegative => non_negative,
        }
    }
}

fn non_negative(resources: Vec<Resource>) -> Vec<Resource> {
    crate::directory::non_negative(resources)
}

fn deliver_or_drop(targets: Vec<Resource>) -> RoutingDecision {
    if targets.is_empty() {
        RoutingDecision::SilentDrop
    } else {
        RoutingDecision::DeliverTo(targets)
    }
}

fn undeliverable(policy: UndeliverablePolicy) -> RoutingDecision {
    match policy {
        UndeliverablePolicy::Bounce => {
            RoutingDecision::BounceError(StanzaErrorCondition::ServiceUnavailable)
        }
        UndeliverablePolicy::Drop => RoutingDecision::SilentDrop,
    }
}

/// IQ requests to a bare JID are answered by the server whether or not the
/// user has resources online; responses are never answered.
fn answer_on_behalf(iq: &Iq, responder: &OnBehalfResponder) -> RoutingDecision {
    if !IqKind::of(iq).is_request() {
        return RoutingDecision::SilentDrop;
    }
    match responder.answer(iq) {
        Some(response) => RoutingDecision::ServerAnswers(response),
        None => RoutingDecision::BounceError(StanzaErrorCondition::ServiceUnavailable),
    }
}
