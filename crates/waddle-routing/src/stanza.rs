//! Stanza envelope consumed by the router.
//!
//! The XML codec lives below the routing core; by the time a stanza reaches
//! the router it has been parsed into one of the `xmpp_parsers` types.

use jid::Jid;
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::{Message, MessageType};
use xmpp_parsers::presence::{Presence, Type as PresenceType};

/// An XMPP stanza.
#[derive(Debug, Clone)]
pub enum Stanza {
    Message(Message),
    Presence(Presence),
    Iq(Iq),
}

/// The three stanza kinds of RFC 6120.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    Message,
    Presence,
    Iq,
}

impl StanzaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanzaKind::Message => "message",
            StanzaKind::Presence => "presence",
            StanzaKind::Iq => "iq",
        }
    }
}

/// IQ type without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqKind {
    Get,
    Set,
    Result,
    Error,
}

impl IqKind {
    pub fn of(iq: &Iq) -> Self {
        match &iq.payload {
            IqType::Get(_) => IqKind::Get,
            IqType::Set(_) => IqKind::Set,
            IqType::Result(_) => IqKind::Result,
            IqType::Error(_) => IqKind::Error,
        }
    }

    /// Whether the IQ is a request that must be answered.
    pub fn is_request(&self) -> bool {
        matches!(self, IqKind::Get | IqKind::Set)
    }
}

impl Stanza {
    /// Get the stanza type name for tracing.
    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> StanzaKind {
        match self {
            Stanza::Message(_) => StanzaKind::Message,
            Stanza::Presence(_) => StanzaKind::Presence,
            Stanza::Iq(_) => StanzaKind::Iq,
        }
    }

    /// The 'to' attribute.
    pub fn to(&self) -> Option<&Jid> {
        match self {
            Stanza::Message(m) => m.to.as_ref(),
            Stanza::Presence(p) => p.to.as_ref(),
            Stanza::Iq(iq) => iq.to.as_ref(),
        }
    }

    /// The 'from' attribute.
    pub fn sender(&self) -> Option<&Jid> {
        match self {
            Stanza::Message(m) => m.from.as_ref(),
            Stanza::Presence(p) => p.from.as_ref(),
            Stanza::Iq(iq) => iq.from.as_ref(),
        }
    }

    /// The 'id' attribute.
    pub fn id(&self) -> Option<&str> {
        match self {
            Stanza::Message(m) => m.id.as_deref(),
            Stanza::Presence(p) => p.id.as_deref(),
            Stanza::Iq(iq) => Some(iq.id.as_str()),
        }
    }

    /// The 'type' attribute as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Stanza::Message(m) => message_type_name(&m.type_),
            Stanza::Presence(p) => presence_type_name(&p.type_),
            Stanza::Iq(iq) => match IqKind::of(iq) {
                IqKind::Get => "get",
                IqKind::Set => "set",
                IqKind::Result => "result",
                IqKind::Error => "error",
            },
        }
    }

    /// Whether this stanza is itself an error.
    ///
    /// Error stanzas are never answered with another error (RFC 6120 Section 8.3.1).
    pub fn is_error(&self) -> bool {
        match self {
            Stanza::Message(m) => m.type_ == MessageType::Error,
            Stanza::Presence(p) => p.type_ == PresenceType::Error,
            Stanza::Iq(iq) => IqKind::of(iq) == IqKind::Error,
        }
    }
}

impl From<Message> for Stanza {
    fn from(message: Message) -> Self {
        Stanza::Message(message)
    }
}

impl From<Presence> for Stanza {
    fn from(presence: Presence) -> Self {
        Stanza::Presence(presence)
    }
}

impl From<Iq> for Stanza {
    fn from(iq: Iq) -> Self {
        Stanza::Iq(iq)
    }
}

fn message_type_name(type_: &MessageType) -> &'static str {
    match type_ {
        MessageType::Chat => "chat",
        MessageType::Error => "error",
        MessageType::Groupchat => "groupchat",
        MessageType::Headline => "headline",
        MessageType::Normal => "normal",
    }
}

fn presence_type_name(type_: &PresenceType) -> &'static str {
    match type_ {
        PresenceType::None => "available",
        PresenceType::Error => "error",
        PresenceType::Probe => "probe",
        PresenceType::Subscribe => "subscribe",
        PresenceType::Subscribed => "subscribed",
        PresenceType::Unavailable => "unavailable",
        PresenceType::Unsubscribe => "unsubscribe",
        PresenceType::Unsubscribed => "unsubscribed",
    }
}
