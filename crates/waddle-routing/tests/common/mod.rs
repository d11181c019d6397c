//! Test utilities for routing tests.
//!
//! Provides an in-process server (a `StanzaRouter` over a fresh directory)
//! and clients backed by bounded session channels, plus stanza builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jid::{FullJid, Jid};
use minidom::Element;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waddle_routing::{
    OutboundStanza, ResourceDirectory, RouterConfig, RoutingOutcome, SessionHandle, Stanza,
    StanzaRouter,
};
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::message::{Body, Message, MessageType};
use xmpp_parsers::presence::{Presence, Type as PresenceType};

/// Domain serviced by the test server.
pub const DOMAIN: &str = "example.com";

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session channel capacity for test clients.
pub const CHANNEL_CAPACITY: usize = 64;

static MARKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Install a test log subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to debug output for the routing crate.
pub fn init_test() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,waddle_routing=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// In-process routing server.
pub struct TestServer {
    pub router: StanzaRouter,
}

impl TestServer {
    /// Start a server for [`DOMAIN`] with the default configuration.
    pub fn start() -> Self {
        Self::start_with_config(RouterConfig::new(DOMAIN))
    }

    /// Start a server with a custom configuration.
    pub fn start_with_config(config: RouterConfig) -> Self {
        init_test();
        let router = StanzaRouter::new(config, Arc::new(ResourceDirectory::new()))
            .expect("valid router config");
        Self { router }
    }

    pub fn directory(&self) -> &Arc<ResourceDirectory> {
        self.router.directory()
    }

    /// Create a client that has not sent presence yet.
    pub fn client(&self, jid: &str) -> TestClient {
        let (session, rx) = SessionHandle::channel(CHANNEL_CAPACITY);
        TestClient {
            jid: jid.parse().expect("valid full JID"),
            session,
            rx,
        }
    }

    /// Create a client and make it available with the given priority.
    pub fn connect(&self, jid: &str, priority: i8) -> TestClient {
        let client = self.client(jid);
        let mut presence = Presence::available();
        presence.priority = priority;
        self.directory()
            .apply_presence(&client.jid, &presence, &client.session)
            .expect("resource registered");
        client
    }

    /// Make a client unavailable.
    pub fn disconnect(&self, client: &TestClient) {
        let presence = Presence::new(PresenceType::Unavailable);
        self.directory()
            .apply_presence(&client.jid, &presence, &client.session)
            .expect("resource unregistered");
    }
}

/// A client session attached to the test server.
pub struct TestClient {
    pub jid: FullJid,
    session: SessionHandle,
    rx: mpsc::Receiver<OutboundStanza>,
}

impl TestClient {
    /// Send a stanza from this client, stamping its `from` address.
    pub fn send(&self, server: &TestServer, stanza: impl Into<Stanza>) -> RoutingOutcome {
        let stanza = stamp_from(stanza.into(), Jid::from(self.jid.clone()));
        server
            .router
            .route_from(stanza, &self.session)
            .expect("stanza has a destination")
    }

    /// Take every stanza received so far.
    pub fn drain(&mut self) -> Vec<Stanza> {
        let mut stanzas = Vec::new();
        while let Ok(outbound) = self.rx.try_recv() {
            stanzas.push(outbound.stanza);
        }
        stanzas
    }

    /// Wait for the next stanza.
    pub async fn recv(&mut self) -> Option<Stanza> {
        timeout(DEFAULT_TIMEOUT, self.rx.recv())
            .await
            .ok()
            .flatten()
            .map(|outbound| outbound.stanza)
    }

    /// Route a marker message to this client's own full JID and collect
    /// everything received before it.
    ///
    /// Stanzas from one session are routed in order, so once the marker
    /// arrives everything sent before it has been routed. The client must be
    /// available; a marker bounced back as an error fails the test.
    pub async fn flush(&mut self, server: &TestServer) -> Vec<Stanza> {
        assert!(
            server.directory().is_available(&self.jid),
            "flush requires {} to be available",
            self.jid
        );

        let id = format!("marker-{}", MARKER_SEQ.fetch_add(1, Ordering::Relaxed));
        let mut marker = Message::new(Some(Jid::from(self.jid.clone())));
        marker.id = Some(id.clone());
        self.send(server, marker);

        let mut received = Vec::new();
        while let Some(stanza) = self.recv().await {
            if stanza.id() == Some(id.as_str()) {
                assert!(!stanza.is_error(), "marker {} bounced: {:?}", id, stanza);
                return received;
            }
            received.push(stanza);
        }
        panic!("marker {} not received within {:?}", id, DEFAULT_TIMEOUT);
    }
}

fn stamp_from(stanza: Stanza, from: Jid) -> Stanza {
    match stanza {
        Stanza::Message(mut message) => {
            message.from = Some(from);
            Stanza::Message(message)
        }
        Stanza::Presence(mut presence) => {
            presence.from = Some(from);
            Stanza::Presence(presence)
        }
        Stanza::Iq(mut iq) => {
            iq.from = Some(from);
            Stanza::Iq(iq)
        }
    }
}

/// Build a message with a body.
pub fn message(to: &str, type_: MessageType) -> Message {
    let mut msg = Message::new(Some(to.parse::<Jid>().expect("valid JID")));
    msg.type_ = type_;
    msg.id = Some(format!("msg-{}", MARKER_SEQ.fetch_add(1, Ordering::Relaxed)));
    msg.bodies.insert(String::new(), Body("Wherefore art thou?".to_string()));
    msg
}

/// Build a directed presence.
pub fn presence(to: &str, type_: PresenceType) -> Presence {
    let mut presence = Presence::new(type_);
    presence.to = Some(to.parse::<Jid>().expect("valid JID"));
    presence
}

/// Build an IQ get with an empty payload element.
pub fn iq_get(to: &str, id: &str, name: &str, ns: &str) -> Iq {
    Iq {
        from: None,
        to: Some(to.parse::<Jid>().expect("valid JID")),
        id: id.to_string(),
        payload: IqType::Get(Element::builder(name, ns).build()),
    }
}

/// Build an IQ result.
pub fn iq_result(to: &str, id: &str) -> Iq {
    Iq {
        from: None,
        to: Some(to.parse::<Jid>().expect("valid JID")),
        id: id.to_string(),
        payload: IqType::Result(None),
    }
}

/// The `to` attribute of a stanza, as a string.
pub fn to_of(stanza: &Stanza) -> Option<String> {
    stanza.to().map(|jid| jid.to_string())
}
