//! XEP-0199 XMPP Ping answered on behalf of the account.

use minidom::Element;
use xmpp_parsers::iq::{Iq, IqType};

use super::{iq_error, iq_result, HandlerRegistry, IqHandler};
use crate::error::StanzaErrorCondition;

/// XMPP Ping namespace (XEP-0199).
pub const PING_NS: &str = "urn:xmpp:ping";

/// Replies to `<ping/>` with an empty result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

impl IqHandler for PingHandler {
    fn namespace(&self) -> &str {
        PING_NS
    }

    fn handle(&self, iq: &Iq, payload: &Element, _registry: &HandlerRegistry) -> Iq {
        match &iq.payload {
            IqType::Get(_) if payload.name() == "ping" => iq_result(iq, None),
            _ => iq_error(iq, StanzaErrorCondition::BadRequest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmpp_parsers::stanza_error::DefinedCondition;

    fn ping(payload: IqType) -> Iq {
        Iq {
            from: Some("romeo@example.net/orchard".parse().unwrap()),
            to: Some("juliet@example.com".parse().unwrap()),
            id: "ping-1".to_string(),
            payload,
        }
    }

    #[test]
    fn test_ping_get_returns_empty_result() {
        let elem = Element::builder("ping", PING_NS).build();
        let iq = ping(IqType::Get(elem.clone()));
        let response = PingHandler.handle(&iq, &elem, &HandlerRegistry::new());

        assert_eq!(response.id, "ping-1");
        assert!(matches!(response.payload, IqType::Result(None)));
        assert_eq!(
            response.from.map(|j| j.to_string()),
            Some("juliet@example.com".to_string())
        );
    }

    #[test]
    fn test_ping_set_is_bad_request() {
        let elem = Element::builder("ping", PING_NS).build();
        let iq = ping(IqType::Set(elem.clone()));
        let response = PingHandler.handle(&iq, &elem, &HandlerRegistry::new());

        match response.payload {
            IqType::Error(error) => {
                assert_eq!(error.defined_condition, DefinedCondition::BadRequest)
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }
}
