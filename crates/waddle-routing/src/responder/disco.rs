//! Service Discovery: disco#info on a user's account.
//!
//! XEP-0030 Section 3.4 has the server answer disco#info sent to a bare JID
//! with the account's identity and the namespaces the server handles for it.

use minidom::Element;
use tracing::debug;
use xmpp_parsers::iq::{Iq, IqType};

use super::{iq_error, iq_result, HandlerRegistry, IqHandler};
use crate::error::StanzaErrorCondition;

/// Service Discovery info namespace (XEP-0030).
pub const DISCO_INFO_NS: &str = "http://jabber.org/protocol/disco#info";

/// Identity element for disco#info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Category (e.g., "account")
    pub category: String,
    /// Type (e.g., "registered")
    pub type_: String,
    /// Optional name (human-readable)
    pub name: Option<String>,
}

impl Identity {
    /// Create a new identity.
    pub fn new(category: &str, type_: &str, name: Option<&str>) -> Self {
        Self {
            category: category.to_string(),
            type_: type_.to_string(),
            name: name.map(|s| s.to_string()),
        }
    }

    /// Registered account identity (category="account", type="registered").
    pub fn registered_account() -> Self {
        Self::new("account", "registered", None)
    }
}

/// Answers disco#info for the account itself.
///
/// Features are the namespaces registered in the [`HandlerRegistry`] at
/// the time of the query.
#[derive(Debug, Clone)]
pub struct DiscoInfoHandler {
    identities: Vec<Identity>,
}

impl DiscoInfoHandler {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }
}

impl Default for DiscoInfoHandler {
    fn default() -> Self {
        Self::new(vec![Identity::registered_account()])
    }
}

impl IqHandler for DiscoInfoHandler {
    fn namespace(&self) -> &str {
        DISCO_INFO_NS
    }

    fn handle(&self, iq: &Iq, payload: &Element, registry: &HandlerRegistry) -> Iq {
        if !matches!(iq.payload, IqType::Get(_)) || payload.name() != "query" {
            return iq_error(iq, StanzaErrorCondition::BadRequest);
        }

        // Accounts publish no disco nodes.
        if let Some(node) = payload.attr("node") {
            debug!(node = %node, "disco#info for unknown account node");
            return iq_error(iq, StanzaErrorCondition::ItemNotFound);
        }

        let features = registry.namespaces();
        iq_result(iq, Some(build_disco_info_query(&self.identities, &features)))
    }
}

/// Build a disco#info `<query/>` element.
fn build_disco_info_query(identities: &[Identity], features: &[String]) -> Element {
    let mut query_builder = Element::builder("query", DISCO_INFO_NS);

    for identity in identities {
        let mut id_builder = Element::builder("identity", DISCO_INFO_NS)
            .attr("category", &identity.category)
            .attr("type", &identity.type_);

        if let Some(ref name) = identity.name {
            id_builder = id_builder.attr("name", name);
        }

        query_builder = query_builder.append(id_builder.build());
    }

    for feature in features {
        let feat_elem = Element::builder("feature", DISCO_INFO_NS)
            .attr("var", feature)
            .build();
        query_builder = query_builder.append(feat_elem);
    }

    query_builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xmpp_parsers::stanza_error::DefinedCondition;

    use crate::responder::PingHandler;

    fn disco(payload: IqType) -> Iq {
        Iq {
            from: Some("romeo@example.net/orchard".parse().unwrap()),
            to: Some("juliet@example.com".parse().unwrap()),
            id: "disco-1".to_string(),
            payload,
        }
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(PingHandler));
        registry.register(Arc::new(DiscoInfoHandler::default()));
        registry
    }

    #[test]
    fn test_disco_info_lists_identity_and_features() {
        let query = Element::builder("query", DISCO_INFO_NS).build();
        let iq = disco(IqType::Get(query.clone()));
        let response = DiscoInfoHandler::default().handle(&iq, &query, &registry());

        let result = match response.payload {
            IqType::Result(Some(elem)) => elem,
            other => panic!("Expected result with query, got {:?}", other),
        };
        assert_eq!(result.name(), "query");

        let identity = result
            .get_child("identity", DISCO_INFO_NS)
            .expect("identity present");
        assert_eq!(identity.attr("category"), Some("account"));
        assert_eq!(identity.attr("type"), Some("registered"));

        let features: Vec<&str> = result
            .children()
            .filter(|c| c.name() == "feature")
            .filter_map(|c| c.attr("var"))
            .collect();
        assert!(features.contains(&DISCO_INFO_NS));
        assert!(features.contains(&crate::responder::PING_NS));
    }

    #[test]
    fn test_disco_info_node_not_found() {
        let query = Element::builder("query", DISCO_INFO_NS)
            .attr("node", "urn:example:node")
            .build();
        let iq = disco(IqType::Get(query.clone()));
        let response = DiscoInfoHandler::default().handle(&iq, &query, &registry());

        match response.payload {
            IqType::Error(error) => {
                assert_eq!(error.defined_condition, DefinedCondition::ItemNotFound)
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_disco_info_set_is_bad_request() {
        let query = Element::builder("query", DISCO_INFO_NS).build();
        let iq = disco(IqType::Set(query.clone()));
        let response = DiscoInfoHandler::default().handle(&iq, &query, &registry());

        assert!(matches!(response.payload, IqType::Error(_)));
    }
}
