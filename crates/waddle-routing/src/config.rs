//! Router configuration.
//!
//! RFC 6121 leaves several routing outcomes to the implementation. Each of
//! those choices is a policy field here so deployments can pick one and tests
//! can pin it.

use serde::{Deserialize, Serialize};

use crate::error::RoutingError;

/// How a stanza reaches a user with several non-negative resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiResourcePolicy {
    /// Deliver to the resources sharing the highest priority
    #[default]
    HighestPriority,
    /// Deliver to every resource with priority >= 0
    AllNonNegative,
}

/// What to do with a stanza RFC 6121 allows to be either bounced or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeliverablePolicy {
    /// Return `service-unavailable` to the sender
    #[default]
    Bounce,
    /// Discard without notifying the sender
    Drop,
}

/// Configuration for the stanza router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Domains serviced by this server
    pub local_domains: Vec<String>,
    /// Target selection among several non-negative resources
    pub multi_resource_policy: MultiResourcePolicy,
    /// Normal/chat messages to a bare JID without available resources
    pub offline_message_policy: UndeliverablePolicy,
    /// Messages to a full JID whose resource is not available
    pub unmatched_resource_policy: UndeliverablePolicy,
    /// Register the ping and disco#info handlers at startup
    pub builtin_handlers: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            local_domains: Vec::new(),
            multi_resource_policy: MultiResourcePolicy::default(),
            offline_message_policy: UndeliverablePolicy::default(),
            unmatched_resource_policy: UndeliverablePolicy::default(),
            builtin_handlers: true,
        }
    }
}

impl RouterConfig {
    /// Create a new router configuration for a single local domain.
    pub fn new(local_domain: impl Into<String>) -> Self {
        Self::default().with_local_domain(local_domain)
    }

    /// Parse a configuration from TOML.
    ///
    /// ```toml
    /// local_domains = ["example.com", "chat.example.com"]
    /// multi_resource_policy = "all_non_negative"
    /// offline_message_policy = "drop"
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, RoutingError> {
        let mut config: Self =
            toml::from_str(input).map_err(|e| RoutingError::config(e.to_string()))?;
        for domain in &mut config.local_domains {
            *domain = normalize_domain(domain);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for mistakes that would make routing useless.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.local_domains.is_empty() {
            return Err(RoutingError::config("at least one local domain is required"));
        }
        if let Some(empty) = self.local_domains.iter().find(|d| d.trim().is_empty()) {
            return Err(RoutingError::config(format!(
                "invalid local domain {:?}",
                empty
            )));
        }
        Ok(())
    }

    /// Add a local domain, lowercased and without a trailing dot.
    pub fn with_local_domain(mut self, domain: impl Into<String>) -> Self {
        self.local_domains.push(normalize_domain(&domain.into()));
        self
    }

    /// Set the multi-resource delivery policy.
    pub fn with_multi_resource_policy(mut self, policy: MultiResourcePolicy) -> Self {
        self.multi_resource_policy = policy;
        self
    }

    /// Set the policy for messages to users without available resources.
    pub fn with_offline_message_policy(mut self, policy: UndeliverablePolicy) -> Self {
        self.offline_message_policy = policy;
        self
    }

    /// Set the policy for messages to unavailable full JIDs.
    pub fn with_unmatched_resource_policy(mut self, policy: UndeliverablePolicy) -> Self {
        self.unmatched_resource_policy = policy;
        self
    }

    /// Enable or disable the built-in IQ handlers.
    pub fn with_builtin_handlers(mut self, enabled: bool) -> Self {
        self.builtin_handlers = enabled;
        self
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_builder() {
        let config = RouterConfig::new("example.com");
        assert_eq!(config.local_domains, vec!["example.com".to_string()]);
        assert_eq!(config.multi_resource_policy, MultiResourcePolicy::HighestPriority);
        assert_eq!(config.offline_message_policy, UndeliverablePolicy::Bounce);
        assert!(config.builtin_handlers);

        let config = config
            .with_local_domain("chat.example.com")
            .with_multi_resource_policy(MultiResourcePolicy::AllNonNegative)
            .with_unmatched_resource_policy(UndeliverablePolicy::Drop)
            .with_builtin_handlers(false);
        assert_eq!(config.local_domains.len(), 2);
        assert_eq!(config.multi_resource_policy, MultiResourcePolicy::AllNonNegative);
        assert_eq!(config.unmatched_resource_policy, UndeliverablePolicy::Drop);
        assert!(!config.builtin_handlers);
    }

    #[test]
    fn test_from_toml() {
        let config = RouterConfig::from_toml_str(
            r#"
            local_domains = ["example.com", "Chat.Example.com"]
            multi_resource_policy = "all_non_negative"
            offline_message_policy = "drop"
            "#,
        )
        .unwrap();

        assert_eq!(config.local_domains.len(), 2);
        assert_eq!(config.multi_resource_policy, MultiResourcePolicy::AllNonNegative);
        assert_eq!(config.offline_message_policy, UndeliverablePolicy::Drop);
        assert_eq!(config.unmatched_resource_policy, UndeliverablePolicy::Bounce);
        assert!(config.builtin_handlers);
    }

    #[test]
    fn test_local_domains_normalized_on_load() {
        let config = RouterConfig::from_toml_str(
            r#"
            local_domains = ["Example.COM.", "chat.example.com"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.local_domains,
            vec!["example.com".to_string(), "chat.example.com".to_string()]
        );

        let config = RouterConfig::new("Waddle.Social.");
        assert_eq!(config.local_domains, vec!["waddle.social".to_string()]);
    }

    #[test]
    fn test_from_toml_rejects_missing_domains() {
        let err = RouterConfig::from_toml_str("builtin_handlers = false").unwrap_err();
        assert!(matches!(err, RoutingError::Config(_)));
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let err = RouterConfig::from_toml_str(
            r#"
            local_domains = ["example.com"]
            multi_resource_policy = "random"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, RoutingError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_blank_domain() {
        let config = RouterConfig::new(" ");
        assert!(config.validate().is_err());
    }
}
