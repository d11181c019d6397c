//! Address classification.
//!
//! Decides which RFC 6121 Section 8.5 branch a destination JID falls into:
//! a remote domain, a local bare JID, a local full JID whose resource is
//! available, or a local full JID whose resource is not.

use std::collections::HashSet;

use jid::{BareJid, FullJid, Jid};

use crate::directory::{Resource, ResourceDirectory};

/// Set of domains serviced by this server.
///
/// Domains are compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct LocalDomains {
    domains: HashSet<String>,
}

impl LocalDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| normalize(d.as_ref()))
                .collect(),
        }
    }

    /// Check whether a domainpart is serviced locally.
    pub fn is_local_domain(&self, domain: &str) -> bool {
        self.domains.contains(&normalize(domain))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

fn normalize(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

/// Where a destination JID points.
#[derive(Debug, Clone)]
pub enum AddressCategory {
    /// Domain is not serviced here
    NonLocal {
        /// The remote domain
        domain: String,
    },
    /// Local bare JID
    LocalBare(BareJid),
    /// Local full JID with an available resource
    LocalFullMatch(Resource),
    /// Local full JID without an available resource
    LocalFullNoMatch(FullJid),
}

impl AddressCategory {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AddressCategory::NonLocal { .. } => "non_local",
            AddressCategory::LocalBare(_) => "local_bare",
            AddressCategory::LocalFullMatch(_) => "local_full_match",
            AddressCategory::LocalFullNoMatch(_) => "local_full_no_match",
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, AddressCategory::NonLocal { .. })
    }
}

/// Classifies destination JIDs against the local domains and the directory.
#[derive(Debug, Clone)]
pub struct AddressClassifier {
    local_domains: LocalDomains,
}

impl AddressClassifier {
    pub fn new(local_domains: LocalDomains) -> Self {
        Self { local_domains }
    }

    pub fn local_domains(&self) -> &LocalDomains {
        &self.local_domains
    }

    /// Check if a JID is local to this server.
    pub fn is_local_jid(&self, jid: &Jid) -> bool {
        self.local_domains.is_local_domain(jid.domain().as_str())
    }

    /// Classify a destination JID. Total: every JID falls in exactly one category.
    pub fn classify(&self, to: &Jid, directory: &ResourceDirectory) -> AddressCategory {
        if !self.is_local_jid(to) {
            return AddressCategory::NonLocal {
                domain: to.domain().as_str().to_string(),
            };
        }

        match to.clone().try_into_full() {
            Err(bare) => AddressCategory::LocalBare(bare),
            Ok(full) => match directory.find(&full) {
                Some(resource) => AddressCategory::LocalFullMatch(resource),
                None => AddressCategory::LocalFullNoMatch(full),
            },
        }
    }
}
