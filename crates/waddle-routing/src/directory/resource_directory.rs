//! Resource Directory implementation.
//!
//! Maps bare JIDs to their available resources for priority-based routing.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jid::{BareJid, FullJid};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use xmpp_parsers::presence::{Presence, Type as PresenceType};

use crate::error::RoutingError;
use crate::stanza::Stanza;

/// A stanza to be sent to a session.
///
/// This is the message type sent through the outbound channel to
/// deliver stanzas to connected clients.
#[derive(Debug, Clone)]
pub struct OutboundStanza {
    /// The stanza to send
    pub stanza: Stanza,
}

impl OutboundStanza {
    /// Create a new outbound stanza.
    pub fn new(stanza: Stanza) -> Self {
        Self { stanza }
    }
}

/// Result of attempting to enqueue a stanza on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Stanza was successfully queued for delivery
    Sent,
    /// The session's channel is full (backpressure)
    ChannelFull,
    /// The session's channel is closed
    ChannelClosed,
}

/// Handle to a live session's outbound queue.
///
/// Cloning the handle clones the channel sender; all clones feed the same
/// session.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<OutboundStanza>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<OutboundStanza>) -> Self {
        Self { sender }
    }

    /// Create a handle together with the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundStanza>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Enqueue a stanza without waiting.
    pub fn send(&self, stanza: Stanza) -> SendResult {
        match self.sender.try_send(OutboundStanza::new(stanza)) {
            Ok(()) => SendResult::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound channel full, applying backpressure");
                SendResult::ChannelFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbound channel closed, session may have dropped");
                SendResult::ChannelClosed
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles feed the same session queue.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// One available client session bound to a full JID.
#[derive(Debug, Clone)]
pub struct Resource {
    jid: FullJid,
    priority: i8,
    connected_at: DateTime<Utc>,
    session: SessionHandle,
}

impl Resource {
    fn new(jid: FullJid, priority: i8, session: SessionHandle) -> Self {
        Self {
            jid,
            priority,
            connected_at: Utc::now(),
            session,
        }
    }

    /// Full JID of this resource.
    pub fn jid(&self) -> &FullJid {
        &self.jid
    }

    /// Owning bare JID.
    pub fn owner(&self) -> BareJid {
        self.jid.to_bare()
    }

    /// Last advertised presence priority.
    pub fn priority(&self) -> i8 {
        self.priority
    }

    /// When the resource became available.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn is_resource(&self, jid: &FullJid) -> bool {
        self.jid.resource() == jid.resource()
    }
}

/// What [`ResourceDirectory::apply_presence`] did with a presence stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// The resource became available
    Registered,
    /// An already available resource changed its priority
    PriorityUpdated,
    /// The resource went unavailable
    Unregistered,
    /// The presence does not affect availability
    Ignored,
}

/// Directory of available resources keyed by bare JID.
///
/// Backed by a DashMap: each bare JID's resource list is guarded by its
/// shard lock, so a read observes the list either before or after any single
/// mutation, and operations on different bare JIDs never contend on a global
/// lock.
///
/// ## Usage
///
/// ```ignore
/// let directory = ResourceDirectory::new();
///
/// // When a session sends initial presence:
/// let (session, rx) = SessionHandle::channel(256);
/// directory.register(full_jid.clone(), 5, session)?;
///
/// // When the router needs a delivery target:
/// let targets = directory.highest_priority(&full_jid.to_bare());
///
/// // When the session goes away:
/// directory.unregister(&full_jid);
/// ```
pub struct ResourceDirectory {
    entries: DashMap<BareJid, Vec<Resource>>,
}

impl ResourceDirectory {
    /// Create a new, empty directory.
    pub fn new() -> Self {
        info!("Creating resource directory");
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register an available resource.
    ///
    /// Fails with [`RoutingError::DuplicateResource`] if the resourcepart is
    /// already registered for the bare JID.
    #[instrument(skip(self, session), fields(jid = %jid))]
    pub fn register(
        &self,
        jid: FullJid,
        priority: i8,
        session: SessionHandle,
    ) -> Result<(), RoutingError> {
        let mut resources = self.entries.entry(jid.to_bare()).or_default();
        if resources.iter().any(|r| r.is_resource(&jid)) {
            warn!("Resource already registered");
            return Err(RoutingError::DuplicateResource(jid));
        }
        debug!(priority, "Registered resource");
        resources.push(Resource::new(jid, priority, session));
        Ok(())
    }

    /// Update the presence priority of a registered resource.
    #[instrument(skip(self), fields(jid = %jid))]
    pub fn update_priority(&self, jid: &FullJid, priority: i8) -> Result<(), RoutingError> {
        let Some(mut resources) = self.entries.get_mut(&jid.to_bare()) else {
            return Err(RoutingError::UnknownResource(jid.clone()));
        };
        match resources.iter_mut().find(|r| r.is_resource(jid)) {
            Some(resource) => {
                debug!(old = resource.priority, new = priority, "Updated priority");
                resource.priority = priority;
                Ok(())
            }
            None => Err(RoutingError::UnknownResource(jid.clone())),
        }
    }

    /// Remove a resource.
    ///
    /// Returns the removed resource, or `None` if it was not registered.
    #[instrument(skip(self), fields(jid = %jid))]
    pub fn unregister(&self, jid: &FullJid) -> Option<Resource> {
        let bare = jid.to_bare();
        let removed = {
            let mut resources = self.entries.get_mut(&bare)?;
            let position = resources.iter().position(|r| r.is_resource(jid))?;
            resources.remove(position)
        };
        self.entries.remove_if(&bare, |_, resources| resources.is_empty());
        debug!("Unregistered resource");
        Some(removed)
    }

    /// Remove a resource only if it is still bound to `session`.
    ///
    /// Used when a session is found dead after its resource was read from
    /// the directory. A resource that has since re-registered on a live
    /// session is kept. The check and the removal happen under one shard
    /// lock.
    #[instrument(skip(self, session), fields(jid = %jid))]
    pub fn unregister_session(&self, jid: &FullJid, session: &SessionHandle) -> Option<Resource> {
        let bare = jid.to_bare();
        let removed = {
            let mut resources = self.entries.get_mut(&bare)?;
            let position = resources.iter().position(|r| {
                r.is_resource(jid) && (r.session.same_session(session) || r.session.is_closed())
            });
            let Some(position) = position else {
                debug!("Resource re-registered on a new session, keeping it");
                return None;
            };
            resources.remove(position)
        };
        self.entries.remove_if(&bare, |_, resources| resources.is_empty());
        debug!("Unregistered dead session");
        Some(removed)
    }

    /// Look up a single resource by full JID.
    pub fn find(&self, jid: &FullJid) -> Option<Resource> {
        self.entries
            .get(&jid.to_bare())
            .and_then(|resources| resources.iter().find(|r| r.is_resource(jid)).cloned())
    }

    /// Check if a full JID is a registered resource.
    pub fn is_available(&self, jid: &FullJid) -> bool {
        self.find(jid).is_some()
    }

    /// Session handle of a registered resource.
    pub fn session(&self, jid: &FullJid) -> Option<SessionHandle> {
        self.find(jid).map(|r| r.session)
    }

    /// All registered resources of a bare JID, regardless of priority.
    pub fn available_resources(&self, bare_jid: &BareJid) -> Vec<Resource> {
        self.entries
            .get(bare_jid)
            .map(|resources| resources.clone())
            .unwrap_or_default()
    }

    /// Resources of a bare JID whose priority is zero or higher.
    pub fn non_negative_resources(&self, bare_jid: &BareJid) -> Vec<Resource> {
        non_negative(self.available_resources(bare_jid))
    }

    /// Non-negative resources sharing the maximum priority.
    ///
    /// Ties are all included. Empty when no resource has a non-negative
    /// priority.
    pub fn highest_priority(&self, bare_jid: &BareJid) -> Vec<Resource> {
        highest(self.non_negative_resources(bare_jid))
    }

    /// Apply a presence stanza the session sent about itself.
    ///
    /// Available presence registers the resource on first sight and updates
    /// its priority afterwards; unavailable presence unregisters it. Other
    /// presence types leave the directory unchanged.
    #[instrument(skip(self, presence, session), fields(jid = %jid, presence_type = ?presence.type_))]
    pub fn apply_presence(
        &self,
        jid: &FullJid,
        presence: &Presence,
        session: &SessionHandle,
    ) -> Result<PresenceChange, RoutingError> {
        match presence.type_ {
            PresenceType::None => {
                if self.is_available(jid) {
                    self.update_priority(jid, presence.priority)?;
                    Ok(PresenceChange::PriorityUpdated)
                } else {
                    self.register(jid.clone(), presence.priority, session.clone())?;
                    Ok(PresenceChange::Registered)
                }
            }
            PresenceType::Unavailable => {
                self.unregister(jid);
                Ok(PresenceChange::Unregistered)
            }
            _ => Ok(PresenceChange::Ignored),
        }
    }

    /// Number of bare JIDs with at least one available resource.
    pub fn user_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of available resources.
    pub fn resource_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// Remove all resources whose session channel has closed.
    ///
    /// This can be called periodically to clean up sessions that
    /// were not properly unregistered.
    pub fn cleanup_stale(&self) -> usize {
        let stale: Vec<(FullJid, SessionHandle)> = self
            .entries
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| r.session.is_closed())
                    .map(|r| (r.jid.clone(), r.session.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut removed = 0;
        for (jid, session) in stale {
            if self.unregister_session(&jid, &session).is_some() {
                debug!(jid = %jid, "Removed stale resource");
                removed += 1;
            }
        }

        if removed > 0 {
            info!(count = removed, "Cleaned up stale resources");
        }

        removed
    }
}

impl Default for ResourceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDirectory")
            .field("user_count", &self.entries.len())
            .finish()
    }
}

/// Keep resources with priority >= 0.
pub(crate) fn non_negative(resources: Vec<Resource>) -> Vec<Resource> {
    resources.into_iter().filter(|r| r.priority >= 0).collect()
}

/// Keep the resources sharing the maximum priority.
pub(crate) fn highest(resources: Vec<Resource>) -> Vec<Resource> {
    let Some(max) = resources.iter().map(|r| r.priority).max() else {
        return Vec::new();
    };
    resources.into_iter().filter(|r| r.priority == max).collect()
}
