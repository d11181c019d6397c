//! Resource Directory for priority-aware stanza routing.
//!
//! Tracks, per bare JID, the resources that are currently available along
//! with their advertised presence priority and the session channel used to
//! reach them.
//!
//! ## Architecture
//!
//! Each session registers its channel sender once it sends available
//! presence. The router reads snapshots of a bare JID's resources to decide
//! where a stanza goes, and the delivery executor pushes stanzas into the
//! selected channels.
//!
//! ```text
//! Session (user@domain/phone) --presence--> ResourceDirectory <--snapshot-- StanzaRouter
//!            ^                                     |                             |
//!            |                                     v                             v
//!      mpsc::Receiver                   DashMap<BareJid, Vec<Resource>>   DeliveryExecutor
//! ```

mod resource_directory;

pub use resource_directory::{
    OutboundStanza, PresenceChange, Resource, ResourceDirectory, SendResult, SessionHandle,
};
pub(crate) use resource_directory::{highest, non_negative};
