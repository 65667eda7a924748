//! Message overview records.

use chrono::{DateTime, Utc};

/// Summary record for one mailbox message (headers and flags, not its body).
///
/// Produced only by the transport's overview fetch; read-only to the rest of
/// the system. Each overview belongs to exactly one rule's match collection,
/// keyed by `uid`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailOverview {
    pub subject: String,
    /// Raw `From` header value, e.g. `John Doe <johndoe@example.com>`.
    pub from: String,
    pub to: String,
    /// Protocol-formatted date header, e.g. `Fri, 22 Apr 2016 22:24:48 -0500`.
    pub date: String,
    pub message_id: String,
    pub size: u32,
    /// Unique id, stable for the life of the mailbox session. Uniqueness is
    /// scoped to the owning mailbox.
    pub uid: u32,
    /// Positional sequence number.
    pub sequence: u32,
    pub recent: bool,
    pub flagged: bool,
    pub answered: bool,
    pub deleted: bool,
    pub seen: bool,
    pub draft: bool,
    pub internal_date: Option<DateTime<Utc>>,
}
