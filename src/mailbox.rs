//! Mailbox access: transport seam, connection cache, and overview records.

pub mod connection;
pub mod imap;
pub mod overview;
pub mod transport;

pub use connection::{ConnectionManager, MailboxConnection};
pub use imap::ImapTransport;
pub use overview::EmailOverview;
pub use transport::{MailboxStatus, MailboxTransport, MarkAs, NO_MAILBOX_SENTINEL};
