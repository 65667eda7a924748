//! Connection manager: one validated live session per mailbox name.

use crate::error::{Error, Result};
use crate::mailbox::overview::EmailOverview;
use crate::mailbox::transport::{MailboxTransport, MarkAs, NO_MAILBOX_SENTINEL};

use std::collections::HashMap;

/// A validated, cached mailbox session.
#[derive(Debug)]
pub struct MailboxConnection<S> {
    pub mailbox: String,
    /// Message count reported by the transport at open.
    pub message_count: u32,
    /// Identity reported by the transport, after decoration stripping.
    pub identity: String,
    session: S,
}

/// Opens and caches one live session per distinct mailbox name for the
/// lifetime of a run. Sessions are validated once at open and never
/// reopened; all session access goes through this manager.
pub struct ConnectionManager<T: MailboxTransport> {
    transport: T,
    connections: HashMap<String, MailboxConnection<T::Session>>,
}

impl<T: MailboxTransport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connections: HashMap::new(),
        }
    }

    /// Open and validate a session for `mailbox`, or return the cached one.
    ///
    /// Idempotent: the open/status sequence runs at most once per mailbox
    /// name per run.
    pub fn ensure_open(&mut self, mailbox: &str) -> Result<&MailboxConnection<T::Session>> {
        if self.connections.contains_key(mailbox) {
            return Ok(&self.connections[mailbox]);
        }

        tracing::debug!(mailbox, "opening mailbox connection");
        let mut session = self
            .transport
            .open(mailbox)
            .map_err(|error| fail(mailbox, format!("failed to open session: {error:#}")))?;
        let status = self
            .transport
            .status(&mut session)
            .map_err(|error| fail(mailbox, format!("failed to check mailbox: {error:#}")))?;

        let identity = strip_decoration(&status.identity);
        if identity == NO_MAILBOX_SENTINEL {
            return Err(fail(mailbox, "no mailbox found with that name".to_string()));
        }
        if identity != mailbox {
            return Err(fail(
                mailbox,
                format!("reported identity '{identity}' does not match the requested name"),
            ));
        }
        tracing::debug!(
            mailbox,
            messages = status.message_count,
            "connected successfully"
        );

        let connection = MailboxConnection {
            mailbox: mailbox.to_string(),
            message_count: status.message_count,
            identity: identity.to_string(),
            session,
        };
        Ok(self
            .connections
            .entry(mailbox.to_string())
            .or_insert(connection))
    }

    /// Run a search expression against an open mailbox.
    pub fn search(&mut self, mailbox: &str, query: &str) -> Result<Vec<u32>> {
        let Self {
            transport,
            connections,
        } = self;
        let connection = connections.get_mut(mailbox).ok_or_else(|| not_open(mailbox))?;
        transport
            .search(&mut connection.session, query)
            .map_err(|error| fail(mailbox, format!("search failed: {error:#}")))
    }

    /// Fetch the overview records for one uid from an open mailbox.
    pub fn fetch_overview(&mut self, mailbox: &str, uid: u32) -> Result<Vec<EmailOverview>> {
        let Self {
            transport,
            connections,
        } = self;
        let connection = connections.get_mut(mailbox).ok_or_else(|| not_open(mailbox))?;
        transport
            .fetch_overview(&mut connection.session, uid)
            .map_err(|error| fail(mailbox, format!("overview fetch failed: {error:#}")))
    }

    /// Apply a flag kind to one message in an open mailbox. Assumes
    /// `ensure_open` already ran for that mailbox; there is no implicit open.
    pub fn set_flag(&mut self, mailbox: &str, uid: u32, mark: MarkAs) -> Result<()> {
        let token = mark.flag_token();
        let Self {
            transport,
            connections,
        } = self;
        let connection = connections.get_mut(mailbox).ok_or_else(|| not_open(mailbox))?;
        tracing::debug!(mailbox, uid, token, "marking message");
        transport
            .set_flag(&mut connection.session, uid, token)
            .map_err(|error| fail(mailbox, format!("failed to set flag on uid {uid}: {error:#}")))
    }

    pub fn is_open(&self, mailbox: &str) -> bool {
        self.connections.contains_key(mailbox)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn fail(mailbox: &str, message: String) -> Error {
    tracing::error!(mailbox, "{message}");
    Error::Connection(format!("mailbox '{mailbox}': {message}"))
}

fn not_open(mailbox: &str) -> Error {
    fail(mailbox, "mailbox is not open".to_string())
}

/// Strip a `{host:port/...}` connection-string prefix from a reported
/// mailbox identity.
fn strip_decoration(identity: &str) -> &str {
    if let Some(rest) = identity.strip_prefix('{')
        && let Some(end) = rest.find('}')
    {
        return &rest[end + 1..];
    }
    identity
}

#[cfg(test)]
mod tests {
    use super::{ConnectionManager, strip_decoration};
    use crate::error::Error;
    use crate::mailbox::transport::MarkAs;
    use crate::testing::FakeTransport;

    #[test]
    fn strip_decoration_removes_connection_string_prefix() {
        assert_eq!(
            strip_decoration("{mail.example.com:993/imap/ssl}INBOX"),
            "INBOX"
        );
        assert_eq!(strip_decoration("INBOX"), "INBOX");
        assert_eq!(strip_decoration("{unterminated"), "{unterminated");
    }

    #[test]
    fn ensure_open_is_idempotent() {
        let mut manager = ConnectionManager::new(FakeTransport::default());
        let first = manager.ensure_open("INBOX").expect("open").message_count;
        let second = manager.ensure_open("INBOX").expect("cached").message_count;
        assert_eq!(first, second);
        assert_eq!(manager.transport().opens, 1);
        assert_eq!(manager.transport().status_calls, 1);
    }

    #[test]
    fn ensure_open_caches_per_mailbox_name() {
        let mut manager = ConnectionManager::new(FakeTransport::default());
        manager.ensure_open("INBOX").expect("open INBOX");
        manager.ensure_open("Sales").expect("open Sales");
        manager.ensure_open("INBOX").expect("cached INBOX");
        assert_eq!(manager.transport().opens, 2);
    }

    #[test]
    fn ensure_open_rejects_identity_mismatch() {
        let mut transport = FakeTransport::default();
        transport.identities.insert(
            "INBOX".to_string(),
            "{mail.example.com:993/imap/ssl}Other".to_string(),
        );
        let mut manager = ConnectionManager::new(transport);
        let error = manager.ensure_open("INBOX").expect_err("identity mismatch");
        assert!(matches!(error, Error::Connection(_)));
        assert!(!manager.is_open("INBOX"));
    }

    #[test]
    fn ensure_open_rejects_missing_mailbox_sentinel() {
        let mut transport = FakeTransport::default();
        transport.identities.insert(
            "Missing".to_string(),
            "{mail.example.com:993/imap/ssl}<no_mailbox>".to_string(),
        );
        let mut manager = ConnectionManager::new(transport);
        let error = manager.ensure_open("Missing").expect_err("sentinel");
        assert!(matches!(error, Error::Connection(_)));
    }

    #[test]
    fn ensure_open_reports_transport_failures() {
        let mut transport = FakeTransport::default();
        transport.fail_open = true;
        let mut manager = ConnectionManager::new(transport);
        let error = manager.ensure_open("INBOX").expect_err("open fails");
        assert!(matches!(error, Error::Connection(_)));
    }

    #[test]
    fn set_flag_requires_an_open_connection() {
        let mut manager = ConnectionManager::new(FakeTransport::default());
        let error = manager
            .set_flag("INBOX", 5, MarkAs::Answered)
            .expect_err("no implicit open");
        assert!(matches!(error, Error::Connection(_)));
    }

    #[test]
    fn set_flag_writes_the_mapped_token() {
        let mut manager = ConnectionManager::new(FakeTransport::default());
        manager.ensure_open("INBOX").expect("open");
        manager
            .set_flag("INBOX", 5, MarkAs::Answered)
            .expect("flag set");
        assert_eq!(
            manager.transport().flags,
            vec![("INBOX".to_string(), 5, "\\Answered".to_string())]
        );
    }
}
