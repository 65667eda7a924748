//! The abstract mailbox transport consumed by the connection manager.

use crate::error::Error;
use crate::mailbox::overview::EmailOverview;

/// Identity reported by a transport when the requested mailbox does not
/// exist.
pub const NO_MAILBOX_SENTINEL: &str = "<no_mailbox>";

/// Result of a mailbox status check after open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Reported mailbox identity, possibly decorated with a
    /// `{host:port/...}` connection-string prefix.
    pub identity: String,
    pub message_count: u32,
}

/// Blocking operations against one mailbox server.
///
/// Sessions are opened per mailbox name and are addressed by unique id
/// throughout: search results, overview fetches, and flag writes all use
/// uids, never positional sequence numbers.
pub trait MailboxTransport {
    type Session;

    /// Connect, authenticate, and select `mailbox`.
    fn open(&mut self, mailbox: &str) -> anyhow::Result<Self::Session>;

    /// Report the selected mailbox identity and message count.
    fn status(&mut self, session: &mut Self::Session) -> anyhow::Result<MailboxStatus>;

    /// Run a search expression; an empty result is "no matches", not an
    /// error.
    fn search(&mut self, session: &mut Self::Session, query: &str) -> anyhow::Result<Vec<u32>>;

    /// Fetch the overview records for one uid. A well-behaved server returns
    /// exactly one; the search executor rejects any other count.
    fn fetch_overview(
        &mut self,
        session: &mut Self::Session,
        uid: u32,
    ) -> anyhow::Result<Vec<EmailOverview>>;

    /// Add a flag (by its protocol token) to one message.
    fn set_flag(
        &mut self,
        session: &mut Self::Session,
        uid: u32,
        token: &str,
    ) -> anyhow::Result<()>;
}

/// The five mutable per-message state markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAs {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
}

impl MarkAs {
    /// The protocol flag token for this kind.
    pub fn flag_token(self) -> &'static str {
        match self {
            MarkAs::Seen => "\\Seen",
            MarkAs::Answered => "\\Answered",
            MarkAs::Flagged => "\\Flagged",
            MarkAs::Deleted => "\\Deleted",
            MarkAs::Draft => "\\Draft",
        }
    }
}

impl std::str::FromStr for MarkAs {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seen" => Ok(MarkAs::Seen),
            "answered" => Ok(MarkAs::Answered),
            "flagged" => Ok(MarkAs::Flagged),
            "deleted" => Ok(MarkAs::Deleted),
            "draft" => Ok(MarkAs::Draft),
            _ => Err(Error::InvalidArgument(format!(
                "unknown flag kind '{}'",
                value.trim()
            ))),
        }
    }
}
