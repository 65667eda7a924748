//! Production mailbox transport over a blocking IMAP session.

use crate::config::IncomingConfig;
use crate::mailbox::overview::EmailOverview;
use crate::mailbox::transport::{MailboxStatus, MailboxTransport};

use anyhow::Context as _;
use chrono::Utc;
use imap::types::{Fetch, Flag};
use imap_proto::types::Address;

type TlsSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

const OVERVIEW_ITEMS: &str = "(UID FLAGS ENVELOPE RFC822.SIZE INTERNALDATE)";

/// One authenticated IMAP session with a selected mailbox.
pub struct ImapSession {
    session: TlsSession,
    selected: String,
    exists: u32,
}

/// Transport backed by the `imap` crate, one TLS session per mailbox.
#[derive(Debug, Clone)]
pub struct ImapTransport {
    host: String,
    port: u16,
    secure: bool,
    username: String,
    password: String,
}

impl ImapTransport {
    pub fn from_config(config: &IncomingConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            secure: config.secure,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    /// Identity in the classic connection-string form,
    /// e.g. `{mail.example.com:993/imap/ssl}INBOX`.
    fn identity_for(&self, mailbox: &str) -> String {
        let ssl = if self.secure { "/ssl" } else { "" };
        format!("{{{}:{}/imap{}}}{}", self.host, self.port, ssl, mailbox)
    }
}

impl MailboxTransport for ImapTransport {
    type Session = ImapSession;

    fn open(&mut self, mailbox: &str) -> anyhow::Result<ImapSession> {
        tracing::debug!(host = %self.host, "connecting to IMAP server");
        let tls = native_tls::TlsConnector::builder()
            .build()
            .context("failed to build TLS connector for IMAP")?;

        let client = if self.secure {
            imap::connect((self.host.as_str(), self.port), self.host.as_str(), &tls).with_context(
                || {
                    format!(
                        "failed to connect to IMAP server '{}:{}'",
                        self.host, self.port
                    )
                },
            )?
        } else {
            imap::connect_starttls((self.host.as_str(), self.port), self.host.as_str(), &tls)
                .with_context(|| {
                    format!(
                        "failed to connect to IMAP server '{}:{}' with STARTTLS",
                        self.host, self.port
                    )
                })?
        };

        let mut session = client
            .login(self.username.as_str(), self.password.as_str())
            .map_err(|error| anyhow::anyhow!(error.0))
            .context("failed to authenticate to IMAP server")?;

        let selected = session
            .select(mailbox)
            .with_context(|| format!("failed to select mailbox '{mailbox}'"))?;

        Ok(ImapSession {
            session,
            selected: mailbox.to_string(),
            exists: selected.exists,
        })
    }

    fn status(&mut self, session: &mut ImapSession) -> anyhow::Result<MailboxStatus> {
        Ok(MailboxStatus {
            identity: self.identity_for(&session.selected),
            message_count: session.exists,
        })
    }

    fn search(&mut self, session: &mut ImapSession, query: &str) -> anyhow::Result<Vec<u32>> {
        let uids = session
            .session
            .uid_search(query)
            .with_context(|| format!("search failed in mailbox '{}'", session.selected))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch_overview(
        &mut self,
        session: &mut ImapSession,
        uid: u32,
    ) -> anyhow::Result<Vec<EmailOverview>> {
        let fetches = session
            .session
            .uid_fetch(uid.to_string(), OVERVIEW_ITEMS)
            .with_context(|| format!("overview fetch failed for uid {uid}"))?;
        Ok(fetches
            .iter()
            .map(|fetch| overview_from_fetch(fetch, uid))
            .collect())
    }

    fn set_flag(
        &mut self,
        session: &mut ImapSession,
        uid: u32,
        token: &str,
    ) -> anyhow::Result<()> {
        session
            .session
            .uid_store(uid.to_string(), format!("+FLAGS ({token})"))
            .with_context(|| format!("failed to store flag '{token}' on uid {uid}"))?;
        Ok(())
    }
}

fn overview_from_fetch(fetch: &Fetch, requested_uid: u32) -> EmailOverview {
    let flags = fetch.flags();
    let envelope = fetch.envelope();
    EmailOverview {
        subject: envelope
            .and_then(|envelope| decode_field(envelope.subject))
            .unwrap_or_default(),
        from: envelope
            .and_then(|envelope| format_address_list(envelope.from.as_deref()))
            .unwrap_or_default(),
        to: envelope
            .and_then(|envelope| format_address_list(envelope.to.as_deref()))
            .unwrap_or_default(),
        date: envelope
            .and_then(|envelope| decode_field(envelope.date))
            .unwrap_or_default(),
        message_id: envelope
            .and_then(|envelope| decode_field(envelope.message_id))
            .unwrap_or_default(),
        size: fetch.size.unwrap_or(0),
        uid: fetch.uid.unwrap_or(requested_uid),
        sequence: fetch.message,
        recent: flags.iter().any(|flag| matches!(flag, Flag::Recent)),
        flagged: flags.iter().any(|flag| matches!(flag, Flag::Flagged)),
        answered: flags.iter().any(|flag| matches!(flag, Flag::Answered)),
        deleted: flags.iter().any(|flag| matches!(flag, Flag::Deleted)),
        seen: flags.iter().any(|flag| matches!(flag, Flag::Seen)),
        draft: flags.iter().any(|flag| matches!(flag, Flag::Draft)),
        internal_date: fetch.internal_date().map(|date| date.with_timezone(&Utc)),
    }
}

fn decode_field(value: Option<&[u8]>) -> Option<String> {
    value.map(|value| String::from_utf8_lossy(value).into_owned())
}

/// Render an envelope address list the way it appears in a mail header:
/// `Name <user@host>` entries joined by `, `.
fn format_address_list(addresses: Option<&[Address<'_>]>) -> Option<String> {
    let formatted: Vec<String> = addresses?.iter().filter_map(format_address).collect();
    if formatted.is_empty() {
        None
    } else {
        Some(formatted.join(", "))
    }
}

fn format_address(address: &Address<'_>) -> Option<String> {
    let mailbox = decode_field(address.mailbox)?;
    let host = decode_field(address.host)?;
    let email = format!("{mailbox}@{host}");
    match decode_field(address.name) {
        Some(name) if !name.is_empty() => Some(format!("{name} <{email}>")),
        _ => Some(email),
    }
}
