//! In-memory collaborator fakes shared by the unit tests.

use crate::mailbox::{EmailOverview, MailboxStatus, MailboxTransport};
use crate::reply::OutgoingTransport;
use crate::rules::Rule;

use lettre::Message;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Scripted mailbox transport: canned identities, search results, and
/// overviews, with call counters for idempotency assertions.
#[derive(Default)]
pub struct FakeTransport {
    /// Identity override per mailbox name; unset names echo the requested
    /// name back with standard decoration.
    pub identities: HashMap<String, String>,
    pub message_counts: HashMap<String, u32>,
    pub search_results: HashMap<String, Vec<u32>>,
    /// Records returned from an overview fetch, per (mailbox, uid).
    pub overviews: HashMap<(String, u32), Vec<EmailOverview>>,
    pub opens: u32,
    pub status_calls: u32,
    /// Every flag write, as (mailbox, uid, token).
    pub flags: Vec<(String, u32, String)>,
    pub fail_open: bool,
}

#[derive(Debug)]
pub struct FakeSession {
    mailbox: String,
}

impl MailboxTransport for FakeTransport {
    type Session = FakeSession;

    fn open(&mut self, mailbox: &str) -> anyhow::Result<FakeSession> {
        if self.fail_open {
            anyhow::bail!("no session");
        }
        self.opens += 1;
        Ok(FakeSession {
            mailbox: mailbox.to_string(),
        })
    }

    fn status(&mut self, session: &mut FakeSession) -> anyhow::Result<MailboxStatus> {
        self.status_calls += 1;
        let identity = self
            .identities
            .get(&session.mailbox)
            .cloned()
            .unwrap_or_else(|| format!("{{mail.example.com:993/imap/ssl}}{}", session.mailbox));
        Ok(MailboxStatus {
            identity,
            message_count: self
                .message_counts
                .get(&session.mailbox)
                .copied()
                .unwrap_or(0),
        })
    }

    fn search(&mut self, session: &mut FakeSession, _query: &str) -> anyhow::Result<Vec<u32>> {
        Ok(self
            .search_results
            .get(&session.mailbox)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_overview(
        &mut self,
        session: &mut FakeSession,
        uid: u32,
    ) -> anyhow::Result<Vec<EmailOverview>> {
        Ok(self
            .overviews
            .get(&(session.mailbox.clone(), uid))
            .cloned()
            .unwrap_or_default())
    }

    fn set_flag(&mut self, session: &mut FakeSession, uid: u32, token: &str) -> anyhow::Result<()> {
        self.flags
            .push((session.mailbox.clone(), uid, token.to_string()));
        Ok(())
    }
}

/// Records outgoing messages instead of delivering them.
#[derive(Default)]
pub struct RecordingOutgoing {
    pub sent: RefCell<Vec<Message>>,
    /// When set, every send fails with this diagnostic.
    pub fail_with: RefCell<Option<String>>,
}

impl OutgoingTransport for RecordingOutgoing {
    fn send(&self, message: &Message) -> anyhow::Result<()> {
        if let Some(reason) = self.fail_with.borrow().clone() {
            anyhow::bail!(reason);
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// A minimal overview with the fields the dispatcher reads.
pub fn overview(uid: u32, subject: &str, from: &str) -> EmailOverview {
    EmailOverview {
        subject: subject.to_string(),
        from: from.to_string(),
        to: "support@example.com".to_string(),
        date: "Fri, 22 Apr 2016 22:24:48 -0500".to_string(),
        message_id: format!("<{uid}@example.com>"),
        size: 3326,
        uid,
        sequence: uid,
        ..EmailOverview::default()
    }
}

/// A rule with placeholder reply settings.
pub fn rule(mailbox: &str, template: &str) -> Rule {
    rule_with_template(mailbox, PathBuf::from(template))
}

/// A rule whose template path points at real files, for dispatch tests.
pub fn rule_with_template(mailbox: &str, template: PathBuf) -> Rule {
    Rule {
        mailbox: mailbox.to_string(),
        imap_search: "UNSEEN SUBJECT \"help\"".to_string(),
        template,
        from_name: "Bot".to_string(),
        from_email: "bot@x.com".to_string(),
        bcc_email: None,
        bcc_name: None,
        matches: BTreeMap::new(),
    }
}
