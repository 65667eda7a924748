//! Search execution: populate each rule with the overviews matching its
//! search expression.

use crate::error::{Error, Result};
use crate::mailbox::{ConnectionManager, MailboxTransport};
use crate::rules::Rule;

/// Run every rule's search against its mailbox and fetch one overview per
/// matching uid.
///
/// Takes ownership of the rule sequence and returns it populated; callers
/// never alias into the match collections. An empty search result is "no
/// matches", but a fetch returning anything other than exactly one record
/// aborts the whole run: that anomaly would otherwise corrupt the match set.
pub fn populate_matches<T: MailboxTransport>(
    manager: &mut ConnectionManager<T>,
    mut rules: Vec<Rule>,
) -> Result<Vec<Rule>> {
    tracing::debug!(rules = rules.len(), "searching mailboxes for matching messages");
    for rule in &mut rules {
        manager.ensure_open(&rule.mailbox)?;
        let uids = manager.search(&rule.mailbox, &rule.imap_search)?;
        tracing::debug!(
            mailbox = %rule.mailbox,
            search = %rule.imap_search,
            matches = uids.len(),
            "search complete"
        );
        for uid in uids {
            let mut overviews = manager.fetch_overview(&rule.mailbox, uid)?;
            if overviews.len() != 1 {
                tracing::error!(
                    mailbox = %rule.mailbox,
                    uid,
                    count = overviews.len(),
                    "overview fetch returned an unexpected record count"
                );
                return Err(Error::Fetch {
                    uid,
                    count: overviews.len(),
                });
            }
            let overview = overviews.remove(0);
            rule.matches.insert(overview.uid, overview);
        }
    }
    Ok(rules)
}
