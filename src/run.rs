//! The run pipeline: one synchronous linear pass over the configured rules.

use crate::config::Config;
use crate::error::Result;
use crate::mailbox::{ConnectionManager, ImapTransport, MailboxTransport, MarkAs};
use crate::reply::{OutgoingTransport, ReplyDispatcher, build_smtp_transport};
use crate::rules::RuleRegistry;

/// Counters reported after a completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rules: usize,
    pub matched: usize,
    pub replied: usize,
    pub marked: usize,
}

/// Run one full pass with production collaborators built from `config`.
pub fn run(config: &Config) -> Result<RunSummary> {
    let registry = RuleRegistry::load(&config.rules_file, config.template_dir.as_deref())?;
    let mark_as = config.mark_as.parse::<MarkAs>()?;
    let mut connections =
        ConnectionManager::new(ImapTransport::from_config(&config.email.incoming));
    let dispatcher = ReplyDispatcher::new(
        build_smtp_transport(&config.email.outgoing)?,
        config.time_format.clone(),
        config.send_email,
    );
    execute(registry, &mut connections, &dispatcher, mark_as)
}

/// The linear pass: open every referenced mailbox, populate rule matches,
/// then dispatch and mark per matched message.
///
/// The first failure anywhere aborts the pass and propagates as a typed
/// error; replies already sent stay sent. Each (rule, overview) pair is
/// committed independently: dispatch, then an explicit flag write through
/// the connection manager.
pub fn execute<M, O>(
    registry: RuleRegistry,
    connections: &mut ConnectionManager<M>,
    dispatcher: &ReplyDispatcher<O>,
    mark_as: MarkAs,
) -> Result<RunSummary>
where
    M: MailboxTransport,
    O: OutgoingTransport,
{
    for mailbox in registry.mailbox_names() {
        connections.ensure_open(mailbox)?;
    }

    let rules = crate::search::populate_matches(connections, registry.into_rules())?;

    let mut summary = RunSummary {
        rules: rules.len(),
        ..RunSummary::default()
    };
    for rule in &rules {
        summary.matched += rule.matches.len();
        for (uid, overview) in &rule.matches {
            dispatcher.dispatch(rule, overview)?;
            summary.replied += 1;
            connections.set_flag(&rule.mailbox, *uid, mark_as)?;
            summary.marked += 1;
        }
    }

    tracing::info!(
        rules = summary.rules,
        matched = summary.matched,
        replied = summary.replied,
        marked = summary.marked,
        "run complete"
    );
    Ok(summary)
}
