//! Reply dispatch: template rendering, outgoing message assembly, and SMTP
//! delivery.

use crate::config::OutgoingConfig;
use crate::error::{Error, Result};
use crate::mailbox::EmailOverview;
use crate::rules::Rule;

use anyhow::Context as _;
use chrono::{DateTime, TimeZone as _, Utc};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use mailparse::MailAddr;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Seam over the outgoing SMTP collaborator so dispatch stays testable
/// offline.
pub trait OutgoingTransport {
    fn send(&self, message: &Message) -> anyhow::Result<()>;
}

impl OutgoingTransport for SmtpTransport {
    fn send(&self, message: &Message) -> anyhow::Result<()> {
        Transport::send(self, message)
            .map(|_| ())
            .context("SMTP transport rejected the message")
    }
}

impl<T: OutgoingTransport> OutgoingTransport for &T {
    fn send(&self, message: &Message) -> anyhow::Result<()> {
        T::send(self, message)
    }
}

/// Renders a rule's templates against a matched overview and hands the
/// assembled reply to the outgoing transport.
///
/// With `send_email` false the send step is skipped entirely; rendering and
/// recipient parsing still run so a dry run exercises the same paths.
pub struct ReplyDispatcher<T> {
    transport: T,
    time_format: String,
    send_email: bool,
}

impl<T: OutgoingTransport> ReplyDispatcher<T> {
    pub fn new(transport: T, time_format: impl Into<String>, send_email: bool) -> Self {
        Self {
            transport,
            time_format: time_format.into(),
            send_email,
        }
    }

    /// Render and send the reply for one matched message.
    ///
    /// The caller is responsible for marking the source message afterwards;
    /// dispatch itself never touches mailbox state.
    pub fn dispatch(&self, rule: &Rule, overview: &EmailOverview) -> Result<()> {
        let html_path = template_path(&rule.template, "html");
        let html_template = std::fs::read_to_string(&html_path).map_err(|source| {
            tracing::error!(path = %html_path.display(), "reply template could not be read");
            Error::Template {
                path: html_path.clone(),
                source,
            }
        })?;
        // The plain-text alternative is optional.
        let text_template = std::fs::read_to_string(template_path(&rule.template, "txt")).ok();

        let now = Utc::now();
        let html_body = render(&html_template, overview, now, &self.time_format);
        let text_body =
            text_template.map(|template| render(&template, overview, now, &self.time_format));

        let message = build_message(rule, overview, html_body, text_body)?;

        tracing::debug!(subject = %overview.subject, uid = overview.uid, "sending reply email");
        if self.send_email {
            self.transport.send(&message).map_err(|error| {
                tracing::error!(%error, "error sending reply email");
                Error::Send(format!("{error:#}"))
            })?;
        } else {
            tracing::debug!("skipping send, the 'send_email' config is set to false");
        }
        Ok(())
    }
}

/// Build the outgoing SMTP transport for the configured endpoint.
pub fn build_smtp_transport(config: &OutgoingConfig) -> Result<SmtpTransport> {
    let builder = match config.smtpsecure.trim().to_ascii_lowercase().as_str() {
        "" | "none" => SmtpTransport::builder_dangerous(&config.host),
        "tls" | "starttls" => SmtpTransport::starttls_relay(&config.host)
            .with_context(|| format!("invalid SMTP host '{}'", config.host))?,
        _ => SmtpTransport::relay(&config.host)
            .with_context(|| format!("invalid SMTP host '{}'", config.host))?,
    };
    let builder = builder.port(config.port);
    let builder = if config.smtpauth {
        builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
    } else {
        builder
    };
    Ok(builder.build())
}

fn build_message(
    rule: &Rule,
    overview: &EmailOverview,
    html_body: String,
    text_body: Option<String>,
) -> Result<Message> {
    let from = mailbox_from_parts(Some(&rule.from_name), &rule.from_email)?;
    let recipient = recipient_mailbox(&overview.from)?;

    let mut builder = Message::builder()
        .from(from.clone())
        .reply_to(from)
        .to(recipient)
        .subject(format!("Re: {}", overview.subject));
    if let Some(bcc_email) = &rule.bcc_email {
        builder = builder.bcc(mailbox_from_parts(rule.bcc_name.as_deref(), bcc_email)?);
    }

    let message = match text_body {
        Some(text_body) => builder.multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(text_body))
                .singlepart(SinglePart::html(html_body)),
        ),
        None => builder.singlepart(SinglePart::html(html_body)),
    };
    message.map_err(|error| Error::Send(format!("failed to assemble reply message: {error}")))
}

/// Render a reply template against an overview.
///
/// Substitution is literal and ordered; any `{word}` token left over after
/// substitution is removed from the output rather than sent as-is.
pub fn render(
    template: &str,
    overview: &EmailOverview,
    now: DateTime<Utc>,
    time_format: &str,
) -> String {
    let name = parse_primary_address(&overview.from)
        .and_then(|(_, display_name)| display_name)
        .unwrap_or_default();

    let rendered = template
        .replace("{subject}", &overview.subject)
        .replace("{response_subject}", &format!("Re: {}", overview.subject))
        .replace("{senddate}", &format_send_date(&overview.date, time_format))
        .replace("{date}", &now.format(time_format).to_string())
        .replace("{name}", &name);

    token_regex().replace_all(&rendered, "").into_owned()
}

/// First address from a header value, even when the header lists several.
pub(crate) fn parse_primary_address(value: &str) -> Option<(String, Option<String>)> {
    let addresses = mailparse::addrparse(value).ok()?.into_inner();
    for address in addresses {
        match address {
            MailAddr::Single(single) => {
                return Some((single.addr, single.display_name));
            }
            MailAddr::Group(group) => {
                if let Some(single) = group.addrs.into_iter().next() {
                    return Some((single.addr, single.display_name));
                }
            }
        }
    }
    None
}

fn recipient_mailbox(from_header: &str) -> Result<Mailbox> {
    let (address, display_name) = parse_primary_address(from_header).ok_or_else(|| {
        tracing::error!(header = %from_header, "no parseable recipient in overview from header");
        Error::Send(format!(
            "no parseable address in from header '{from_header}'"
        ))
    })?;
    let address: Address = address
        .parse()
        .map_err(|error| Error::Send(format!("invalid recipient address '{address}': {error}")))?;
    Ok(Mailbox::new(display_name, address))
}

fn mailbox_from_parts(name: Option<&str>, email: &str) -> Result<Mailbox> {
    let address: Address = email
        .parse()
        .map_err(|error| Error::Send(format!("invalid address '{email}': {error}")))?;
    let name = name.map(str::to_string).filter(|name| !name.is_empty());
    Ok(Mailbox::new(name, address))
}

/// Reformat the overview's protocol date with the configured time format.
/// An unparseable date passes through unchanged.
fn format_send_date(date: &str, time_format: &str) -> String {
    mailparse::dateparse(date)
        .ok()
        .and_then(|timestamp| Utc.timestamp_opt(timestamp, 0).single())
        .map(|parsed| parsed.format(time_format).to_string())
        .unwrap_or_else(|| date.to_string())
}

fn template_path(template: &Path, extension: &str) -> PathBuf {
    let mut path = template.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

fn token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{\w+\}").expect("valid template token regex"))
}
