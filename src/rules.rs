//! Search rule registry: loads declarative rules and validates them into
//! typed records.

use crate::error::{Error, Result};
use crate::mailbox::EmailOverview;

use anyhow::Context as _;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A configured mapping from a search expression in one mailbox to a
/// templated reply.
///
/// Immutable after load except for `matches`, which the search executor
/// populates with the overviews matching `imap_search`, keyed by unique id.
#[derive(Debug, Clone)]
pub struct Rule {
    pub mailbox: String,
    /// IMAP search expression, e.g. `UNSEEN SUBJECT "help"`.
    pub imap_search: String,
    /// Resolved template path without extension; `.html` and `.txt` are
    /// appended by the dispatcher.
    pub template: PathBuf,
    pub from_name: String,
    pub from_email: String,
    pub bcc_email: Option<String>,
    pub bcc_name: Option<String>,
    pub matches: BTreeMap<u32, EmailOverview>,
}

/// One raw `[[rule]]` record as it appears in the rules file. All fields are
/// optional here so that validation, not deserialization, reports what is
/// missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleRecord {
    pub mailbox: Option<String>,
    pub imap_search: Option<String>,
    pub template: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub bcc_email: Option<String>,
    pub bcc_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleRecord>,
}

/// The loaded rule collection, in source order.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    /// Load and validate the rules file.
    pub fn load(path: &Path, template_root: Option<&Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        Self::from_toml(&raw, template_root)
    }

    /// Parse rules from TOML text. Fails on the first record missing a
    /// required field, naming the field and the offending record.
    pub fn from_toml(raw: &str, template_root: Option<&Path>) -> Result<Self> {
        let file: RulesFile = toml::from_str(raw).context("failed to parse rules file")?;
        let rules = file
            .rules
            .into_iter()
            .map(|record| record.into_rule(template_root))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(rules = rules.len(), "loaded search rules");
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Distinct mailbox names referenced by the rules, sorted.
    pub fn mailbox_names(&self) -> BTreeSet<&str> {
        self.rules.iter().map(|rule| rule.mailbox.as_str()).collect()
    }

    /// Hand the rule sequence to the caller. The search executor takes
    /// ownership and returns the populated rules; nothing else aliases them.
    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleRecord {
    /// Validate the required fields, in their canonical order, and build the
    /// typed rule.
    fn into_rule(self, template_root: Option<&Path>) -> Result<Rule> {
        let record = format!("{self:?}");
        let mailbox = self.mailbox.ok_or_else(|| missing_field("mailbox", &record))?;
        let imap_search = self
            .imap_search
            .ok_or_else(|| missing_field("imap_search", &record))?;
        let template = self
            .template
            .ok_or_else(|| missing_field("template", &record))?;
        let from_email = self
            .from_email
            .ok_or_else(|| missing_field("from_email", &record))?;
        let from_name = self
            .from_name
            .ok_or_else(|| missing_field("from_name", &record))?;

        Ok(Rule {
            mailbox,
            imap_search,
            template: resolve_template(&template, template_root),
            from_name,
            from_email,
            bcc_email: self.bcc_email,
            bcc_name: self.bcc_name,
            matches: BTreeMap::new(),
        })
    }
}

fn missing_field(field: &'static str, record: &str) -> Error {
    tracing::error!(field, record, "rule is missing a required field");
    Error::Validation {
        field,
        record: record.to_string(),
    }
}

/// Resolve a template path against the configured root unless it is absolute
/// or no root is configured.
fn resolve_template(template: &str, root: Option<&Path>) -> PathBuf {
    let path = Path::new(template);
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}
