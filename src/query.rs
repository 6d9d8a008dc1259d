use anyhow::Result;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::LineKind;
use crate::fields::{extract_fields, QueryRecord, PORT_DELIMITER};
use crate::stats::Aggregation;

/// An empty argument matches every key.
pub const WILDCARD: &str = "";

/// The reverse lookups the analyzer can answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    /// Domains queried by one client, optionally narrowed by a domain pattern.
    ByIp { ip: String, domain: Option<String> },
    /// Clients that queried domains matching a pattern, optionally one client only.
    ByDomain { domain: String, ip: Option<String> },
    /// RPZ names hit by one client.
    RpzByIp { ip: String },
    /// Clients whose queries hit RPZ names matching a pattern.
    RpzByDomain { domain: String },
    /// Record types queried by one client.
    RecordTypeByIp { ip: String },
    /// Record types queried for domains matching a pattern.
    RecordTypeByDomain { domain: String },
    /// Domains queried with one record type.
    ByRecordType { record_type: String },
}

/// A field of a query record that can key a frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Domain,
    Client,
    RecordType,
    RpzName,
}

impl Dimension {
    pub fn key<'a>(self, record: &QueryRecord<'a>) -> Option<&'a str> {
        match self {
            Dimension::Domain => record.domain,
            Dimension::Client => Some(record.client),
            Dimension::RecordType => record.record_type,
            Dimension::RpzName => record.rpz_name,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Dimension::Domain => "domain names",
            Dimension::Client => "ip addresses",
            Dimension::RecordType => "record types",
            Dimension::RpzName => "rpz names",
        }
    }
}

/// Case-insensitive domain matcher.
///
/// Arguments are regular expressions; one that does not compile is matched
/// as a literal substring instead.
#[derive(Debug, Clone)]
pub struct DomainPattern {
    regex: Regex,
}

impl DomainPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                warn!(
                    action = "compile",
                    component = "domain_pattern",
                    pattern = pattern,
                    error = %e,
                    "Invalid regex, matching as literal text"
                );
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()?
            }
        };
        Ok(Self { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// True when `needle` occurs at the start of a whitespace-delimited token.
fn starts_token(line: &str, needle: &str) -> bool {
    line.match_indices(needle).any(|(index, _)| {
        line[..index]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace)
    })
}

/// Checks applied to the raw line before tokenizing.
#[derive(Debug, Clone)]
enum LineFilter {
    /// A token starting with `<ip>#`.
    Client(String),
    Pattern(DomainPattern),
}

impl LineFilter {
    fn client(ip: &str) -> Self {
        LineFilter::Client(format!("{}{}", ip, PORT_DELIMITER))
    }

    fn matches(&self, line: &str) -> bool {
        match self {
            LineFilter::Client(needle) => starts_token(line, needle),
            LineFilter::Pattern(pattern) => pattern.is_match(line),
        }
    }
}

/// Checks that need extracted fields; truncated lines never pass them.
#[derive(Debug, Clone)]
enum FieldFilter {
    Domain(DomainPattern),
    RecordType(String),
}

impl FieldFilter {
    fn matches(&self, record: &QueryRecord<'_>) -> bool {
        match self {
            FieldFilter::Domain(pattern) => record.domain.is_some_and(|d| pattern.is_match(d)),
            FieldFilter::RecordType(wanted) => record
                .record_type
                .is_some_and(|t| t.eq_ignore_ascii_case(wanted)),
        }
    }
}

/// A query mode compiled into the filters and tables of one scan.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub kind: LineKind,
    line_filters: Vec<LineFilter>,
    field_filters: Vec<FieldFilter>,
    pub primary: Dimension,
    pub related: Vec<Dimension>,
}

impl QueryPlan {
    pub fn new_aggregation(&self) -> Aggregation {
        Aggregation::new(self.related.len())
    }

    /// Fold one log line into the aggregation.
    pub fn observe(&self, line: &str, aggregation: &mut Aggregation) {
        if !self.kind.matches(line) || !self.line_filters.iter().all(|f| f.matches(line)) {
            return;
        }

        let Some(record) = extract_fields(line, self.kind) else {
            if self.field_filters.is_empty() {
                debug!(
                    action = "skip",
                    component = "field_extraction",
                    "Matching line too short to extract fields"
                );
                aggregation.record_malformed();
            }
            return;
        };

        if !self.field_filters.iter().all(|f| f.matches(&record)) {
            return;
        }

        aggregation.matched += 1;
        if let Some(key) = self.primary.key(&record) {
            aggregation.primary.accumulate(key);
        }
        for (dimension, table) in self.related.iter().zip(aggregation.related.iter_mut()) {
            if let Some(key) = dimension.key(&record) {
                table.accumulate(key);
            }
        }
    }
}

fn argument(value: &str) -> Option<&str> {
    (value != WILDCARD).then_some(value)
}

fn optional_argument(value: &Option<String>) -> Option<&str> {
    value.as_deref().and_then(argument)
}

impl QueryMode {
    pub fn label(&self) -> &'static str {
        match self {
            QueryMode::ByIp { .. } => "by-ip",
            QueryMode::ByDomain { .. } => "by-domain",
            QueryMode::RpzByIp { .. } => "rpz-by-ip",
            QueryMode::RpzByDomain { .. } => "rpz-by-domain",
            QueryMode::RecordTypeByIp { .. } => "record-type-by-ip",
            QueryMode::RecordTypeByDomain { .. } => "record-type-by-domain",
            QueryMode::ByRecordType { .. } => "by-record-type",
        }
    }

    /// The argument the mode searches for, as given.
    pub fn argument(&self) -> &str {
        match self {
            QueryMode::ByIp { ip, .. }
            | QueryMode::RpzByIp { ip }
            | QueryMode::RecordTypeByIp { ip } => ip,
            QueryMode::ByDomain { domain, .. }
            | QueryMode::RpzByDomain { domain }
            | QueryMode::RecordTypeByDomain { domain } => domain,
            QueryMode::ByRecordType { record_type } => record_type,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.argument() == WILDCARD
    }

    /// Human-readable subject for headers and summaries.
    pub fn subject(&self) -> String {
        let name = if self.is_wildcard() {
            "all".to_string()
        } else if let QueryMode::ByRecordType { record_type } = self {
            record_type.to_ascii_uppercase()
        } else {
            self.argument().to_string()
        };

        match self {
            QueryMode::ByRecordType { .. } => format!("record type {}", name),
            _ => name,
        }
    }

    /// Heading of the ranked section.
    pub fn heading(&self) -> &'static str {
        match self {
            QueryMode::ByDomain { .. } | QueryMode::RpzByDomain { .. } => "ip addresses",
            QueryMode::RecordTypeByDomain { .. } => "record types",
            _ => "queries",
        }
    }

    /// Related lists are printed only for a concrete subject.
    pub fn lists_related(&self) -> bool {
        matches!(self, QueryMode::ByRecordType { .. }) || !self.is_wildcard()
    }

    pub fn plan(&self) -> Result<QueryPlan> {
        let mut line_filters = Vec::new();
        let mut field_filters = Vec::new();

        let (kind, primary, related) = match self {
            QueryMode::ByIp { ip, domain } => {
                if let Some(ip) = argument(ip) {
                    line_filters.push(LineFilter::client(ip));
                }
                if let Some(domain) = optional_argument(domain) {
                    field_filters.push(FieldFilter::Domain(DomainPattern::new(domain)?));
                }
                (LineKind::Query, Dimension::Domain, vec![])
            }
            QueryMode::ByDomain { domain, ip } => {
                if let Some(domain) = argument(domain) {
                    line_filters.push(LineFilter::Pattern(DomainPattern::new(domain)?));
                }
                if let Some(ip) = optional_argument(ip) {
                    line_filters.push(LineFilter::client(ip));
                }
                (LineKind::Query, Dimension::Client, vec![Dimension::Domain])
            }
            QueryMode::RpzByIp { ip } => {
                if let Some(ip) = argument(ip) {
                    line_filters.push(LineFilter::client(ip));
                }
                (LineKind::Rpz, Dimension::RpzName, vec![])
            }
            QueryMode::RpzByDomain { domain } => {
                if let Some(domain) = argument(domain) {
                    line_filters.push(LineFilter::Pattern(DomainPattern::new(domain)?));
                }
                (LineKind::Rpz, Dimension::Client, vec![Dimension::RpzName])
            }
            QueryMode::RecordTypeByIp { ip } => {
                if let Some(ip) = argument(ip) {
                    line_filters.push(LineFilter::client(ip));
                }
                (
                    LineKind::Query,
                    Dimension::RecordType,
                    vec![Dimension::Domain],
                )
            }
            QueryMode::RecordTypeByDomain { domain } => {
                if let Some(domain) = argument(domain) {
                    line_filters.push(LineFilter::Pattern(DomainPattern::new(domain)?));
                }
                (
                    LineKind::Query,
                    Dimension::RecordType,
                    vec![Dimension::Domain, Dimension::Client],
                )
            }
            QueryMode::ByRecordType { record_type } => {
                if let Some(record_type) = argument(record_type) {
                    field_filters.push(FieldFilter::RecordType(record_type.to_string()));
                }
                (LineKind::Query, Dimension::Domain, vec![Dimension::Client])
            }
        };

        Ok(QueryPlan {
            kind,
            line_filters,
            field_filters,
            primary,
            related,
        })
    }

    /// Natural-language summary; `related` holds the distinct counts of the
    /// related tables in plan order.
    pub fn summary(&self, total: u64, primary: usize, related: &[usize]) -> String {
        let related_count = |index: usize| related.get(index).copied().unwrap_or(0);
        let found = format!("Searched {} and found {} queries", self.subject(), total);

        match self {
            QueryMode::ByIp { .. } => format!("{} for {} domain names.", found, primary),
            QueryMode::ByDomain { .. } if self.is_wildcard() => {
                format!("{} from {} clients.", found, primary)
            }
            QueryMode::ByDomain { .. } => format!(
                "{} for {} domain names from {} clients.",
                found,
                related_count(0),
                primary
            ),
            QueryMode::RpzByIp { .. } => format!("{} for {} rpz names.", found, primary),
            QueryMode::RpzByDomain { .. } => format!("{} from {} clients.", found, primary),
            QueryMode::RecordTypeByIp { .. } => format!(
                "{} with {} record types for {} domains.",
                found,
                primary,
                related_count(0)
            ),
            QueryMode::RecordTypeByDomain { .. } => format!(
                "{} for {} record types from {} clients.",
                found,
                primary,
                related_count(1)
            ),
            QueryMode::ByRecordType { .. } => format!(
                "{} for {} domains from {} clients.",
                found,
                primary,
                related_count(0)
            ),
        }
    }
}
