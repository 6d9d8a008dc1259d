use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;
use tracing::info;

use crate::query::{QueryMode, QueryPlan};
use crate::stats::{Aggregation, FrequencyTable};

/// One ranked line: a key and how many matching queries produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

/// Sorted distinct keys of a related dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyList {
    pub title: &'static str,
    pub distinct: usize,
    pub keys: Vec<String>,
}

/// Result of one analysis, ready to render or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mode: &'static str,
    pub subject: String,
    pub heading: &'static str,
    pub total_queries: u64,
    pub malformed_lines: u64,
    pub distinct_keys: usize,
    pub ranked: Vec<RankedEntry>,
    pub related: Vec<KeyList>,
    pub summary: String,
    pub elapsed_secs: f64,
    #[serde(skip)]
    list_related: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Leave out the summary and timing lines.
    pub quiet: bool,
    /// Print at most this many ranked lines.
    pub top: Option<usize>,
}

/// Order a table by count descending, then key ascending.
pub fn rank(table: &FrequencyTable) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = table
        .iter()
        .map(|(key, count)| RankedEntry {
            key: key.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked
}

impl Report {
    /// Rank the aggregation and stamp the time elapsed since `started`.
    pub fn build(
        mode: &QueryMode,
        plan: &QueryPlan,
        aggregation: Aggregation,
        started: Instant,
    ) -> Self {
        let ranked = rank(&aggregation.primary);
        let related: Vec<KeyList> = plan
            .related
            .iter()
            .zip(aggregation.related.iter())
            .map(|(dimension, table)| KeyList {
                title: dimension.title(),
                distinct: table.distinct(),
                keys: table.sorted_keys(),
            })
            .collect();

        let related_distinct: Vec<usize> = related.iter().map(|list| list.distinct).collect();
        let summary = mode.summary(aggregation.matched, ranked.len(), &related_distinct);
        let elapsed = started.elapsed();

        info!(
            action = "complete",
            component = "ranking",
            mode = mode.label(),
            total_queries = aggregation.matched,
            keyed_queries = aggregation.primary.total(),
            distinct_keys = ranked.len(),
            duration_ms = elapsed.as_millis(),
            "Report ranked"
        );

        Report {
            mode: mode.label(),
            subject: mode.subject(),
            heading: mode.heading(),
            total_queries: aggregation.matched,
            malformed_lines: aggregation.malformed,
            distinct_keys: ranked.len(),
            ranked,
            related,
            summary,
            elapsed_secs: elapsed.as_secs_f64(),
            list_related: mode.lists_related(),
        }
    }

    pub fn render(&self, options: &RenderOptions) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} total queries: {}",
            self.subject, self.total_queries
        ));
        lines.push(format!("{}:", self.heading));

        let limit = options.top.unwrap_or(self.ranked.len());
        for entry in self.ranked.iter().take(limit) {
            lines.push(format!("{}\t{}", entry.count, entry.key));
        }

        if self.list_related {
            for list in &self.related {
                lines.push(String::new());
                lines.push(format!("{}:", list.title));
                lines.extend(list.keys.iter().cloned());
            }
        }

        if !options.quiet {
            lines.push(String::new());
            lines.push(format!("Summary: {}", self.summary));
            lines.push(format!("Query time: {:.2} seconds", self.elapsed_secs));
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        rendered
    }
}

/// Write the report as text or JSON; a closed pipe surfaces as an error.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &Report,
    options: &RenderOptions,
    json: bool,
) -> io::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", report.render(options))?;
    }
    out.flush()
}

pub fn print_report(report: &Report, options: &RenderOptions, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, report, options, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::WILDCARD;

    fn table(keys: &[&str]) -> FrequencyTable {
        let mut table = FrequencyTable::new();
        for key in keys {
            table.accumulate(key);
        }
        table
    }

    fn report_for(
        mode: &QueryMode,
        primary: &[&str],
        related: &[&[&str]],
        matched: u64,
    ) -> Report {
        let plan = mode.plan().unwrap();
        let mut aggregation = plan.new_aggregation();
        aggregation.matched = matched;
        aggregation.primary = table(primary);
        for (slot, keys) in aggregation.related.iter_mut().zip(related) {
            *slot = table(keys);
        }
        Report::build(mode, &plan, aggregation, Instant::now())
    }

    fn by_ip(ip: &str) -> QueryMode {
        QueryMode::ByIp {
            ip: ip.to_string(),
            domain: None,
        }
    }

    fn by_domain(domain: &str) -> QueryMode {
        QueryMode::ByDomain {
            domain: domain.to_string(),
            ip: None,
        }
    }

    const QUIET: RenderOptions = RenderOptions {
        quiet: true,
        top: None,
    };

    /// Writer whose reader hung up.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rank_orders_by_count_then_key() {
        let ranked = rank(&table(&["c", "b", "a", "b", "d", "d", "d"]));
        let order: Vec<(&str, u64)> = ranked
            .iter()
            .map(|e| (e.key.as_str(), e.count))
            .collect();
        assert_eq!(order, vec![("d", 3), ("b", 2), ("a", 1), ("c", 1)]);
    }

    #[test]
    fn test_rank_adjacent_pairs_hold_invariant() {
        let keys: Vec<String> = (0..200)
            .map(|i| format!("host{}.example.com", i % 37))
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let ranked = rank(&table(&refs));
        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.count > b.count || (a.count == b.count && a.key <= b.key));
        }
    }

    #[test]
    fn test_rank_empty_table() {
        assert!(rank(&FrequencyTable::new()).is_empty());
    }

    #[test]
    fn test_render_by_ip_report() {
        let primary = ["a.example.com", "b.example.com", "a.example.com"];
        let report = report_for(&by_ip("10.0.0.45"), &primary, &[], 3);
        let rendered = report.render(&RenderOptions::default());

        assert!(rendered.starts_with(
            "10.0.0.45 total queries: 3\nqueries:\n2\ta.example.com\n1\tb.example.com\n\nSummary: Searched 10.0.0.45 and found 3 queries for 2 domain names.\nQuery time: "
        ));
        assert!(rendered.ends_with(" seconds\n"));
    }

    #[test]
    fn test_render_lists_related_for_concrete_subject() {
        let related: &[&[&str]] = &[&["b.example.com", "a.example.com"]];
        let report = report_for(&by_domain("example"), &["10.0.0.45"], related, 2);
        assert_eq!(
            report.render(&QUIET),
            "example total queries: 2\nip addresses:\n1\t10.0.0.45\n\ndomain names:\na.example.com\nb.example.com\n"
        );
    }

    #[test]
    fn test_render_record_type_by_domain_lists_domains_then_clients() {
        let mode = QueryMode::RecordTypeByDomain {
            domain: "example".into(),
        };
        let related: &[&[&str]] = &[
            &["b.example.com", "a.example.com", "a.example.com"],
            &["10.0.0.46", "10.0.0.45"],
        ];
        let report = report_for(&mode, &["A", "AAAA", "A"], related, 3);
        let rendered = report.render(&RenderOptions::default());

        assert!(rendered.starts_with(
            "example total queries: 3\nrecord types:\n2\tA\n1\tAAAA\n\ndomain names:\na.example.com\nb.example.com\n\nip addresses:\n10.0.0.45\n10.0.0.46\n\n"
        ));
        assert!(rendered.contains(
            "Summary: Searched example and found 3 queries for 2 record types from 2 clients.\n"
        ));
    }

    #[test]
    fn test_render_hides_related_for_wildcard() {
        let related: &[&[&str]] = &[&["a.example.com"]];
        let report = report_for(&by_domain(WILDCARD), &["10.0.0.45"], related, 1);
        assert_eq!(
            report.render(&QUIET),
            "all total queries: 1\nip addresses:\n1\t10.0.0.45\n"
        );
        assert_eq!(report.related[0].distinct, 1);
    }

    #[test]
    fn test_render_top_limits_ranked_lines_only() {
        let report = report_for(&by_ip(WILDCARD), &["a", "a", "b", "c"], &[], 4);
        let options = RenderOptions {
            quiet: false,
            top: Some(1),
        };
        let rendered = report.render(&options);
        assert!(rendered.contains("2\ta\n\nSummary"));
        assert!(rendered.contains("for 3 domain names."));
    }

    #[test]
    fn test_empty_report() {
        let report = report_for(&by_ip("10.9.9.9"), &[], &[], 0);
        assert_eq!(report.total_queries, 0);
        assert_eq!(report.distinct_keys, 0);
        assert!(report.ranked.is_empty());
        assert!(report
            .render(&RenderOptions::default())
            .contains("Summary: Searched 10.9.9.9 and found 0 queries for 0 domain names."));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mode = QueryMode::RpzByIp {
            ip: "192.168.1.20".into(),
        };
        let report = report_for(&mode, &["ads.tracker.net"], &[], 1);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["mode"], "rpz-by-ip");
        assert_eq!(value["total_queries"], 1);
        assert_eq!(value["ranked"][0]["key"], "ads.tracker.net");
        assert_eq!(value["ranked"][0]["count"], 1);
        assert!(value.get("list_related").is_none());
    }

    #[test]
    fn test_write_report_text_and_json() {
        let report = report_for(&by_ip("10.0.0.45"), &["a.example.com"], &[], 1);

        let mut text = Vec::new();
        write_report(&mut text, &report, &QUIET, false).unwrap();
        assert_eq!(
            String::from_utf8(text).unwrap(),
            "10.0.0.45 total queries: 1\nqueries:\n1\ta.example.com\n"
        );

        let mut json = Vec::new();
        write_report(&mut json, &report, &QUIET, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["subject"], "10.0.0.45");
    }

    #[test]
    fn test_write_report_to_closed_pipe_is_an_error() {
        let report = report_for(&by_ip("10.0.0.45"), &["a.example.com"], &[], 1);
        let err = write_report(&mut ClosedPipe, &report, &QUIET, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err = write_report(&mut ClosedPipe, &report, &QUIET, true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
