/// Process tag every BIND record carries.
pub const PROCESS_MARKER: &str = "named";
/// Event tag of a client query record.
pub const QUERY_MARKER: &str = "query:";
/// Event tag of a response policy hit.
pub const RPZ_MARKER: &str = "QNAME";
/// RPZ SOA rewrites are zone bookkeeping, not client hits.
const RPZ_EXCLUDED: &str = "SOA";

/// The two record flavours the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Query,
    Rpz,
}

impl LineKind {
    pub fn matches(self, line: &str) -> bool {
        match self {
            LineKind::Query => is_query_line(line),
            LineKind::Rpz => is_rpz_line(line),
        }
    }
}

/// True when the line is a query event logged by the DNS server.
///
/// Markers are fixed-case in the source format, so matching is case-sensitive.
pub fn is_query_line(line: &str) -> bool {
    line.contains(PROCESS_MARKER) && line.contains(QUERY_MARKER)
}

/// True when the line records a response policy zone hit.
pub fn is_rpz_line(line: &str) -> bool {
    line.contains(PROCESS_MARKER) && line.contains(RPZ_MARKER) && !line.contains(RPZ_EXCLUDED)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY_LINE: &str = "2021-03-01T10:00:00.123456-05:00 ns1 named[812]: client @0x7f2a1c0d2e10 10.0.0.45#53 (a.example.com): query: a.example.com IN A +E(0)K (10.0.0.1)";
    const RPZ_LINE: &str = "2021-03-01T10:00:01.000000-05:00 ns1 named[812]: client @0x7f2a1c0d2e10 10.0.0.45#53 (ads.tracker.net): rpz QNAME NXDOMAIN rewrite ads.tracker.net/A via ads.tracker.net.rpz.local";

    #[test]
    fn test_query_line_detected() {
        assert!(is_query_line(QUERY_LINE));
        assert!(!is_rpz_line(QUERY_LINE));
    }

    #[test]
    fn test_rpz_line_detected() {
        assert!(is_rpz_line(RPZ_LINE));
        assert!(!is_query_line(RPZ_LINE));
    }

    #[test]
    fn test_requires_both_markers() {
        assert!(!is_query_line(
            "2021-03-01T10:00:00 ns1 systemd[1]: query: something unrelated"
        ));
        assert!(!is_query_line(
            "2021-03-01T10:00:00 ns1 named[812]: zone example.com/IN: loaded serial 7"
        ));
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert!(!is_query_line(&QUERY_LINE.replace("query:", "QUERY:")));
        assert!(!is_query_line(&QUERY_LINE.replace("named", "NAMED")));
    }

    #[test]
    fn test_rpz_soa_rewrites_excluded() {
        let soa = RPZ_LINE.replace("ads.tracker.net/A", "ads.tracker.net/SOA");
        assert!(!is_rpz_line(&soa));
    }

    #[test]
    fn test_line_kind_dispatch() {
        assert!(LineKind::Query.matches(QUERY_LINE));
        assert!(LineKind::Rpz.matches(RPZ_LINE));
        assert!(!LineKind::Rpz.matches(QUERY_LINE));
    }
}
