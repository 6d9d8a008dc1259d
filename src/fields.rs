use crate::classify::LineKind;

/// Separates the client address from its source port (`10.0.0.45#53`).
pub const PORT_DELIMITER: char = '#';
/// Separates the rewritten name from its record type in RPZ lines (`ads.example/A`).
const RPZ_TYPE_DELIMITER: char = '/';

/// Whitespace-token positions of the fields in one record flavour.
///
/// BIND logs are positional; keeping the indices here, next to the guard
/// that protects them, means a format change touches one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub client: usize,
    pub domain: Option<usize>,
    pub record_type: Option<usize>,
    pub rpz_name: Option<usize>,
    /// Lines with fewer tokens are treated as truncated.
    pub min_tokens: usize,
}

/// `<ts> <host> named[pid]: client @0x.. <ip>#<port> (<name>): query: <name> IN <type> <flags> (<server>)`
pub const QUERY_LAYOUT: FieldLayout = FieldLayout {
    client: 5,
    domain: Some(8),
    record_type: Some(10),
    rpz_name: None,
    min_tokens: 13,
};

/// `<ts> <host> named[pid]: client @0x.. <ip>#<port> (<name>): rpz QNAME <action> rewrite <name>/<type> via <rule>`
pub const RPZ_LAYOUT: FieldLayout = FieldLayout {
    client: 5,
    domain: None,
    record_type: None,
    rpz_name: Some(11),
    min_tokens: 12,
};

impl FieldLayout {
    pub fn for_kind(kind: LineKind) -> &'static FieldLayout {
        match kind {
            LineKind::Query => &QUERY_LAYOUT,
            LineKind::Rpz => &RPZ_LAYOUT,
        }
    }
}

/// Fields borrowed from one matching log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord<'a> {
    /// Client address with the port stripped.
    pub client: &'a str,
    pub domain: Option<&'a str>,
    pub record_type: Option<&'a str>,
    pub rpz_name: Option<&'a str>,
}

/// Pull the named fields out of a classified line.
///
/// Returns `None` when the line is too short for the layout of `kind`.
pub fn extract_fields(line: &str, kind: LineKind) -> Option<QueryRecord<'_>> {
    let layout = FieldLayout::for_kind(kind);
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < layout.min_tokens {
        return None;
    }

    let client_token: &str = tokens.get(layout.client).copied()?;
    let (client, _port) = split_client(client_token);
    let mut record = QueryRecord {
        client,
        domain: field(&tokens, layout.domain),
        record_type: field(&tokens, layout.record_type),
        rpz_name: None,
    };

    if let Some(rpz_token) = field(&tokens, layout.rpz_name) {
        let (name, record_type) = split_rpz_name(rpz_token);
        record.rpz_name = Some(name);
        record.record_type = record_type;
    }

    Some(record)
}

fn field<'a>(tokens: &[&'a str], index: Option<usize>) -> Option<&'a str> {
    index.and_then(|i| tokens.get(i).copied())
}

/// Split `ip#port` into the address and the optional port.
pub fn split_client(token: &str) -> (&str, Option<&str>) {
    match token.split_once(PORT_DELIMITER) {
        Some((address, port)) => (address, Some(port)),
        None => (token, None),
    }
}

fn split_rpz_name(token: &str) -> (&str, Option<&str>) {
    match token.split_once(RPZ_TYPE_DELIMITER) {
        Some((name, record_type)) if !record_type.is_empty() => (name, Some(record_type)),
        Some((name, _)) => (name, None),
        None => (token, None),
    }
}
