//! Canonical request construction.
//!
//! Signer and verifier must hash identical bytes, so every outbound
//! request is reduced to a deterministic string before signing:
//! `METHOD \n PATH \n QUERY \n CANONICAL_HEADERS \n SIGNED_HEADER_NAMES`.
//! Body integrity is not part of this string; it travels in the
//! `x-gnfd-content-sha256` header, which the headers block covers.

use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

/// Header names never included in the signed set.
const EXCLUDED_HEADERS: [&str; 4] = [
    "authorization",
    "user-agent",
    "accept-encoding",
    "content-length",
];

/// Build the canonical string for a request.
///
/// Pure and total over any well-formed request; repeated calls and
/// header-map insertion-order permutations produce byte-identical output.
pub fn canonical_request(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> String {
    let signed = signed_header_names(headers);
    let header_block = canonical_headers(url, headers, &signed);
    [
        method.as_str(),
        &canonical_uri(url),
        &canonical_query(url),
        &header_block,
        &signed.join(";"),
    ]
    .join("\n")
}

/// The lower-cased, sorted signed-header name set. `host` is always a
/// member, whether or not the map carries it.
fn signed_header_names(headers: &HeaderMap) -> Vec<String> {
    let mut names: Vec<String> = headers
        .keys()
        .map(|k| k.as_str().to_ascii_lowercase())
        .filter(|k| !EXCLUDED_HEADERS.contains(&k.as_str()))
        .collect();
    if !names.iter().any(|n| n == "host") {
        names.push("host".to_string());
    }
    names.sort();
    names.dedup();
    names
}

/// One `name:value` line per signed header, sorted, joined with `\n`.
fn canonical_headers(
    url: &Url,
    headers: &HeaderMap,
    signed: &[String],
) -> String {
    let mut lines = Vec::with_capacity(signed.len());
    for name in signed {
        let value = if name == "host" && !headers.contains_key("host") {
            host_value(url)
        } else {
            headers
                .get_all(name.as_str())
                .iter()
                .map(|v| trim_all(&String::from_utf8_lossy(v.as_bytes())))
                .collect::<Vec<_>>()
                .join(",")
        };
        lines.push(format!("{}:{}", name, value));
    }
    lines.join("\n")
}

/// Host (with non-default port) taken from the resolved URL.
fn host_value(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Collapse internal whitespace runs to a single space and trim ends.
fn trim_all(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Percent-encode the request path S3-style: `/` is preserved, every
/// other byte outside the unreserved set is escaped with uppercase hex.
pub(crate) fn canonical_uri(url: &Url) -> String {
    let decoded =
        percent_encoding::percent_decode_str(url.path()).collect::<Vec<u8>>();
    uri_encode(&decoded, true)
}

/// Escape every byte outside the unreserved set `A-Za-z0-9 -_.~` with
/// uppercase hex. The verifier recomputes the same encoding, so the
/// form-urlencoded byte set (raw `*`, escaped `~`) must not be used here.
fn uri_encode(bytes: &[u8], preserve_slash: bool) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'~' => out.push(b as char),
            b'/' if preserve_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Re-encode the query with keys sorted alphabetically and every pair
/// percent-encoded over the unreserved set, so an encoded space is `%20`
/// (never `+`) on both sides.
pub(crate) fn canonical_query(url: &Url) -> String {
    let raw = match url.query() {
        Some(q) if !q.is_empty() => q,
        _ => return String::new(),
    };
    let mut pairs: Vec<(String, String)> =
        url::form_urlencoded::parse(raw.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                uri_encode(k.as_bytes(), false),
                uri_encode(v.as_bytes(), false)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
