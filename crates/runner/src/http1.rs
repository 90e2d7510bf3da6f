// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HTTP/1 header-block parsing into the pseudo-header form.
//!
//! Request and status lines plus CRLF-delimited header lines are
//! materialized as the Proxy-Wasm view: `:method`/`:scheme`/`:path`/
//! `:authority` (requests) or `:status` (responses), with every normal
//! header name lowercased and duplicates coalesced by the header map.
//! Any parse failure is a test-setup error, never a silent empty map.

use filtercheck_core::{FilterCheckError, HeaderMap, Result};
use url::Url;

const MAX_HEADERS: usize = 96;

// Resolution base for validating origin-form request targets.
const ORIGIN_FORM_BASE: &str = "http://example.com";

fn invalid(msg: String) -> FilterCheckError {
    FilterCheckError::InvalidInput(msg)
}

/// Ensures the block ends with an empty line so partial fixtures parse.
fn terminated(content: &str) -> String {
    let mut block = content.to_string();
    block.push_str("\r\n\r\n");
    block
}

/// Splits an absolute-form request target into scheme, authority, and
/// path-with-query. Returns `None` for origin-form (or unparseable)
/// targets.
fn absolute_form(uri: &str) -> Option<(String, String, String)> {
    let url = Url::parse(uri).ok()?;
    let host = url.host_str()?.to_string();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some((url.scheme().to_string(), authority, path))
}

/// Validates an origin-form target: resolving it against a fixed base must
/// reproduce the input path-and-query exactly.
fn validate_origin_form(uri: &str) -> Result<()> {
    let base = Url::parse(ORIGIN_FORM_BASE)
        .map_err(|e| invalid(format!("origin-form base failed to parse: {e}")))?;
    let joined = base.join(uri).map_err(|_| invalid(format!("Invalid URI: {uri}")))?;
    let mut path_and_query = joined.path().to_string();
    if let Some(query) = joined.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    if path_and_query == uri {
        Ok(())
    } else {
        Err(invalid(format!("Invalid URI: {uri}")))
    }
}

/// Parses an HTTP/1 request header block.
///
/// # Errors
///
/// Fails on malformed wire syntax, a missing method or URI, or a request
/// target that is neither absolute-form nor a valid origin-form path.
pub fn parse_request(content: &str) -> Result<HeaderMap> {
    let block = terminated(content);
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut slots);
    let status = request
        .parse(block.as_bytes())
        .map_err(|e| invalid(format!("header parse error: {e}")))?;
    if status.is_partial() {
        return Err(invalid("incomplete HTTP/1 request block".to_string()));
    }
    let method = request.method.ok_or_else(|| invalid("missing request method".to_string()))?;
    let uri = request.path.ok_or_else(|| invalid("missing request URI".to_string()))?;

    let headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|h| (h.name.to_ascii_lowercase(), String::from_utf8_lossy(h.value).into_owned()))
        .collect();

    let mut map = HeaderMap::new();
    map.insert_or_append(":method", &method.to_ascii_uppercase());

    let mut consume_host = false;
    if let Some((scheme, authority, path)) = absolute_form(uri) {
        map.insert_or_append(":scheme", &scheme);
        map.insert_or_append(":path", &path);
        map.insert_or_append(":authority", &authority);
        consume_host = true;
    } else {
        validate_origin_form(uri)?;
        map.insert_or_append(":path", uri);
        if let Some(host) = headers.iter().find(|(name, _)| name == "host") {
            map.insert_or_append(":authority", &host.1);
            consume_host = true;
        }
    }

    for (name, value) in &headers {
        if consume_host && name == "host" {
            continue;
        }
        map.insert_or_append(name, value);
    }
    Ok(map)
}

/// Parses an HTTP/1 response header block, emitting `:status`.
///
/// # Errors
///
/// Fails on malformed wire syntax or a missing status code.
pub fn parse_response(content: &str) -> Result<HeaderMap> {
    let block = terminated(content);
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut slots);
    let status = response
        .parse(block.as_bytes())
        .map_err(|e| invalid(format!("header parse error: {e}")))?;
    if status.is_partial() {
        return Err(invalid("incomplete HTTP/1 response block".to_string()));
    }
    let code = response.code.ok_or_else(|| invalid("missing response status".to_string()))?;

    let mut map = HeaderMap::new();
    map.insert_or_append(":status", &code.to_string());
    for header in response.headers.iter() {
        map.insert_or_append(
            &header.name.to_ascii_lowercase(),
            &String::from_utf8_lossy(header.value),
        );
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_uri_request() {
        let map =
            parse_request("GET http://example.com/foo?q=1 HTTP/1.1\r\nHost: ignored\r\n\r\n")
                .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get(":method"), Some("GET"));
        assert_eq!(map.get(":scheme"), Some("http"));
        assert_eq!(map.get(":authority"), Some("example.com"));
        assert_eq!(map.get(":path"), Some("/foo?q=1"));
        assert_eq!(map.get("host"), None);
    }

    #[test]
    fn test_absolute_uri_with_port() {
        let map = parse_request("GET http://example.com:8080/x HTTP/1.1")
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get(":authority"), Some("example.com:8080"));
        assert_eq!(map.get(":path"), Some("/x"));
    }

    #[test]
    fn test_origin_form_takes_authority_from_host() {
        let map = parse_request(
            "POST /submit?x=2 HTTP/1.1\r\nHost: api.test\r\nContent-Type: text/plain\r\n",
        )
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get(":method"), Some("POST"));
        assert_eq!(map.get(":path"), Some("/submit?x=2"));
        assert_eq!(map.get(":authority"), Some("api.test"));
        assert_eq!(map.get(":scheme"), None);
        assert_eq!(map.get("host"), None);
        assert_eq!(map.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_origin_form_without_host() {
        let map = parse_request("GET /just/path HTTP/1.1\r\nAccept: */*\r\n")
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get(":path"), Some("/just/path"));
        assert_eq!(map.get(":authority"), None);
        assert_eq!(map.get("accept"), Some("*/*"));
    }

    #[test]
    fn test_invalid_uri_is_rejected() {
        assert!(parse_request("GET no-leading-slash HTTP/1.1").is_err());
        assert!(parse_request("GET * HTTP/1.1").is_err());
    }

    #[test]
    fn test_malformed_request_line_is_rejected() {
        assert!(parse_request("GARBAGE\u{1}\r\n").is_err());
    }

    #[test]
    fn test_duplicate_headers_coalesce_lowercased() {
        let map = parse_request(
            "GET / HTTP/1.1\r\nAccept: text/html\r\nACCEPT: text/plain\r\n",
        )
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get("accept"), Some("text/html, text/plain"));
    }

    #[test]
    fn test_header_entry_order_does_not_matter() {
        let a = parse_request("GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\n")
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let b = parse_request("GET / HTTP/1.1\r\nB: 2\r\nA: 1\r\n")
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let pairs_a: Vec<_> = a.pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let pairs_b: Vec<_> = b.pairs().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        assert_eq!(pairs_a, pairs_b);
    }

    #[test]
    fn test_response_status_line() {
        let map = parse_response("HTTP/1.1 404 Not Found\r\nServer: unit\r\n")
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(map.get(":status"), Some("404"));
        assert_eq!(map.get("server"), Some("unit"));
    }

    #[test]
    fn test_response_garbage_is_rejected() {
        assert!(parse_response("not an http response").is_err());
    }
}
