//! Request-line and header parsing.

use crate::errors::{AggregationError, AggregationResult};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};

/// Case-insensitive header store. Only `Content-Length` and
/// `Lamport-Clock` are ever looked at; everything else is kept (lowercased
/// key) but otherwise ignored.
#[derive(Debug, Default, Clone)]
pub struct HeaderMap(HashMap<String, String>);

impl HeaderMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_length(&self) -> usize {
        self.get("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn lamport_clock(&self) -> u64 {
        self.get("lamport-clock")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    fn insert(&mut self, name: String, value: String) {
        self.0.insert(name.to_ascii_lowercase(), value);
    }
}

/// A fully-parsed HTTP request: method, path (with any query string split
/// off), headers, and the raw body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// `?id=<station>` convenience accessor used by the GET handler.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_ref()?;
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let k = parts.next()?;
            if k == key {
                return Some(parts.next().unwrap_or("").to_string());
            }
        }
        None
    }
}

/// Read and parse one HTTP request from an async buffered reader: request
/// line, headers until a blank line, then exactly `Content-Length` bytes
/// of body (zero if the header is absent).
pub async fn parse_request<R>(reader: &mut R) -> AggregationResult<HttpRequest>
where
    R: AsyncBufReadExt + AsyncReadExt + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(AggregationError::protocol("connection closed before a request line arrived"));
    }
    let (method, path, query) = parse_request_line(&line)?;

    let mut headers = HeaderMap::default();
    loop {
        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line).await?;
        if n == 0 {
            return Err(AggregationError::protocol("connection closed while reading headers"));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(AggregationError::protocol(format!("malformed header line: {trimmed:?}")));
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    let content_length = headers.content_length();
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(HttpRequest {
        method,
        path,
        query,
        headers,
        body,
    })
}

/// Parse `METHOD SP PATH SP VERSION CRLF`, splitting the path's query
/// string off if present.
fn parse_request_line(line: &str) -> AggregationResult<(String, String, Option<String>)> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut parts = trimmed.split(' ');
    let method = parts.next().filter(|s| !s.is_empty());
    let target = parts.next().filter(|s| !s.is_empty());
    let version = parts.next().filter(|s| !s.is_empty());

    let (Some(method), Some(target), Some(_version)) = (method, target, version) else {
        return Err(AggregationError::protocol(format!("malformed request line: {trimmed:?}")));
    };

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    Ok((method.to_ascii_uppercase(), path, query))
}
