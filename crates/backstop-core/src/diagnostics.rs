//! Redacting request/response dumps for debug logging
//!
//! Credentials never reach the log: JSON bodies, form bodies and headers
//! have sensitive values replaced with `[REDACTED]` before they are
//! formatted.

use serde_json::Value;

/// Replacement for sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Body fields whose values are never logged
const SENSITIVE_FIELDS: &[&str] = &[
    "access_token",
    "refresh_token",
    "id_token",
    "password",
    "client_secret",
    "token",
    "apikey",
    "api_key",
    "authorization",
    "secret",
];

/// Headers whose values are never logged
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-auth-token"];

/// Raw bodies longer than this are summarized instead of printed
const MAX_RAW_DUMP: usize = 1024;

fn is_sensitive_field(name: &str) -> bool {
    SENSITIVE_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(name))
}

fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|header| header.eq_ignore_ascii_case(name.trim()))
}

/// Replace sensitive values in a JSON document, at any depth
pub fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if is_sensitive_field(key) {
                    *val = Value::String(REDACTED.to_string());
                } else {
                    redact_json(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

/// Replace sensitive values in an `application/x-www-form-urlencoded` body
///
/// Pairs keep their order; keys are compared after percent-decoding.
pub fn redact_form(body: &str) -> String {
    body.split('&')
        .map(|pair| {
            let (raw_key, _) = pair.split_once('=').unwrap_or((pair, ""));
            let key = url::form_urlencoded::parse(raw_key.as_bytes())
                .next()
                .map(|(k, _)| k.into_owned())
                .unwrap_or_default();
            if is_sensitive_field(&key) {
                format!("{}={}", raw_key, REDACTED)
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Copy `headers`, replacing credential-bearing values
pub fn redact_headers<'a, I>(headers: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                REDACTED.to_string()
            } else {
                value.to_string()
            };
            (name.to_string(), value)
        })
        .collect()
}

/// How a body should be rendered in a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Form,
    Json,
    Raw,
}

impl BodyFormat {
    /// Classify a `Content-Type` header value
    ///
    /// Parameters such as `charset` are ignored, as is case.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Raw;
        };
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            "application/x-www-form-urlencoded" => Self::Form,
            "application/json" => Self::Json,
            other if other.ends_with("+json") => Self::Json,
            _ => Self::Raw,
        }
    }
}

/// Render `body` for a log line with credentials removed
pub fn dump_body(content_type: Option<&str>, body: &[u8]) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }

    match BodyFormat::from_content_type(content_type) {
        BodyFormat::Json => match serde_json::from_slice::<Value>(body) {
            Ok(mut value) => {
                redact_json(&mut value);
                value.to_string()
            }
            Err(_) => dump_raw(body),
        },
        BodyFormat::Form => match std::str::from_utf8(body) {
            Ok(text) => redact_form(text),
            Err(_) => dump_raw(body),
        },
        BodyFormat::Raw => dump_raw(body),
    }
}

fn dump_raw(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) if text.len() <= MAX_RAW_DUMP && !text.chars().any(is_binary_char) => {
            text.to_string()
        }
        Ok(_) => format!("<{} bytes>", body.len()),
        Err(_) => format!("<{} bytes of binary data>", body.len()),
    }
}

fn is_binary_char(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\r' | '\t')
}

/// One side of an HTTP exchange
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

impl Exchange<'_> {
    fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| *value)
    }

    fn render_headers(&self) -> String {
        redact_headers(self.headers.iter().copied())
            .into_iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Log a request and its response at debug level
///
/// Nothing is formatted unless debug logging is enabled.
pub fn log_exchange(method: &str, url: &str, request: Exchange<'_>, status: u16, response: Exchange<'_>) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    tracing::debug!(
        method,
        url,
        headers = %request.render_headers(),
        body = %dump_body(request.content_type(), request.body),
        "HTTP request"
    );
    tracing::debug!(
        method,
        url,
        status,
        headers = %response.render_headers(),
        body = %dump_body(response.content_type(), response.body),
        "HTTP response"
    );
}
