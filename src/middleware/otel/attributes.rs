//! HTTP span attributes and status mapping.
//!
//! Attribute keys follow OpenTelemetry semantic conventions v1.4.0, the
//! `http.*` / `net.*` generation.

use http::StatusCode;
use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::KeyValue;

use super::config::SpanOption;
use crate::request::Request;

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_TARGET: &str = "http.target";
pub const HTTP_ROUTE: &str = "http.route";
pub const HTTP_URL: &str = "http.url";
pub const HTTP_USER_AGENT: &str = "http.user_agent";
pub const HTTP_REQUEST_CONTENT_LENGTH: &str = "http.request_content_length";
pub const HTTP_SCHEME: &str = "http.scheme";
pub const HTTP_SERVER_NAME: &str = "http.server_name";
pub const HTTP_HOST: &str = "http.host";
pub const HTTP_CLIENT_IP: &str = "http.client_ip";
pub const NET_PEER_IP: &str = "net.peer.ip";
pub const NET_TRANSPORT: &str = "net.transport";
pub const HTTP_STATUS_CODE: &str = "http.status_code";
pub const HTTP_RESPONSE_CONTENT_LENGTH: &str = "http.response_content_length";

/// Set when the handler failed; the value is the error message.
pub const TSU_ERROR: &str = "tsu.error";

/// `net.transport` value for TCP.
pub const NET_TRANSPORT_TCP: &str = "ip_tcp";

/// The built-in span-start options for `req`, in their fixed order.
///
/// Attributes with no value for this request (no matched route, no
/// `Content-Length`, no `X-Forwarded-For`, ...) are left out rather than
/// recorded empty.
pub fn request_options(req: &Request, server_name: Option<&str>) -> Vec<SpanOption> {
    let mut attrs = Vec::with_capacity(11);

    attrs.push(KeyValue::new(HTTP_METHOD, req.method().as_str().to_owned()));
    attrs.push(KeyValue::new(HTTP_TARGET, req.target().to_owned()));
    if let Some(route) = req.route() {
        attrs.push(KeyValue::new(HTTP_ROUTE, route.to_owned()));
    }
    attrs.push(KeyValue::new(HTTP_URL, req.url()));
    attrs.push(KeyValue::new(HTTP_USER_AGENT, req.user_agent().unwrap_or_default().to_owned()));
    if let Some(len) = req.content_length() {
        attrs.push(KeyValue::new(HTTP_REQUEST_CONTENT_LENGTH, saturating_i64(len)));
    }
    attrs.push(KeyValue::new(HTTP_SCHEME, req.scheme().to_owned()));
    match (server_name, req.host()) {
        (Some(name), _) => attrs.push(KeyValue::new(HTTP_SERVER_NAME, name.to_owned())),
        (None, Some(host)) => attrs.push(KeyValue::new(HTTP_HOST, host.to_owned())),
        (None, None) => {}
    }
    if let Some(ip) = req.client_ip() {
        attrs.push(KeyValue::new(HTTP_CLIENT_IP, ip.to_string()));
    }
    if let Some(addr) = req.remote_addr() {
        attrs.push(KeyValue::new(NET_PEER_IP, addr.ip().to_string()));
    }
    attrs.push(KeyValue::new(NET_TRANSPORT, NET_TRANSPORT_TCP));

    attrs.into_iter()
        .map(SpanOption::attribute)
        .chain([SpanOption::Kind(SpanKind::Server)])
        .collect()
}

/// Attributes describing the response.
pub fn response_attributes(status: StatusCode, content_length: usize) -> Vec<KeyValue> {
    vec![
        KeyValue::new(HTTP_STATUS_CODE, i64::from(status.as_u16())),
        KeyValue::new(HTTP_RESPONSE_CONTENT_LENGTH, saturating_i64(content_length as u64)),
    ]
}

/// Span status for a server span that answered with `code`.
///
/// | code | status |
/// |---|---|
/// | below 100, 600 and up | `Error`, "Invalid HTTP status code N" |
/// | 100–499 | `Unset` |
/// | 500–599 | `Error`, canonical reason phrase |
///
/// 4xx answers are the client's fault and leave a server span unset.
pub fn span_status(code: u16) -> Status {
    match code {
        100..=499 => Status::Unset,
        500..=599 => {
            let reason = StatusCode::from_u16(code).ok().and_then(|s| s.canonical_reason());
            Status::error(reason.unwrap_or_default())
        }
        _ => Status::error(format!("Invalid HTTP status code {code}")),
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
