//! Span naming.
//!
//! A template is plain text with `{field}` placeholders, rendered against
//! each request:
//!
//! | field | value |
//! |---|---|
//! | `method` | `GET` |
//! | `path` | `/users/42` |
//! | `target` | `/users/42?expand=teams` |
//! | `route` | `/users/{id}`, or `HTTP GET route not found` |
//! | `host` | `api.example.com` |
//! | `scheme` | `https` |
//! | `param.<name>` | path parameter `<name>` |
//! | `header.<name>` | request header `<name>` |
//!
//! `{{` and `}}` produce literal braces.

use crate::request::Request;

/// How the span for a request is named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanName {
    /// The matched route pattern, or `HTTP <METHOD> route not found`.
    Route,
    /// The same literal name for every request.
    Static(String),
    /// A template rendered per request, e.g. `"{method} {route}"`.
    Template(String),
}

/// Why a span-name template could not be rendered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed placeholder at byte {offset}")]
    Unclosed { offset: usize },

    #[error("unmatched `}}` at byte {offset}")]
    Unmatched { offset: usize },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` has no value for this request")]
    Missing(String),
}

impl SpanName {
    /// Derives the span name for `req`.
    pub fn for_request(&self, req: &Request) -> Result<String, TemplateError> {
        match self {
            Self::Route => Ok(route_or_not_found(req)),
            Self::Static(name) => Ok(name.clone()),
            Self::Template(template) => render(template, req),
        }
    }
}

fn route_or_not_found(req: &Request) -> String {
    match req.route() {
        Some(route) => route.to_owned(),
        None => format!("HTTP {} route not found", req.method()),
    }
}

/// Renders `template` against `req`.
pub fn render(template: &str, req: &Request) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(i) = rest.find(['{', '}']) {
        out.push_str(&rest[..i]);
        let at = offset + i;

        if rest[i..].starts_with("{{") {
            out.push('{');
            (rest, offset) = (&rest[i + 2..], at + 2);
        } else if rest[i..].starts_with("}}") {
            out.push('}');
            (rest, offset) = (&rest[i + 2..], at + 2);
        } else if rest[i..].starts_with('}') {
            return Err(TemplateError::Unmatched { offset: at });
        } else {
            let close = rest[i..].find('}').ok_or(TemplateError::Unclosed { offset: at })?;
            let field = rest[i + 1..i + close].trim();
            out.push_str(&field_value(field, req)?);
            (rest, offset) = (&rest[i + close + 1..], at + close + 1);
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn field_value(field: &str, req: &Request) -> Result<String, TemplateError> {
    let missing = || TemplateError::Missing(field.to_owned());

    let value = match field {
        "route" => return Ok(route_or_not_found(req)),
        "method" => req.method().as_str(),
        "path" => req.path(),
        "target" => req.target(),
        "host" => req.host().ok_or_else(missing)?,
        "scheme" => req.scheme(),
        _ => match field.split_once('.') {
            Some(("param", name)) if !name.is_empty() => req.param(name).ok_or_else(missing)?,
            Some(("header", name)) if !name.is_empty() => req.header(name).ok_or_else(missing)?,
            _ => return Err(TemplateError::UnknownField(field.to_owned())),
        },
    };
    Ok(value.to_owned())
}
