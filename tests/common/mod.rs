//! Shared utilities for the middleware integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use opentelemetry::{Key, Value};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use tsu_otel::Request;
use tsu_otel::middleware::otel::SharedTracerProvider;

/// A tracer provider that exports synchronously into memory.
pub fn in_memory_provider() -> (SharedTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (Arc::new(provider), exporter)
}

pub fn finished(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    exporter.get_finished_spans().unwrap()
}

pub fn attr(span: &SpanData, key: &str) -> Option<Value> {
    let key = Key::from(key.to_owned());
    span.attributes.iter().find(|kv| kv.key == key).map(|kv| kv.value.clone())
}

/// Attribute keys in the order they were recorded.
pub fn keys(span: &SpanData) -> Vec<String> {
    span.attributes.iter().map(|kv| kv.key.as_str().to_owned()).collect()
}

pub fn get(uri: &str) -> Request {
    Request::builder()
        .uri(uri)
        .header("host", "api.example.com")
        .header("user-agent", "tsu-tests/1.0")
        .remote_addr("127.0.0.1:40000".parse().unwrap())
        .build()
        .unwrap()
}
