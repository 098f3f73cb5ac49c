//! # Docs Module
//!
//! Write-only documentation sink receiving one entry per registered route.
//!
//! The sink is a pure observer: it sees the compiled shape of each route
//! (after plugins have extended it and after each used plugin's
//! `modify_docs` pass) and has no feedback path into binding or dispatch.

use std::sync::Mutex;

use serde::Serialize;

use crate::descriptor::ParamType;

/// One documented parameter of a route.
#[derive(Debug, Clone, Serialize)]
pub struct DocParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub required: bool,
    /// Where the parameter binds: `"path"` or `"query"`.
    pub location: &'static str,
    pub description: String,
}

impl DocParam {
    pub(crate) fn path(name: &str, ty: ParamType) -> Self {
        DocParam {
            name: name.to_string(),
            ty: ty.name().to_string(),
            required: true,
            location: "path",
            description: String::new(),
        }
    }

    pub(crate) fn query(name: &str, ty: ParamType, required: bool, description: &str) -> Self {
        DocParam {
            name: name.to_string(),
            ty: ty.name().to_string(),
            required,
            location: "query",
            description: description.to_string(),
        }
    }
}

/// Documentation entry for one registered route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDoc {
    /// Display name, `"<METHOD> <path>"`.
    pub name: String,
    pub method: String,
    pub path: String,
    pub version: u32,
    /// Cosmetic grouping set via `Router::category`; no dispatch effect.
    pub category: Option<String>,
    pub description: String,
    pub params: Vec<DocParam>,
}

/// Receiver for route documentation entries.
pub trait DocSink: Send + Sync {
    fn route_registered(&self, doc: &RouteDoc);
}

/// Sink that discards everything. The router's default.
#[derive(Debug, Default)]
pub struct NullDocSink;

impl DocSink for NullDocSink {
    fn route_registered(&self, _doc: &RouteDoc) {}
}

/// Sink that collects entries in memory, for tests and doc generators.
#[derive(Debug, Default)]
pub struct CollectingDocSink {
    entries: Mutex<Vec<RouteDoc>>,
}

impl CollectingDocSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every entry received so far.
    #[must_use]
    pub fn entries(&self) -> Vec<RouteDoc> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl DocSink for CollectingDocSink {
    fn route_registered(&self, doc: &RouteDoc) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(doc.clone());
        }
    }
}
