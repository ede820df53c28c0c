//! Canonical identity for quick-reply items.
//!
//! Every upstream plugin describes its items with a different field shape, so
//! the rest of the crate never looks at raw records directly: it resolves each
//! record to a `CanonicalId` string and keys all policy decisions on that.
//! The id format is `TAG::discriminator`, e.g. `JSR::<script_id>`,
//! `QRV2::<set_name>`, `LWB::<task_scope>::<task_id>`.

use serde::{Deserialize, Serialize};

/// Upstream plugin that produced a quick-reply record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickReplySource {
    JsSlashRunner,
    QuickReplyV2,
    LittleWhiteBox,
    Unknown,
}

impl QuickReplySource {
    /// Source string as stamped into `data-qr-source` by upstream renderers.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickReplySource::JsSlashRunner => "JSSlashRunner",
            QuickReplySource::QuickReplyV2 => "QuickReplyV2",
            QuickReplySource::LittleWhiteBox => "LittleWhiteBox",
            QuickReplySource::Unknown => "Unknown",
        }
    }

    /// Parse a source attribute value. Anything unrecognized maps to
    /// `Unknown` rather than an error; unknown sources are simply excluded
    /// from policy enforcement.
    pub fn parse(value: &str) -> Self {
        match value {
            "JSSlashRunner" => QuickReplySource::JsSlashRunner,
            "QuickReplyV2" => QuickReplySource::QuickReplyV2,
            "LittleWhiteBox" => QuickReplySource::LittleWhiteBox,
            _ => QuickReplySource::Unknown,
        }
    }
}

/// Source-specific discriminator fields, one variant per upstream shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOrigin {
    JsSlashRunner {
        script_id: Option<String>,
        /// Present for API-based buttons only.
        button_id: Option<String>,
        api_based: bool,
    },
    /// Discriminated by the record's `set_name`.
    QuickReplyV2,
    LittleWhiteBox {
        task_scope: Option<String>,
        task_id: Option<String>,
    },
    Unknown,
}

impl RecordOrigin {
    pub fn source(&self) -> QuickReplySource {
        match self {
            RecordOrigin::JsSlashRunner { .. } => QuickReplySource::JsSlashRunner,
            RecordOrigin::QuickReplyV2 => QuickReplySource::QuickReplyV2,
            RecordOrigin::LittleWhiteBox { .. } => QuickReplySource::LittleWhiteBox,
            RecordOrigin::Unknown => QuickReplySource::Unknown,
        }
    }
}

/// One quick-reply item as supplied by the aggregation source.
///
/// Immutable snapshot; lives only for the duration of one fetch and is never
/// retained across reconciliation passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReplyRecord {
    pub label: String,
    pub set_name: String,
    /// Standard (native quick-reply) vs script-produced item.
    pub is_standard: bool,
    /// Presentation-only scope hint (`global`, `character`, ...).
    pub scope: Option<String>,
    pub origin: RecordOrigin,
}

/// Canonical identity of a quick-reply group, stable across upstream sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn new(id: impl Into<String>) -> Self {
        CanonicalId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalId {
    fn from(s: &str) -> Self {
        CanonicalId(s.to_string())
    }
}

/// Return a discriminator only if it is present and non-empty.
///
/// An absent discriminator must resolve to `None`, never to an empty-string
/// id: two unrelated records with missing fields would otherwise collide.
fn discriminator(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// Resolve a record to its canonical identity.
///
/// Pure and deterministic. Records from unknown sources, and records missing
/// a required discriminator, resolve to `None` and are thereby excluded from
/// policy enforcement (hiding unidentifiable UI risks hiding unrelated host
/// controls).
pub fn resolve(record: &QuickReplyRecord) -> Option<CanonicalId> {
    match &record.origin {
        RecordOrigin::JsSlashRunner { script_id, .. } => {
            let script_id = discriminator(script_id)?;
            Some(CanonicalId(format!("JSR::{script_id}")))
        }
        RecordOrigin::QuickReplyV2 => {
            if record.set_name.is_empty() {
                return None;
            }
            Some(CanonicalId(format!("QRV2::{}", record.set_name)))
        }
        RecordOrigin::LittleWhiteBox {
            task_scope,
            task_id,
        } => {
            let scope = discriminator(task_scope)?;
            let task = discriminator(task_id)?;
            Some(CanonicalId(format!("LWB::{scope}::{task}")))
        }
        RecordOrigin::Unknown => None,
    }
}
