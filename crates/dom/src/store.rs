//! Sidecar metadata keyed by [`NodeId`].
//!
//! Records live outside the tree so that moving a node never touches its
//! metadata, while deleting a node drops it. Everything is created lazily on
//! first mutable access.
use crate::NodeId;
use core_types::{DiffMark, DiffMarks, Dsr, Tsr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn is_false(v: &bool) -> bool {
    !*v
}

/// Per-node source bookkeeping, persisted as `data-parsoid`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsr: Option<Dsr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsr: Option<Tsr>,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_inserted_start: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_inserted_end: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub fostered: bool,
    /// Surface syntax hint; `"html"` marks a literal HTML tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stx: Option<String>,
    #[serde(rename = "strippedNL", skip_serializing_if = "Option::is_none")]
    pub stripped_nl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub li_hack_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Attribute name/value pairs as written in the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sa: Option<Map<String, Value>>,
    #[serde(skip_serializing)]
    pub tmp: Scratch,
    #[serde(skip_serializing)]
    pub tag_id: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceRecord {
    pub fn is_literal_html(&self) -> bool {
        self.stx.as_deref() == Some("html")
    }

    pub fn valid_dsr(&self) -> Option<Dsr> {
        self.dsr.filter(Dsr::is_valid)
    }

    /// Clears the pipeline-internal fields.
    pub fn clear_scratch(&mut self) {
        self.tsr = None;
        self.tmp = Scratch::default();
        self.tag_id = None;
    }

    pub fn is_empty(&self) -> bool {
        *self == SourceRecord::default()
    }
}

/// Pipeline-internal scratch space. Read from input, never written out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scratch {
    pub in_transclusion: bool,
    pub from_foster: bool,
    pub responsive: Option<String>,
}

/// Structured data for template/extension nodes, persisted as `data-mw`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallRecord(pub Map<String, Value>);

impl CallRecord {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn parts(&self) -> Option<&Vec<Value>> {
        self.0.get("parts").and_then(Value::as_array)
    }

    pub fn parts_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.0.get_mut("parts").and_then(Value::as_array_mut)
    }
}

#[derive(Clone, Debug, Default)]
struct NodeData {
    source: Option<SourceRecord>,
    call: Option<CallRecord>,
    diff: DiffMarks,
}

#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: HashMap<NodeId, NodeData>,
}

impl MetadataStore {
    pub fn source(&self, id: NodeId) -> Option<&SourceRecord> {
        self.entries.get(&id)?.source.as_ref()
    }

    pub fn source_mut(&mut self, id: NodeId) -> &mut SourceRecord {
        self.entries
            .entry(id)
            .or_default()
            .source
            .get_or_insert_with(SourceRecord::default)
    }

    pub fn set_source(&mut self, id: NodeId, record: SourceRecord) {
        self.entries.entry(id).or_default().source = Some(record);
    }

    pub fn take_source(&mut self, id: NodeId) -> Option<SourceRecord> {
        self.entries.get_mut(&id)?.source.take()
    }

    /// Structured data, treating an empty record as absent.
    pub fn call(&self, id: NodeId) -> Option<&CallRecord> {
        self.entries
            .get(&id)?
            .call
            .as_ref()
            .filter(|call| !call.is_empty())
    }

    pub fn call_mut(&mut self, id: NodeId) -> &mut CallRecord {
        self.entries
            .entry(id)
            .or_default()
            .call
            .get_or_insert_with(CallRecord::default)
    }

    pub fn set_call(&mut self, id: NodeId, record: CallRecord) {
        self.entries.entry(id).or_default().call = Some(record);
    }

    pub fn take_call(&mut self, id: NodeId) -> Option<CallRecord> {
        self.entries
            .get_mut(&id)?
            .call
            .take()
            .filter(|call| !call.is_empty())
    }

    pub fn diff(&self, id: NodeId) -> DiffMarks {
        self.entries.get(&id).map(|d| d.diff).unwrap_or_default()
    }

    pub fn mark(&mut self, id: NodeId, mark: DiffMark) {
        self.entries.entry(id).or_default().diff.insert(mark);
    }

    pub fn discard(&mut self, id: NodeId) {
        self.entries.remove(&id);
    }
}
