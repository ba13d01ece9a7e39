//! Moving node metadata between the store and the tree.
//!
//! Inline storage writes `data-parsoid` and `data-mw` attributes. Page
//! bundle storage gives every element carrying data an `id` and collects the
//! records in a [`PageBundle`] keyed by that id.
use crate::store::{CallRecord, SourceRecord};
use crate::{Document, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DATA_PARSOID: &str = "data-parsoid";
pub const DATA_MW: &str = "data-mw";

#[derive(Debug)]
pub enum PersistError {
    InvalidAttribute {
        node: NodeId,
        attr: &'static str,
        source: serde_json::Error,
    },
    Encode(serde_json::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::InvalidAttribute { node, attr, source } => {
                write!(f, "invalid {attr} on {node}: {source}")
            }
            PersistError::Encode(err) => write!(f, "failed to encode node data: {err}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::InvalidAttribute { source, .. } => Some(source),
            PersistError::Encode(err) => Some(err),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Drop source records instead of writing them.
    pub discard_data_parsoid: bool,
    /// Collect records into a [`PageBundle`] instead of inline attributes.
    pub page_bundle: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(default)]
    pub ids: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBundle {
    pub parsoid: BundleSection,
    #[serde(default)]
    pub mw: BundleSection,
}

impl PageBundle {
    pub fn new() -> Self {
        Self {
            parsoid: BundleSection {
                counter: Some(0),
                ids: Map::new(),
            },
            mw: BundleSection::default(),
        }
    }

    fn next_id(&mut self, doc: &Document) -> String {
        loop {
            let n = self.parsoid.counter.unwrap_or(0);
            self.parsoid.counter = Some(n + 1);
            let id = format!("mw{}", to_base36(n));
            if !id_in_use(doc, &id) {
                return id;
            }
        }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn id_in_use(doc: &Document, id: &str) -> bool {
    let root = doc.root();
    doc.descendants(root)
        .into_iter()
        .any(|n| doc.attr(n, "id") == Some(id))
}

/// Moves inline data attributes below `root` (inclusive) into the store.
pub fn load_data_attribs(doc: &mut Document, root: NodeId) -> Result<(), PersistError> {
    for node in doc.descendants(root) {
        if !doc.is_element(node) {
            continue;
        }
        if let Some(raw) = doc.remove_attr(node, DATA_PARSOID) {
            let record: SourceRecord =
                serde_json::from_str(&raw).map_err(|source| PersistError::InvalidAttribute {
                    node,
                    attr: DATA_PARSOID,
                    source,
                })?;
            doc.store_mut().set_source(node, record);
        }
        if let Some(raw) = doc.remove_attr(node, DATA_MW) {
            let record: CallRecord =
                serde_json::from_str(&raw).map_err(|source| PersistError::InvalidAttribute {
                    node,
                    attr: DATA_MW,
                    source,
                })?;
            doc.store_mut().set_call(node, record);
        }
        if let Some(about) = doc.attr(node, "about").map(str::to_string) {
            doc.reserve_about_id(&about);
        }
    }
    Ok(())
}

/// Loads records from a page bundle onto the elements whose `id` they name.
pub fn load_page_bundle(
    doc: &mut Document,
    root: NodeId,
    bundle: &PageBundle,
) -> Result<(), PersistError> {
    for node in doc.descendants(root) {
        let Some(id) = doc.attr(node, "id").map(str::to_string) else {
            continue;
        };
        if let Some(value) = bundle.parsoid.ids.get(&id) {
            let record: SourceRecord = serde_json::from_value(value.clone()).map_err(|source| {
                PersistError::InvalidAttribute {
                    node,
                    attr: DATA_PARSOID,
                    source,
                }
            })?;
            doc.store_mut().set_source(node, record);
        }
        if let Some(value) = bundle.mw.ids.get(&id) {
            let record: CallRecord = serde_json::from_value(value.clone()).map_err(|source| {
                PersistError::InvalidAttribute {
                    node,
                    attr: DATA_MW,
                    source,
                }
            })?;
            doc.store_mut().set_call(node, record);
        }
    }
    Ok(())
}

fn encoded_source(record: &SourceRecord) -> Result<Option<Value>, PersistError> {
    let value = serde_json::to_value(record).map_err(PersistError::Encode)?;
    Ok(match &value {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(value),
    })
}

/// Writes one node's records out of the store.
///
/// With `bundle` set the records go into the bundle; otherwise they become
/// inline attributes.
pub fn store_node_data(
    doc: &mut Document,
    node: NodeId,
    options: StoreOptions,
    bundle: Option<&mut PageBundle>,
) -> Result<(), PersistError> {
    if !doc.is_element(node) {
        return Ok(());
    }
    let source = doc.store_mut().take_source(node);
    let call = doc.store_mut().take_call(node).filter(|c| !c.is_empty());
    let source = match source {
        Some(record) if !options.discard_data_parsoid => encoded_source(&record)?,
        _ => None,
    };
    let call = match call {
        Some(record) => Some(serde_json::to_value(&record).map_err(PersistError::Encode)?),
        None => None,
    };
    if source.is_none() && call.is_none() {
        return Ok(());
    }

    match bundle {
        Some(bundle) => {
            let id = match doc.attr(node, "id") {
                Some(id) => id.to_string(),
                None => {
                    let id = bundle.next_id(doc);
                    doc.set_attr(node, "id", id.clone());
                    id
                }
            };
            if let Some(value) = source {
                bundle.parsoid.ids.insert(id.clone(), value);
            }
            if let Some(value) = call {
                bundle.mw.ids.insert(id, value);
            }
        }
        None => {
            if let Some(value) = source {
                doc.set_attr(node, DATA_PARSOID, value.to_string());
            }
            if let Some(value) = call {
                doc.set_attr(node, DATA_MW, value.to_string());
            }
        }
    }
    Ok(())
}

/// Writes the records of every element below `root` (inclusive). Returns the
/// bundle when page bundle storage was requested.
pub fn store_data_attribs(
    doc: &mut Document,
    root: NodeId,
    options: StoreOptions,
) -> Result<Option<PageBundle>, PersistError> {
    let mut bundle = options.page_bundle.then(PageBundle::new);
    for node in doc.descendants(root) {
        store_node_data(doc, node, options, bundle.as_mut())?;
    }
    Ok(bundle)
}
