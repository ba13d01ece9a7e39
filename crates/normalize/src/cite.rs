//! Citation state: numbering `<ref>`s and rendering `<references>` lists.
//!
//! Refs arrive as marker elements (`typeof="mw:Extension/ref/Marker"`) whose
//! children are the note body. Extraction replaces each marker with the
//! inline citation link and keeps the body until a references container for
//! the same group renders it. State is ordered and spans the whole document,
//! so one [`Cite`] serves exactly one top-level run.
use crate::config::ResponsiveReferences;
use dom::persist::{StoreOptions, store_node_data};
use dom::scope::find_first_encapsulation_wrapper;
use dom::traverse::HandlerError;
use dom::{CallRecord, Document, Dsr, NodeId, SourceRecord, inner_html, to_html};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

pub const REF_MARKER_TYPE: &str = "mw:Extension/ref/Marker";
pub const REF_TYPE: &str = "mw:Extension/ref";
pub const REFERENCES_TYPE: &str = "mw:Extension/references";

pub fn is_ref_marker(doc: &Document, node: NodeId) -> bool {
    doc.has_type_of(node, REF_MARKER_TYPE)
}

pub fn is_references_container(doc: &Document, node: NodeId) -> bool {
    doc.has_type_of(node, REFERENCES_TYPE)
}

/// The citation collaborator the reference pass drives.
pub trait CitationState {
    /// Replaces a ref marker with its inline citation link and returns the
    /// replacement.
    fn extract_ref_from_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
    ) -> Result<NodeId, HandlerError>;

    /// Extracts refs nested in a references container, then fills it with
    /// the notes collected for its group. Returns the node now standing where
    /// the container stood (a responsive wrapper, or the container itself).
    fn insert_references_into_dom(
        &mut self,
        doc: &mut Document,
        node: NodeId,
    ) -> Result<NodeId, HandlerError>;

    /// Appends a generated list to `root` for every group no container
    /// claimed. `source_len` anchors their zero-width ranges.
    fn insert_missing_references_into_dom(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        source_len: usize,
    ) -> Result<(), HandlerError>;
}

#[derive(Debug)]
struct Ref {
    /// Detached holder of the first body seen for this ref.
    content: Option<NodeId>,
    group: String,
    group_index: usize,
    key: String,
    id: String,
    linkbacks: Vec<String>,
    name: Option<String>,
    target: String,
    has_multiples: bool,
    cached_html: String,
}

#[derive(Debug, Default)]
struct RefGroup {
    name: String,
    refs: Vec<Ref>,
    index_by_name: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct ReferencesData {
    index: usize,
    groups: Vec<RefGroup>,
}

/// `name="a b"` and `name="a_b"` identify the same note.
fn make_valid_id_attr(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

impl ReferencesData {
    fn group_position(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    fn group_refs(&self, name: &str) -> usize {
        self.group_position(name)
            .map_or(0, |at| self.groups[at].refs.len())
    }

    fn remove_group(&mut self, name: &str) -> Option<RefGroup> {
        let at = self.group_position(name)?;
        Some(self.groups.remove(at))
    }

    /// Registers one use of a ref and returns `(group, ref)` positions.
    fn add(
        &mut self,
        doc: &Document,
        group_name: &str,
        ref_name: Option<&str>,
        skip_linkback: bool,
    ) -> (usize, usize) {
        let group_at = match self.group_position(group_name) {
            Some(at) => at,
            None => {
                self.groups.push(RefGroup {
                    name: group_name.to_string(),
                    ..RefGroup::default()
                });
                self.groups.len() - 1
            }
        };
        let ref_name = ref_name
            .map(make_valid_id_attr)
            .filter(|name| !name.is_empty());

        let existing = ref_name
            .as_ref()
            .and_then(|name| self.groups[group_at].index_by_name.get(name).copied());
        let ref_at = match existing {
            Some(at) => {
                let entry = &mut self.groups[group_at].refs[at];
                if let Some(content) = entry.content {
                    entry.has_multiples = true;
                    entry.cached_html = inner_html(doc, content);
                }
                at
            }
            None => {
                let n = self.index;
                self.index += 1;
                let ref_key = (n + 1).to_string();
                let (key, target) = match &ref_name {
                    Some(name) => (
                        format!("cite_ref-{name}_{ref_key}"),
                        format!("cite_note-{name}-{ref_key}"),
                    ),
                    None => (format!("cite_ref-{ref_key}"), format!("cite_note-{ref_key}")),
                };
                let group = &mut self.groups[group_at];
                let id = if ref_name.is_some() {
                    format!("{key}-0")
                } else {
                    key.clone()
                };
                group.refs.push(Ref {
                    content: None,
                    group: group.name.clone(),
                    group_index: group.refs.len() + 1,
                    key,
                    id,
                    linkbacks: Vec::new(),
                    name: ref_name.clone(),
                    target,
                    has_multiples: false,
                    cached_html: String::new(),
                });
                let at = group.refs.len() - 1;
                if let Some(name) = ref_name {
                    group.index_by_name.insert(name, at);
                }
                at
            }
        };

        if !skip_linkback {
            let entry = &mut self.groups[group_at].refs[ref_at];
            let linkback = format!("{}-{}", entry.key, entry.linkbacks.len());
            entry.linkbacks.push(linkback);
        }
        (group_at, ref_at)
    }
}

/// Where a ref nested in a references container reports to.
struct NestedRefs<'a> {
    group: Option<String>,
    html: &'a mut Vec<String>,
}

#[derive(Debug, Default)]
pub struct Cite {
    data: ReferencesData,
    responsive: ResponsiveReferences,
}

impl Cite {
    pub fn new(responsive: ResponsiveReferences) -> Self {
        Self {
            data: ReferencesData::default(),
            responsive,
        }
    }

    /// Number of notes still waiting for a container, over all groups.
    pub fn pending_refs(&self) -> usize {
        self.data.groups.iter().map(|g| g.refs.len()).sum()
    }

    fn extract(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        nested: Option<&mut NestedRefs<'_>>,
    ) -> Result<Option<NodeId>, HandlerError> {
        let dp = doc.source(node).cloned().unwrap_or_default();
        let group = dp
            .group
            .clone()
            .or_else(|| nested.as_ref().and_then(|n| n.group.clone()))
            .unwrap_or_default();
        let about = doc.attr(node, "about").map(str::to_string);
        let (group_at, ref_at) =
            self.data
                .add(doc, &group, dp.name.as_deref(), nested.is_some());

        let content = if doc.has_children(node) {
            let holder = doc.create_element("div");
            doc.migrate_children(node, holder, None)?;
            self.process_refs(doc, holder)?;
            Some(holder)
        } else {
            None
        };

        let body = match content {
            Some(holder) => {
                let entry = &self.data.groups[group_at].refs[ref_at];
                let html = if entry.has_multiples {
                    Some(inner_html(doc, holder))
                } else {
                    None
                };
                match html {
                    Some(html) if html != entry.cached_html => Some(json!({ "html": html })),
                    _ => Some(json!({ "id": format!("mw-reference-text-{}", entry.target) })),
                }
            }
            None => None,
        };

        let call = match doc.call(node) {
            Some(existing) => existing.clone(),
            None => {
                let mut attrs = Map::new();
                if let Some(group) = &dp.group {
                    attrs.insert("group".into(), Value::from(group.clone()));
                }
                if let Some(name) = &self.data.groups[group_at].refs[ref_at].name {
                    attrs.insert("name".into(), Value::from(name.clone()));
                }
                let mut map = Map::new();
                map.insert("name".into(), Value::from("ref"));
                if let Some(body) = body {
                    map.insert("body".into(), body);
                }
                map.insert("attrs".into(), Value::Object(attrs));
                CallRecord(map)
            }
        };

        let entry = &self.data.groups[group_at].refs[ref_at];
        let span = doc.create_element("span");
        if let Some(about) = &about {
            doc.set_attr(span, "about", about.clone());
        }
        doc.set_attr(span, "class", "mw-ref");
        if nested.is_none() {
            let id = match (&entry.name, entry.linkbacks.last()) {
                (Some(_), Some(last)) => last.clone(),
                _ => entry.id.clone(),
            };
            doc.set_attr(span, "id", id);
        }
        doc.set_attr(span, "rel", "dc:references");
        let remaining_types: Vec<&str> = doc
            .attr(node, "typeof")
            .unwrap_or_default()
            .split_ascii_whitespace()
            .filter(|t| *t != REF_MARKER_TYPE)
            .collect();
        doc.set_attr(span, "typeof", remaining_types.join(" "));
        doc.add_type_of(span, REF_TYPE);
        doc.store_mut().set_source(
            span,
            SourceRecord {
                src: dp.src.clone(),
                dsr: dp.dsr,
                ..SourceRecord::default()
            },
        );
        doc.store_mut().set_call(span, call);

        let link = doc.create_element("a");
        doc.set_attr(link, "href", format!("#{}", entry.target));
        doc.set_attr(
            link,
            "style",
            format!("counter-reset: mw-Ref {};", entry.group_index),
        );
        if !entry.group.is_empty() {
            doc.set_attr(link, "data-mw-group", entry.group.clone());
        }
        let link_text = doc.create_element_with_attrs("span", &[("class", "mw-reflink-text")]);
        let label = if entry.group.is_empty() {
            format!("[{}]", entry.group_index)
        } else {
            format!("[{} {}]", entry.group, entry.group_index)
        };
        let label = doc.create_text(label);
        doc.append_child(link_text, label)?;
        doc.append_child(link, link_text)?;
        doc.append_child(span, link)?;

        let entry = &mut self.data.groups[group_at].refs[ref_at];
        match content {
            Some(holder) if entry.content.is_none() => entry.content = Some(holder),
            Some(holder) => doc.remove(holder),
            None => {}
        }

        match nested {
            None => {
                doc.replace(node, span)?;
                Ok(Some(span))
            }
            Some(nested) => {
                // The marker itself goes away when its container is re-rendered.
                for n in doc.descendants(span) {
                    store_node_data(doc, n, StoreOptions::default(), None)
                        .map_err(|err| HandlerError::Invariant(err.to_string()))?;
                }
                nested.html.push(to_html(doc, span));
                nested.html.push("\n".to_string());
                doc.remove(span);
                Ok(None)
            }
        }
    }

    /// Extracts every ref below `node`, rendering nested containers.
    fn process_refs(&mut self, doc: &mut Document, node: NodeId) -> Result<(), HandlerError> {
        let mut child = doc.first_child(node);
        while let Some(c) = child {
            let next = doc.next_sibling(c);
            if doc.is_element(c) {
                if is_ref_marker(doc, c) {
                    self.extract(doc, c, None)?;
                } else if is_references_container(doc, c) {
                    self.insert_references_into_dom(doc, c)?;
                } else if doc.has_children(c) {
                    self.process_refs(doc, c)?;
                }
            }
            child = next;
        }
        Ok(())
    }

    fn process_refs_in_references(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        nested: &mut NestedRefs<'_>,
    ) -> Result<(), HandlerError> {
        let mut child = doc.first_child(node);
        while let Some(c) = child {
            let next = doc.next_sibling(c);
            if doc.is_element(c) {
                if is_ref_marker(doc, c) {
                    self.extract(doc, c, Some(&mut *nested))?;
                } else if doc.has_children(c) {
                    self.process_refs_in_references(doc, c, nested)?;
                }
            }
            child = next;
        }
        Ok(())
    }

    fn render_references(
        &mut self,
        doc: &mut Document,
        refs_node: NodeId,
        nested_html: &[String],
        auto_generated: bool,
    ) -> Result<NodeId, HandlerError> {
        let dp = doc.source(refs_node).cloned().unwrap_or_default();
        let group = dp.group.clone().unwrap_or_default();

        if doc.call(refs_node).is_some() && self.data.group_refs(&group) == 0 {
            // Already rendered by an earlier run; nothing new to add.
            return Ok(refs_node);
        }

        if doc.call(refs_node).is_none() {
            let mut attrs = Map::new();
            if !group.is_empty() {
                attrs.insert("group".into(), Value::from(group.clone()));
            }
            if let Some(responsive) = &dp.tmp.responsive {
                attrs.insert("responsive".into(), Value::from(responsive.clone()));
            }
            let mut map = Map::new();
            map.insert("name".into(), Value::from("references"));
            map.insert("attrs".into(), Value::Object(attrs));
            if auto_generated {
                map.insert("autoGenerated".into(), Value::Bool(true));
            } else if !nested_html.is_empty() {
                let html = format!("\n{}", nested_html.concat());
                map.insert("body".into(), json!({ "html": html }));
            }
            doc.store_mut().set_call(refs_node, CallRecord(map));
        }

        while let Some(child) = doc.first_child(refs_node) {
            doc.remove(child);
        }

        let group_data = self.data.remove_group(&group);
        let rendered = group_data.as_ref().map_or(0, |g| g.refs.len());
        if let Some(group_data) = group_data {
            for entry in &group_data.refs {
                render_line(doc, refs_node, entry)?;
            }
        }

        let wrap = match &dp.tmp.responsive {
            Some(flag) => flag != "0",
            None => self.responsive.enabled,
        };
        if !wrap {
            return Ok(refs_node);
        }
        let div = doc.create_element("div");
        doc.add_class(div, "mw-references-wrap");
        if rendered > self.responsive.threshold {
            doc.add_class(div, "mw-references-columns");
        }
        if let Some(first) = find_first_encapsulation_wrapper(doc, refs_node) {
            if first != refs_node {
                let about = doc.new_about_id();
                doc.set_attr(refs_node, "about", about);
                if let Some(first_about) = doc.attr(first, "about").map(str::to_string) {
                    doc.set_attr(div, "about", first_about);
                }
            }
        }
        let parent = doc
            .parent(refs_node)
            .ok_or(dom::DomError::Detached(refs_node))?;
        doc.insert_before(parent, div, Some(refs_node))?;
        doc.append_child(div, refs_node)?;
        Ok(div)
    }
}

fn render_line(doc: &mut Document, refs_list: NodeId, entry: &Ref) -> Result<(), HandlerError> {
    let li = doc.create_element("li");
    doc.set_attr(li, "about", format!("#{}", entry.target));
    doc.set_attr(li, "id", entry.target.clone());

    let text_span = doc.create_element("span");
    doc.set_attr(text_span, "id", format!("mw-reference-text-{}", entry.target));
    doc.set_attr(text_span, "class", "mw-reference-text");
    if let Some(content) = entry.content {
        doc.migrate_children(content, text_span, None)?;
        doc.remove(content);
    }

    let backlinks = if entry.linkbacks.len() == 1 {
        let link = linkback(doc, &entry.id, &entry.group, "↑")?;
        doc.set_attr(link, "rel", "mw:referencedBy");
        link
    } else {
        let span = doc.create_element_with_attrs("span", &[("rel", "mw:referencedBy")]);
        for (i, lb) in entry.linkbacks.iter().enumerate() {
            let link = linkback(doc, lb, &entry.group, &(i + 1).to_string())?;
            doc.append_child(span, link)?;
        }
        span
    };
    let space = doc.create_text(" ");
    doc.append_child(li, backlinks)?;
    doc.append_child(li, space)?;
    doc.append_child(li, text_span)?;
    doc.append_child(refs_list, li)?;
    Ok(())
}

fn linkback(doc: &mut Document, href: &str, group: &str, text: &str) -> Result<NodeId, HandlerError> {
    let a = doc.create_element("a");
    doc.set_attr(a, "href", format!("#{href}"));
    if !group.is_empty() {
        doc.set_attr(a, "data-mw-group", group.to_string());
    }
    let span = doc.create_element_with_attrs("span", &[("class", "mw-linkback-text")]);
    let label = doc.create_text(format!("{text} "));
    doc.append_child(span, label)?;
    doc.append_child(a, span)?;
    Ok(a)
}

impl CitationState for Cite {
    fn extract_ref_from_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
    ) -> Result<NodeId, HandlerError> {
        self.extract(doc, node, None)?
            .ok_or_else(|| HandlerError::Invariant("top-level ref produced no citation".into()))
    }

    fn insert_references_into_dom(
        &mut self,
        doc: &mut Document,
        node: NodeId,
    ) -> Result<NodeId, HandlerError> {
        let mut html = Vec::new();
        let group = doc.source(node).and_then(|dp| dp.group.clone());
        let mut nested = NestedRefs {
            group,
            html: &mut html,
        };
        self.process_refs_in_references(doc, node, &mut nested)?;
        self.render_references(doc, node, &html, false)
    }

    fn insert_missing_references_into_dom(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        source_len: usize,
    ) -> Result<(), HandlerError> {
        while let Some(group) = self.data.groups.first().map(|g| g.name.clone()) {
            let ol = doc.create_element("ol");
            doc.set_attr(ol, "class", "mw-references references");
            doc.set_attr(ol, "typeof", REFERENCES_TYPE);
            let about = doc.new_about_id();
            doc.set_attr(ol, "about", about);
            let record = doc.source_mut(ol);
            record.dsr = Some(Dsr::new(source_len, source_len, 0, 0));
            if !group.is_empty() {
                record.group = Some(group.clone());
                doc.set_attr(ol, "data-mw-group", group.clone());
            }
            let newline = doc.create_text("\n");
            doc.append_child(root, newline)?;
            doc.append_child(root, ol)?;
            log::debug!(target: "normalize.refs", "generated references list for group {group:?}");
            self.render_references(doc, ol, &[], true)?;
        }
        Ok(())
    }
}
