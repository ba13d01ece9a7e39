//! Pre-order tree walker with a per-tag handler registry.
//!
//! Contract:
//! - Handlers registered for a node's tag name, or for every tag, run in
//!   registration order.
//! - [`Step::Continue`] runs the next handler; once all have continued, the
//!   walker descends into the node's children and then moves to its next
//!   sibling.
//! - [`Step::ResumeAt`] stops handler dispatch for the node and resumes the
//!   walk at the given node, or ends the current sibling run on `None`.
//! - A handler error, or resuming at a node that is no longer in the
//!   document, is a contract violation: it is logged, recorded in the
//!   [`TraverseReport`], and only the offending node is abandoned.
//! - The encapsulation [`Scope`] opens at the first wrapper seen while no
//!   scope is active and closes after its `last` node, when a handler
//!   resumes past `last` at the run's level, or as soon as a handler sets
//!   `clear`.
use crate::scope::Scope;
use crate::{Document, DomError, NodeId, NodeKind};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    ResumeAt(Option<NodeId>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerError {
    Dom(DomError),
    Invariant(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Dom(err) => write!(f, "tree operation failed: {err}"),
            HandlerError::Invariant(msg) => write!(f, "invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Dom(err) => Some(err),
            HandlerError::Invariant(_) => None,
        }
    }
}

impl From<DomError> for HandlerError {
    fn from(err: DomError) -> Self {
        HandlerError::Dom(err)
    }
}

pub type HandlerResult = Result<Step, HandlerError>;

/// What a handler sees besides the tree and the node.
pub struct Visit<'v, C> {
    pub ctx: &'v mut C,
    pub at_top_level: bool,
    pub scope: Option<&'v mut Scope>,
}

type Handler<'h, C> =
    Box<dyn for<'v> FnMut(&mut Document, NodeId, &mut Visit<'v, C>) -> HandlerResult + 'h>;

struct Registration<'h, C> {
    tag: Option<String>,
    name: &'static str,
    handler: Handler<'h, C>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    HandlerFailed(HandlerError),
    ResumedAtDetachedNode(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraverseError {
    pub node: NodeId,
    pub handler: &'static str,
    pub kind: ViolationKind,
}

impl fmt::Display for TraverseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::HandlerFailed(err) => {
                write!(f, "handler `{}` failed on {}: {err}", self.handler, self.node)
            }
            ViolationKind::ResumedAtDetachedNode(target) => write!(
                f,
                "handler `{}` on {} resumed at detached node {target}",
                self.handler, self.node
            ),
        }
    }
}

impl std::error::Error for TraverseError {}

#[derive(Debug, Default)]
pub struct TraverseReport {
    pub violations: Vec<TraverseError>,
    /// Nodes a handler left detached while asking to continue.
    pub detached: Vec<(NodeId, &'static str)>,
}

impl TraverseReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.detached.is_empty()
    }
}

pub struct DomTraverser<'h, C> {
    handlers: Vec<Registration<'h, C>>,
    check_if_attached: bool,
}

impl<C> Default for DomTraverser<'_, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h, C> DomTraverser<'h, C> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            check_if_attached: false,
        }
    }

    /// Report nodes left detached by a handler that returned `Continue`.
    pub fn check_if_attached(mut self, enabled: bool) -> Self {
        self.check_if_attached = enabled;
        self
    }

    /// Registers `handler` for `tag`, or for every node when `tag` is `None`.
    pub fn add_handler<F>(&mut self, tag: Option<&str>, name: &'static str, handler: F)
    where
        F: for<'v> FnMut(&mut Document, NodeId, &mut Visit<'v, C>) -> HandlerResult + 'h,
    {
        self.handlers.push(Registration {
            tag: tag.map(str::to_ascii_lowercase),
            name,
            handler: Box::new(handler),
        });
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Walks `root` and its subtree. `root` itself is visited, its siblings
    /// are not.
    pub fn traverse(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        ctx: &mut C,
        at_top_level: bool,
    ) -> TraverseReport {
        let mut report = TraverseReport::default();
        let mut walk = Walk {
            ctx,
            at_top_level,
            report: &mut report,
        };
        self.walk(doc, root, None, true, &mut walk);
        report
    }

    /// Walks `start` and, unless `single`, its following siblings. Returns
    /// whether a handler cleared the `inherited` scope, which the caller
    /// then clears as well.
    fn walk(
        &mut self,
        doc: &mut Document,
        start: NodeId,
        inherited: Option<Scope>,
        single: bool,
        walk: &mut Walk<'_, C>,
    ) -> bool {
        // Whether `scope` is still the caller's.
        let mut shared = inherited.is_some();
        let mut cleared = false;
        let mut scope = inherited;
        let mut work = Some(start);
        while let Some(node) = work {
            if scope.is_none() && doc.is_element(node) {
                scope = Scope::open(doc, node);
                shared = false;
            }
            let next_before = doc.next_sibling(node);
            let step = self.dispatch(doc, node, &mut scope, walk);

            if scope.as_ref().is_some_and(|s| s.clear) {
                cleared |= shared;
                scope = None;
            }

            let next = match step {
                Step::Continue => {
                    let container = matches!(doc.kind(node), NodeKind::Element(_) | NodeKind::Document);
                    if container {
                        if let Some(child) = doc.first_child(node) {
                            if self.walk(doc, child, scope.clone(), false, walk) {
                                if let Some(s) = scope.as_mut() {
                                    s.clear = true;
                                    cleared |= shared;
                                }
                            }
                        }
                    }
                    doc.next_sibling(node)
                }
                Step::ResumeAt(target) => {
                    // Jumping past the end of the run at its own level, or removing
                    // its last node, closes it.
                    let past_run = match (scope.as_ref(), target) {
                        (Some(s), Some(t)) => {
                            doc.is_freed(s.last)
                                || (doc.parent(t) == doc.parent(s.last) && !reaches(doc, t, s.last))
                        }
                        _ => false,
                    };
                    if past_run {
                        scope = None;
                    }
                    target
                }
            };
            let next = match next {
                Some(n) if doc.is_freed(n) => next_before.filter(|n| !doc.is_freed(*n)),
                other => other,
            };

            if scope.as_ref().is_some_and(|s| s.last == node) {
                scope = None;
            }
            if single {
                break;
            }
            work = next;
        }
        cleared
    }

    fn dispatch(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        scope: &mut Option<Scope>,
        walk: &mut Walk<'_, C>,
    ) -> Step {
        let next_before = doc.next_sibling(node);
        for reg in &mut self.handlers {
            let applies = match &reg.tag {
                None => true,
                Some(tag) => doc.node_name(node) == Some(tag.as_str()),
            };
            if !applies {
                continue;
            }
            let result = {
                let mut visit = Visit {
                    ctx: &mut *walk.ctx,
                    at_top_level: walk.at_top_level,
                    scope: scope.as_mut(),
                };
                (reg.handler)(doc, node, &mut visit)
            };
            match result {
                Ok(Step::Continue) => {
                    if self.check_if_attached && !doc.is_attached(node) {
                        log::error!(
                            target: "dom.traverse",
                            "handler `{}` left {node} detached from the document",
                            reg.name
                        );
                        walk.report.detached.push((node, reg.name));
                    }
                }
                Ok(Step::ResumeAt(Some(target))) if !doc.is_attached(target) => {
                    let violation = TraverseError {
                        node,
                        handler: reg.name,
                        kind: ViolationKind::ResumedAtDetachedNode(target),
                    };
                    log::error!(target: "dom.traverse", "{violation}");
                    walk.report.violations.push(violation);
                    return Step::ResumeAt(next_before);
                }
                Ok(step @ Step::ResumeAt(_)) => return step,
                Err(err) => {
                    let violation = TraverseError {
                        node,
                        handler: reg.name,
                        kind: ViolationKind::HandlerFailed(err),
                    };
                    log::error!(target: "dom.traverse", "{violation}");
                    walk.report.violations.push(violation);
                    return Step::ResumeAt(next_before);
                }
            }
        }
        Step::Continue
    }
}

/// Whether walking forward from `node` over siblings reaches `last`.
fn reaches(doc: &Document, node: NodeId, last: NodeId) -> bool {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n == last {
            return true;
        }
        cur = doc.next_sibling(n);
    }
    false
}

struct Walk<'a, C> {
    ctx: &'a mut C,
    at_top_level: bool,
    report: &'a mut TraverseReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(doc: &mut Document) -> (NodeId, NodeId, NodeId, NodeId) {
        let root = doc.root();
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        let text = doc.create_text("x");
        let span = doc.create_element("span");
        doc.append_child(root, div).expect("append");
        doc.append_child(div, p).expect("append");
        doc.append_child(p, text).expect("append");
        doc.append_child(div, span).expect("append");
        (div, p, text, span)
    }

    #[test]
    fn visits_in_pre_order_with_tag_and_wildcard_handlers() {
        let mut doc = Document::new();
        let (div, p, text, span) = build(&mut doc);
        let mut seen: Vec<(NodeId, &str)> = Vec::new();
        let mut traverser = DomTraverser::new();
        traverser.add_handler(Some("P"), "p-only", |_, node, visit: &mut Visit<'_, Vec<(NodeId, &str)>>| {
            visit.ctx.push((node, "p"));
            Ok(Step::Continue)
        });
        traverser.add_handler(None, "all", |_, node, visit: &mut Visit<'_, Vec<(NodeId, &str)>>| {
            visit.ctx.push((node, "*"));
            Ok(Step::Continue)
        });
        assert_eq!(traverser.handler_count(), 2);
        let start = doc.root();
        let report = traverser.traverse(&mut doc, start, &mut seen, true);
        assert!(report.is_clean());
        let root = doc.root();
        assert_eq!(
            seen,
            [(root, "*"), (div, "*"), (p, "p"), (p, "*"), (text, "*"), (span, "*")]
        );
    }

    #[test]
    fn resume_at_skips_remaining_handlers_and_children() {
        let mut doc = Document::new();
        let (div, p, _text, span) = build(&mut doc);
        let mut seen = Vec::new();
        let mut traverser = DomTraverser::new();
        traverser.add_handler(Some("p"), "delete-p", |doc: &mut Document, node, _: &mut Visit<'_, Vec<NodeId>>| {
            let next = doc.next_sibling(node);
            doc.remove(node);
            Ok(Step::ResumeAt(next))
        });
        traverser.add_handler(None, "record", |_, node, visit: &mut Visit<'_, Vec<NodeId>>| {
            visit.ctx.push(node);
            Ok(Step::Continue)
        });
        let start = doc.root();
        let report = traverser.traverse(&mut doc, start, &mut seen, true);
        assert!(report.is_clean());
        assert_eq!(seen, [doc.root(), div, span]);
        assert!(doc.is_freed(p));
    }

    #[test]
    fn contract_violation_is_recorded_and_only_that_node_is_abandoned() {
        let mut doc = Document::new();
        let (div, p, _text, span) = build(&mut doc);
        let mut seen = Vec::new();
        let mut traverser = DomTraverser::new();
        traverser.add_handler(Some("p"), "bad", |_, _, _: &mut Visit<'_, Vec<NodeId>>| {
            Err(HandlerError::Invariant("boom".into()))
        });
        traverser.add_handler(None, "record", |_, node, visit: &mut Visit<'_, Vec<NodeId>>| {
            visit.ctx.push(node);
            Ok(Step::Continue)
        });
        let start = doc.root();
        let report = traverser.traverse(&mut doc, start, &mut seen, true);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].node, p);
        assert_eq!(report.violations[0].handler, "bad");
        assert_eq!(seen, [doc.root(), div, span]);
    }

    #[test]
    fn detached_node_is_reported_when_checking_is_enabled() {
        let mut doc = Document::new();
        let (_div, p, _text, _span) = build(&mut doc);
        let mut traverser = DomTraverser::new().check_if_attached(true);
        traverser.add_handler(Some("p"), "detacher", |doc: &mut Document, node, _: &mut Visit<'_, ()>| {
            doc.detach(node);
            Ok(Step::Continue)
        });
        let start = doc.root();
        let report = traverser.traverse(&mut doc, start, &mut (), true);
        assert!(report.violations.is_empty());
        assert_eq!(report.detached, [(p, "detacher")]);
    }

    #[test]
    fn scope_is_visible_until_its_last_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.create_element_with_attrs("p", &[("typeof", "mw:Transclusion"), ("about", "#mwt1")]);
        let second = doc.create_element_with_attrs("p", &[("about", "#mwt1")]);
        let inner = doc.create_element("b");
        let after = doc.create_element("p");
        for n in [first, second, after] {
            doc.append_child(root, n).expect("append");
        }
        doc.append_child(second, inner).expect("append inner");

        let mut seen: Vec<(NodeId, Option<NodeId>)> = Vec::new();
        let mut traverser = DomTraverser::new();
        traverser.add_handler(None, "scope", |_, node, visit: &mut Visit<'_, Vec<(NodeId, Option<NodeId>)>>| {
            let first = visit.scope.as_ref().map(|s| s.first);
            visit.ctx.push((node, first));
            Ok(Step::Continue)
        });
        traverser.traverse(&mut doc, root, &mut seen, true);
        assert_eq!(
            seen,
            [
                (root, None),
                (first, Some(first)),
                (second, Some(first)),
                (inner, Some(first)),
                (after, None)
            ]
        );
    }

    #[test]
    fn clear_ends_the_scope_immediately() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.create_element_with_attrs("p", &[("typeof", "mw:Transclusion"), ("about", "#mwt1")]);
        let second = doc.create_element_with_attrs("p", &[("about", "#mwt1")]);
        doc.append_child(root, first).expect("append");
        doc.append_child(root, second).expect("append");

        let mut seen: Vec<bool> = Vec::new();
        let mut traverser = DomTraverser::new();
        traverser.add_handler(Some("p"), "clear", |_, _, visit: &mut Visit<'_, Vec<bool>>| {
            visit.ctx.push(visit.scope.is_some());
            if let Some(scope) = visit.scope.as_mut() {
                scope.clear = true;
            }
            Ok(Step::Continue)
        });
        traverser.traverse(&mut doc, root, &mut seen, true);
        assert_eq!(seen, [true, false]);
    }
}
