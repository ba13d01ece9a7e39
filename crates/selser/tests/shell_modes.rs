use core_types::DiffMark;
use dom::{Document, parse_fragment, to_html};
use normalize::NormalizeError;
use pollster::block_on;
use selser::{
    CachedDiff, DiffEngine, DiffSummary, EmitError, Emitter, FetchError, Mode, PriorRevision,
    PriorRevisionFetch, SelectiveSerializer, SelserConfig, SelserError, SerializeRequest,
};
use std::cell::Cell;

const PRIOR_SOURCE: &str = "== A ==\nfoo";

#[derive(Default)]
struct FakeDiff {
    changed: bool,
    calls: usize,
}

impl DiffEngine for FakeDiff {
    fn diff(&mut self, _prior: &PriorRevision, doc: &mut Document) -> DiffSummary {
        self.calls += 1;
        if self.changed {
            if let Some(first) = doc.first_child(doc.root()) {
                doc.mark(first, DiffMark::Modified);
            }
        }
        DiffSummary {
            is_empty: !self.changed,
        }
    }
}

#[derive(Default)]
struct RecordingEmitter {
    calls: Vec<bool>,
    fail: bool,
}

impl Emitter for RecordingEmitter {
    fn emit(&mut self, doc: &Document, selective: bool) -> Result<String, EmitError> {
        self.calls.push(selective);
        if self.fail {
            return Err(EmitError::new("no serializer for <blink>"));
        }
        let prefix = if selective { "sel" } else { "full" };
        Ok(format!("{prefix}:{}", to_html(doc, doc.root())))
    }
}

struct FakeFetch {
    source: Option<&'static str>,
    calls: Cell<usize>,
}

impl FakeFetch {
    fn serving(source: &'static str) -> Self {
        Self {
            source: Some(source),
            calls: Cell::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            source: None,
            calls: Cell::new(0),
        }
    }
}

impl PriorRevisionFetch for FakeFetch {
    async fn fetch(&self, _page: &str, _revision: &str) -> Result<PriorRevision, FetchError> {
        self.calls.set(self.calls.get() + 1);
        match self.source {
            Some(source) => Ok(PriorRevision::from_source(source)),
            None => Err(FetchError::Unavailable("timed out".into())),
        }
    }
}

type Shell = SelectiveSerializer<FakeDiff, RecordingEmitter, FakeFetch>;

fn shell(changed: bool, fetch: FakeFetch) -> Shell {
    SelectiveSerializer::new(
        SelserConfig::default(),
        FakeDiff {
            changed,
            calls: 0,
        },
        RecordingEmitter::default(),
        fetch,
    )
}

fn request(prior: Option<&str>, revision: Option<&str>) -> SerializeRequest {
    SerializeRequest {
        page: "Main".into(),
        revision_id: revision.map(str::to_string),
        prior: prior.map(PriorRevision::from_source),
        cached_diff: None,
    }
}

const QUOTES: &str = "<p><i>a</i><i>b</i></p>";

#[test]
fn an_unchanged_page_returns_the_prior_source_verbatim() {
    let mut shell = shell(false, FakeFetch::failing());
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(Some(PRIOR_SOURCE), None)))
        .expect("serializes");
    assert_eq!(outcome.mode, Mode::Unchanged);
    assert_eq!(outcome.text, PRIOR_SOURCE);
    assert!(shell.emitter().calls.is_empty());
    assert_eq!(shell.diff_engine().calls, 1);
    // No pass ran.
    assert_eq!(to_html(&doc, doc.root()), QUOTES);
}

#[test]
fn without_prior_source_the_page_is_regenerated() {
    let mut shell = shell(true, FakeFetch::failing());
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(None, None))).expect("serializes");
    assert_eq!(outcome.mode, Mode::Full);
    assert_eq!(outcome.text, "full:<p><i>ab</i></p>");
    assert_eq!(shell.emitter().calls, [false]);
    assert_eq!(shell.diff_engine().calls, 0);
}

#[test]
fn a_failed_fetch_downgrades_to_full_mode() {
    let mut shell = shell(true, FakeFetch::failing());
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(None, Some("41"))))
        .expect("fetch failures are not errors");
    assert_eq!(outcome.mode, Mode::Full);
    assert_eq!(shell.emitter().calls, [false]);
    assert_eq!(shell.diff_engine().calls, 0);
}

#[test]
fn fetched_prior_source_enables_selective_emission() {
    let fetch = FakeFetch::serving(PRIOR_SOURCE);
    let mut shell = shell(true, fetch);
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(None, Some("41"))))
        .expect("serializes");
    assert_eq!(outcome.mode, Mode::Selective);
    assert_eq!(outcome.text, "sel:<p><i>ab</i></p>");
    assert_eq!(shell.emitter().calls, [true]);
    let p = doc.first_child(doc.root()).expect("p");
    assert!(doc.diff_marks(p).contains(DiffMark::Modified));
}

#[test]
fn inline_prior_data_skips_the_fetch() {
    let mut shell = shell(false, FakeFetch::serving("other"));
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(Some(PRIOR_SOURCE), Some("41"))))
        .expect("serializes");
    assert_eq!(outcome.text, PRIOR_SOURCE);
}

#[test]
fn a_cached_diff_replaces_the_diff_engine() {
    let mut shell = shell(false, FakeFetch::failing());
    let mut doc = parse_fragment("<p>a</p><p>b</p>").expect("fixture");
    let second = doc
        .next_sibling(doc.first_child(doc.root()).expect("p"))
        .expect("p");
    let mut req = request(Some(PRIOR_SOURCE), None);
    req.cached_diff = Some(CachedDiff {
        marks: vec![(second, DiffMark::Inserted)],
    });
    let outcome = block_on(shell.serialize(&mut doc, &req)).expect("serializes");
    assert_eq!(outcome.mode, Mode::Selective);
    assert_eq!(shell.diff_engine().calls, 0);
    assert!(doc.diff_marks(second).contains(DiffMark::Inserted));
}

#[test]
fn full_mode_ignores_prior_source() {
    let mut shell = SelectiveSerializer::new(
        SelserConfig::full(),
        FakeDiff::default(),
        RecordingEmitter::default(),
        FakeFetch::serving(PRIOR_SOURCE),
    );
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let outcome = block_on(shell.serialize(&mut doc, &request(Some(PRIOR_SOURCE), Some("41"))))
        .expect("serializes");
    assert_eq!(outcome.mode, Mode::Full);
    assert_eq!(shell.diff_engine().calls, 0);
}

#[test]
fn emitter_failures_surface() {
    let mut shell = SelectiveSerializer::new(
        SelserConfig::default(),
        FakeDiff::default(),
        RecordingEmitter {
            calls: Vec::new(),
            fail: true,
        },
        FakeFetch::failing(),
    );
    let mut doc = parse_fragment(QUOTES).expect("fixture");
    let err = block_on(shell.serialize(&mut doc, &request(None, None))).expect_err("emit fails");
    assert!(matches!(err, SelserError::Emit(_)));
}

#[test]
fn normalization_failures_surface_before_emission() {
    let mut shell = shell(true, FakeFetch::failing());
    let mut doc =
        parse_fragment("<table typeof=\"mw:FosterBox\"></table><p>x</p>").expect("fixture");
    let err = block_on(shell.serialize(&mut doc, &request(None, None))).expect_err("bad foster");
    assert!(matches!(
        err,
        SelserError::Normalize(NormalizeError::FosterStructure { .. })
    ));
    assert!(shell.emitter().calls.is_empty());
}

#[test]
fn selective_runs_read_offsets_against_the_prior_source() {
    let prior = "* <li class=\"x\">foo</li>";
    let mut shell = shell(true, FakeFetch::failing());
    let mut doc = parse_fragment(
        "<ul data-parsoid='{\"dsr\":[0,24,0,0]}'><li data-parsoid='{\"dsr\":[0,2,1,0]}'></li>\
         <li class=\"x\" data-parsoid='{\"stx\":\"html\",\"dsr\":[2,24,14,5]}'>foo</li></ul>",
    )
    .expect("fixture");
    let outcome =
        block_on(shell.serialize(&mut doc, &request(Some(prior), None))).expect("serializes");
    assert_eq!(outcome.mode, Mode::Selective);
    let ul = doc.first_child(doc.root()).expect("ul");
    assert_eq!(doc.child_count(ul), 1);
}
