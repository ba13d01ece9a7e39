use dom::scope::Scope;
use dom::{Document, NodeId, WikitextClassifier, parse_document, parse_fragment, to_html};
use dom_test_support::{assert_same_tree, load_fixture_file};
use normalize::{
    Cite, LintKind, NormalizeConfig, NormalizeError, Pass, PassContext, PassSuite, SuiteReport,
};
use std::path::PathBuf;

fn run_suite(
    doc: &mut Document,
    suite: &PassSuite,
    config: &NormalizeConfig,
    source: Option<&str>,
) -> Result<SuiteReport, NormalizeError> {
    let root = doc.root();
    let mut cite = Cite::new(config.responsive_references);
    let mut ctx = PassContext::new(config, &WikitextClassifier, &mut cite);
    ctx.source = source;
    suite.run(doc, root, &mut ctx, true)
}

fn normalize_html(html: &str, source: Option<&str>) -> String {
    let mut doc = parse_fragment(html).expect("fixture markup");
    run_suite(&mut doc, &PassSuite::new(), &NormalizeConfig::default(), source)
        .expect("suite runs");
    to_html(&doc, doc.root())
}

fn children(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.children(node).collect()
}

#[test]
fn normalizing_twice_changes_nothing() {
    let corpus = load_fixture_file(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pass_suite.toml"),
    );
    let mut inputs: Vec<(String, Option<String>)> = corpus
        .cases
        .iter()
        .map(|c| (c.input.clone(), c.source.clone()))
        .collect();
    inputs.push((
        "<p>a<span typeof=\"mw:Extension/ref/Marker\" data-parsoid='{\"name\":\"n\"}'>x</span>\
         <span typeof=\"mw:Extension/ref/Marker\" data-parsoid='{\"name\":\"n\"}'>x</span></p>"
            .to_string(),
        Some("a<ref name=n>x</ref><ref name=n>x</ref>".to_string()),
    ));
    inputs.push((
        "<div about=\"#mwt1\" typeof=\"mw:Transclusion\" data-mw='{\"parts\":[]}'><p>x</p></div>\
         <p about=\"#mwt1\"></p><p about=\"#mwt1\" data-parsoid='{\"stx\":\"html\"}'>y</p>"
            .to_string(),
        None,
    ));

    for (input, source) in &inputs {
        let once = normalize_html(input, source.as_deref());
        let twice = normalize_html(&once, source.as_deref());
        assert_same_tree(&once, &twice, input);
        assert_eq!(once, twice, "second run changed {input}");
    }
}

#[test]
fn migrated_newlines_conserve_total_width() {
    let html = "<ul data-parsoid='{\"dsr\":[0,8,0,0]}'>\
        <li data-parsoid='{\"dsr\":[0,5,1,0]}'>ab\n\n</li>\
        <li data-parsoid='{\"dsr\":[5,8,1,0]}'>cd</li></ul>";
    let width_sum = |doc: &Document| -> usize {
        let ul = doc.first_child(doc.root()).expect("ul");
        children(doc, ul)
            .into_iter()
            .filter_map(|n| doc.dsr(n).and_then(|d| d.width()))
            .sum()
    };
    let before = width_sum(&parse_document(html).expect("fixture"));
    let out = normalize_html(html, None);
    let after_doc = parse_document(&out).expect("output reparses");
    assert_eq!(before, width_sum(&after_doc));

    let ul = after_doc.first_child(after_doc.root()).expect("ul");
    let items: Vec<_> = children(&after_doc, ul)
        .into_iter()
        .filter(|n| after_doc.is_element(*n))
        .collect();
    let first = after_doc.dsr(items[0]).expect("first range");
    let second = after_doc.dsr(items[1]).expect("second range");
    assert_eq!((first.start, first.end), (Some(0), Some(3)));
    assert_eq!((second.start, second.end), (Some(3), Some(8)));
    assert_eq!(after_doc.text(after_doc.next_sibling(items[0]).expect("moved")), Some("\n\n"));
}

#[test]
fn fostered_content_stays_inside_its_transclusion() {
    let mut doc = parse_fragment(
        "<table typeof=\"mw:FosterBox\"></table>a\
         <b data-parsoid='{\"tmp\":{\"inTransclusion\":true}}'>t</b><div>blk</div>\
         <table><tbody><tr><td>x</td></tr></tbody></table>",
    )
    .expect("fixture");
    let suite = PassSuite::with_passes(&[Pass::MarkFostered]);
    run_suite(&mut doc, &suite, &NormalizeConfig::default(), None).expect("suite runs");

    let root = doc.root();
    let start = doc.first_child(root).expect("start marker");
    let scope = Scope::open(&doc, start).expect("start marker opens a scope");
    let about = scope.about.clone();
    let mut relocated = Vec::new();
    let mut cur = doc.next_sibling(start);
    let mut end = None;
    while let Some(n) = cur {
        if doc.attr(n, "about") == Some(about.as_str()) {
            end = Some(n);
            break;
        }
        relocated.push(n);
        cur = doc.next_sibling(n);
    }
    let end = end.expect("end marker reachable from the start marker");
    assert!(doc.has_type_of(end, "mw:Transclusion/End"));
    let names: Vec<_> = relocated.iter().map(|n| doc.node_name(*n)).collect();
    assert_eq!(names, [Some("p"), Some("div"), Some("table")]);
    assert!(relocated.iter().all(|n| doc.source(*n).is_some_and(|dp| dp.fostered)
        || doc.is_element_named(*n, "table")));
}

#[test]
fn zero_width_nodes_are_crossed_without_moving_text_past_wide_ones() {
    let wide = "<p data-parsoid='{\"dsr\":[0,9,0,0]}'>text\n\
        <span typeof=\"mw:Placeholder\" data-parsoid='{\"dsr\":[5,5,0,0]}'></span>\
        <span data-parsoid='{\"dsr\":[5,9,0,0]}'>wide</span></p>";
    let doc = parse_document(&normalize_html(wide, None)).expect("output reparses");
    let p = doc.first_child(doc.root()).expect("p");
    assert_eq!(doc.text_content(p), "text\nwide");
    assert!(doc.next_sibling(p).is_none());

    let crossing = "<p data-parsoid='{\"dsr\":[0,6,0,0]}'>text\n\
        <span typeof=\"mw:Placeholder\" data-parsoid='{\"dsr\":[6,6,0,0]}'></span></p>";
    let doc = parse_document(&normalize_html(crossing, None)).expect("output reparses");
    let p = doc.first_child(doc.root()).expect("p");
    assert_eq!(doc.text_content(p), "text");
    assert_eq!(doc.text(doc.next_sibling(p).expect("moved newline")), Some("\n"));
    let marker = doc.last_child(p).expect("marker");
    assert!(doc.is_element_named(marker, "span"));
    let dsr = doc.dsr(marker).expect("marker range");
    assert_eq!((dsr.start, dsr.end), (Some(5), Some(5)));
    assert_eq!(doc.dsr(p).and_then(|d| d.end), Some(5));
}

#[test]
fn ignored_table_attributes_report_once_per_row() {
    let config = NormalizeConfig {
        lint_ignored_table_attrs: true,
        ..NormalizeConfig::default()
    };
    let mut doc = parse_fragment(
        "<table><tbody>\
         <tr data-parsoid='{\"sa\":{\"foo\":\"1\",\"bar\":\"2\"},\"dsr\":[2,12,null,null]}'><td>a</td></tr>\
         <tr data-parsoid='{\"sa\":{\"<!--c-->\":\"\"},\"dsr\":[13,20,null,null]}'><td>b</td></tr>\
         </tbody></table>",
    )
    .expect("fixture");
    let report = run_suite(&mut doc, &PassSuite::new(), &config, None).expect("suite runs");
    assert_eq!(report.lints.len(), 1);
    assert_eq!(report.lints[0].kind, LintKind::IgnoredTableAttr);
    assert_eq!(report.lints[0].dsr.and_then(|d| d.start), Some(2));
    assert!(!report.lints[0].in_transclusion);
}
