use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dom::{WikitextClassifier, parse_fragment, to_html};
use normalize::{Cite, NormalizeConfig, PassContext, PassSuite};

const SMALL_BLOCKS: usize = 64;
const LARGE_BLOCKS: usize = 2_000;

// Each block exercises quote minimization, trailing newline migration and
// empty element marking.
fn make_blocks(n: usize) -> String {
    let mut out = String::with_capacity(n * 160);
    for i in 0..n {
        let start = i * 24;
        out.push_str(&format!(
            "<p data-parsoid='{{\"dsr\":[{start},{},0,0]}}'><i>a</i><b><i>x</i></b><b><i>y</i></b>\n</p>\
             <ul><li>item\n</li><li></li></ul>",
            start + 20
        ));
    }
    out
}

fn normalize(html: &str, suite: &PassSuite, config: &NormalizeConfig) -> usize {
    let mut doc = parse_fragment(html).expect("fixture parses");
    let root = doc.root();
    let mut cite = Cite::new(config.responsive_references);
    let mut ctx = PassContext::new(config, &WikitextClassifier, &mut cite);
    let report = suite
        .run(&mut doc, root, &mut ctx, true)
        .expect("suite runs");
    black_box(report);
    to_html(&doc, root).len()
}

fn bench_suite_small(c: &mut Criterion) {
    let input = make_blocks(SMALL_BLOCKS);
    let suite = PassSuite::new();
    let config = NormalizeConfig::default();
    c.bench_function("bench_suite_small", |b| {
        b.iter(|| black_box(normalize(black_box(&input), &suite, &config)));
    });
}

fn bench_suite_large(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    let suite = PassSuite::new();
    let config = NormalizeConfig::default();
    c.bench_function("bench_suite_large", |b| {
        b.iter_batched(
            || input.clone(),
            |html| black_box(normalize(&html, &suite, &config)),
            BatchSize::LargeInput,
        );
    });
}

fn bench_page_bundle_large(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    let suite = PassSuite::new();
    let config = NormalizeConfig {
        store_in_page_bundle: true,
        ..NormalizeConfig::default()
    };
    c.bench_function("bench_page_bundle_large", |b| {
        b.iter(|| black_box(normalize(&input, &suite, &config)));
    });
}

criterion_group!(
    benches,
    bench_suite_small,
    bench_suite_large,
    bench_page_bundle_large
);
criterion_main!(benches);
