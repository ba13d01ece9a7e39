use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dom::traverse::{DomTraverser, Step, Visit};
use dom::{Document, parse_document, to_html};

const SMALL_BLOCKS: usize = 64;
const LARGE_BLOCKS: usize = 5_000;

fn make_blocks(n: usize) -> String {
    let mut out = String::with_capacity(n * 96);
    for i in 0..n {
        let start = i * 20;
        out.push_str(&format!(
            "<p data-parsoid='{{\"dsr\":[{start},{},0,0]}}'>para <i>x</i><i>y</i></p>\n",
            start + 19
        ));
    }
    out
}

fn count_elements(doc: &mut Document) -> usize {
    let mut count = 0usize;
    let mut traverser = DomTraverser::new();
    traverser.add_handler(None, "count", |doc: &mut Document, node, visit: &mut Visit<'_, usize>| {
        if doc.is_element(node) {
            *visit.ctx += 1;
        }
        Ok(Step::Continue)
    });
    let root = doc.root();
    traverser.traverse(doc, root, &mut count, true);
    count
}

fn bench_parse_small(c: &mut Criterion) {
    let input = make_blocks(SMALL_BLOCKS);
    c.bench_function("bench_parse_small", |b| {
        b.iter(|| {
            let doc = parse_document(black_box(&input)).expect("fixture parses");
            black_box(doc);
        });
    });
}

fn bench_traverse_large(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    c.bench_function("bench_traverse_large", |b| {
        b.iter_batched(
            || parse_document(&input).expect("fixture parses"),
            |mut doc| black_box(count_elements(&mut doc)),
            BatchSize::LargeInput,
        );
    });
}

fn bench_write_large(c: &mut Criterion) {
    let input = make_blocks(LARGE_BLOCKS);
    let doc = parse_document(&input).expect("fixture parses");
    c.bench_function("bench_write_large", |b| {
        b.iter(|| black_box(to_html(&doc, doc.root()).len()));
    });
}

criterion_group!(benches, bench_parse_small, bench_traverse_large, bench_write_large);
criterion_main!(benches);
