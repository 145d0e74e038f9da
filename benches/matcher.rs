use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Once;
use wikilens_rs::{LookupConfig, SlugMatcher, apply_highlight, parse_markup};

const ARTICLE: &str = concat!(
    "<article><h1>Linear Algebra</h1><h2>Maps</h2>",
    "<p>A linear transformation between vector spaces is represented by a matrix ",
    "once bases are fixed. Composition of maps becomes matrix multiplication.</p>",
    "<p>Every <em>square <b>matrix</b></em> with nonzero determinant is invertible.</p>",
    "</article>"
);

fn ensure_loaded() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        // Force the lazy catalog and synonym tables so benches measure queries only.
        let _ = SlugMatcher::builtin().match_word("vectors");
    });
}

fn bench_match_word(c: &mut Criterion) {
    ensure_loaded();
    let matcher = SlugMatcher::builtin();
    const WORDS: &[&str] = &["vectors", "functions", "matrix", "set", "xyzzy"];
    for &word in WORDS {
        c.bench_with_input(BenchmarkId::new("match_word", word), &word, |b, &word| {
            b.iter(|| black_box(matcher.match_word(word).len()));
        });
    }
}

fn bench_inline_matches(c: &mut Criterion) {
    ensure_loaded();
    let matcher = SlugMatcher::builtin();
    const CASES: &[(&str, &str)] = &[
        ("short", "linear transformation matrix"),
        (
            "paragraph",
            "Composition of linear maps becomes matrix multiplication over fields, \
             and recursion over trees mirrors graphs of function calls.",
        ),
    ];
    for &(label, text) in CASES {
        c.bench_with_input(BenchmarkId::new("inline_matches", label), &text, |b, &text| {
            b.iter(|| {
                let per_word = matcher.find_inline_matches(text);
                let whole = matcher.whole_selection_matches(text, &per_word);
                black_box((per_word.len(), whole.len()));
            });
        });
    }
}

fn bench_highlight_cycle(c: &mut Criterion) {
    ensure_loaded();
    let matcher = SlugMatcher::builtin();
    let config = LookupConfig::default();
    const SELECTIONS: &[(&str, &str)] = &[
        ("surround", "linear transformation between vector spaces"),
        ("single_word", "invertible"),
        ("cross_element", "multiplication.Every square matr"),
    ];
    for &(label, needle) in SELECTIONS {
        c.bench_with_input(
            BenchmarkId::new("highlight_apply_release", label),
            &needle,
            |b, &needle| {
                let mut doc = parse_markup(ARTICLE).expect("bench article parses");
                b.iter(|| {
                    let range = doc.find_text(doc.root(), needle).expect("needle present");
                    doc.set_selection(Some(range)).expect("valid selection");
                    let handle = apply_highlight(&mut doc, &matcher, &config).expect("highlighted");
                    black_box(handle.annotations().len());
                    handle.release(&mut doc);
                });
            },
        );
    }
}

criterion_group!(
    benches,
    bench_match_word,
    bench_inline_matches,
    bench_highlight_cycle
);
criterion_main!(benches);
