//! Benchmarks for odtei conversion performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks convert synthetic manuscripts with one apparatus entry
//! and one comment per paragraph.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const NS: &str = r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:dc="http://purl.org/dc/elements/1.1/""#;

/// Creates a content.xml part with the given number of annotated paragraphs.
fn create_manuscript(paragraphs: usize) -> String {
    let mut body = String::new();
    for i in 0..paragraphs {
        body.push_str(&format!(
            concat!(
                "<text:p>Pravda jest, že cnost",
                "<office:annotation><text:p text:style-name=\"Apparatus\">cnost] ctnost W, St</text:p></office:annotation>",
                " veliká jest &lt;PE_{}&gt; a labyrint světa",
                "<office:annotation><dc:creator>Editor</dc:creator><text:p text:style-name=\"Comment\">poznámka {}</text:p></office:annotation>",
                " trvá.</text:p>"
            ),
            i, i
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content {NS}><office:body><office:text>{body}</office:text></office:body></office:document-content>"#
    )
}

fn engine() -> odtei::Engine {
    let config = odtei::EngineConfig::default()
        .with_witness("W", "W")
        .with_witness("St", "St");
    odtei::Engine::new(config).unwrap()
}

/// Benchmark source detection.
fn bench_format_detection(c: &mut Criterion) {
    let xml = create_manuscript(1);

    c.bench_function("detect_content_xml", |b| {
        b.iter(|| odtei::detect_format_from_bytes(black_box(xml.as_bytes())).unwrap());
    });

    c.bench_function("detect_non_opendocument", |b| {
        b.iter(|| odtei::detect_format_from_bytes(black_box(b"<html/>")).is_err());
    });
}

/// Benchmark parsing alone at various sizes.
fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for paragraphs in [10, 100, 1000].iter() {
        let xml = create_manuscript(*paragraphs);

        group.bench_function(format!("{}_paragraphs", paragraphs), |b| {
            b.iter(|| odtei::parse_str(black_box(&xml)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the full pipeline at various sizes.
fn bench_conversion(c: &mut Criterion) {
    let engine = engine();
    let mut group = c.benchmark_group("conversion");

    for paragraphs in [10, 100, 1000].iter() {
        let xml = create_manuscript(*paragraphs);

        group.bench_function(format!("{}_paragraphs", paragraphs), |b| {
            b.iter(|| engine.convert_str(black_box(&xml)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark apparatus grammar parsing.
fn bench_apparatus_grammar(c: &mut Criterion) {
    let config = odtei::EngineConfig::default()
        .with_witness("W", "W")
        .with_witness("St", "St");
    let parser = odtei::annotate::ApparatusParser::new(&config).unwrap();

    c.bench_function("apparatus_entry", |b| {
        b.iter(|| parser.parse(black_box("12 Labyrint světa] Labyrinth W, St; om. B (srov. 3)")));
    });
}

criterion_group!(
    benches,
    bench_format_detection,
    bench_parsing,
    bench_conversion,
    bench_apparatus_grammar,
);
criterion_main!(benches);
