//! Benchmarks for tokenization and object parsing.
//!
//! Benchmark groups:
//! - `lexer_tokenize`: raw `Lexer::next_token` throughput on mixed input
//! - `lexer_token_types`: isolated numbers, names and strings
//! - `parser_objects`: `Parser::next_object` over dictionaries with references

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use carousel_core::pdfparser::Parser;
use carousel_core::psparser::Lexer;

// =============================================================================
// Data Generation
// =============================================================================

/// Tokens shaped like object bodies: numbers, names, references, strings.
fn generate_mixed_tokens(n: usize) -> Vec<u8> {
    let templates: &[&[u8]] = &[
        b"<< ",
        b"/Type ",
        b"/Page ",
        b"/Parent ",
        b"12 0 R ",
        b"/MediaBox ",
        b"[0 0 612 792] ",
        b"/Rotate ",
        b"90 ",
        b"/UserUnit ",
        b"1.5 ",
        b"/T ",
        b"(Title \\(draft\\)) ",
        b"/ID ",
        b"<4f6e65> ",
        b">> ",
    ];
    let mut data = Vec::with_capacity(n * 8);
    for i in 0..n {
        data.extend_from_slice(templates[i % templates.len()]);
    }
    data
}

fn generate_numbers(n: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(n * 7);
    for i in 0..n {
        let value = match i % 4 {
            0 => format!("{} ", i % 1000),
            1 => format!("-{} ", i % 500),
            2 => format!("{}.{} ", i % 100, (i * 7) % 100),
            _ => format!("-.{} ", (i % 99) + 1),
        };
        data.extend_from_slice(value.as_bytes());
    }
    data
}

fn generate_names(n: usize) -> Vec<u8> {
    let names: &[&[u8]] = &[
        b"/Type ",
        b"/FlateDecode ",
        b"/A#20B ",
        b"/DecodeParms ",
        b"/Lime#20Green ",
    ];
    let mut data = Vec::with_capacity(n * 10);
    for i in 0..n {
        data.extend_from_slice(names[i % names.len()]);
    }
    data
}

fn generate_strings(n: usize) -> Vec<u8> {
    let strings: &[&[u8]] = &[
        b"(Hello) ",
        b"(Line 1\\nLine 2) ",
        b"(Nested (parens) here) ",
        b"(Octal\\101\\102\\103) ",
        b"<48454C4C4F> ",
        b"<4 8 4 5> ",
        b"() ",
    ];
    let mut data = Vec::with_capacity(n * 16);
    for i in 0..n {
        data.extend_from_slice(strings[i % strings.len()]);
    }
    data
}

/// `n` indirect-object-like dictionaries back to back.
fn generate_objects(n: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(n * 96);
    for i in 0..n {
        data.extend_from_slice(
            format!(
                "<< /Type /Annot /Rect [{} {} 100 20.5] /P {} 0 R /Kids [{} 0 R {} 0 R] /NM (a{}) >>\n",
                i % 600,
                i % 800,
                i + 1,
                i + 2,
                i + 3,
                i
            )
            .as_bytes(),
        );
    }
    data
}

fn count_tokens(data: &Bytes) -> usize {
    let mut lexer = Lexer::at(data.clone(), 0);
    std::iter::from_fn(|| lexer.next_token()).count()
}

// =============================================================================
// Benchmark Groups
// =============================================================================

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_tokenize");

    for target in [10_000usize, 100_000, 1_000_000] {
        let data = Bytes::from(generate_mixed_tokens(target));
        let tokens = count_tokens(&data);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("mixed", tokens), &data, |b, data| {
            b.iter(|| {
                let mut lexer = Lexer::at(black_box(data.clone()), 0);
                let mut count = 0usize;
                while let Some(token) = lexer.next_token() {
                    black_box(token.unwrap());
                    count += 1;
                }
                count
            })
        });
    }

    group.finish();
}

fn bench_token_types(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_token_types");
    let n = 100_000;

    let inputs = [
        ("numbers", generate_numbers(n)),
        ("names", generate_names(n)),
        ("strings", generate_strings(n)),
    ];
    for (label, data) in inputs {
        let data = Bytes::from(data);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &data, |b, data| {
            b.iter(|| {
                let mut lexer = Lexer::at(black_box(data.clone()), 0);
                std::iter::from_fn(|| lexer.next_token())
                    .map(|t| black_box(t.unwrap()))
                    .count()
            })
        });
    }

    group.finish();
}

fn bench_parse_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_objects");

    for n in [1_000usize, 10_000] {
        let data = Bytes::from(generate_objects(n));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("annots", n), &data, |b, data| {
            b.iter(|| {
                let mut parser = Parser::new(black_box(data.clone()), 0);
                let mut count = 0usize;
                while let Some(value) = parser.next_object().unwrap() {
                    black_box(value);
                    count += 1;
                }
                count
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_token_types, bench_parse_objects);
criterion_main!(benches);
