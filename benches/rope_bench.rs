//! Benchmarks for rope operations matching real editor usage patterns
//!
//! - Keystroke inserts and deletes in large documents
//! - O(log n) navigation in every unit
//! - Edit batching through the RCU document
//! - Split, concat and compaction

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_rope::{Doc, Edit, Rope, RopeConfig, SplitMode, Unit};

/// Generate a realistic document with mixed content
fn generate_document(lines: usize) -> String {
    let mut doc = String::new();
    for i in 0..lines {
        match i % 5 {
            0 => doc.push_str(&format!("fn function_{}() {{\n", i)),
            1 => doc.push_str(&format!(
                "    let variable_{} = \"chaîne littérale 😀\";\n",
                i
            )),
            2 => doc.push_str(&format!("    // Comment explaining line {}\n", i)),
            3 => doc.push_str(&format!("    process_data({}, {}, {});\n", i, i * 2, i * 3)),
            _ => doc.push_str("}\n"),
        }
    }
    doc
}

fn parse(text: &str) -> Rope {
    Rope::from_bytes(text.as_bytes()).unwrap()
}

/// Nearest char boundary at or before `byte`
fn floor_boundary(text: &str, mut byte: usize) -> usize {
    while !text.is_char_boundary(byte) {
        byte -= 1;
    }
    byte
}

fn bench_single_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_insert");

    for size in [100, 1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);
        let mid = floor_boundary(&text, text.len() / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut rope = rope.clone();
                rope.insert(Unit::Byte, mid, "x").unwrap();
                std::hint::black_box(rope.len(Unit::Byte));
            });
        });
    }
    group.finish();
}

/// Roughly 16ms of typing applied as one flush
fn bench_batched_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("batched_edits");

    for size in [1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);
        let start = floor_boundary(&text, text.len() / 2);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let doc = Doc::from_rope(rope.clone(), &RopeConfig::default());
                for i in 0..10 {
                    doc.edit(Edit::Insert {
                        pos: start + i,
                        text: "a".to_string(),
                    })
                    .unwrap();
                }
                doc.flush().unwrap();

                std::hint::black_box(doc.read());
            });
        });
    }
    group.finish();
}

fn bench_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("navigation");

    for size in [1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);

        group.bench_with_input(BenchmarkId::new("byte_to_line", size), size, |b, _| {
            let positions: Vec<usize> = (0..100).map(|i| (text.len() * i) / 100).collect();

            b.iter(|| {
                for &pos in &positions {
                    let _ = std::hint::black_box(rope.byte_to_line(pos));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("line_to_byte", size), size, |b, _| {
            let line_count = rope.len(Unit::Line);
            let lines: Vec<usize> = (0..100).map(|i| (line_count * i) / 100).collect();

            b.iter(|| {
                for &line in &lines {
                    let _ = std::hint::black_box(rope.line_to_byte(line));
                }
            });
        });

        for unit in [Unit::Char, Unit::Codepoint, Unit::Utf16] {
            let id = format!("seek_{}", unit.name());
            group.bench_with_input(BenchmarkId::new(id, size), size, |b, _| {
                let total = rope.len(unit);
                let targets: Vec<usize> = (0..100).map(|i| (total * i) / 100).collect();

                b.iter(|| {
                    for &target in &targets {
                        let _ = std::hint::black_box(rope.seek(unit, target));
                    }
                });
            });
        }

        group.bench_with_input(BenchmarkId::new("find_newlines", size), size, |b, _| {
            let positions: Vec<usize> = (0..100).map(|i| (text.len() * i) / 100).collect();

            b.iter(|| {
                for &pos in &positions {
                    let _ = std::hint::black_box(rope.find_next_newline(pos));
                    let _ = std::hint::black_box(rope.find_prev_newline(pos));
                }
            });
        });
    }
    group.finish();
}

fn bench_text_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_extraction");

    for size in [1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);

        // ~50 lines of code per viewport
        group.bench_with_input(BenchmarkId::new("viewport_slice", size), size, |b, _| {
            let line_count = rope.len(Unit::Line);
            let starts: Vec<usize> = (0..10).map(|i| (line_count * i) / 10).collect();

            b.iter(|| {
                for &line in &starts {
                    let end = (line + 50).min(line_count);
                    let _ = std::hint::black_box(rope.slice(Unit::Line, line..end));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("to_bytes", size), size, |b, _| {
            b.iter(|| {
                std::hint::black_box(rope.to_bytes());
            });
        });
    }
    group.finish();
}

fn bench_rcu_concurrency(c: &mut Criterion) {
    let mut group = c.benchmark_group("rcu_concurrency");

    let text = generate_document(10000);
    let rope = parse(&text);

    group.bench_function("concurrent_reads_during_writes", |b| {
        b.iter(|| {
            let doc = Arc::new(Doc::from_rope(rope.clone(), &RopeConfig::default()));
            let reader_doc = Arc::clone(&doc);

            let reader = thread::spawn(move || {
                let mut sum = 0usize;
                for _ in 0..20 {
                    sum += reader_doc.read().len(Unit::Line);
                    thread::sleep(Duration::from_micros(500));
                }
                sum
            });

            for i in 0..100 {
                doc.edit(Edit::Insert {
                    pos: i,
                    text: "x".to_string(),
                })
                .unwrap();
                if i % 10 == 0 {
                    doc.flush().unwrap();
                }
            }
            doc.flush().unwrap();

            std::hint::black_box(reader.join().unwrap());
        });
    });

    group.finish();
}

fn bench_deletion(c: &mut Criterion) {
    let mut group = c.benchmark_group("deletion");

    for size in [1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);

        // Backspace
        group.bench_with_input(BenchmarkId::new("single_delete", size), size, |b, _| {
            let mid = rope.len(Unit::Codepoint) / 2;
            b.iter(|| {
                let mut rope = rope.clone();
                rope.delete(Unit::Codepoint, mid..mid + 1).unwrap();
                std::hint::black_box(rope.len(Unit::Byte));
            });
        });

        group.bench_with_input(BenchmarkId::new("line_delete", size), size, |b, _| {
            let mid = rope.len(Unit::Line) / 2;
            b.iter(|| {
                let mut rope = rope.clone();
                rope.delete(Unit::Line, mid..mid + 1).unwrap();
                std::hint::black_box(rope.len(Unit::Byte));
            });
        });
    }
    group.finish();
}

fn bench_structure(c: &mut Criterion) {
    let mut group = c.benchmark_group("structure");

    for size in [1000, 10000, 100000].iter() {
        let text = generate_document(*size);
        let rope = parse(&text);

        group.bench_with_input(BenchmarkId::new("split_concat", size), size, |b, _| {
            let mid = rope.len(Unit::Line) / 2;
            b.iter(|| {
                let mut head = rope.clone();
                let tail = head.split_off(Unit::Line, mid).unwrap();
                std::hint::black_box(Rope::concat(head, tail).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("split_leaf", size), size, |b, _| {
            let mid = rope.len(Unit::Codepoint) / 2;
            b.iter(|| {
                let mut rope = rope.clone();
                let _ = std::hint::black_box(rope.split_at(Unit::Codepoint, mid, SplitMode::Char));
            });
        });

        group.bench_with_input(BenchmarkId::new("compact", size), size, |b, _| {
            let config = RopeConfig {
                compact_interval: 0,
                ..RopeConfig::default()
            };
            let mut fragmented = Rope::from_bytes_with_config(text.as_bytes(), &config).unwrap();
            for i in 0..200 {
                let pos = (fragmented.len(Unit::Line) * i) / 200;
                fragmented.insert(Unit::Line, pos, "// x\n").unwrap();
            }

            b.iter(|| {
                let mut rope = fragmented.clone();
                rope.compact().unwrap();
                std::hint::black_box(rope.node_count());
            });
        });
    }
    group.finish();
}

fn bench_memory_usage(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory");

    // Snapshot cost for undo history
    group.bench_function("arc_clone", |b| {
        let doc = Doc::from_rope(parse(&generate_document(10000)), &RopeConfig::default());
        let rope = doc.read();

        b.iter(|| {
            std::hint::black_box(Arc::clone(&rope));
        });
    });

    for size in [1000, 10000, 100000].iter() {
        group.bench_with_input(BenchmarkId::new("rope_creation", size), size, |b, _| {
            let text = generate_document(*size);
            b.iter(|| {
                std::hint::black_box(parse(&text));
            });
        });
    }

    group.finish();
}

fn bench_realistic_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("realistic_session");

    group.bench_function("typing_burst", |b| {
        let text = generate_document(5000);
        let rope = parse(&text);
        let start = floor_boundary(&text, text.len() / 2);

        b.iter(|| {
            let doc = Doc::from_rope(rope.clone(), &RopeConfig::default());
            let mut pos = start;
            let code = "fn example() {\n    let x = 42;\n    println!(\"x = {}\", x);\n}\n";

            for ch in code.chars() {
                doc.edit(Edit::Insert {
                    pos,
                    text: ch.to_string(),
                })
                .unwrap();
                pos += ch.len_utf8();

                if pos % 3 == 0 {
                    doc.flush().unwrap();
                }
            }
            doc.flush().unwrap();

            std::hint::black_box(doc.read());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_insert,
    bench_batched_edits,
    bench_navigation,
    bench_text_extraction,
    bench_rcu_concurrency,
    bench_deletion,
    bench_structure,
    bench_memory_usage,
    bench_realistic_session
);

criterion_main!(benches);
