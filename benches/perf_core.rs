use criterion::{black_box, criterion_group, criterion_main, Criterion};
use foodscout::render;
use foodscout::store::{FileStore, KeyValueStore};
use foodscout::suggest::llm::{extract_first_json, structured_from_text};

fn synthetic_answer(restaurants: usize) -> String {
    let entries: Vec<String> = (0..restaurants)
        .map(|i| {
            format!(
                r#"{{"name": "Place {i}", "address": "{i} Main St {{corner}}", "mapLink": "", "reasons": ["fresh", "\"famous\"", "open late", "cheap"]}}"#
            )
        })
        .collect();
    format!(
        "Sure! Here are my picks:\n```json\n{{\"foodDescription\": \"A dish.\", \"restaurants\": [{}]}}\n```\nEnjoy.",
        entries.join(", ")
    )
}

fn bench_extract_first_json(c: &mut Criterion) {
    let small = synthetic_answer(2);
    c.bench_function("extract_first_json_small", |b| {
        b.iter(|| black_box(extract_first_json(black_box(&small)).is_some()));
    });

    let large = synthetic_answer(500);
    c.bench_function("extract_first_json_large", |b| {
        b.iter(|| black_box(extract_first_json(black_box(&large)).is_some()));
    });

    let noise = format!("{}{{\"unterminated\": ", "prose without braces ".repeat(2_000));
    c.bench_function("extract_first_json_no_match", |b| {
        b.iter(|| black_box(extract_first_json(black_box(&noise)).is_none()));
    });
}

fn bench_render_structured(c: &mut Criterion) {
    let result = structured_from_text(&synthetic_answer(2)).expect("synthetic answer should decode");
    c.bench_function("render_structured", |b| {
        b.iter(|| black_box(render::structured(black_box(&result)).len()));
    });
}

fn bench_file_store_roundtrip(c: &mut Criterion) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FileStore::new(temp.path());
    store.set("encrypted_api_key", "{}").expect("seed store");

    c.bench_function("file_store_get", |b| {
        b.iter(|| black_box(store.get("encrypted_api_key").expect("get")));
    });
}

criterion_group!(
    perf_core,
    bench_extract_first_json,
    bench_render_structured,
    bench_file_store_roundtrip
);
criterion_main!(perf_core);
