//! Criterion benchmarks for the content pipeline.
//!
//! - `load_records`: dispatch of generated item records, half of them
//!   deferred behind a forward `copy-from`
//! - `load_and_finalize`: the same content plus groups and migrations,
//!   through finalization

use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use stockpile_core::catalog::Catalog;
use stockpile_core::id::ContentSource;
use stockpile_core::test_utils::test_catalog;
use stockpile_data::ContentLoader;

// ===========================================================================
// Content builders
// ===========================================================================

/// `families` tool bases, each with `children` variants declared before it.
fn build_records(families: usize, children: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(families * (children + 1) + families);
    for f in 0..families {
        for c in 0..children {
            out.push(json!({
                "type": "TOOL",
                "id": format!("tool_{f}_{c}"),
                "copy-from": format!("tool_{f}"),
                "relative": {"weight": c as i64 * 10},
                "extend": {"flags": [format!("VARIANT_{c}")]}
            }));
        }
        out.push(json!({
            "type": "TOOL",
            "id": format!("tool_{f}"),
            "name": {"str": format!("tool {f}")},
            "weight": "750 g",
            "volume": "500 ml",
            "material": ["steel"],
            "qualities": [["HAMMER", 1]],
            "max_charges": 20,
            "ammo": "battery"
        }));
        out.push(json!({
            "type": "item_group",
            "id": format!("tools_{f}"),
            "items": (0..children).map(|c| json!([format!("tool_{f}_{c}"), 10])).collect::<Vec<_>>()
        }));
        out.push(json!({"type": "MIGRATION", "id": format!("old_tool_{f}"), "replace": format!("tool_{f}")}));
    }
    out
}

fn load(catalog: &mut Catalog, records: &[Value]) {
    let mut loader = ContentLoader::new(catalog);
    loader
        .load_source(&ContentSource::new("core"), records.to_vec())
        .unwrap();
    loader.finish().unwrap();
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_load_records(c: &mut Criterion) {
    let records = build_records(200, 4);
    c.bench_function("load_records", |b| {
        b.iter(|| {
            let mut catalog = test_catalog();
            load(&mut catalog, &records);
            catalog
        })
    });
}

fn bench_load_and_finalize(c: &mut Criterion) {
    let records = build_records(200, 4);
    c.bench_function("load_and_finalize", |b| {
        b.iter(|| {
            let mut catalog = test_catalog();
            load(&mut catalog, &records);
            catalog.finalize().unwrap()
        })
    });
}

criterion_group!(benches, bench_load_records, bench_load_and_finalize);
criterion_main!(benches);
