use criterion::{Criterion, criterion_group, criterion_main};

use xrefmap::mapfile::parse_line;

fn bench_parse_line(c: &mut Criterion) {
    let line = "xref:48213:1042:1873:2000:1950:0:1999:0:1949:M 1950 D 50:9365";
    c.bench_function("parse_map_line", |b| {
        b.iter(|| {
            let record = parse_line(line).unwrap().unwrap();
            assert_eq!(record.query_id, 48213);
        });
    });
}

fn bench_threshold_filter(c: &mut Criterion) {
    // 10k records with varying identities, roughly half passing 90/90
    let lines: Vec<String> = (0..10_000)
        .map(|i| {
            let identity = 1700 + (i % 300);
            format!("xref:{i}:1042:{identity}:2000:1950:0:1999:0:1949:M 1950:9365")
        })
        .collect();

    c.bench_function("threshold_filter_10k", |b| {
        b.iter(|| {
            let kept = lines
                .iter()
                .filter_map(|line| parse_line(line).unwrap())
                .filter(|record| record.passes(90, 90))
                .count();
            assert!(kept > 0);
        });
    });
}

criterion_group!(benches, bench_parse_line, bench_threshold_filter);
criterion_main!(benches);
