//! Throughput benchmarks

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use gsmodem_core::core::classifier::classify;
use gsmodem_core::core::codec::{decode_ucs2, encode_ucs2};
use gsmodem_core::core::sms::parse_sms_list;
use gsmodem_core::LineFramer;

fn framer_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..64)
        .flat_map(|i| format!("+CSQ: {},0\r\n\r\nOK\r\n", i % 32).into_bytes())
        .collect();

    let mut group = c.benchmark_group("framer");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("feed_bytes", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            black_box(framer.feed_bytes(black_box(&data)))
        })
    });

    group.finish();
}

fn classifier_benchmark(c: &mut Criterion) {
    let lines = [
        "RING",
        "+CLIP: \"+375291234567\",145,\"\",0,\"\",0",
        "+CMTI: \"SM\",12",
        "NO CARRIER",
        "+CSQ: 14,0",
        "0048006500790021",
    ];

    let mut group = c.benchmark_group("classifier");
    group.throughput(Throughput::Elements(lines.len() as u64));

    group.bench_function("classify", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(classify(black_box(line)));
            }
        })
    });

    group.finish();
}

fn ucs2_benchmark(c: &mut Criterion) {
    let text = "Привет! Hello from the modem. ".repeat(5);
    let hex = encode_ucs2(&text);

    let mut group = c.benchmark_group("ucs2");
    group.throughput(Throughput::Bytes(hex.len() as u64));

    group.bench_function("decode", |b| b.iter(|| black_box(decode_ucs2(black_box(&hex)))));
    group.bench_function("encode", |b| b.iter(|| black_box(encode_ucs2(black_box(&text)))));

    let lines: Vec<String> = (1..=30)
        .flat_map(|i| {
            [
                format!("+CMGL: {i},\"REC READ\",\"002B0031\",,\"23/01/05,14:03:21+00\""),
                hex.clone(),
            ]
        })
        .collect();
    group.bench_function("parse_sms_list", |b| {
        b.iter(|| black_box(parse_sms_list(black_box(&lines))))
    });

    group.finish();
}

criterion_group!(benches, framer_benchmark, classifier_benchmark, ucs2_benchmark);
criterion_main!(benches);
