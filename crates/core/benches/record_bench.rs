//! 레코드/이벤트 벤치마크
//!
//! Record 생성, 와이어 포맷 직렬화, 채널 통신 성능을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use logpost_core::event::{EventMetadata, RecordEvent};
use logpost_core::record::Record;
use serde_json::json;

fn create_record() -> Record {
    let mut attrs = serde_json::Map::new();
    attrs.insert("severity".to_owned(), json!("error"));
    attrs.insert("source".to_owned(), json!("nginx"));
    attrs.insert("alert".to_owned(), json!(true));
    Record::with_attributes(
        "2024-03-14T02:11:05Z ERROR worker-3 connection reset by peer (retry 2/5)",
        attrs,
    )
}

fn bench_record_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_creation");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record_new", |b| {
        b.iter(|| Record::new(black_box("GET /api/v1/users HTTP/1.1 200 OK")))
    });

    group.bench_function("record_with_attributes", |b| {
        let mut attrs = serde_json::Map::new();
        attrs.insert("severity".to_owned(), json!("info"));
        b.iter(|| {
            Record::with_attributes(
                black_box("GET /api/v1/users HTTP/1.1 200 OK"),
                black_box(attrs.clone()),
            )
        })
    });

    group.bench_function("record_event_new", |b| {
        let record = create_record();
        b.iter(|| RecordEvent::new(black_box(record.clone()), black_box("/var/log/app.log")))
    });

    group.finish();
}

fn bench_record_serialization(c: &mut Criterion) {
    let record = create_record();
    let bare = Record::new("plain line without attributes");

    let mut group = c.benchmark_group("record_serialization");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record_to_json", |b| {
        b.iter(|| black_box(&record).to_json().unwrap())
    });

    group.bench_function("record_to_json_no_attrs", |b| {
        b.iter(|| black_box(&bare).to_json().unwrap())
    });

    group.bench_function("record_to_value", |b| {
        b.iter(|| black_box(&record).to_value())
    });

    group.finish();
}

fn bench_event_metadata(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_metadata");
    group.throughput(Throughput::Elements(1));

    group.bench_function("metadata_new", |b| {
        b.iter(|| EventMetadata::new(black_box("test-module"), black_box("trace-12345")))
    });

    group.bench_function("metadata_with_new_trace", |b| {
        b.iter(|| EventMetadata::with_new_trace(black_box("test-module")))
    });

    group.finish();
}

fn bench_record_cloning(c: &mut Criterion) {
    let record = create_record();
    let event = RecordEvent::new(create_record(), "/var/log/app.log");

    let mut group = c.benchmark_group("record_cloning");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record_clone", |b| {
        b.iter(|| {
            let _ = black_box(&record).clone();
        })
    });

    group.bench_function("record_event_clone", |b| {
        b.iter(|| {
            let _ = black_box(&event).clone();
        })
    });

    group.finish();
}

fn bench_channel_throughput(c: &mut Criterion) {
    use tokio::runtime::Runtime;

    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("channel_throughput");

    // 작은 배치 (100개)
    group.throughput(Throughput::Elements(100));
    group.bench_function("send_recv_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (tx, mut rx) = tokio::sync::mpsc::channel::<RecordEvent>(100);

                let sender = tokio::spawn(async move {
                    for _ in 0..100 {
                        let event = RecordEvent::new(create_record(), "/var/log/app.log");
                        tx.send(event).await.unwrap();
                    }
                });

                let receiver = tokio::spawn(async move {
                    let mut count = 0;
                    while let Some(_event) = rx.recv().await {
                        count += 1;
                        if count >= 100 {
                            break;
                        }
                    }
                });

                sender.await.unwrap();
                receiver.await.unwrap();
            })
        })
    });

    // 큰 배치 (1000개)
    group.throughput(Throughput::Elements(1000));
    group.bench_function("send_recv_1000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (tx, mut rx) = tokio::sync::mpsc::channel::<RecordEvent>(1000);

                let sender = tokio::spawn(async move {
                    for _ in 0..1000 {
                        let event = RecordEvent::new(create_record(), "/var/log/app.log");
                        tx.send(event).await.unwrap();
                    }
                });

                let receiver = tokio::spawn(async move {
                    let mut count = 0;
                    while let Some(_event) = rx.recv().await {
                        count += 1;
                        if count >= 1000 {
                            break;
                        }
                    }
                });

                sender.await.unwrap();
                receiver.await.unwrap();
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_record_creation,
    bench_record_serialization,
    bench_event_metadata,
    bench_record_cloning,
    bench_channel_throughput
);
criterion_main!(benches);
