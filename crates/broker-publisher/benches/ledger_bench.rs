//! 전달 원장 벤치마크
//!
//! 미확인 전달 수에 따른 추적/정산 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logpost_publish::ledger::DeliveryLedger;

fn bench_track(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_track");

    for count in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = DeliveryLedger::new();
                ledger.begin_epoch();
                for tag in 1..=count {
                    ledger.track(black_box(tag));
                }
                ledger.outstanding_len()
            })
        });
    }

    group.finish();
}

fn bench_single_acks(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_single_acks");

    for count in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = DeliveryLedger::new();
                ledger.begin_epoch();
                for tag in 1..=count {
                    ledger.track(tag);
                }
                for tag in 1..=count {
                    ledger.ack(black_box(tag), false);
                }
                ledger.acked()
            })
        });
    }

    group.finish();
}

fn bench_multiple_ack_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_multiple_ack");

    for count in [10u64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*count));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = DeliveryLedger::new();
                ledger.begin_epoch();
                for tag in 1..=count {
                    ledger.track(tag);
                }
                // 브로커가 multiple=true 하나로 전체를 확인하는 경우
                ledger.ack(black_box(count), true)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_track,
    bench_single_acks,
    bench_multiple_ack_sweep
);
criterion_main!(benches);
