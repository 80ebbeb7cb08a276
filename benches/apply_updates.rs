//! Benchmarks for snapshot application and incremental update processing.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use orderbook_delta_engine::{
    BookListener, FieldDictionary, FieldIds, FieldValue, ListenerConfig, ManualTimer, MessageType,
    WireMessage,
};

fn level_sub(ids: &FieldIds, price: f64, side: char, action: char, size: u64) -> FieldValue {
    FieldValue::SubMsg(
        WireMessage::new()
            .with(ids.pl_price, FieldValue::Price(price))
            .with(ids.pl_side, FieldValue::Char(side))
            .with(ids.pl_action, FieldValue::Char(action))
            .with(ids.pl_size, FieldValue::U64(size)),
    )
}

fn snapshot_msg(ids: &FieldIds, depth: usize) -> WireMessage {
    let mut levels = Vec::with_capacity(depth * 2);
    for i in 0..depth {
        levels.push(level_sub(ids, 100.0 - 0.01 * i as f64, 'B', 'A', 100));
        levels.push(level_sub(ids, 100.01 + 0.01 * i as f64, 'A', 'A', 100));
    }
    WireMessage::new()
        .with(ids.seq_num, FieldValue::U64(1))
        .with(ids.sender_id, FieldValue::U64(1))
        .with(ids.price_levels, FieldValue::Vector(levels))
}

fn update_stream(ids: &FieldIds, count: usize, depth: usize) -> Vec<WireMessage> {
    let mut updates = Vec::with_capacity(count);
    for i in 0..count {
        let is_bid = i % 2 == 0;
        let offset = 0.01 * ((i % depth) as f64);
        let (price, side) = if is_bid {
            (100.0 - offset, 'B')
        } else {
            (100.01 + offset, 'A')
        };
        let size = ((i % 500) + 1) as u64;
        updates.push(
            WireMessage::new()
                .with(ids.seq_num, FieldValue::U64((i + 2) as u64))
                .with(ids.sender_id, FieldValue::U64(1))
                .with(
                    ids.price_levels,
                    FieldValue::Vector(vec![level_sub(ids, price, side, 'U', size)]),
                ),
        );
    }
    updates
}

fn bench_apply_updates(c: &mut Criterion) {
    let dict = FieldDictionary::standard();
    let ids = FieldIds::resolve(&dict).unwrap();
    let snapshot = snapshot_msg(&ids, 10);
    let updates = update_stream(&ids, 10_000, 10);

    let mut group = c.benchmark_group("apply_updates");
    group.throughput(Throughput::Elements(updates.len() as u64));

    group.bench_function("process_update_stream", |b| {
        b.iter(|| {
            let mut listener = BookListener::new("BENCH", ListenerConfig::default());
            listener.configure_dictionary(&dict).unwrap();
            let mut timer = ManualTimer::new();
            listener
                .process_message(MessageType::Snapshot, &snapshot, &mut timer)
                .unwrap();
            for msg in &updates {
                let _ = black_box(listener.process_message(MessageType::Update, msg, &mut timer));
            }
        })
    });

    group.finish();
}

fn bench_snapshot_replace(c: &mut Criterion) {
    let dict = FieldDictionary::standard();
    let ids = FieldIds::resolve(&dict).unwrap();
    let snapshot = snapshot_msg(&ids, 50);

    let mut listener = BookListener::new("BENCH", ListenerConfig::default());
    listener.configure_dictionary(&dict).unwrap();
    let mut timer = ManualTimer::new();

    c.bench_function("snapshot_replace_50_levels", |b| {
        b.iter(|| {
            let _ = black_box(listener.process_message(
                MessageType::Snapshot,
                &snapshot,
                &mut timer,
            ));
        })
    });
}

criterion_group!(benches, bench_apply_updates, bench_snapshot_replace);
criterion_main!(benches);
