//! Message encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gds_protocol::{
    Data, DataType, EventData, EventDocumentData, FieldHolder, FieldValueType, FragmentAssembler,
    Header, Inbound, MessageManager,
};
use rmpv::Value;

fn create_event(attachment_size: usize) -> (Header, Data) {
    let header = Header::new("bench", "bench-1", DataType::Event);
    let data = EventData::new("INSERT INTO multi_event (id, name) VALUES ('1', 'bench')")
        .with_attachment("1", Bytes::from(vec![0x42u8; attachment_size]))
        .into();
    (header, data)
}

fn create_document(records: usize) -> (Header, Data) {
    let header = Header::new("bench", "bench-2", DataType::EventDocument);
    let mut document = EventDocumentData::new(
        "multi_event",
        vec![
            FieldHolder::new("id", FieldValueType::Keyword, ""),
            FieldHolder::new("amount", FieldValueType::Double, ""),
        ],
    );
    for i in 0..records {
        document = document.with_record(vec![Value::from(format!("id-{i}")), Value::from(i as f64)]);
    }
    (header, document.into())
}

fn bench_event_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_encode");

    for size in [100, 1000, 10000] {
        let (header, data) = create_event(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(MessageManager::encode_message(&header, data).unwrap()));
        });
    }

    group.finish();
}

fn bench_event_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_decode");

    for size in [100, 1000, 10000] {
        let (header, data) = create_event(size);
        let encoded = MessageManager::encode_message(&header, &data).unwrap();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| black_box(MessageManager::decode_message(encoded.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_document_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_roundtrip");

    for records in [10, 100, 1000] {
        let (header, data) = create_document(records);

        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &data, |b, data| {
            b.iter(|| {
                let encoded = MessageManager::encode_message(&header, data).unwrap();
                black_box(MessageManager::decode_message(encoded).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_fragment_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragment_reassembly");
    let (header, data) = create_event(100_000);

    for unit in [1024, 8192, 65536] {
        let slices = MessageManager::fragment(&header, &data, unit).unwrap();

        group.throughput(Throughput::Bytes(100_000));
        group.bench_with_input(BenchmarkId::from_parameter(unit), &slices, |b, slices| {
            b.iter(|| {
                let mut assembler = FragmentAssembler::new();
                let mut complete = None;
                for slice in slices {
                    match MessageManager::decode(slice.clone()).unwrap() {
                        Inbound::Fragment(fragment) => complete = assembler.push(fragment).unwrap(),
                        Inbound::Message(message) => complete = Some(message),
                    }
                }
                black_box(complete.unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_event_encode,
    bench_event_decode,
    bench_document_roundtrip,
    bench_fragment_reassembly,
);

criterion_main!(benches);
