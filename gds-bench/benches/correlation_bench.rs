//! Request/response round-trip benchmarks over the in-memory transport.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gds_client::{ClientConfig, MemoryTransport, SyncClient};
use gds_protocol::{AckStatus, Data, EventAckData, EventData};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

/// Connects a client to an in-memory service that acks every event.
fn setup_client(rt: &Runtime) -> Arc<SyncClient> {
    rt.block_on(async {
        let (transport, mut peer) = MemoryTransport::pair();
        let client = SyncClient::new(ClientConfig::new("memory://bench", "bench"), transport);

        tokio::spawn(async move {
            peer.accept_login().await.unwrap();
            while let Ok(request) = peer.recv_message().await {
                if let Data::Event(_) = request.data() {
                    let ack = EventAckData::new(AckStatus::Ok, Vec::new());
                    if peer.reply(request.header(), ack).is_err() {
                        break;
                    }
                }
            }
        });

        client.connect().await.unwrap();
        Arc::new(client)
    })
}

fn bench_event_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let client = setup_client(&rt);

    let mut group = c.benchmark_group("event_roundtrip");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sequential", |b| {
        b.to_async(&rt).iter(|| {
            let client = client.clone();
            async move {
                let event = EventData::new("INSERT INTO multi_event (id) VALUES ('1')");
                black_box(client.send_event(event, None, TIMEOUT).await.unwrap())
            }
        });
    });
    group.finish();
}

fn bench_concurrent_roundtrips(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let client = setup_client(&rt);

    let mut group = c.benchmark_group("concurrent_roundtrips");
    for in_flight in [10u64, 100] {
        group.throughput(Throughput::Elements(in_flight));
        group.bench_function(format!("{in_flight}"), |b| {
            b.to_async(&rt).iter(|| {
                let client = client.clone();
                async move {
                    let tasks: Vec<_> = (0..in_flight)
                        .map(|_| {
                            let client = client.clone();
                            tokio::spawn(async move {
                                let event = EventData::new("INSERT INTO multi_event (id) VALUES ('1')");
                                client.send_event(event, None, TIMEOUT).await.unwrap()
                            })
                        })
                        .collect();
                    for task in tasks {
                        black_box(task.await.unwrap());
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_event_roundtrip, bench_concurrent_roundtrips);

criterion_main!(benches);
