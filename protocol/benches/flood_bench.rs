// Hot-path benchmarks for the flood engine.
//
// Covers seen-set inserts and duplicate checks, one full dispatcher step with
// fan-out to several peer queues, and JSON frame encode/decode.

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio_util::codec::{Decoder, Encoder};

use murmur_protocol::identity::PeerId;
use murmur_protocol::network::{
    Disposition, FrameCodec, GossipNode, Inbound, Message, MessageStore, PeerHandle, WireFrame,
};

const ORIGIN: &str = "/ip4/127.0.0.1/tcp/3001";

fn bench_store_insert_new(c: &mut Criterion) {
    c.bench_function("store/insert_new", |b| {
        let store = MessageStore::new();
        let mut seq = 0u64;
        b.iter(|| {
            seq += 1;
            store.insert_if_new(&Message::new("hello", seq, ORIGIN))
        });
    });
}

fn bench_store_duplicate(c: &mut Criterion) {
    let store = MessageStore::new();
    let msg = Message::new("hello", 1, ORIGIN);
    store.insert_if_new(&msg);

    c.bench_function("store/insert_duplicate", |b| {
        b.iter(|| store.insert_if_new(&msg));
    });
}

fn bench_handle_incoming(c: &mut Criterion) {
    let mut group = c.benchmark_group("node/handle_incoming");

    for peers in [1usize, 8, 32] {
        group.throughput(Throughput::Elements(peers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(peers), &peers, |b, &peers| {
            let (node, mut channels) = GossipNode::new(PeerId::from("bench"), "bench");
            let mut queues = Vec::with_capacity(peers);
            for i in 0..peers {
                let (handle, rx) = PeerHandle::channel(i as u64 + 1);
                node.registry().put(PeerId::new(format!("peer-{i}")), handle);
                queues.push(rx);
            }

            let mut seq = 0u64;
            b.iter(|| {
                seq += 1;
                let disposition = node.handle_incoming(Inbound {
                    from: PeerId::from("peer-0"),
                    message: Message::new("flooded line", seq, ORIGIN),
                });
                debug_assert!(matches!(disposition, Disposition::Accepted { .. }));

                // Keep queues and output from growing without bound.
                for rx in queues.iter_mut() {
                    while rx.try_recv().is_ok() {}
                }
                while channels.output.try_recv().is_ok() {}
            });
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let frame = WireFrame::Chat(Message::new("a typical chat line of moderate length", 42, ORIGIN));

    c.bench_function("codec/encode_chat", |b| {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::with_capacity(256);
        b.iter(|| {
            buf.clear();
            codec.encode(frame.clone(), &mut buf).unwrap();
        });
    });

    let mut encoded = BytesMut::new();
    FrameCodec::new().encode(frame, &mut encoded).unwrap();

    c.bench_function("codec/decode_chat", |b| {
        let mut codec = FrameCodec::new();
        b.iter(|| {
            let mut buf = encoded.clone();
            codec.decode(&mut buf).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_store_insert_new,
    bench_store_duplicate,
    bench_handle_incoming,
    bench_codec,
);
criterion_main!(benches);
