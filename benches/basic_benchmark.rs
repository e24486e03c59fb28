use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use zfx_peering::master::PeersList;
use zfx_peering::peer::{Nonce, PeerAddress, PeerObject};
use zfx_peering::pool::{peer_has_priority, score};
use zfx_peering::socket::Direction;

fn create_nonces(n: usize) -> Vec<Nonce> {
    (0..n).map(|_| Nonce::generate()).collect()
}

fn create_peers(n: usize) -> Vec<PeerObject> {
    (0..n)
        .map(|i| {
            let ip = IpAddr::V4(Ipv4Addr::new(10, (i >> 16) as u8, (i >> 8) as u8, i as u8));
            PeerObject::new(Nonce::generate(), PeerAddress::new(ip, 5000 + (i % 1000) as u16))
        })
        .collect()
}

pub fn run_priority_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_benchmark");
    let iterations = vec![100, 1000, 10000];

    peer_has_priority_benchmark(&mut group, iterations.clone());
    score_benchmark(&mut group, iterations);

    group.finish();
}

pub fn run_peers_list_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("peers_list_benchmark");
    let iterations = vec![100, 1000, 10000];

    insert_into_peers_list_benchmark(&mut group, iterations);

    group.finish();
}

fn peer_has_priority_benchmark(group: &mut BenchmarkGroup<WallTime>, iterations: Vec<usize>) {
    let system_nonce = Nonce::generate();
    for size in iterations {
        let nonces = create_nonces(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("peer_has_priority", size), &nonces, |b, nonces| {
            b.iter(|| {
                for nonce in nonces.iter() {
                    black_box(peer_has_priority(nonce, &system_nonce));
                }
            })
        });
    }
}

fn score_benchmark(group: &mut BenchmarkGroup<WallTime>, iterations: Vec<usize>) {
    for size in iterations {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("score", size), &size, |b, size| {
            b.iter(|| {
                for i in 0..*size {
                    let direction = if i % 2 == 0 { Direction::Inbound } else { Direction::Outbound };
                    black_box(score(direction, i % 3 == 0, i % 5 == 0, i % 7 == 0));
                }
            })
        });
    }
}

fn insert_into_peers_list_benchmark(group: &mut BenchmarkGroup<WallTime>, iterations: Vec<usize>) {
    for size in iterations {
        let peers = create_peers(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert", size), &peers, |b, peers| {
            b.iter(|| {
                let mut list = PeersList::new(Nonce::generate(), HashSet::new(), HashSet::new());
                for peer in peers.iter() {
                    let _ = black_box(list.insert(peer.clone(), 1));
                }
            })
        });
    }
}

criterion_group!(benches, run_priority_benchmark, run_peers_list_benchmark);
criterion_main!(benches);
