use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::thread;

use flowvakt_capture::Frame;
use flowvakt_core::events::EventBus;
use flowvakt_core::flow::{FlowKey, FlowMetricsStore};
use flowvakt_core::packet::{Direction, TransportProtocol};
use flowvakt_core::time::{Clock, VirtualClock};
use flowvakt_engine::{Pipeline, Verdict};
use flowvakt_protocols::testing::{
    FrameBuilder, IPPROTO_ICMP, MULTICAST_MAC, TCP_FLAG_ACK, TCP_FLAG_SYN,
};
use flowvakt_telemetry::MetricsRecorder;

struct Setup {
    store: Arc<FlowMetricsStore>,
    bus: EventBus,
    clock: VirtualClock,
    ingress: Pipeline,
    egress: Pipeline,
}

fn setup() -> Setup {
    let store = Arc::new(FlowMetricsStore::with_max_entries(1 << 16));
    let bus = EventBus::with_capacity(1 << 16).unwrap();
    let clock = VirtualClock::new(0);
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let metrics = MetricsRecorder::new().unwrap();

    Setup {
        ingress: Pipeline::ingress(store.clone(), bus.share(), shared_clock.clone(), &metrics),
        egress: Pipeline::egress(store.clone(), bus.share(), shared_clock, &metrics),
        store,
        bus,
        clock,
    }
}

fn mapped(octets: [u8; 4]) -> Ipv6Addr {
    Ipv4Addr::from(octets).to_ipv6_mapped()
}

#[test]
fn handshake_observed_in_both_directions_is_one_flow() {
    let s = setup();
    let syn = FrameBuilder::tcp_v4([10, 0, 0, 1], 443, [10, 0, 0, 2], 51000)
        .tcp_flags(TCP_FLAG_SYN)
        .build();
    let syn_ack = FrameBuilder::tcp_v4([10, 0, 0, 2], 51000, [10, 0, 0, 1], 443)
        .tcp_flags(TCP_FLAG_SYN | TCP_FLAG_ACK)
        .build();
    assert_eq!(syn.len(), 60);

    s.clock.set(100);
    assert_eq!(s.ingress.process(Frame::whole(&syn)), Verdict::Pass);
    s.clock.set(250);
    assert_eq!(s.egress.process(Frame::whole(&syn_ack)), Verdict::Pass);

    let snapshot = s.store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot[0].key,
        FlowKey {
            local_ip: mapped([10, 0, 0, 2]),
            remote_ip: mapped([10, 0, 0, 1]),
            local_port: 51000,
            remote_port: 443,
            protocol: TransportProtocol::Tcp,
        }
    );

    let metrics = snapshot[0].metrics;
    assert_eq!((metrics.packets_in, metrics.packets_out), (1, 1));
    assert_eq!((metrics.bytes_in, metrics.bytes_out), (60, 60));
    assert_eq!((metrics.ts_start, metrics.ts_current), (100, 250));

    let first = s.bus.recv().unwrap();
    let second = s.bus.recv().unwrap();
    assert!(s.bus.recv().is_none());
    assert_eq!(first.direction, Direction::Inbound);
    assert_eq!(second.direction, Direction::Outbound);
    assert!(second.flags.syn && second.flags.ack);
}

#[test]
fn ipv6_udp_conversation_is_tracked() {
    let s = setup();
    let local: Ipv6Addr = "2001:db8::2".parse().unwrap();
    let remote: Ipv6Addr = "2001:db8::53".parse().unwrap();

    let query = FrameBuilder::udp_v6(local, 40000, remote, 53).payload(32).build();
    let answer = FrameBuilder::udp_v6(remote, 53, local, 40000).payload(96).build();

    s.egress.process(Frame::whole(&query));
    s.ingress.process(Frame::whole(&answer));

    let snapshot = s.store.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].key.local_ip, local);
    assert_eq!(snapshot[0].key.remote_port, 53);
    assert_eq!(snapshot[0].metrics.bytes_out, query.len() as u64);
    assert_eq!(snapshot[0].metrics.bytes_in, answer.len() as u64);
}

#[test]
fn malformed_and_uninteresting_frames_change_nothing() {
    let s = setup();
    let tcp = FrameBuilder::tcp_v4([10, 0, 0, 1], 443, [10, 0, 0, 2], 51000)
        .tcp_flags(TCP_FLAG_SYN)
        .build();
    let arp = FrameBuilder::tcp_v4([10, 0, 0, 1], 1, [10, 0, 0, 2], 2)
        .ether_type(0x0806)
        .build();
    let icmp = FrameBuilder::tcp_v4([10, 0, 0, 1], 1, [10, 0, 0, 2], 2)
        .ip_protocol(IPPROTO_ICMP)
        .build();
    let mdns = FrameBuilder::udp_v4([10, 0, 0, 1], 5353, [224, 0, 0, 251], 5353)
        .destination_mac(MULTICAST_MAC)
        .build();

    let frames: [&[u8]; 7] = [&[], &tcp[..13], &tcp[..20], &tcp[..40], &arp, &icmp, &mdns];
    for frame in frames {
        assert_eq!(s.ingress.process(Frame::whole(frame)), Verdict::Pass);
        assert_eq!(s.egress.process(Frame::whole(frame)), Verdict::Pass);
    }

    assert!(s.store.is_empty());
    assert!(s.bus.is_empty());
}

#[test]
fn concurrent_workers_lose_nothing() {
    const WORKERS: u16 = 8;
    const PACKETS: u16 = 500;

    let s = setup();

    // Every worker opens its own flow, then all of them hammer one shared flow.
    let shared_open = FrameBuilder::udp_v4([10, 0, 0, 2], 9999, [10, 0, 0, 1], 53).build();
    s.egress.process(Frame::whole(&shared_open));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let (pipeline, inbound) = if worker % 2 == 0 {
                (s.egress.clone(), false)
            } else {
                (s.ingress.clone(), true)
            };
            thread::spawn(move || {
                let own = FrameBuilder::udp_v4([10, 0, 0, 2], 20000 + worker, [10, 0, 0, 1], 53)
                    .build();
                let shared = if inbound {
                    FrameBuilder::udp_v4([10, 0, 0, 1], 53, [10, 0, 0, 2], 9999).build()
                } else {
                    FrameBuilder::udp_v4([10, 0, 0, 2], 9999, [10, 0, 0, 1], 53).build()
                };
                pipeline.process(Frame::whole(&own));
                for _ in 0..PACKETS {
                    pipeline.process(Frame::whole(&shared));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One shared flow plus one per worker; ingress workers' "own" frames are
    // keyed with 10.0.0.1 as local, so they are distinct flows too.
    assert_eq!(s.store.len(), 1 + WORKERS as usize);

    let shared = s
        .store
        .snapshot()
        .into_iter()
        .find(|entry| entry.key.local_port == 9999)
        .unwrap();
    let per_direction = u32::from(WORKERS / 2 * PACKETS);
    assert_eq!(shared.metrics.packets_out, per_direction + 1);
    assert_eq!(shared.metrics.packets_in, per_direction);
}
