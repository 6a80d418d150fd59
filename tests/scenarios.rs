//! End-to-end scenarios, driven entirely over
//! [`swift_mptp::LoopbackTransport`] so no real socket or root privilege is
//! needed to exercise the full bind/connect/send/recv/release path.

use std::net::Ipv4Addr;

use swift_mptp::{AddressRecord, Destination, LoopbackTransport, SocketState, SwiftProtocol, SwiftSocket};

fn harness() -> std::sync::Arc<SwiftProtocol> {
    let transport = LoopbackTransport::new();
    let protocol = SwiftProtocol::new(transport.clone());
    transport.attach(&protocol);
    protocol
}

#[test]
fn bind_then_release_frees_the_port_for_reuse() {
    let protocol = harness();

    let first = SwiftSocket::create(&protocol);
    first.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 5)).unwrap();
    assert_eq!(first.state(), SocketState::Bound);

    first.release();

    let second = SwiftSocket::create(&protocol);
    second
        .bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 5))
        .expect("port 5 should be free again after release");
}

#[tokio::test]
async fn loopback_single_send_is_delivered_with_its_source_port() {
    let protocol = harness();

    let sender = SwiftSocket::create(&protocol);
    sender.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 10)).unwrap();

    let receiver = SwiftSocket::create(&protocol);
    receiver.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 20)).unwrap();

    let target = AddressRecord {
        destinations: vec![Destination::new(Ipv4Addr::LOCALHOST, 20)],
    };
    let sent = sender.sendmsg(&[b"ping"], Some(&target)).unwrap();
    assert_eq!(sent, 1);

    let mut buffers = vec![vec![0u8; 16]];
    let mut from = AddressRecord::default();
    let report = receiver
        .recvmsg(&mut buffers, Some(&mut from), true)
        .await
        .unwrap();

    assert_eq!(report.count, 1);
    assert_eq!(buffers[0], b"ping");
    assert_eq!(from.destinations[0].port, 10);
}

#[tokio::test]
async fn multi_destination_sendmsg_fans_out_positionally() {
    let protocol = harness();

    let sender = SwiftSocket::create(&protocol);
    sender.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 1)).unwrap();

    let receivers: Vec<_> = (0..3)
        .map(|i| {
            let socket = SwiftSocket::create(&protocol);
            socket
                .bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 30 + i))
                .unwrap();
            socket
        })
        .collect();

    let target = AddressRecord {
        destinations: vec![
            Destination::new(Ipv4Addr::LOCALHOST, 30),
            Destination::new(Ipv4Addr::LOCALHOST, 31),
            Destination::new(Ipv4Addr::LOCALHOST, 32),
        ],
    };
    let payloads: [&[u8]; 3] = [b"one", b"two", b"three"];

    let sent = sender.sendmsg(&payloads, Some(&target)).unwrap();
    assert_eq!(sent, 3);

    for (receiver, expected) in receivers.iter().zip(payloads.iter()) {
        let mut buffers = vec![vec![0u8; 16]];
        let report = receiver.recvmsg(&mut buffers, None, true).await.unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(&buffers[0], expected);
    }
}

#[tokio::test]
async fn multi_datagram_recvmsg_drains_everything_already_queued() {
    let protocol = harness();

    let sender = SwiftSocket::create(&protocol);
    sender.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 1)).unwrap();

    let receiver = SwiftSocket::create(&protocol);
    receiver.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 40)).unwrap();

    let target = AddressRecord {
        destinations: vec![Destination::new(Ipv4Addr::LOCALHOST, 40)],
    };
    for payload in [&b"a"[..], &b"b"[..], &b"c"[..]] {
        sender.sendmsg(&[payload], Some(&target)).unwrap();
    }

    let mut buffers = vec![vec![0u8; 8]; 5];
    let mut from = AddressRecord::default();
    let report = receiver
        .recvmsg(&mut buffers, Some(&mut from), true)
        .await
        .unwrap();

    assert_eq!(report.count, 3);
    assert_eq!(from.destinations.len(), 3);
    assert_eq!(buffers[0], b"a");
    assert_eq!(buffers[1], b"b");
    assert_eq!(buffers[2], b"c");
}

#[tokio::test]
async fn a_datagram_with_a_zero_destination_port_never_reaches_any_socket() {
    let protocol = harness();

    let receiver = SwiftSocket::create(&protocol);
    receiver.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 50)).unwrap();

    // src=9, dst=0, length=4 (header only): crafted directly rather than
    // through sendmsg, which would refuse to construct this in the first
    // place. This exercises the inbound header validator itself.
    let malformed = [9u8, 0u8, 0u8, 4u8];
    protocol.handle_inbound(&malformed, Ipv4Addr::LOCALHOST);

    let mut buffers = vec![vec![0u8; 8]];
    let err = receiver.recvmsg(&mut buffers, None, true).await.unwrap_err();
    assert!(matches!(err, swift_mptp::SwiftError::WouldBlock));
    assert_eq!(protocol.stats().malformed_dropped, 1);
}

#[test]
fn binding_an_already_bound_port_fails_with_address_in_use() {
    let protocol = harness();

    let first = SwiftSocket::create(&protocol);
    first.bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 60)).unwrap();

    let second = SwiftSocket::create(&protocol);
    let err = second
        .bind(&AddressRecord::single(Ipv4Addr::UNSPECIFIED, 60))
        .unwrap_err();

    assert!(matches!(err, swift_mptp::SwiftError::AddressInUse));
}
