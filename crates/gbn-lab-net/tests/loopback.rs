use std::net::SocketAddr;
use std::time::Duration;

use gbn_lab_abstract::{ArqConfig, FrameMode};
use gbn_lab_net::{NetConfig, NetError, UdpTransport, receiver_endpoint, run_sender};

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// Bind a receiver on an ephemeral loopback port and serve it in the background.
async fn spawn_receiver(arq: &ArqConfig, net: &NetConfig) -> SocketAddr {
    let transport = UdpTransport::bind(loopback()).await.unwrap();
    let addr = transport.local_addr();
    let mut endpoint = receiver_endpoint(arq, net, transport);
    tokio::spawn(async move { endpoint.run().await });
    addr
}

fn net_config(receiver_addr: SocketAddr) -> NetConfig {
    NetConfig {
        receiver_addr,
        sender_bind: loopback(),
        reply_delay_ms: 0,
        ..NetConfig::default()
    }
}

#[tokio::test]
async fn lossless_transfer_over_loopback() {
    let arq = ArqConfig {
        total_units: 20,
        window_size: 4,
        timeout_ms: 200,
        ..ArqConfig::lossless()
    };
    let receiver = spawn_receiver(&arq, &net_config(loopback())).await;

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        run_sender(&arq, &net_config(receiver)),
    )
    .await
    .expect("transfer timed out")
    .expect("transfer failed");

    assert!(report.complete);
    assert_eq!(report.base, 20);
    assert_eq!(report.summary.stats.packets_sent, 20);
    assert_eq!(report.summary.stats.timeouts, 0);
    assert_eq!(report.summary.bytes_sent, 20 * 1024);
}

#[tokio::test]
async fn lossy_transfer_recovers_by_retransmission() {
    let arq = ArqConfig {
        total_units: 30,
        window_size: 5,
        unit_size: 128,
        timeout_ms: 50,
        bit_error_prob: 0.1,
        packet_loss_prob: 0.1,
        frame_mode: FrameMode::Sequenced,
        seed: Some(11),
        ..ArqConfig::default()
    };
    let receiver = spawn_receiver(&arq, &net_config(loopback())).await;

    let report = tokio::time::timeout(
        Duration::from_secs(60),
        run_sender(&arq, &net_config(receiver)),
    )
    .await
    .expect("transfer timed out")
    .expect("transfer failed");

    assert!(report.complete);
    assert!(report.summary.stats.packets_sent >= 30);
}

#[tokio::test]
async fn receiver_acks_with_decimal_text_after_delay() {
    let arq = ArqConfig::lossless();
    let net = NetConfig {
        reply_delay_ms: 50,
        ..NetConfig::default()
    };
    let receiver = spawn_receiver(&arq, &net).await;

    let probe = UdpTransport::bind(loopback()).await.unwrap();
    let mut buf = [0u8; 64];
    for expected in [b"0".as_slice(), b"1".as_slice()] {
        let sent_at = tokio::time::Instant::now();
        probe.send_to(&[b'X'; 1024], receiver).await.unwrap();
        let (n, from) = probe
            .recv_timeout(&mut buf, Some(Duration::from_secs(2)))
            .await
            .unwrap()
            .expect("no ack");
        assert_eq!(&buf[..n], expected);
        assert_eq!(from, receiver);
        assert!(sent_at.elapsed() >= Duration::from_millis(50));
    }
}

#[tokio::test]
async fn sender_gives_up_on_silent_peer() {
    let arq = ArqConfig {
        total_units: 3,
        timeout_ms: 20,
        max_retries: Some(2),
        ..ArqConfig::lossless()
    };
    // Bound but never read: every datagram goes unanswered.
    let silent = UdpTransport::bind(loopback()).await.unwrap();

    let report = run_sender(&arq, &net_config(silent.local_addr()))
        .await
        .unwrap();
    assert!(report.aborted);
    assert!(!report.complete);
    assert_eq!(report.summary.stats.timeouts, 3);
    assert_eq!(report.summary.stats.retransmissions, 6);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_binding() {
    let arq = ArqConfig {
        window_size: 0,
        ..ArqConfig::default()
    };
    let err = run_sender(&arq, &NetConfig::default()).await.unwrap_err();
    assert!(matches!(err, NetError::Config(_)));
}
