//! Integration tests for the tunnel session

use async_trait::async_trait;
use bytes::Bytes;
use neko_core::{DomainRule, Layout, LogStore, RuleStore};
use neko_platform::{
    AddressFamily, ChannelFlow, FlowPacket, PacketFlow, PlatformError, TunnelSettings,
};
use neko_tunnel::{SessionConfig, SessionState, TunnelError, TunnelSession};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn dns_message(domain: &str) -> Vec<u8> {
    let mut msg = vec![0x51, 0x0A, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
    for label in domain.split('.') {
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0);
    msg.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    msg
}

fn ipv4_query(domain: &str) -> FlowPacket {
    let payload = dns_message(domain);
    let udp_len = (8 + payload.len()) as u16;
    let total_len = 20 + udp_len;
    let mut packet = vec![
        0x45, 0x00,
        (total_len >> 8) as u8, (total_len & 0xFF) as u8,
        0x00, 0x01, 0x00, 0x00,
        0x40, 0x11, 0x00, 0x00,
        0xC0, 0xA8, 0x00, 0x0A, // 192.168.0.10
        0x08, 0x08, 0x08, 0x08, // 8.8.8.8
        0xD4, 0x31, 0x00, 0x35, // 54321 -> 53
        (udp_len >> 8) as u8, (udp_len & 0xFF) as u8,
        0x00, 0x00,
    ];
    packet.extend_from_slice(&payload);
    FlowPacket::new(packet, AddressFamily::Inet)
}

fn tcp_packet() -> FlowPacket {
    let mut packet = vec![0u8; 40];
    packet[0] = 0x45;
    packet[3] = 40;
    packet[9] = 6;
    FlowPacket::new(packet, AddressFamily::Inet)
}

fn session_config(dir: &Path, rules: Vec<DomainRule>) -> SessionConfig {
    let rules_path = dir.join("rules.json");
    RuleStore::with_rules(&rules_path, rules).save().unwrap();

    SessionConfig {
        settings: TunnelSettings::default(),
        layout: Layout::Layered,
        dns_port: 53,
        rules_path,
        logs_path: dir.join("logs.json"),
        log_capacity: 100,
        resume_history: true,
    }
}

async fn wait_for_state(handle: &neko_tunnel::SessionHandle, state: SessionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session did not reach expected state");
}

#[tokio::test]
async fn test_batch_is_written_back_in_order() {
    let dir = TempDir::new().unwrap();
    let config = session_config(dir.path(), vec![DomainRule::block("ads.")]);
    let (flow, mut peer) = ChannelFlow::pair(4);
    let mut session = TunnelSession::new(flow, config);

    let blocked = ipv4_query("static.ads.example.com");
    let allowed = ipv4_query("example.com");
    let other = tcp_packet();
    peer.send_batch(vec![blocked.clone(), allowed.clone(), other.clone()])
        .await
        .unwrap();
    peer.finish();

    let summary = session.run().await.unwrap();
    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.packets, 3);
    assert_eq!(summary.blocked, 1);
    assert_eq!(summary.allowed, 1);
    assert_eq!(summary.passed_through, 1);
    assert_eq!(summary.persistence_failures, 0);

    let written = peer.recv_written().await.unwrap();
    assert_eq!(written.len(), 3);

    // Spoofed reply keeps length and family, comes from the resolver
    assert_eq!(written[0].family, AddressFamily::Inet);
    assert_eq!(written[0].data.len(), blocked.data.len());
    assert_ne!(written[0].data, blocked.data);
    assert_eq!(&written[0].data[12..16], &[8, 8, 8, 8]);
    assert_eq!(written[0].data[28 + 2], blocked.data[28 + 2] | 0x84);

    assert_eq!(written[1], allowed);
    assert_eq!(written[2], other);

    assert_eq!(peer.settings(), Some(TunnelSettings::default()));
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_decisions_are_logged_most_recent_first() {
    let dir = TempDir::new().unwrap();
    let config = session_config(dir.path(), vec![DomainRule::block("ads.")]);
    let logs_path = config.logs_path.clone();
    let (flow, mut peer) = ChannelFlow::pair(4);

    peer.send_batch(vec![ipv4_query("static.ads.example.com")])
        .await
        .unwrap();
    peer.send_batch(vec![ipv4_query("example.com"), tcp_packet()])
        .await
        .unwrap();
    peer.finish();

    TunnelSession::new(flow, config).run().await.unwrap();

    let entries = LogStore::read(&logs_path).unwrap();
    let decisions: Vec<_> = entries.iter().map(|e| (e.domain.as_str(), e.blocked)).collect();
    assert_eq!(
        decisions,
        vec![("example.com", false), ("static.ads.example.com", true)]
    );
}

#[tokio::test]
async fn test_rules_are_read_once_at_start() {
    let dir = TempDir::new().unwrap();
    let config = session_config(dir.path(), vec![]);
    let rules_path = config.rules_path.clone();
    let (flow, mut peer) = ChannelFlow::pair(4);

    let mut session = TunnelSession::new(flow, config);
    let handle = session.handle();
    let task = tokio::spawn(async move { session.run().await });

    wait_for_state(&handle, SessionState::Running).await;

    // Changing the rules mid-session has no effect
    RuleStore::with_rules(&rules_path, vec![DomainRule::block("example")])
        .save()
        .unwrap();
    let query = ipv4_query("example.com");
    peer.send_batch(vec![query.clone()]).await.unwrap();
    assert_eq!(peer.recv_written().await.unwrap(), vec![query]);

    handle.stop();
    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.blocked, 0);
}

#[tokio::test]
async fn test_stop_abandons_pending_read() {
    let dir = TempDir::new().unwrap();
    let (flow, mut peer) = ChannelFlow::pair(4);
    let mut session = TunnelSession::new(flow, session_config(dir.path(), vec![]));
    let handle = session.handle();
    assert_eq!(handle.state(), SessionState::Idle);

    let task = tokio::spawn(async move { session.run().await });

    peer.send_batch(vec![ipv4_query("example.com")]).await.unwrap();
    assert_eq!(peer.recv_written().await.unwrap().len(), 1);
    wait_for_state(&handle, SessionState::Running).await;

    // The session is now parked in a read with nothing queued
    handle.stop();
    let summary = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stop did not interrupt the pending read")
        .unwrap()
        .unwrap();

    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.batches, 1);
    assert_eq!(handle.state(), SessionState::Stopped);
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_stop_before_run() {
    let dir = TempDir::new().unwrap();
    let (flow, peer) = ChannelFlow::pair(4);
    peer.send_batch(vec![ipv4_query("example.com")]).await.unwrap();

    let mut session = TunnelSession::new(flow, session_config(dir.path(), vec![]));
    let handle = session.handle();
    handle.stop();
    assert!(handle.is_stop_requested());

    let summary = session.run().await.unwrap();
    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.batches, 0);
    assert!(peer.settings().is_some());
}

#[tokio::test]
async fn test_run_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (flow, mut peer) = ChannelFlow::pair(1);
    peer.finish();

    let mut session = TunnelSession::new(flow, session_config(dir.path(), vec![]));
    session.run().await.unwrap();

    assert!(matches!(
        session.run().await,
        Err(TunnelError::AlreadyStarted(SessionState::Stopped))
    ));
}

#[tokio::test]
async fn test_persistence_failure_does_not_stop_session() {
    let dir = TempDir::new().unwrap();
    let mut config = session_config(dir.path(), vec![DomainRule::block("ads.")]);
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    config.logs_path = blocker.join("logs.json");

    let (flow, mut peer) = ChannelFlow::pair(4);
    peer.send_batch(vec![ipv4_query("ads.example.com"), ipv4_query("example.com")])
        .await
        .unwrap();
    peer.finish();

    let summary = TunnelSession::new(flow, config).run().await.unwrap();
    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.persistence_failures, 2);
    assert_eq!(peer.recv_written().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fixed_offset_layout() {
    let dir = TempDir::new().unwrap();
    let mut config = session_config(dir.path(), vec![DomainRule::block("tracker")]);
    config.layout = Layout::FixedOffset;

    let query = FlowPacket::new(Bytes::from(dns_message("tracker.net")), AddressFamily::Inet);
    let (flow, mut peer) = ChannelFlow::pair(1);
    peer.send_batch(vec![query.clone()]).await.unwrap();
    peer.finish();

    let summary = TunnelSession::new(flow, config).run().await.unwrap();
    assert_eq!(summary.blocked, 1);

    let written = peer.recv_written().await.unwrap();
    let mut expected = query.data.to_vec();
    expected[2] |= 0x84;
    assert_eq!(written[0].data.as_ref(), expected.as_slice());
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FailAt {
    Configure,
    Read,
    Write,
}

/// Flow that serves one batch and fails at the chosen phase
struct FailingFlow {
    fail_at: FailAt,
    closed: bool,
}

#[async_trait]
impl PacketFlow for FailingFlow {
    async fn configure(&mut self, _settings: &TunnelSettings) -> neko_platform::Result<()> {
        if self.fail_at == FailAt::Configure {
            return Err(PlatformError::ConfigurationRejected("permission denied".into()));
        }
        Ok(())
    }

    async fn read_packets(&mut self) -> neko_platform::Result<Option<Vec<FlowPacket>>> {
        if self.fail_at == FailAt::Read {
            return Err(PlatformError::ReadFailed("interface gone".into()));
        }
        Ok(Some(vec![ipv4_query("example.com")]))
    }

    async fn write_packets(&mut self, _packets: Vec<FlowPacket>) -> neko_platform::Result<()> {
        Err(PlatformError::WriteFailed("no buffer space".into()))
    }

    async fn close(&mut self) -> neko_platform::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[tokio::test]
async fn test_interface_failures_fault_the_session() {
    for fail_at in [FailAt::Configure, FailAt::Read, FailAt::Write] {
        let dir = TempDir::new().unwrap();
        let flow = FailingFlow {
            fail_at,
            closed: false,
        };
        let mut session = TunnelSession::new(flow, session_config(dir.path(), vec![]));

        let err = session.run().await.unwrap_err();
        match fail_at {
            FailAt::Configure => assert!(matches!(err, TunnelError::Configure(_))),
            FailAt::Read => assert!(matches!(err, TunnelError::Read(_))),
            FailAt::Write => assert!(matches!(err, TunnelError::Write(_))),
        }

        assert_eq!(session.state(), SessionState::Faulted);
        assert_eq!(session.summary().state, SessionState::Faulted);
        assert_eq!(session.summary().batches, 0);
        assert!(session.flow().closed);
    }
}
