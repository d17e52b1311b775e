//! Integration tests for the replay flow

use neko_platform::{
    parse_batches, AddressFamily, FlowPacket, PacketFlow, PlatformError, ReplayFlow,
    TunnelSettings,
};
use std::time::Duration;
use tempfile::TempDir;

const CAPTURE: &str = "\
# DNS query for example.com over IPv4
4 450000390001000040110000c0a80101080808080400003500250000abcd01000001000000000000076578616d706c6503636f6d0000010001

# two packets in one batch
4 4500
6 6000
";

#[tokio::test]
async fn test_replay_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.txt");
    std::fs::write(&path, CAPTURE).unwrap();

    let mut flow = ReplayFlow::from_file(&path).await.unwrap();
    assert_eq!(flow.remaining(), 2);

    let first = flow.read_packets().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].family, AddressFamily::Inet);

    let second = flow.read_packets().await.unwrap().unwrap();
    let families: Vec<_> = second.iter().map(|p| p.family).collect();
    assert_eq!(families, vec![AddressFamily::Inet, AddressFamily::Inet6]);
}

#[tokio::test]
async fn test_written_output_replays() {
    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("out.txt");
    let output = tokio::fs::File::create(&out_path).await.unwrap();

    let mut flow = ReplayFlow::from_text(CAPTURE).unwrap().with_output(output);
    flow.configure(&TunnelSettings::default()).await.unwrap();

    while let Some(batch) = flow.read_packets().await.unwrap() {
        flow.write_packets(batch).await.unwrap();
    }
    flow.close().await.unwrap();
    assert_eq!(flow.packets_written(), 3);

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(
        parse_batches(&written).unwrap(),
        parse_batches(CAPTURE).unwrap()
    );
}

#[tokio::test]
async fn test_closed_flow_rejects_io() {
    let mut flow = ReplayFlow::from_text(CAPTURE).unwrap();
    flow.close().await.unwrap();

    assert!(matches!(flow.read_packets().await, Err(PlatformError::Closed)));
    assert!(matches!(
        flow.write_packets(vec![FlowPacket::detect(vec![0x45u8])]).await,
        Err(PlatformError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_batch_delay() {
    let mut flow = ReplayFlow::from_text("4500\n")
        .unwrap()
        .with_batch_delay(Duration::from_millis(250));

    let start = tokio::time::Instant::now();
    assert!(flow.read_packets().await.unwrap().is_some());
    assert!(start.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let result = ReplayFlow::from_file("/nonexistent/capture.txt").await;
    assert!(matches!(result, Err(PlatformError::Io(_))));
}
