//! Control port end to end: datagram -> queue -> processor -> registry -> hub

use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use udp_media_bridge::events::EventPublisher;
use udp_media_bridge::hub::{CommandDispatch, Hub};
use udp_media_bridge::network::{control_queue, CommandSender, ControlListener, ControlProcessor};
use udp_media_bridge::recordings::{RecordingRegistry, TransferTracker};
use udp_media_bridge::state::BridgeState;

async fn next_message(rx: &mut mpsc::Receiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("hub message within timeout")
        .expect("hub channel open")
}

#[tokio::test]
async fn test_file_transfer_and_alarm_reach_web_clients() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(RecordingRegistry::new());
    let state = Arc::new(BridgeState::new());
    let commands: Arc<dyn CommandDispatch> = Arc::new(CommandSender::start("", 5005, "key".into()).unwrap());
    let hub = Arc::new(Hub::new(registry.clone(), state.clone(), commands));
    let tracker = Arc::new(TransferTracker::new(dir.path().join("received"), registry.clone()));
    let events = EventPublisher::new(state.clone(), hub.clone());

    let (tx, rx) = control_queue(64);
    let processor = ControlProcessor::new(tracker, events).spawn(rx).unwrap();
    let listener = ControlListener::bind("127.0.0.1:0".parse().unwrap(), 256 * 1024, tx).unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let listener_task = tokio::spawn(listener.run(shutdown.clone()));

    let (_client, mut inbox) = hub.connect("integration");
    assert_eq!(next_message(&mut inbox).await, "ROLE:OWNER");
    while inbox.try_recv().is_ok() {}

    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for line in [
        "FILE_START:clip.wav:2",
        "FILE_CHUNK:clip.wav:0:SGVsbG8s",
        "FILE_CHUNK:clip.wav:1:IHdvcmxk",
        "FILE_END:clip.wav",
        "!",
    ] {
        device.send_to(line.as_bytes(), addr).await.unwrap();
    }

    assert_eq!(next_message(&mut inbox).await, "FILE_START:clip.wav:2");
    assert_eq!(next_message(&mut inbox).await, "FILE_PROGRESS:clip.wav:2/2");
    let end = next_message(&mut inbox).await;
    assert!(end.starts_with("FILE_END:clip.wav:clip.wav_"), "{}", end);
    let listing = next_message(&mut inbox).await;
    assert!(listing.starts_with("REC_LIST:"));
    assert!(listing.contains("\"name\":\"clip.wav\""));
    assert_eq!(next_message(&mut inbox).await, "ALARM:SOS_ACTIVE");

    let recording = registry.find_by_id_or_name("clip.wav").unwrap();
    assert_eq!(std::fs::read(&recording.path).unwrap(), b"Hello, world");
    assert_eq!(recording.size_bytes, 12);
    assert!(state.is_distress_active());

    shutdown.cancel();
    listener_task.await.unwrap().unwrap();
    processor.join().unwrap();
}
