//! End-to-end replication tests.
//!
//! Tests cover:
//! - Snapshot plus deltas through a grace-buffered channel
//! - Late joiners converging from a snapshot taken mid-stream
//! - Corrupt frames leaving a mirror untouched

use obsync::net::{
    BufferedPeerChannel, ChannelConfig, DeliveryMethod, MemoryTransport, PeerId, SendOutcome,
};
use obsync::observable::{ObservableProfile, ProfileError};
use obsync::soak::{new_profile, NAMES_KEY, SCORES_KEY};
use std::sync::Arc;

fn names(profile: &mut ObservableProfile) -> &mut obsync::observable::ObservableStringMap {
    profile.container_mut(NAMES_KEY).unwrap()
}

fn scores(profile: &mut ObservableProfile) -> &mut obsync::observable::ObservableIntMap {
    profile.container_mut(SCORES_KEY).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_then_deltas_through_channel() {
    let mut server = new_profile().unwrap();
    names(&mut server).set_value("p1", Some("Ada".to_string()));
    scores(&mut server).set_value(1, 10);
    server.collect_updates();

    let transport = Arc::new(MemoryTransport::new());
    let mut remote = transport.take_receiver().unwrap();
    let channel = BufferedPeerChannel::spawn(
        PeerId::new("client"),
        transport.clone(),
        ChannelConfig::default(),
    )
    .unwrap();

    let outcome = channel.send(server.to_bytes(), DeliveryMethod::ReliableSequenced).await.unwrap();
    assert_eq!(outcome, SendOutcome::Queued);

    names(&mut server).set_value("p2", Some("Grace".to_string()));
    scores(&mut server).remove(1);
    let delta = server.collect_updates().unwrap();
    channel.send(delta, DeliveryMethod::ReliableSequenced).await.unwrap();

    let mut client = new_profile().unwrap();
    let (snapshot, _) = remote.recv().await.unwrap();
    client.from_bytes(&snapshot).unwrap();
    let (delta, _) = remote.recv().await.unwrap();
    client.apply_updates(&delta).unwrap();

    assert_eq!(client.to_json(), server.to_json());
    assert!(!channel.is_buffering());

    // passthrough from now on
    names(&mut server).set_value("p1", None);
    let delta = server.collect_updates().unwrap();
    assert_eq!(
        channel.send(delta, DeliveryMethod::ReliableSequenced).await.unwrap(),
        SendOutcome::Sent
    );
    let (delta, _) = remote.recv().await.unwrap();
    client.apply_updates(&delta).unwrap();
    assert_eq!(client.to_json(), server.to_json());
}

#[test]
fn test_late_joiner_converges_with_pending_log() {
    let mut server = new_profile().unwrap();
    let mut early = new_profile().unwrap();

    for i in 0..20 {
        scores(&mut server).set_value(i, i * 3);
    }
    early.apply_updates(&server.collect_updates().unwrap()).unwrap();

    names(&mut server).set_value("p9", Some("Lin".to_string()));
    scores(&mut server).set_value(4, -1);

    // the snapshot already contains the uncollected changes
    let mut late = new_profile().unwrap();
    late.from_bytes(&server.to_bytes()).unwrap();

    let delta = server.collect_updates().unwrap();
    early.apply_updates(&delta).unwrap();
    late.apply_updates(&delta).unwrap();

    assert_eq!(early.to_json(), server.to_json());
    assert_eq!(late.to_json(), server.to_json());
}

#[test]
fn test_corrupt_frame_leaves_mirror_untouched() {
    let mut server = new_profile().unwrap();
    let mut client = new_profile().unwrap();
    names(&mut server).set_value("p1", Some("Ada".to_string()));
    client.apply_updates(&server.collect_updates().unwrap()).unwrap();
    let before = client.to_json();

    names(&mut server).set_value("p2", Some("Grace".to_string()));
    scores(&mut server).set_value(7, 70);
    let frame = server.collect_updates().unwrap();

    let result = client.apply_updates(&frame[..frame.len() - 1]);
    assert!(matches!(
        result,
        Err(ProfileError::Property { .. }) | Err(ProfileError::CorruptFrame(_))
    ));
    assert_eq!(client.to_json(), before);
}
