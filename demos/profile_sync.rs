//! Profile Sync Example
//!
//! A server-side profile replicated to one client through a buffered
//! peer channel: a full snapshot on connect, then deltas.
//!
//! Run with: cargo run --example profile_sync

use obsync::net::{BufferedPeerChannel, ChannelConfig, DeliveryMethod, MemoryTransport, PeerId};
use obsync::observable::{ObservableIntMap, ObservableProfile, ObservableStringMap};
use std::sync::Arc;

fn profile() -> ObservableProfile {
    ObservableProfile::new()
        .with_property(ObservableStringMap::new(1))
        .and_then(|p| p.with_property(ObservableIntMap::new(2)))
        .expect("distinct property keys")
}

#[tokio::main]
async fn main() {
    println!("=== Profile Sync Example ===\n");

    let mut server = profile();
    let mut client = profile();

    let transport = Arc::new(MemoryTransport::new());
    let mut remote = transport.take_receiver().expect("fresh transport");
    let channel = BufferedPeerChannel::spawn(
        PeerId::new("client-1"),
        transport.clone(),
        ChannelConfig::default(),
    )
    .expect("inside a tokio runtime");

    // Seed some state before the client connects
    {
        let names = server.container_mut::<String, String>(1).unwrap();
        names.set_value("guild", Some("Night Owls".to_string()));
        names.set_value("title", Some("Warden".to_string()));
    }
    server.collect_updates();

    // The snapshot is held for the grace period
    let outcome = channel.send(server.to_bytes(), DeliveryMethod::ReliableSequenced).await.unwrap();
    println!("Snapshot send outcome: {:?}", outcome);
    println!("Pending while buffering: {}\n", channel.pending_len());

    // Mutate and ship a delta
    server.container_mut::<i32, i32>(2).unwrap().set_value(10, 250);
    server.container_mut::<String, String>(1).unwrap().set_value("title", None);
    let delta = server.collect_updates().expect("dirty profile");
    println!("Delta frame: {} bytes", delta.len());
    channel.send(delta, DeliveryMethod::ReliableSequenced).await.unwrap();

    // Both messages arrive once the grace delay passes
    let (snapshot, _) = remote.recv().await.unwrap();
    client.from_bytes(&snapshot).unwrap();
    let (delta, _) = remote.recv().await.unwrap();
    client.apply_updates(&delta).unwrap();

    println!("Server: {}", server.to_json());
    println!("Client: {}", client.to_json());
    assert_eq!(server.to_json(), client.to_json());

    channel.disconnect("demo finished").await.unwrap();
    println!("\n✓ Client converged with the server");
}
