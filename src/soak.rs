//! Replication soak run.
//!
//! An authority profile is mutated by a seeded random stream while a set of
//! mirror peers follow it through grace-buffered channels. Every mirror must
//! end up identical to the authority.

use async_stream::stream;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use obsync_net::{
    BufferedPeerChannel, ChannelConfigBuilder, ChannelError, DeliveryMethod, MemoryTransport,
    PeerId, SendOutcome, Transmitted,
};
use obsync_observable::{
    ObservableIntMap, ObservableKey, ObservableProfile, ObservableStringMap, ProfileError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Property key of the display-name container.
pub const NAMES_KEY: ObservableKey = 1;
/// Property key of the score container.
pub const SCORES_KEY: ObservableKey = 2;

const FRAME_SNAPSHOT: u8 = 0;
const FRAME_DELTA: u8 = 1;
const FRAME_DONE: u8 = 2;

#[derive(Error, Debug)]
pub enum SoakError {
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("peer {0} stopped receiving before the run finished")]
    Incomplete(PeerId),

    #[error("peer {0} diverged from the authority")]
    Diverged(PeerId),

    #[error("peer {peer} received {actual} frames, expected {expected}")]
    FrameCountMismatch {
        peer: PeerId,
        expected: usize,
        actual: usize,
    },

    #[error("mirror task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Parameters of a soak run.
#[derive(Clone, Debug)]
pub struct SoakConfig {
    pub peers: usize,
    pub operations: usize,
    /// Mutations between two delta broadcasts.
    pub batch_size: usize,
    pub key_space: u32,
    pub grace_delay: Duration,
    pub seed: u64,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            peers: 4,
            operations: 10_000,
            batch_size: 50,
            key_space: 64,
            grace_delay: Duration::from_millis(20),
            seed: 7,
        }
    }
}

impl SoakConfig {
    /// Read `[peers] [operations] [batch_size] [seed]` positionally.
    ///
    /// Missing or unparsable values keep their defaults.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let defaults = Self::default();
        let mut args = args.into_iter();

        Self {
            peers: parse_arg(args.next(), "peers", defaults.peers).max(1),
            operations: parse_arg(args.next(), "operations", defaults.operations),
            batch_size: parse_arg(args.next(), "batch_size", defaults.batch_size).max(1),
            seed: parse_arg(args.next(), "seed", defaults.seed),
            ..defaults
        }
    }
}

fn parse_arg<T: FromStr + std::fmt::Display>(arg: Option<String>, name: &str, default: T) -> T {
    match arg {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(argument = name, value = %raw, %default, "unparsable argument, using default");
            default
        }),
    }
}

/// Statistics collected during a soak run
#[derive(Clone, Debug)]
pub struct SoakStats {
    pub peers: usize,
    pub operations: usize,
    /// Frames every mirror received; all mirrors see the same stream.
    pub frames_per_peer: usize,
    pub queued_frames: usize,
    pub bytes_sent: usize,
    pub total_time: Duration,
    pub ops_per_second: f64,
}

impl SoakStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Replication Soak Statistics                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Mirror Peers:              {:>30} ║", self.peers);
        println!("║  Mutations:                 {:>30} ║", self.operations);
        println!("║  Frames per Peer:           {:>30} ║", self.frames_per_peer);
        println!("║  Frames Held During Grace:  {:>30} ║", self.queued_frames);
        println!("║  Bytes Transmitted:         {:>30} ║", self.bytes_sent);
        let seconds = format!("{:.3}", self.total_time.as_secs_f64());
        println!("║  Total Time:                {:>29}s ║", seconds);
        println!("║  Mutations/Second:          {:>30.0} ║", self.ops_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

#[derive(Clone, Debug)]
enum Mutation {
    Rename(String, Option<String>),
    Forget(String),
    Score(i32, i32),
    ClearScore(i32),
}

/// Generator that yields a reproducible mix of container mutations
fn mutation_generator(
    seed: u64,
    operations: usize,
    key_space: u32,
) -> impl Stream<Item = Mutation> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        let span = key_space.max(1) as i32;
        for _ in 0..operations {
            let mutation = match rng.gen_range(0..10) {
                0..=3 => {
                    let key = format!("player_{}", rng.gen_range(0..span));
                    // a None assignment removes the entry
                    let value = if rng.gen_bool(0.1) {
                        None
                    } else {
                        Some(format!("name_{}", rng.gen::<u16>()))
                    };
                    Mutation::Rename(key, value)
                }
                4 => Mutation::Forget(format!("player_{}", rng.gen_range(0..span))),
                5..=8 => Mutation::Score(rng.gen_range(-span..span), rng.gen()),
                _ => Mutation::ClearScore(rng.gen_range(-span..span)),
            };
            yield mutation;
        }
    }
}

/// A profile with the two containers every soak participant shares.
pub fn new_profile() -> Result<ObservableProfile, ProfileError> {
    ObservableProfile::new()
        .with_property(ObservableStringMap::new(NAMES_KEY))?
        .with_property(ObservableIntMap::new(SCORES_KEY))
}

fn apply(profile: &mut ObservableProfile, mutation: Mutation) {
    match mutation {
        Mutation::Rename(key, value) => {
            if let Some(names) = profile.container_mut::<String, String>(NAMES_KEY) {
                names.set_value(key, value);
            }
        }
        Mutation::Forget(key) => {
            if let Some(names) = profile.container_mut::<String, String>(NAMES_KEY) {
                names.remove(key);
            }
        }
        Mutation::Score(key, value) => {
            if let Some(scores) = profile.container_mut::<i32, i32>(SCORES_KEY) {
                scores.set_value(key, value);
            }
        }
        Mutation::ClearScore(key) => {
            if let Some(scores) = profile.container_mut::<i32, i32>(SCORES_KEY) {
                scores.remove(key);
            }
        }
    }
}

fn envelope(tag: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 1);
    buf.put_u8(tag);
    buf.put_slice(payload);
    buf.freeze()
}

/// Follow the authority until the closing frame arrives.
async fn run_mirror(
    peer: PeerId,
    mut remote: UnboundedReceiver<Transmitted>,
) -> Result<(ObservableProfile, usize), SoakError> {
    let mut profile = new_profile()?;
    let mut frames = 0;

    while let Some((message, _delivery)) = remote.recv().await {
        let Some((&tag, payload)) = message.split_first() else {
            warn!(peer = %peer, "empty frame");
            continue;
        };
        frames += 1;

        match tag {
            FRAME_SNAPSHOT => profile.from_bytes(payload)?,
            FRAME_DELTA => profile.apply_updates(payload)?,
            FRAME_DONE => {
                debug!(peer = %peer, frames, "mirror finished");
                return Ok((profile, frames));
            }
            other => warn!(peer = %peer, tag = other, "unknown frame tag"),
        }
    }

    Err(SoakError::Incomplete(peer))
}

struct Mirror {
    channel: Arc<BufferedPeerChannel<MemoryTransport>>,
    task: JoinHandle<Result<(ObservableProfile, usize), SoakError>>,
}

async fn broadcast(
    mirrors: &[Mirror],
    message: Bytes,
    queued: &mut usize,
) -> Result<(), SoakError> {
    for mirror in mirrors {
        let outcome = mirror
            .channel
            .send(message.clone(), DeliveryMethod::ReliableSequenced)
            .await?;
        if outcome == SendOutcome::Queued {
            *queued += 1;
        }
    }
    Ok(())
}

/// Every mirror is sent the same frames, so every mirror must count the same.
fn record_frame_count(
    seen: &mut Option<usize>,
    peer: &PeerId,
    frames: usize,
) -> Result<(), SoakError> {
    match *seen {
        None => *seen = Some(frames),
        Some(expected) if expected != frames => {
            return Err(SoakError::FrameCountMismatch {
                peer: peer.clone(),
                expected,
                actual: frames,
            });
        }
        Some(_) => {}
    }
    Ok(())
}

/// Run one soak pass and verify every mirror converged.
pub async fn run(config: &SoakConfig) -> Result<SoakStats, SoakError> {
    info!(
        peers = config.peers,
        operations = config.operations,
        batch_size = config.batch_size,
        seed = config.seed,
        "starting soak run"
    );
    let start = Instant::now();

    let mut authority = new_profile()?;
    let channel_config = ChannelConfigBuilder::new()
        .grace_delay(config.grace_delay)
        .build();

    let mut mirrors = Vec::with_capacity(config.peers);
    for idx in 0..config.peers {
        let peer = PeerId::new(format!("mirror-{}", idx));
        let transport = Arc::new(MemoryTransport::new());
        let remote = transport
            .take_receiver()
            .ok_or_else(|| SoakError::Incomplete(peer.clone()))?;
        let channel = BufferedPeerChannel::spawn(peer.clone(), transport, channel_config.clone())?;
        let task = tokio::spawn(run_mirror(peer, remote));
        mirrors.push(Mirror { channel, task });
    }

    let mut queued = 0;
    broadcast(&mirrors, envelope(FRAME_SNAPSHOT, &authority.to_bytes()), &mut queued).await?;

    let mut mutations = Box::pin(mutation_generator(
        config.seed,
        config.operations,
        config.key_space,
    ));
    let mut applied = 0;
    while let Some(mutation) = mutations.next().await {
        apply(&mut authority, mutation);
        applied += 1;

        if applied % config.batch_size == 0 {
            if let Some(frame) = authority.collect_updates() {
                broadcast(&mirrors, envelope(FRAME_DELTA, &frame), &mut queued).await?;
            }
            // let the grace timers fire part way through the run
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    if let Some(frame) = authority.collect_updates() {
        broadcast(&mirrors, envelope(FRAME_DELTA, &frame), &mut queued).await?;
    }
    broadcast(&mirrors, envelope(FRAME_DONE, &[]), &mut queued).await?;

    let expected = authority.to_json();
    let mut frames_per_peer = None;
    let mut bytes_sent = 0;

    for mirror in mirrors {
        // no-op when the grace timer already flushed
        mirror.channel.flush().await?;

        let (profile, frames) = mirror.task.await??;
        if profile.to_json() != expected {
            return Err(SoakError::Diverged(mirror.channel.peer_id().clone()));
        }

        record_frame_count(&mut frames_per_peer, mirror.channel.peer_id(), frames)?;
        bytes_sent += mirror
            .channel
            .transport()
            .sent()
            .iter()
            .map(|message| message.len())
            .sum::<usize>();
        mirror.channel.disconnect("soak complete").await?;
    }

    let total_time = start.elapsed();
    info!(elapsed_ms = total_time.as_millis() as u64, "soak run converged");

    Ok(SoakStats {
        peers: config.peers,
        operations: applied,
        frames_per_peer: frames_per_peer.unwrap_or(0),
        queued_frames: queued,
        bytes_sent,
        total_time,
        ops_per_second: applied as f64 / total_time.as_secs_f64().max(f64::EPSILON),
    })
}
