//! Live update hub.
//!
//! Fans every committed board change out to connected viewers and keeps a
//! bounded window of recent broadcasts so a reconnecting viewer can catch up
//! from its last seen sequence number.

use crate::{
    config::HubConfig,
    domain::CardView,
    error::Result,
    notifier::ChangeNotifier,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MAX_CHANNEL_CAPACITY: usize = 1 << 20;

/// Payload pushed to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoardMessage {
    /// Full ordered card list after a change; never a diff
    CardChanged { cards: Vec<CardView> },
}

/// What a subscriber receives on its channel
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Message {
        seq: u64,
        message: Arc<BoardMessage>,
    },
    /// Keep-alive marker: no sequence number, never buffered
    Heartbeat,
}

impl HubEvent {
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Message { seq, .. } => Some(*seq),
            Self::Heartbeat => None,
        }
    }

    /// Encodes the event as a text/event-stream frame
    pub fn to_sse_frame(&self) -> Result<String> {
        match self {
            Self::Message { seq, message } => {
                let data = serde_json::to_string(message.as_ref())?;
                Ok(format!("id: {}\ndata: {}\n\n", seq, data))
            }
            Self::Heartbeat => Ok(": keep-alive\n\n".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one subscriber channel. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Receiving its initial snapshot and replay; held inside `subscribe`
    Connecting,
    Active,
    Closed,
}

/// Options for [`LiveUpdateHub::subscribe`]
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Full refresh delivered first, tagged with the latest sequence number
    pub initial: Option<BoardMessage>,
    /// Replay buffered broadcasts newer than this sequence number
    pub last_seen: Option<u64>,
}

impl SubscribeOptions {
    pub fn with_initial(mut self, message: BoardMessage) -> Self {
        self.initial = Some(message);
        self
    }

    pub fn with_last_seen(mut self, seq: u64) -> Self {
        self.last_seen = Some(seq);
        self
    }
}

/// A viewer's end of the hub
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<HubEvent>,
}

#[derive(Debug)]
struct HubState {
    last_seq: u64,
    buffer: VecDeque<(u64, Arc<BoardMessage>)>,
    subscribers: HashMap<SubscriberId, mpsc::Sender<HubEvent>>,
    next_subscriber: u64,
}

/// Publish/subscribe broadcaster with a bounded replay window.
///
/// One instance per process, shared by `Arc`. Delivery never blocks: each
/// subscriber has its own bounded channel fed with `try_send`. A subscriber
/// whose channel is full is closed so it can reconnect and replay; a
/// subscriber whose receiver is gone is closed as well. Neither affects the
/// others.
#[derive(Debug)]
pub struct LiveUpdateHub {
    config: HubConfig,
    state: Mutex<HubState>,
}

impl Default for LiveUpdateHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl LiveUpdateHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            state: Mutex::new(HubState {
                last_seq: 0,
                buffer: VecDeque::new(),
                subscribers: HashMap::new(),
                next_subscriber: 1,
            }),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Room for a full replay plus the initial snapshot. Unvalidated configs
    // are clamped so channel creation cannot panic.
    fn channel_capacity(&self) -> usize {
        self.config
            .subscriber_buffer
            .max(self.config.retention.saturating_add(2))
            .clamp(1, MAX_CHANNEL_CAPACITY)
    }

    /// Registers a new viewer channel.
    ///
    /// Initial snapshot and replay are queued while the hub is locked, so no
    /// broadcast can slip in between them and the live stream.
    pub fn subscribe(&self, options: SubscribeOptions) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.channel_capacity());
        let mut state = self.lock();
        let id = SubscriberId(state.next_subscriber);
        state.next_subscriber += 1;

        let mut queued = Vec::new();
        if let Some(initial) = options.initial {
            queued.push(HubEvent::Message {
                seq: state.last_seq,
                message: Arc::new(initial),
            });
        }
        if let Some(last_seen) = options.last_seen {
            queued.extend(
                state
                    .buffer
                    .iter()
                    .filter(|(seq, _)| *seq > last_seen)
                    .map(|(seq, message)| HubEvent::Message {
                        seq: *seq,
                        message: Arc::clone(message),
                    }),
            );
        }
        let replayed = queued.len();
        for event in queued {
            // Capacity covers the whole window; failure means the receiver is gone.
            if sender.try_send(event).is_err() {
                tracing::debug!(subscriber = %id, "subscriber closed during replay");
                return Subscription { id, receiver };
            }
        }

        state.subscribers.insert(id, sender);
        tracing::debug!(
            subscriber = %id,
            replayed,
            active = state.subscribers.len(),
            "subscriber connected"
        );
        Subscription { id, receiver }
    }

    /// Removes a subscriber; returns whether it was still active
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "subscriber disconnected");
        }
        removed
    }

    /// Assigns the next sequence number, buffers and fans out the message
    pub fn broadcast(&self, message: BoardMessage) -> u64 {
        let message = Arc::new(message);
        let mut state = self.lock();
        state.last_seq += 1;
        let seq = state.last_seq;

        state.buffer.push_back((seq, Arc::clone(&message)));
        while state.buffer.len() > self.config.retention {
            state.buffer.pop_front();
        }

        state.subscribers.retain(|id, sender| {
            let event = HubEvent::Message {
                seq,
                message: Arc::clone(&message),
            };
            match sender.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, seq, "subscriber lagging; closing channel");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "subscriber channel closed");
                    false
                }
            }
        });
        seq
    }

    /// Sends a keep-alive marker to every subscriber
    pub fn heartbeat(&self) {
        let mut state = self.lock();
        // A full channel already has traffic pending, so skipping is harmless.
        state.subscribers.retain(|_, sender| {
            !matches!(
                sender.try_send(HubEvent::Heartbeat),
                Err(TrySendError::Closed(_))
            )
        });
        tracing::trace!(active = state.subscribers.len(), "heartbeat sent");
    }

    /// Sends heartbeats on the configured interval until the hub is dropped
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let hub: Weak<Self> = Arc::downgrade(self);
        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match hub.upgrade() {
                    Some(hub) => hub.heartbeat(),
                    None => break,
                }
            }
        })
    }

    pub fn state(&self, id: SubscriberId) -> Option<SubscriberState> {
        let state = self.lock();
        if state.subscribers.contains_key(&id) {
            Some(SubscriberState::Active)
        } else if id.0 < state.next_subscriber {
            Some(SubscriberState::Closed)
        } else {
            None
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Sequence number of the most recent broadcast, 0 before the first
    pub fn latest_sequence(&self) -> u64 {
        self.lock().last_seq
    }

    /// Sequence numbers currently available for replay, oldest first
    pub fn retained_sequences(&self) -> Vec<u64> {
        self.lock().buffer.iter().map(|(seq, _)| *seq).collect()
    }
}

/// Bridges board changes into hub broadcasts
#[derive(Debug, Clone)]
pub struct HubNotifier {
    hub: Arc<LiveUpdateHub>,
}

impl HubNotifier {
    pub fn new(hub: Arc<LiveUpdateHub>) -> Self {
        Self { hub }
    }
}

impl ChangeNotifier for HubNotifier {
    fn notify_board_updated(&self, actor: &str, cards: &[CardView]) {
        let seq = self.hub.broadcast(BoardMessage::CardChanged {
            cards: cards.to_vec(),
        });
        tracing::debug!(actor, seq, cards = cards.len(), "board change broadcast");
    }
}
