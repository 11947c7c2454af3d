//! Change notification contract between the board service and delivery.

use crate::domain::CardView;
#[cfg(test)]
use std::sync::Mutex;

/// Called once after every committed mutation, before the operation returns.
///
/// Implementations must not fail the mutation: delivery problems are
/// handled (and at most logged) on the implementation's side.
pub trait ChangeNotifier: Send + Sync {
    fn notify_board_updated(&self, actor: &str, cards: &[CardView]);
}

impl<F> ChangeNotifier for F
where
    F: Fn(&str, &[CardView]) + Send + Sync,
{
    fn notify_board_updated(&self, actor: &str, cards: &[CardView]) {
        self(actor, cards)
    }
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify_board_updated(&self, _actor: &str, _cards: &[CardView]) {}
}

/// Keeps every notification in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    calls: Mutex<Vec<(String, Vec<CardView>)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, Vec<CardView>)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl ChangeNotifier for RecordingNotifier {
    fn notify_board_updated(&self, actor: &str, cards: &[CardView]) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((actor.to_string(), cards.to_vec()));
        }
    }
}
