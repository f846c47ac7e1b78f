//! Selection notifications pushed to the embedding host.

use crate::scene::selection::SelectedEntity;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ViewerEvent<K> {
    #[serde(rename_all = "camelCase")]
    SelectionChanged {
        selected_entities: Vec<SelectedEntity<K>>,
    },
}

impl<K> ViewerEvent<K> {
    pub fn selection_changed(selected_entities: Vec<SelectedEntity<K>>) -> Self {
        Self::SelectionChanged { selected_entities }
    }
}

/// Receiver of viewer events on the owning thread.
pub trait SelectionListener<K> {
    fn on_event(&mut self, event: &ViewerEvent<K>);
}

impl<K, F> SelectionListener<K> for F
where
    F: FnMut(&ViewerEvent<K>),
{
    fn on_event(&mut self, event: &ViewerEvent<K>) {
        self(event)
    }
}

/// Forwards events to another thread. A dropped receiver is not an error.
pub struct ChannelListener<K> {
    sender: mpsc::Sender<ViewerEvent<K>>,
}

impl<K> ChannelListener<K> {
    pub fn new() -> (Self, mpsc::Receiver<ViewerEvent<K>>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl<K: Clone> SelectionListener<K> for ChannelListener<K> {
    fn on_event(&mut self, event: &ViewerEvent<K>) {
        if self.sender.send(event.clone()).is_err() {
            log::debug!("Selection event dropped: receiver is gone");
        }
    }
}

/// Fans selection snapshots out to every attached listener.
pub struct EventNotifier<K> {
    listeners: Vec<Box<dyn SelectionListener<K>>>,
    sent: u64,
}

impl<K> Default for EventNotifier<K> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            sent: 0,
        }
    }
}

impl<K: Clone> EventNotifier<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `listener` and replays `current` to it alone.
    pub fn attach(
        &mut self,
        mut listener: Box<dyn SelectionListener<K>>,
        current: Vec<SelectedEntity<K>>,
    ) {
        listener.on_event(&ViewerEvent::selection_changed(current));
        self.listeners.push(listener);
    }

    pub fn notify(&mut self, snapshot: Vec<SelectedEntity<K>>) {
        let event = ViewerEvent::selection_changed(snapshot);
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
        self.sent += 1;
    }

    /// Notifications pushed since creation, replays excluded.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn detach_all(&mut self) {
        self.listeners.clear();
    }
}
