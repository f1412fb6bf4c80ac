//! Messages exchanged with the presentation layer.

use crate::channel::Side;

/// Text shown in the countdown widget outside the running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownLabel {
    Prepare,
    GetReady,
    Finished,
}

/// Warning indicators on the task screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// "Use this slider" reminder next to one slider.
    Unused(Side),
    /// Both sliders were not operated at the same time.
    Concurrency,
}

/// Commands the core sends to the task screen.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    SetCountdownLabel(CountdownLabel),
    /// Animate the countdown; the screen answers with a countdown-finished signal.
    StartCountdown { seconds: f64 },
    SetChannelEnabled { side: Side, enabled: bool },
    SetWarningVisible { warning: Warning, visible: bool },
    SetProgress { trial: usize, of: usize },
}

/// User-facing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Info { title: String, text: String },
    Warning(String),
    Error(String),
    Success(String),
}

/// Receiver of display commands and notifications.
pub trait Presenter {
    fn display(&mut self, command: &DisplayCommand);
    fn notify(&mut self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Multi-consumer callback registry, dispatched on the caller's thread.
pub struct EventBus<T> {
    listeners: Vec<(ListenerId, Box<dyn FnMut(&T)>)>,
    next_id: u64,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        before != self.listeners.len()
    }

    /// Calls every listener in subscription order.
    pub fn emit(&mut self, event: &T) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
