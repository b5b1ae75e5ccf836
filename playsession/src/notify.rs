//! Concrete [`Notifier`] implementations; the trait itself lives in
//! `playsession-core` since the save-state manager and rewind/turbo paths
//! call it without depending on any host machinery.

use crossbeam::channel::Sender;
pub use playsession_core::notify::{NullNotifier, Notifier};

/// Forwards every message onto a channel, for a host UI to drain and display
/// (analogous to `tetanes`'s `add_message`/`UiEvent::Message` path).
pub struct ChannelNotifier {
    tx: Sender<String>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        // A full channel means no one's listening; dropping the message is correct.
        let _ = self.tx.try_send(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards_messages() {
        let (tx, rx) = crossbeam::channel::bounded(4);
        let notifier = ChannelNotifier::new(tx);
        notifier.notify("hello");
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }
}
