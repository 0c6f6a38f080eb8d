//! Event name patterns and subscription streams.

use crate::message::Event;
use tokio::sync::mpsc;

/// Matches an event name against a subscription pattern.
///
/// Names are dot-separated. `*` matches exactly one segment and `**` matches everything
/// from its position on.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "**" || pattern == name {
        return true;
    }
    let mut pattern_segments = pattern.split('.');
    let mut name_segments = name.split('.');
    loop {
        match (pattern_segments.next(), name_segments.next()) {
            (Some("**"), _) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(n)) if p == n => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. `None` once the broker has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Takes every already-delivered event.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_wildcard_patterns() {
        assert!(pattern_matches("articles.created", "articles.created"));
        assert!(pattern_matches("articles.*", "articles.created"));
        assert!(!pattern_matches("articles.*", "v1.articles.created"));
        assert!(pattern_matches("*.articles.*", "v1.articles.created"));
        assert!(pattern_matches("**", "anything.at.all"));
        assert!(pattern_matches("tenant.**", "tenant.v1.articles.updated"));
        assert!(!pattern_matches("articles.created", "articles.created.extra"));
        assert!(!pattern_matches("articles.updated", "articles.created"));
    }
}
