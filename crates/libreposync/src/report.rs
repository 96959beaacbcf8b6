use std::sync::Mutex;

/// Receives everything a pass wants to tell the operator.
///
/// The engine never logs; frontends decide how (and whether) to render these.
pub trait Reporter: Send + Sync {
    /// A change that would run outside simulation mode.
    fn would_change(&self, description: &str);
    /// A change that has just been applied.
    fn changed(&self, description: &str);
    /// A failed precondition that simulation mode assumes would have held.
    fn assumed(&self, narrative: &str);
}

/// Reporter that discards everything.
pub struct Quiet;

impl Reporter for Quiet {
    fn would_change(&self, _description: &str) {}

    fn changed(&self, _description: &str) {}

    fn assumed(&self, _narrative: &str) {}
}

/// Something a [`Recorder`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// See [`Reporter::would_change`].
    WouldChange(String),
    /// See [`Reporter::changed`].
    Changed(String),
    /// See [`Reporter::assumed`].
    Assumed(String),
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    /// Events in arrival order.
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Append an event.
    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for Recorder {
    fn would_change(&self, description: &str) {
        self.push(Event::WouldChange(description.to_string()));
    }

    fn changed(&self, description: &str) {
        self.push(Event::Changed(description.to_string()));
    }

    fn assumed(&self, narrative: &str) {
        self.push(Event::Assumed(narrative.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let recorder = Recorder::new();
        recorder.assumed("parent exists");
        recorder.would_change("clone");
        recorder.changed("pull");
        assert_eq!(
            recorder.events(),
            vec![
                Event::Assumed("parent exists".to_string()),
                Event::WouldChange("clone".to_string()),
                Event::Changed("pull".to_string()),
            ]
        );
    }
}
