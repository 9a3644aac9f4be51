use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::event::{EditorEvent, EventHandler};

/// Keeps the text shown in the status bar. Clones share the same text,
/// so the UI can read what the editor wrote.
#[derive(Debug, Clone, Default)]
pub struct StatusBar {
    text: Arc<Mutex<String>>,
    notice: Arc<Mutex<Option<String>>>,
}

impl StatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// Last transient message, cleared once read
    pub fn take_notice(&self) -> Option<String> {
        self.notice.lock().take()
    }
}

impl EventHandler for StatusBar {
    fn handle_event(&mut self, event: &EditorEvent) {
        match event {
            EditorEvent::StatusText(text) => *self.text.lock() = text.clone(),
            EditorEvent::Notice(text) => {
                info!("{}", text);
                *self.notice.lock() = Some(text.clone());
            }
            EditorEvent::GestureCommitted { .. } | EditorEvent::GestureCanceled { .. } => {
                self.text.lock().clear();
            }
            _ => {}
        }
    }
}

/// Records every event, for diagnostics
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EditorEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EditorEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventHandler for EventLog {
    fn handle_event(&mut self, event: &EditorEvent) {
        debug!("Event: {:?}", event);
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;

    #[test]
    fn test_status_bar_follows_gesture() {
        let bus = EventBus::new();
        let status = StatusBar::new();
        let log = EventLog::new();
        bus.subscribe(Box::new(status.clone()));
        bus.subscribe(Box::new(log.clone()));

        bus.emit(EditorEvent::StatusText("start: 1 2 end: 3 4".into()));
        assert_eq!(status.text(), "start: 1 2 end: 3 4");

        bus.emit(EditorEvent::GestureCanceled { tool: "line".into() });
        assert_eq!(status.text(), "");

        bus.emit(EditorEvent::Notice("busy".into()));
        assert_eq!(status.take_notice().as_deref(), Some("busy"));
        assert_eq!(status.take_notice(), None);
        assert_eq!(log.events().len(), 3);
    }
}
