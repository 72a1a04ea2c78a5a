use tokio::sync::broadcast;

use crate::{calendar::MonthGrid, theme::ColorTheme};

const CHANNEL_CAPACITY: usize = 64;

/// Change notification of a single observable output of
/// [CalendarProjector](super::CalendarProjector).
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectorEvent {
    UsernameChanged(String),
    CurrentDayChanged(u32),
    LabelChanged(String),
    FirstMonthChanged(MonthGrid),
    SecondMonthChanged(MonthGrid),
    FirstColorChanged(ColorTheme),
    SecondColorChanged(ColorTheme),
}

/// Observer list built on a broadcast channel. Observers that fall behind lose the oldest events,
/// which is fine since every refresh sends the whole state again.
#[derive(Debug)]
pub struct Notifier {
    sender: broadcast::Sender<ProjectorEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl Notifier {
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectorEvent> {
        self.sender.subscribe()
    }

    /// Nobody listening is not an error.
    pub fn notify(&self, event: ProjectorEvent) {
        let _ = self.sender.send(event);
    }
}
