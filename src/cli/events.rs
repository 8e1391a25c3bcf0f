use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Input(KeyEvent),
    Resize,
    /// One second of a lockout countdown elapsed.
    CountdownTick { generation: u64 },
    /// The failed-callback message has been shown long enough.
    CallbackFallback,
}

pub type EventSender = UnboundedSender<AppEvent>;
pub type EventReceiver = UnboundedReceiver<AppEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Forward terminal input into the event channel from a blocking thread.
/// The thread ends once the receiving side is gone.
pub fn spawn_input_reader(tx: EventSender) {
    thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => tx.send(AppEvent::Input(key)),
            Ok(Event::Resize(_, _)) => tx.send(AppEvent::Resize),
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "terminal input failed");
                break;
            }
        };
        if forwarded.is_err() {
            break;
        }
    });
}

/// Deliver `event` once after `after`.
pub fn schedule(after: Duration, event: AppEvent, tx: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(event);
    })
}

/// A running lockout countdown. Sends one tick per second until it has sent
/// `seconds` ticks; dropping it stops the ticks.
#[derive(Debug)]
pub struct CountdownTask {
    handle: JoinHandle<()>,
}

impl CountdownTask {
    pub fn spawn(seconds: u32, generation: u64, tx: EventSender) -> Self {
        debug!(seconds, generation, "arming countdown");
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            for _ in 0..seconds {
                interval.tick().await;
                if tx.send(AppEvent::CountdownTick { generation }).is_err() {
                    break;
                }
            }
        });

        Self { handle }
    }
}

impl Drop for CountdownTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
