use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::cli::events::{CountdownTask, EventSender};
use crate::clients::ComparisonData;
use crate::session::BalanceSnapshot;

pub const PIN_LENGTH: usize = 4;

/// Digits typed so far. Never holds more than [`PIN_LENGTH`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinBuffer {
    digits: String,
}

impl PinBuffer {
    /// Append a digit. Returns the complete PIN, and empties the buffer, the
    /// moment the last digit lands.
    pub fn push(&mut self, digit: char) -> Option<String> {
        if !digit.is_ascii_digit() || self.digits.len() >= PIN_LENGTH {
            return None;
        }
        self.digits.push(digit);
        if self.digits.len() == PIN_LENGTH {
            Some(std::mem::take(&mut self.digits))
        } else {
            None
        }
    }

    pub fn pop(&mut self) {
        self.digits.pop();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Filled state of each indicator slot.
    pub fn slots(&self) -> [bool; PIN_LENGTH] {
        std::array::from_fn(|i| i < self.digits.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadKey {
    Digit(char),
    Blank,
    Delete,
}

pub const KEYPAD: [[PadKey; 3]; 4] = [
    [PadKey::Digit('1'), PadKey::Digit('2'), PadKey::Digit('3')],
    [PadKey::Digit('4'), PadKey::Digit('5'), PadKey::Digit('6')],
    [PadKey::Digit('7'), PadKey::Digit('8'), PadKey::Digit('9')],
    [PadKey::Blank, PadKey::Digit('0'), PadKey::Delete],
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lockout {
    pub locked: bool,
    pub remaining_seconds: u32,
}

#[derive(Debug, Default)]
pub struct PinScreen {
    pub buffer: PinBuffer,
    pub lockout: Lockout,
    pub error: Option<String>,
    pub verifying: bool,
    /// (row, column) into [`KEYPAD`].
    pub cursor: (usize, usize),
    countdown: Option<CountdownTask>,
    generation: u64,
}

impl PinScreen {
    /// The keypad accepts input only while no countdown is running.
    pub fn is_interactive(&self) -> bool {
        self.lockout.remaining_seconds == 0
    }

    pub fn selected_key(&self) -> PadKey {
        KEYPAD[self.cursor.0][self.cursor.1]
    }

    pub fn move_cursor(&mut self, rows: isize, cols: isize) {
        let row = (self.cursor.0 as isize + rows).clamp(0, KEYPAD.len() as isize - 1);
        let col = (self.cursor.1 as isize + cols).clamp(0, 2);
        self.cursor = (row as usize, col as usize);
    }

    /// Start a fresh countdown from `seconds`, replacing any running one.
    /// Without a sender the countdown only advances through [`Self::tick`].
    pub fn arm_lockout(&mut self, seconds: u32, events: Option<&EventSender>) {
        self.generation += 1;
        self.countdown = None;
        self.lockout = Lockout {
            locked: true,
            remaining_seconds: seconds,
        };

        if seconds == 0 {
            self.lockout.locked = false;
            return;
        }
        if let Some(tx) = events {
            self.countdown = Some(CountdownTask::spawn(seconds, self.generation, tx.clone()));
        }
    }

    /// Apply one countdown tick. Ticks from a replaced countdown are ignored.
    pub fn tick(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.lockout.remaining_seconds == 0 {
            return false;
        }

        self.lockout.remaining_seconds -= 1;
        if self.lockout.remaining_seconds == 0 {
            self.lockout.locked = false;
            self.countdown = None;
        }
        true
    }

    pub fn countdown_generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectStatus {
    #[default]
    Idle,
    Requesting,
    Redirecting {
        auth_url: String,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectScreen {
    pub status: ConnectStatus,
    /// Something to tell the user that did not come from this screen's own
    /// request, e.g. an `?error=` from the bank.
    pub notice: Option<String>,
    /// Text being pasted when the user hands back a redirect URL.
    pub paste: Option<String>,
}

impl ConnectScreen {
    pub fn with_notice(notice: impl Into<String>) -> Self {
        Self {
            notice: Some(notice.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackScreen {
    Exchanging,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardScreen {
    pub snapshot: BalanceSnapshot,
    pub refreshing: bool,
    pub updated_at: DateTime<Local>,
}

impl DashboardScreen {
    pub fn new(snapshot: BalanceSnapshot) -> Self {
        Self {
            snapshot,
            refreshing: false,
            updated_at: Local::now(),
        }
    }
}

/// Exactly one screen is active at a time.
#[derive(Debug)]
pub enum Screen {
    Loading,
    Pin(PinScreen),
    Connect(ConnectScreen),
    Callback(CallbackScreen),
    Dashboard(DashboardScreen),
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Loading => "loading",
            Screen::Pin(_) => "pin",
            Screen::Connect(_) => "connect",
            Screen::Callback(_) => "callback",
            Screen::Dashboard(_) => "dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Median12m,
    Average24m,
}

impl ComparisonKind {
    pub const ALL: [ComparisonKind; 2] = [ComparisonKind::Median12m, ComparisonKind::Average24m];

    pub fn label(self) -> &'static str {
        match self {
            ComparisonKind::Median12m => "12-month median",
            ComparisonKind::Average24m => "24-month average",
        }
    }

    pub fn value(self, data: &ComparisonData) -> Option<f64> {
        match self {
            ComparisonKind::Median12m => data.median_12m,
            ComparisonKind::Average24m => data.average_24m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonView {
    /// Not enough history yet.
    Unavailable,
    Favorable { delta: f64 },
    Unfavorable { delta: f64 },
}

/// Favorable iff the current balance is at least the comparison value.
pub fn comparison_view(current: f64, value: Option<f64>) -> ComparisonView {
    match value {
        None => ComparisonView::Unavailable,
        Some(value) if current >= value => ComparisonView::Favorable { delta: current - value },
        Some(value) => ComparisonView::Unfavorable { delta: current - value },
    }
}

const MAX_ACTIVITY: usize = 100;

#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<String>,
}

impl ActivityLog {
    pub fn add(&mut self, message: impl AsRef<str>) {
        let timestamp = Local::now().format("%H:%M:%S");
        self.entries.push_back(format!("[{}] {}", timestamp, message.as_ref()));
        if self.entries.len() > MAX_ACTIVITY {
            self.entries.pop_front();
        }
    }

    /// The newest `count` entries, oldest first.
    pub fn latest(&self, count: usize) -> impl Iterator<Item = &String> {
        self.entries.iter().skip(self.entries.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub activity: ActivityLog,
    pub show_help: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Loading,
            activity: ActivityLog::default(),
            show_help: false,
        }
    }
}
