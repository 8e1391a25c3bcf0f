pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod session;

pub use cli::{App, AppState, Controller, Screen};
pub use clients::{DaybalApi, HttpApiClient};
pub use config::Config;
pub use error::{ClientError, StoreError};
pub use formatter::{CurrencyFormatter, NumberLocale, ResponseFormatter};
pub use session::{AccountStore, BalanceSnapshot, FileAccountStore, MemoryAccountStore, SessionContext};
