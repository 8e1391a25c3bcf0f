// Terminal front-end for the balance dashboard
pub mod app;
pub mod controller;
pub mod debug;
pub mod events;
pub mod launch;
pub mod state;
pub mod ui;

pub use app::App;
pub use controller::{Controller, Effect};
pub use state::{AppState, Screen};
