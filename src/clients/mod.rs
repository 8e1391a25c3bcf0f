// HTTP client for the daybal API
pub mod api;

pub use api::{
    CallbackResponse, ComparisonData, DaybalApi, DebugAccount, DebugApi, DebugCallbackResponse, HttpApiClient,
    PinVerification, SessionStatus,
};
