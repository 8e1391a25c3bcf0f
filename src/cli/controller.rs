use std::time::Duration;

use tracing::{info, warn};

use crate::cli::events::{AppEvent, EventSender};
use crate::cli::launch::LaunchUrl;
use crate::cli::state::{
    AppState, CallbackScreen, ConnectScreen, ConnectStatus, DashboardScreen, PadKey, PinScreen, Screen,
};
use crate::clients::PinVerification;
use crate::clients::api::Result;
use crate::error::ClientError;
use crate::formatter::ResponseFormatter;
use crate::session::{BalanceSnapshot, SessionContext};

/// Work the controller asks its host to carry out after an input handler
/// returns. Async variants go back through [`Controller::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    VerifyPin(String),
    StartAuth,
    ExchangeCode(String),
    RefreshBalance,
    OpenBrowser(String),
    Schedule { after: Duration, event: AppEvent },
}

/// Owns the active screen and moves between screens on input and API
/// responses.
pub struct Controller {
    state: AppState,
    session: SessionContext,
    location: LaunchUrl,
    events: EventSender,
    callback_fallback: Duration,
    formatter: ResponseFormatter,
}

impl Controller {
    pub fn new(
        session: SessionContext,
        location: LaunchUrl,
        events: EventSender,
        callback_fallback: Duration,
    ) -> Self {
        Self {
            state: AppState::new(),
            session,
            location,
            events,
            callback_fallback,
            formatter: ResponseFormatter::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn screen(&self) -> &Screen {
        &self.state.screen
    }

    pub fn location(&self) -> &LaunchUrl {
        &self.location
    }

    pub fn toggle_help(&mut self) {
        self.state.show_help = !self.state.show_help;
    }

    pub fn close_help(&mut self) -> bool {
        std::mem::replace(&mut self.state.show_help, false)
    }

    pub fn log(&mut self, message: impl AsRef<str>) {
        self.state.activity.add(message);
    }

    /// One-line message for a failed call. Upstream detail may be a whole
    /// HTML page.
    fn failure_message(&self, error: &ClientError) -> String {
        self.formatter.compact_detail(&error.to_string())
    }

    fn transition(&mut self, next: Screen) {
        info!(from = self.state.screen.name(), to = next.name(), "screen transition");
        self.state.screen = next;
    }

    /// Initial routing from the launch location. Runs once.
    pub fn mount(&mut self) -> Effect {
        let params = self.location.oauth_params();
        self.location.strip_oauth_params();

        if let Some(code) = params.code {
            self.log("Completing bank authorization...");
            self.transition(Screen::Callback(CallbackScreen::Exchanging));
            Effect::ExchangeCode(code)
        } else if let Some(error) = params.error {
            self.log(format!("Bank authorization failed: {}", error));
            self.transition(Screen::Connect(ConnectScreen::with_notice(error)));
            Effect::None
        } else {
            self.transition(Screen::Pin(PinScreen::default()));
            Effect::None
        }
    }

    /// Dispatch an async effect. Host-side effects are handed back untouched.
    pub async fn run(&mut self, effect: Effect) -> Effect {
        match effect {
            Effect::VerifyPin(pin) => self.verify_pin(pin).await,
            Effect::StartAuth => self.start_auth().await,
            Effect::ExchangeCode(code) => self.exchange_code(code).await,
            Effect::RefreshBalance => self.refresh_balance().await,
            other => other,
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Effect {
        match event {
            AppEvent::CountdownTick { generation } => {
                if let Screen::Pin(pin) = &mut self.state.screen {
                    if pin.tick(generation) && pin.is_interactive() {
                        self.state.activity.add("Keypad unlocked");
                    }
                }
            }
            AppEvent::CallbackFallback => {
                if let Screen::Callback(CallbackScreen::Failed { message }) = &self.state.screen {
                    let notice = message.clone();
                    self.transition(Screen::Connect(ConnectScreen::with_notice(notice)));
                }
            }
            AppEvent::Input(_) | AppEvent::Resize => {}
        }
        Effect::None
    }

    // PIN entry

    pub fn press_digit(&mut self, digit: char) -> Effect {
        let Screen::Pin(pin) = &mut self.state.screen else {
            return Effect::None;
        };
        if !pin.is_interactive() {
            return Effect::None;
        }

        match pin.buffer.push(digit) {
            Some(code) => {
                pin.verifying = true;
                Effect::VerifyPin(code)
            }
            None => Effect::None,
        }
    }

    pub fn delete_digit(&mut self) {
        if let Screen::Pin(pin) = &mut self.state.screen {
            if pin.is_interactive() {
                pin.buffer.pop();
            }
        }
    }

    pub fn move_cursor(&mut self, rows: isize, cols: isize) {
        if let Screen::Pin(pin) = &mut self.state.screen {
            pin.move_cursor(rows, cols);
        }
    }

    pub fn press_selected_key(&mut self) -> Effect {
        let key = match &self.state.screen {
            Screen::Pin(pin) => pin.selected_key(),
            _ => return Effect::None,
        };

        match key {
            PadKey::Digit(digit) => self.press_digit(digit),
            PadKey::Delete => {
                self.delete_digit();
                Effect::None
            }
            PadKey::Blank => Effect::None,
        }
    }

    pub async fn verify_pin(&mut self, code: String) -> Effect {
        let outcome = self.session.api().verify_pin(&code).await;

        let effect = match outcome {
            Ok(PinVerification::Verified { .. }) => {
                self.set_pin_error(None);
                self.log("PIN accepted");
                match self.after_pin_verified().await {
                    Ok(()) => Effect::None,
                    Err(e) => {
                        let message = self.failure_message(&e);
                        self.set_pin_error(Some(message));
                        Effect::None
                    }
                }
            }
            Ok(PinVerification::Locked {
                remaining_seconds,
                detail,
            }) => {
                warn!(remaining_seconds, "PIN entry locked");
                self.log(format!("Locked for {}s", remaining_seconds));
                if let Screen::Pin(pin) = &mut self.state.screen {
                    pin.error = Some(detail);
                    pin.arm_lockout(remaining_seconds, Some(&self.events));
                }
                Effect::None
            }
            Ok(PinVerification::Rejected { detail, attempts_left }) => {
                let message = match attempts_left {
                    Some(left) => format!("{} ({} attempts left)", detail, left),
                    None => detail,
                };
                self.set_pin_error(Some(message));
                Effect::None
            }
            Err(e) => {
                warn!(error = %e, "PIN verification failed");
                let message = self.failure_message(&e);
                self.set_pin_error(Some(message));
                Effect::None
            }
        };

        if let Screen::Pin(pin) = &mut self.state.screen {
            pin.verifying = false;
        }
        effect
    }

    async fn after_pin_verified(&mut self) -> Result<()> {
        let status = self.session.api().session_status().await?;

        if status.bank_connected {
            if let Some(uid) = status.account_uid.as_deref() {
                self.session.remember_account(uid);
            }
            let snapshot = self.session.fetch_balance().await;
            self.transition(Screen::Dashboard(DashboardScreen::new(snapshot)));
        } else {
            self.log("No bank connected yet");
            self.transition(Screen::Connect(ConnectScreen::default()));
        }
        Ok(())
    }

    fn set_pin_error(&mut self, error: Option<String>) {
        if let Screen::Pin(pin) = &mut self.state.screen {
            pin.error = error;
        }
    }

    // Bank connection

    pub fn request_auth(&mut self) -> Effect {
        let Screen::Connect(connect) = &mut self.state.screen else {
            return Effect::None;
        };
        match connect.status {
            ConnectStatus::Idle | ConnectStatus::Redirecting { .. } => {
                connect.status = ConnectStatus::Requesting;
                Effect::StartAuth
            }
            ConnectStatus::Requesting | ConnectStatus::Failed { .. } => Effect::None,
        }
    }

    pub fn retry_auth(&mut self) {
        if let Screen::Connect(connect) = &mut self.state.screen {
            if matches!(connect.status, ConnectStatus::Failed { .. }) {
                connect.status = ConnectStatus::Idle;
            }
        }
    }

    pub async fn start_auth(&mut self) -> Effect {
        let result = self.session.api().start_auth().await.map_err(|e| {
            warn!(error = %e, "could not start bank authorization");
            self.failure_message(&e)
        });
        let Screen::Connect(connect) = &mut self.state.screen else {
            return Effect::None;
        };

        match result {
            Ok(auth_url) => {
                connect.status = ConnectStatus::Redirecting {
                    auth_url: auth_url.clone(),
                };
                self.state.activity.add("Opening bank authorization page");
                Effect::OpenBrowser(auth_url)
            }
            Err(message) => {
                connect.status = ConnectStatus::Failed { message };
                Effect::None
            }
        }
    }

    /// The redirect could not be opened; leave the URL on screen.
    pub fn browser_failed(&mut self, error: &str) {
        if let Screen::Connect(connect) = &mut self.state.screen {
            connect.notice = Some(format!("Could not open a browser ({}). Open the link above manually.", error));
        }
    }

    pub fn is_pasting(&self) -> bool {
        matches!(&self.state.screen, Screen::Connect(ConnectScreen { paste: Some(_), .. }))
    }

    pub fn begin_paste(&mut self) {
        if let Screen::Connect(connect) = &mut self.state.screen {
            connect.paste = Some(String::new());
        }
    }

    pub fn cancel_paste(&mut self) {
        if let Screen::Connect(connect) = &mut self.state.screen {
            connect.paste = None;
        }
    }

    pub fn paste_char(&mut self, c: char) {
        if let Screen::Connect(ConnectScreen { paste: Some(text), .. }) = &mut self.state.screen {
            text.push(c);
        }
    }

    pub fn paste_backspace(&mut self) {
        if let Screen::Connect(ConnectScreen { paste: Some(text), .. }) = &mut self.state.screen {
            text.pop();
        }
    }

    /// Resume from the URL the bank redirected to, as if the client had
    /// been started there.
    pub fn submit_paste(&mut self) -> Effect {
        let Screen::Connect(connect) = &mut self.state.screen else {
            return Effect::None;
        };
        let Some(text) = connect.paste.take() else {
            return Effect::None;
        };

        let location = match LaunchUrl::parse(&text) {
            Ok(location) => location,
            Err(e) => {
                connect.notice = Some(format!("Not a valid URL: {}", e));
                return Effect::None;
            }
        };

        let params = location.oauth_params();
        if params.code.is_none() && params.error.is_none() {
            connect.notice = Some("No authorization code found in that URL".to_string());
            return Effect::None;
        }

        self.location = location;
        self.mount()
    }

    pub async fn exchange_code(&mut self, code: String) -> Effect {
        match self.session.api().exchange_code(&code).await {
            Ok(response) => {
                if let Some(uid) = response.account_uids.first() {
                    self.session.remember_account(uid);
                }
                self.log("Bank connected");
                let snapshot = self.session.fetch_balance().await;
                self.transition(Screen::Dashboard(DashboardScreen::new(snapshot)));
                Effect::None
            }
            Err(e) => {
                warn!(error = %e, "authorization code exchange failed");
                let message = self.failure_message(&e);
                self.transition(Screen::Callback(CallbackScreen::Failed { message }));
                Effect::Schedule {
                    after: self.callback_fallback,
                    event: AppEvent::CallbackFallback,
                }
            }
        }
    }

    // Dashboard

    pub fn request_refresh(&mut self) -> Effect {
        match &mut self.state.screen {
            Screen::Dashboard(dashboard) if !dashboard.refreshing => {
                dashboard.refreshing = true;
                Effect::RefreshBalance
            }
            _ => Effect::None,
        }
    }

    pub async fn refresh_balance(&mut self) -> Effect {
        let snapshot = self.session.fetch_balance().await;
        if let BalanceSnapshot::Failed { detail } = &snapshot {
            let message = format!("Refresh failed: {}", detail);
            self.log(message);
        }

        if let Screen::Dashboard(dashboard) = &mut self.state.screen {
            *dashboard = DashboardScreen::new(snapshot);
        }
        Effect::None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::cli::events::{self, EventReceiver};
    use crate::clients::api::Result as ApiResult;
    use crate::clients::{CallbackResponse, ComparisonData, DaybalApi, SessionStatus};
    use crate::error::ClientError;
    use crate::session::{AccountStore, MemoryAccountStore};

    fn api_error(status: Option<u16>, detail: &str) -> ClientError {
        ClientError::Api {
            status,
            detail: detail.to_string(),
        }
    }

    fn comparison(current: f64, median: Option<f64>, average: Option<f64>) -> ComparisonData {
        ComparisonData {
            current_balance: current,
            currency: "EUR".to_string(),
            median_12m: median,
            average_24m: average,
            historical_data_available: median.is_some(),
            date: None,
            day_of_month: None,
            message: None,
        }
    }

    /// Scripted API. Each queue is consumed in order; an empty queue means
    /// the server is unreachable.
    #[derive(Default)]
    struct FakeApi {
        pin_outcomes: Mutex<VecDeque<ApiResult<PinVerification>>>,
        statuses: Mutex<VecDeque<ApiResult<SessionStatus>>>,
        auth_urls: Mutex<VecDeque<ApiResult<String>>>,
        callbacks: Mutex<VecDeque<ApiResult<CallbackResponse>>>,
        comparisons: Mutex<VecDeque<ApiResult<ComparisonData>>>,
        pins_seen: Mutex<Vec<String>>,
        comparison_accounts: Mutex<Vec<Option<String>>>,
    }

    fn next<T>(queue: &Mutex<VecDeque<ApiResult<T>>>) -> ApiResult<T> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(api_error(None, "Failed to fetch")))
    }

    #[async_trait]
    impl DaybalApi for FakeApi {
        async fn health(&self) -> ApiResult<Value> {
            Ok(json!({"status": "ok"}))
        }

        async fn start_auth(&self) -> ApiResult<String> {
            next(&self.auth_urls)
        }

        async fn exchange_code(&self, _code: &str) -> ApiResult<CallbackResponse> {
            next(&self.callbacks)
        }

        async fn verify_pin(&self, pin: &str) -> ApiResult<PinVerification> {
            self.pins_seen.lock().unwrap().push(pin.to_string());
            next(&self.pin_outcomes)
        }

        async fn session_status(&self) -> ApiResult<SessionStatus> {
            next(&self.statuses)
        }

        async fn comparison_data(&self, account_uid: Option<&str>) -> ApiResult<ComparisonData> {
            self.comparison_accounts
                .lock()
                .unwrap()
                .push(account_uid.map(str::to_string));
            next(&self.comparisons)
        }
    }

    struct Harness {
        controller: Controller,
        api: Arc<FakeApi>,
        store: Arc<MemoryAccountStore>,
        rx: EventReceiver,
    }

    fn harness(api: FakeApi, location: &str) -> Harness {
        let api = Arc::new(api);
        let store = Arc::new(MemoryAccountStore::new());
        let session = SessionContext::new(api.clone(), store.clone());
        let location = if location.is_empty() {
            LaunchUrl::default()
        } else {
            LaunchUrl::parse(location).unwrap()
        };
        let (tx, rx) = events::channel();
        let controller = Controller::new(session, location, tx, Duration::from_secs(2));
        Harness {
            controller,
            api,
            store,
            rx,
        }
    }

    async fn enter_pin(controller: &mut Controller, code: &str) -> Effect {
        let mut effect = Effect::None;
        for digit in code.chars() {
            effect = controller.press_digit(digit);
        }
        controller.run(effect).await
    }

    fn pin_screen(controller: &Controller) -> &PinScreen {
        match controller.screen() {
            Screen::Pin(pin) => pin,
            other => panic!("expected pin screen, got {}", other.name()),
        }
    }

    #[test]
    fn test_mount_without_params_shows_pin() {
        let mut h = harness(FakeApi::default(), "");
        assert_eq!(h.controller.screen().name(), "loading");
        assert_eq!(h.controller.mount(), Effect::None);
        assert_eq!(h.controller.screen().name(), "pin");
    }

    #[test]
    fn test_mount_with_error_shows_connect_notice() {
        let mut h = harness(FakeApi::default(), "https://daybal.vercel.app/?error=access_denied");
        h.controller.mount();

        match h.controller.screen() {
            Screen::Connect(connect) => assert_eq!(connect.notice.as_deref(), Some("access_denied")),
            other => panic!("expected connect screen, got {}", other.name()),
        }
        assert!(!h.controller.location().as_str().contains("error"));
    }

    #[tokio::test]
    async fn test_callback_success_stores_account_and_shows_dashboard() {
        let api = FakeApi::default();
        api.callbacks.lock().unwrap().push_back(Ok(CallbackResponse {
            account_uids: vec!["acc-1".to_string(), "acc-2".to_string()],
        }));
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Ok(comparison(1000.0, Some(1200.0), Some(900.0))));

        let mut h = harness(api, "https://daybal.vercel.app/callback?code=ABC123&state=daybal-auth");
        let effect = h.controller.mount();
        assert_eq!(effect, Effect::ExchangeCode("ABC123".to_string()));
        assert_eq!(h.controller.screen().name(), "callback");
        assert!(!h.controller.location().as_str().contains("code"));

        assert_eq!(h.controller.run(effect).await, Effect::None);
        assert_eq!(h.controller.screen().name(), "dashboard");
        assert_eq!(h.store.load().unwrap(), Some("acc-1".to_string()));
        assert_eq!(
            *h.api.comparison_accounts.lock().unwrap(),
            vec![Some("acc-1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_failure_falls_back_to_connect() {
        let api = FakeApi::default();
        api.callbacks
            .lock()
            .unwrap()
            .push_back(Err(api_error(None, "invalid code")));

        let mut h = harness(api, "?code=ABC123");
        let effect = h.controller.mount();
        let effect = h.controller.run(effect).await;

        assert!(!h.controller.location().as_str().contains("code"));
        match h.controller.screen() {
            Screen::Callback(CallbackScreen::Failed { message }) => {
                assert_eq!(message, "API Error: invalid code")
            }
            other => panic!("expected failed callback, got {}", other.name()),
        }

        let (after, event) = match effect {
            Effect::Schedule { after, event } => (after, event),
            other => panic!("expected a scheduled fallback, got {other:?}"),
        };
        assert_eq!(after, Duration::from_secs(2));

        events::schedule(after, event, h.controller.events.clone());
        tokio::time::sleep(Duration::from_millis(2100)).await;
        let event = h.rx.try_recv().unwrap();
        h.controller.handle_event(event);
        assert_eq!(h.controller.screen().name(), "connect");
    }

    #[tokio::test]
    async fn test_pin_success_without_bank_goes_to_connect() {
        let api = FakeApi::default();
        api.pin_outcomes
            .lock()
            .unwrap()
            .push_back(Ok(PinVerification::Verified { session_token: None }));
        api.statuses.lock().unwrap().push_back(Ok(SessionStatus {
            bank_connected: false,
            ..SessionStatus::default()
        }));

        let mut h = harness(api, "");
        h.controller.mount();
        enter_pin(&mut h.controller, "1234").await;

        assert_eq!(*h.api.pins_seen.lock().unwrap(), vec!["1234".to_string()]);
        assert_eq!(h.controller.screen().name(), "connect");
    }

    #[tokio::test]
    async fn test_pin_success_with_bank_goes_to_dashboard() {
        let api = FakeApi::default();
        api.pin_outcomes
            .lock()
            .unwrap()
            .push_back(Ok(PinVerification::Verified { session_token: None }));
        api.statuses.lock().unwrap().push_back(Ok(SessionStatus {
            bank_connected: true,
            account_uid: Some("acc-7".to_string()),
            has_accounts: Some(true),
        }));
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Ok(comparison(50.0, None, None)));

        let mut h = harness(api, "");
        h.controller.mount();
        enter_pin(&mut h.controller, "1234").await;

        match h.controller.screen() {
            Screen::Dashboard(dashboard) => {
                assert_eq!(dashboard.snapshot, BalanceSnapshot::Loaded(comparison(50.0, None, None)));
            }
            other => panic!("expected dashboard, got {}", other.name()),
        }
        assert_eq!(h.store.load().unwrap(), Some("acc-7".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_pin_reports_attempts_left() {
        let api = FakeApi::default();
        api.pin_outcomes.lock().unwrap().push_back(Ok(PinVerification::Rejected {
            detail: "Incorrect PIN".to_string(),
            attempts_left: Some(3),
        }));

        let mut h = harness(api, "");
        h.controller.mount();
        enter_pin(&mut h.controller, "9999").await;

        let pin = pin_screen(&h.controller);
        assert_eq!(pin.error.as_deref(), Some("Incorrect PIN (3 attempts left)"));
        assert!(pin.buffer.is_empty());
        assert!(!pin.verifying);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_pin_screen() {
        let mut h = harness(FakeApi::default(), "");
        h.controller.mount();
        enter_pin(&mut h.controller, "1234").await;

        let pin = pin_screen(&h.controller);
        assert_eq!(pin.error.as_deref(), Some("API Error: Failed to fetch"));
        assert!(pin.is_interactive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_counts_down_and_reenables_keypad() {
        let api = FakeApi::default();
        api.pin_outcomes.lock().unwrap().push_back(Ok(PinVerification::Locked {
            remaining_seconds: 30,
            detail: "Too many attempts".to_string(),
        }));

        let mut h = harness(api, "");
        h.controller.mount();
        enter_pin(&mut h.controller, "0000").await;

        {
            let pin = pin_screen(&h.controller);
            assert_eq!(pin.error.as_deref(), Some("Too many attempts"));
            assert_eq!(pin.lockout.remaining_seconds, 30);
            assert!(!pin.is_interactive());
        }

        // input is ignored while locked
        assert_eq!(h.controller.press_digit('1'), Effect::None);
        assert!(pin_screen(&h.controller).buffer.is_empty());

        // sample half a second after each tick
        tokio::time::sleep(Duration::from_millis(500)).await;
        for elapsed in 1..=30u32 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            while let Ok(event) = h.rx.try_recv() {
                h.controller.handle_event(event);
            }
            let pin = pin_screen(&h.controller);
            assert_eq!(pin.lockout.remaining_seconds, 30 - elapsed);
            assert_eq!(pin.is_interactive(), elapsed == 30);
        }

        assert!(!pin_screen(&h.controller).lockout.locked);
        h.controller.press_digit('1');
        assert_eq!(pin_screen(&h.controller).buffer.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_lockout_restarts_countdown() {
        let api = FakeApi::default();
        for seconds in [10, 60] {
            api.pin_outcomes.lock().unwrap().push_back(Ok(PinVerification::Locked {
                remaining_seconds: seconds,
                detail: "Too many attempts".to_string(),
            }));
        }

        let mut h = harness(api, "");
        h.controller.mount();
        enter_pin(&mut h.controller, "0000").await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        while let Ok(event) = h.rx.try_recv() {
            h.controller.handle_event(event);
        }
        assert_eq!(pin_screen(&h.controller).lockout.remaining_seconds, 7);

        // a second lockout supplied directly resets the countdown
        let effect = h.controller.verify_pin("0000".to_string()).await;
        assert_eq!(effect, Effect::None);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        while let Ok(event) = h.rx.try_recv() {
            h.controller.handle_event(event);
        }
        assert_eq!(pin_screen(&h.controller).lockout.remaining_seconds, 59);
    }

    #[tokio::test]
    async fn test_start_auth_error_and_retry() {
        let api = FakeApi::default();
        api.auth_urls
            .lock()
            .unwrap()
            .push_back(Err(api_error(Some(500), "upstream down")));
        api.auth_urls
            .lock()
            .unwrap()
            .push_back(Err(ClientError::MissingField("auth_url")));
        api.auth_urls
            .lock()
            .unwrap()
            .push_back(Ok("https://bank.example/authorize?x=1".to_string()));

        let mut h = harness(api, "?error=denied");
        h.controller.mount();

        let effect = h.controller.request_auth();
        assert_eq!(effect, Effect::StartAuth);
        assert_eq!(h.controller.request_auth(), Effect::None);
        h.controller.run(effect).await;
        match h.controller.screen() {
            Screen::Connect(connect) => assert_eq!(
                connect,
                &ConnectScreen {
                    status: ConnectStatus::Failed {
                        message: "API Error (500): upstream down".to_string()
                    },
                    notice: Some("denied".to_string()),
                    paste: None,
                }
            ),
            other => panic!("expected connect, got {}", other.name()),
        }

        h.controller.retry_auth();
        let effect = h.controller.request_auth();
        h.controller.run(effect).await;
        match h.controller.screen() {
            Screen::Connect(connect) => assert_eq!(
                connect.status,
                ConnectStatus::Failed {
                    message: "No auth URL received".to_string()
                }
            ),
            other => panic!("expected connect, got {}", other.name()),
        }

        h.controller.retry_auth();
        let effect = h.controller.request_auth();
        assert_eq!(
            h.controller.run(effect).await,
            Effect::OpenBrowser("https://bank.example/authorize?x=1".to_string())
        );
    }

    #[tokio::test]
    async fn test_html_error_pages_are_compacted() {
        let page = "<html>\n  <body>\n    <h1>Bad Gateway</h1>\n  </body>\n</html>";
        let api = FakeApi::default();
        api.auth_urls
            .lock()
            .unwrap()
            .push_back(Err(api_error(Some(502), page)));
        api.callbacks
            .lock()
            .unwrap()
            .push_back(Err(api_error(Some(502), page)));

        let mut h = harness(api, "?error=denied");
        h.controller.mount();
        let effect = h.controller.request_auth();
        h.controller.run(effect).await;
        match h.controller.screen() {
            Screen::Connect(connect) => assert_eq!(
                connect.status,
                ConnectStatus::Failed {
                    message: "API Error (502): Bad Gateway".to_string()
                }
            ),
            other => panic!("expected connect, got {}", other.name()),
        }

        h.controller.begin_paste();
        for c in "?code=XYZ".chars() {
            h.controller.paste_char(c);
        }
        let effect = h.controller.submit_paste();
        h.controller.run(effect).await;
        match h.controller.screen() {
            Screen::Callback(CallbackScreen::Failed { message }) => {
                assert_eq!(message, "API Error (502): Bad Gateway")
            }
            other => panic!("expected failed callback, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_pasted_redirect_resumes_callback() {
        let api = FakeApi::default();
        api.callbacks.lock().unwrap().push_back(Ok(CallbackResponse {
            account_uids: vec!["acc-3".to_string()],
        }));
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Ok(comparison(10.0, Some(5.0), None)));

        let mut h = harness(api, "?error=denied");
        h.controller.mount();

        h.controller.begin_paste();
        assert!(h.controller.is_pasting());
        for c in "https://daybal.vercel.app/callback?state=x".chars() {
            h.controller.paste_char(c);
        }
        assert_eq!(h.controller.submit_paste(), Effect::None);
        match h.controller.screen() {
            Screen::Connect(connect) => {
                assert_eq!(connect.notice.as_deref(), Some("No authorization code found in that URL"))
            }
            other => panic!("expected connect, got {}", other.name()),
        }

        h.controller.begin_paste();
        for c in "https://daybal.vercel.app/callback?code=XYZ".chars() {
            h.controller.paste_char(c);
        }
        let effect = h.controller.submit_paste();
        assert_eq!(effect, Effect::ExchangeCode("XYZ".to_string()));
        h.controller.run(effect).await;
        assert_eq!(h.controller.screen().name(), "dashboard");
        assert_eq!(h.store.load().unwrap(), Some("acc-3".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_is_guarded_and_replaces_snapshot() {
        let api = FakeApi::default();
        api.callbacks.lock().unwrap().push_back(Ok(CallbackResponse::default()));
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Ok(comparison(10.0, None, None)));
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Err(api_error(None, "Bank not connected")));

        let mut h = harness(api, "?code=abc");
        let effect = h.controller.mount();
        h.controller.run(effect).await;

        let effect = h.controller.request_refresh();
        assert_eq!(effect, Effect::RefreshBalance);
        assert_eq!(h.controller.request_refresh(), Effect::None);

        h.controller.run(effect).await;
        match h.controller.screen() {
            Screen::Dashboard(dashboard) => {
                assert!(!dashboard.refreshing);
                assert_eq!(
                    dashboard.snapshot,
                    BalanceSnapshot::Failed {
                        detail: "Bank not connected".to_string()
                    }
                );
            }
            other => panic!("expected dashboard, got {}", other.name()),
        }

        // no stored account: the server default is requested
        assert_eq!(*h.api.comparison_accounts.lock().unwrap(), vec![None, None]);
        assert_eq!(h.controller.request_refresh(), Effect::RefreshBalance);
    }

    #[tokio::test]
    async fn test_stored_account_is_sent_with_balance_requests() {
        let api = Arc::new(FakeApi::default());
        api.comparisons
            .lock()
            .unwrap()
            .push_back(Ok(comparison(10.0, None, None)));
        let store = Arc::new(MemoryAccountStore::with_account("acc-saved"));
        let session = SessionContext::new(api.clone(), store);

        let snapshot = session.fetch_balance().await;
        assert!(matches!(snapshot, BalanceSnapshot::Loaded(_)));
        assert_eq!(
            *api.comparison_accounts.lock().unwrap(),
            vec![Some("acc-saved".to_string())]
        );
    }

    #[test]
    fn test_keypad_selection_submits() {
        let mut h = harness(FakeApi::default(), "");
        h.controller.mount();

        // 1, 2, 3 along the top row then 0 from the bottom row
        assert_eq!(h.controller.press_selected_key(), Effect::None);
        h.controller.move_cursor(0, 1);
        h.controller.press_selected_key();
        h.controller.move_cursor(0, 1);
        h.controller.press_selected_key();
        h.controller.move_cursor(3, -1);
        assert_eq!(h.controller.press_selected_key(), Effect::VerifyPin("1230".to_string()));
    }
}
