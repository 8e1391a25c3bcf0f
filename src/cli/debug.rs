// One-shot commands against the API, for poking at the bank connection
// without the dashboard in the way.

use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use crate::clients::DebugApi;
use crate::formatter::ResponseFormatter;
use crate::session::AccountStore;

#[derive(Debug, Clone, Subcommand)]
pub enum DebugAction {
    /// Check that the API is up
    Health,
    /// Request a bank authorization URL
    StartAuth,
    /// Exchange an authorization code and list the linked accounts
    Callback {
        #[arg(short, long)]
        code: String,
    },
    /// Show whether a bank is connected
    Status,
    /// List accounts in the current bank session
    Accounts,
    /// Fetch the raw provider balance for an account (defaults to the stored one)
    Balance { account_id: Option<String> },
}

/// Runs one debug command. Nothing here writes to `store`.
pub async fn run(action: DebugAction, client: &dyn DebugApi, store: &dyn AccountStore) -> Result<String> {
    let formatter = ResponseFormatter::new();
    info!(?action, "debug command");

    let output = match action {
        DebugAction::Health => formatter.format_json(&client.health().await?),
        DebugAction::StartAuth => formatter.format_json(&client.start_auth_raw().await?),
        DebugAction::Callback { code } => {
            let response = client.exchange_code_debug(&code).await?;
            let mut lines = vec![format!(
                "session_id: {}",
                response.session_id.as_deref().unwrap_or("-")
            )];
            if response.accounts.is_empty() {
                lines.push("no accounts returned".to_string());
            }
            for account in &response.accounts {
                lines.push(format!(
                    "- account_id: {}  iban: {}",
                    account.id().unwrap_or("-"),
                    account.iban.as_deref().unwrap_or("-")
                ));
            }
            lines.join("\n")
        }
        DebugAction::Status => formatter.format_json(&client.session_status_raw().await?),
        DebugAction::Accounts => formatter.format_json(&client.accounts().await?),
        DebugAction::Balance { account_id } => {
            let account_id = match account_id {
                Some(id) => id,
                None => store
                    .load()?
                    .ok_or_else(|| anyhow!("no account id given and no account stored yet"))?,
            };
            let balance: Value = client.balance(&account_id).await?;
            formatter.format_json(&balance)
        }
    };

    Ok(output)
}
