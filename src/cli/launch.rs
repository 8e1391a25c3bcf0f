use anyhow::Result;
use reqwest::Url;

const APP_BASE: &str = "daybal://app/";

/// Query parameters whose presence resumes an OAuth redirect.
const OAUTH_PARAMS: [&str; 3] = ["code", "error", "state"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// The location the client was started from: the URL the bank redirected
/// back to, or nothing for a plain start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchUrl {
    url: Option<Url>,
}

impl LaunchUrl {
    /// Accepts a full URL or just its query (`?code=...`).
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(_) => Url::parse(APP_BASE)?.join(raw)?,
        };
        Ok(Self { url: Some(url) })
    }

    pub fn oauth_params(&self) -> OAuthParams {
        let mut params = OAuthParams::default();
        let Some(url) = &self.url else {
            return params;
        };

        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match &*key {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Drop the OAuth parameters so a restart from this location does not
    /// replay the redirect. Other parameters are kept.
    pub fn strip_oauth_params(&mut self) {
        let Some(url) = &mut self.url else {
            return;
        };

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_oauth_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_ref().map(Url::as_str).unwrap_or(APP_BASE)
    }
}

fn is_oauth_param(key: &str) -> bool {
    OAUTH_PARAMS.contains(&key)
}
