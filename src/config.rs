// Runtime configuration: where the API lives, how to authenticate and which
// card id to use when a command is not given one.

use tracing::{debug, warn};

/// API root used when `BASE_URL` is unset or empty.
pub const DEFAULT_BASE_URL: &str = "https://api.develop.biodoc.com.br";

/// Card id used when `CARD_ID` is unset or empty.
pub const DEFAULT_CARD_ID: &str = "99980000999999993";

pub const BASE_URL_VAR: &str = "BASE_URL";
pub const AUTH_TOKEN_VAR: &str = "AUTH_TOKEN";
pub const CARD_ID_VAR: &str = "CARD_ID";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    /// Bearer token. May be empty, in which case protected endpoints are
    /// expected to reject the request.
    pub token: String,
    pub default_id: String,
}

impl Config {
    /// Resolve the configuration from the process environment, after
    /// loading a `.env` file from the working directory if there is one.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("loaded environment from {}", path.display()),
            Err(err) => debug!("no .env file loaded: {err}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let token = lookup(AUTH_TOKEN_VAR).unwrap_or_default();
        if token.is_empty() {
            warn!("{AUTH_TOKEN_VAR} is not set; protected endpoints will fail");
        }

        Config {
            base_url: non_empty(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            token,
            default_id: non_empty(CARD_ID_VAR).unwrap_or_else(|| DEFAULT_CARD_ID.into()),
        }
    }
}
