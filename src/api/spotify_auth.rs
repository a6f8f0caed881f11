use crate::config::Config;
use crate::error::SyncError;
use crate::models::AccessToken;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange the configured refresh token for an access token.
///
/// The credentials travel in the form body (`grant_type=refresh_token`,
/// `refresh_token`, `client_id`, `client_secret`). The token is not cached
/// or refreshed: one exchange per run, no retry.
pub async fn request_access_token(client: &Client, cfg: &Config) -> Result<AccessToken, SyncError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", cfg.refresh_token.as_str()),
        ("client_id", cfg.client_id.as_str()),
        ("client_secret", cfg.client_secret.as_str()),
    ];
    let resp = client
        .post(&cfg.auth_url)
        .form(&params)
        .send()
        .await
        .map_err(|e| SyncError::Auth(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Auth(format!("{} - {}", status, body)));
    }
    let tr: TokenResponse = resp
        .json()
        .await
        .map_err(|e| SyncError::Auth(format!("parse token json: {}", e)))?;
    if tr.access_token.is_empty() {
        return Err(SyncError::Auth("no access_token".into()));
    }
    debug!("Obtained access token (expires_in={:?})", tr.expires_in);
    Ok(AccessToken(tr.access_token))
}
