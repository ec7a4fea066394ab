use super::ProviderIdentity;
use crate::config::Config;
use serde::Deserialize;

const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const USERINFO_URL: &str = "https://discord.com/api/users/@me";
const AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    id: String,
    username: String,
    #[serde(default)]
    email: Option<String>,
}

pub fn authorize_url(config: &Config, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope=identify%20email&state={}",
        AUTHORIZE_URL, config.discord_client_id, config.discord_redirect_uri, state
    )
}

/// `POST /oauth/discord/web/callback`: Discord only exposes the web
/// redirect flow, no device flow.
pub async fn exchange_code(config: &Config, code: &str) -> Result<ProviderIdentity, String> {
    let client = reqwest::Client::new();
    let token = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", config.discord_client_id.as_str()),
            ("client_secret", config.discord_client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.discord_redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json::<TokenResponse>()
        .await
        .map_err(|e| e.to_string())?;

    let info = client
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json::<UserInfo>()
        .await
        .map_err(|e| e.to_string())?;

    Ok(ProviderIdentity {
        provider_id: info.id,
        email: info.email.unwrap_or_default(),
        display_name: info.username,
    })
}
