use super::{DevicePollOutcome, OAuthErrorBody, ProviderIdentity};
use crate::config::Config;
use serde::Deserialize;

const DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_url: String,
    interval: u64,
    expires_in: u64,
}

#[derive(serde::Serialize)]
pub struct DeviceStart {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub interval: u64,
    pub expires_in: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

pub fn authorize_url(config: &Config, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
        AUTHORIZE_URL, config.google_client_id, config.google_redirect_uri, state
    )
}

/// `POST /oauth/google/device`: starts a device-code flow.
pub async fn start_device(config: &Config) -> Result<DeviceStart, String> {
    let client = reqwest::Client::new();
    let resp = client
        .post(DEVICE_CODE_URL)
        .form(&[
            ("client_id", config.google_client_id.as_str()),
            ("scope", "openid email profile"),
        ])
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json::<DeviceCodeResponse>()
        .await
        .map_err(|e| e.to_string())?;

    Ok(DeviceStart {
        device_code: resp.device_code,
        user_code: resp.user_code,
        verification_url: resp.verification_url,
        interval: resp.interval,
        expires_in: resp.expires_in,
    })
}

/// `POST /oauth/google/device/poll`: one poll attempt against the token
/// endpoint, translated into the three poll outcomes the wire contract
/// distinguishes.
pub async fn poll_device(config: &Config, device_code: &str) -> DevicePollOutcome {
    let client = reqwest::Client::new();
    let resp = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", config.google_client_id.as_str()),
            ("client_secret", config.google_client_secret.as_str()),
            ("device_code", device_code),
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
        ])
        .send()
        .await;

    let resp = match resp {
        Ok(r) => r,
        Err(_) => return DevicePollOutcome::AuthorizationPending,
    };

    if resp.status().is_success() {
        let token = match resp.json::<TokenResponse>().await {
            Ok(t) => t,
            Err(_) => return DevicePollOutcome::AuthorizationPending,
        };
        return match fetch_userinfo(&token.access_token).await {
            Ok(identity) => DevicePollOutcome::Granted(identity),
            Err(_) => DevicePollOutcome::AuthorizationPending,
        };
    }

    match resp.json::<OAuthErrorBody>().await {
        Ok(body) => match body.error.as_str() {
            "slow_down" => DevicePollOutcome::SlowDown,
            "expired_token" | "invalid_grant" | "invalid_device_code" => DevicePollOutcome::InvalidDeviceCode,
            _ => DevicePollOutcome::AuthorizationPending,
        },
        Err(_) => DevicePollOutcome::AuthorizationPending,
    }
}

/// `POST /oauth/google/web/callback`: exchanges an authorization code
/// obtained via the web redirect flow.
pub async fn exchange_code(config: &Config, code: &str) -> Result<ProviderIdentity, String> {
    let client = reqwest::Client::new();
    let token = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", config.google_client_id.as_str()),
            ("client_secret", config.google_client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.google_redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json::<TokenResponse>()
        .await
        .map_err(|e| e.to_string())?;

    fetch_userinfo(&token.access_token).await
}

async fn fetch_userinfo(access_token: &str) -> Result<ProviderIdentity, String> {
    let client = reqwest::Client::new();
    let info = client
        .get(USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| e.to_string())?
        .json::<UserInfo>()
        .await
        .map_err(|e| e.to_string())?;

    Ok(ProviderIdentity {
        provider_id: info.sub,
        email: info.email,
        display_name: info.name.unwrap_or_default(),
    })
}
