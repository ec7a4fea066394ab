pub mod discord;
pub mod google;

use serde::Deserialize;

/// Outcome of a successful provider exchange: just enough to look up or
/// provision a local user. OAuth flows never carry passwords.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider_id: String,
    pub email: String,
    pub display_name: String,
}

/// Device-flow poll outcome, mapped onto HTTP statuses by the route
/// handler per the wire contract: `authorization_pending -> 428`,
/// `slow_down -> 429`, `invalid_device_code -> 400`.
#[derive(Debug)]
pub enum DevicePollOutcome {
    Granted(ProviderIdentity),
    AuthorizationPending,
    SlowDown,
    InvalidDeviceCode,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
}
