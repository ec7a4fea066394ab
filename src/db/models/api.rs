use serde::Serialize;

/// Uniform JSON envelope for every HTTP response the core emits.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDetail>>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: &str) -> Self {
        Self {
            success: true,
            code: 200,
            message: message.to_string(),
            data: Some(data),
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn created(data: T, message: &str) -> Self {
        Self {
            success: true,
            code: 201,
            message: message.to_string(),
            data: Some(data),
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            code: 200,
            message: message.to_string(),
            data: None,
            errors: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn error(code: u16, error_code: &str, message: &str, field: Option<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.to_string(),
            data: None,
            errors: Some(vec![ErrorDetail {
                field,
                code: error_code.to_string(),
                message: message.to_string(),
            }]),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(400, "BAD_REQUEST", message, None)
    }

    pub fn bad_request_code(message: &str, code: &str) -> Self {
        Self::error(400, code, message, None)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::error(401, "UNAUTHORIZED", message, None)
    }

    pub fn not_found(message: &str) -> Self {
        Self::error(404, "NOT_FOUND", message, None)
    }

    pub fn conflict(message: &str, field: Option<String>, error_code: &str) -> Self {
        Self::error(409, error_code, message, field)
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::error(503, "SERVICE_UNAVAILABLE", message, None)
    }

    pub fn gateway_timeout(message: &str) -> Self {
        Self::error(504, "GATEWAY_TIMEOUT", message, None)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::error(500, "INTERNAL_ERROR", message, None)
    }
}

/// Fixed error codes for `POST /auth/register`, per the wire contract.
pub mod register_errors {
    pub const USERNAME_MISSING: &str = "usernameMissing";
    pub const PASSWORD_MISSING: &str = "passwordMissing";
    pub const REPASSWORD_MISSING: &str = "repasswordMissing";
    pub const EMAIL_MISSING: &str = "emailMissing";
    pub const INVALID_EMAIL: &str = "invalidEmail";
    pub const PASSWORDS_DONT_MATCH: &str = "passwordsDontMatch";
    pub const INVALID_USERNAME_FORMAT: &str = "invalidUsernameFormat";
    pub const INVALID_USERNAME_LENGTH: &str = "invalidUsernameLength";
    pub const USERNAME_TAKEN: &str = "usernameTaken";
    pub const EMAIL_TAKEN: &str = "emailTaken";
}
