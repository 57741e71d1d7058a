use thiserror::Error;

/// Coarse failure classes surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CredentialMissing,
    PermissionDenied,
    InvalidRequest,
    ProviderGeneric,
    NoContentReturned,
    PlaybackFailure,
}

impl ErrorKind {
    /// Best-effort classification of a free-form provider message.
    /// Order matters: key problems win over status codes.
    pub fn sniff(message: &str) -> ErrorKind {
        if message.contains("API Key") {
            ErrorKind::CredentialMissing
        } else if message.contains("403") || message.contains("permission") {
            ErrorKind::PermissionDenied
        } else if message.contains("400") {
            ErrorKind::InvalidRequest
        } else {
            ErrorKind::ProviderGeneric
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API Key is missing or invalid: {0}")]
    CredentialMissing(String),
    #[error("permission denied (403): {0}")]
    PermissionDenied(String),
    #[error("invalid request (400): {0}")]
    InvalidRequest(String),
    #[error("{message}")] Provider {
        status: u16,
        message: String,
    },
    #[error("{0}")] Transport(#[from] reqwest::Error),
    #[error("invalid endpoint URL: {0}")] Endpoint(#[from] url::ParseError),
    #[error("No image generated.")]
    NoImage,
    #[error("No audio generated")]
    NoAudio,
}

impl GatewayError {
    /// Maps a non-success HTTP status plus the provider's error text.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => GatewayError::CredentialMissing(message),
            400 if message.to_lowercase().contains("api key") => {
                GatewayError::CredentialMissing(message)
            }
            400 => GatewayError::InvalidRequest(message),
            403 => GatewayError::PermissionDenied(message),
            _ => GatewayError::Provider { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::CredentialMissing(_) => ErrorKind::CredentialMissing,
            GatewayError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            | GatewayError::Provider { .. }
            | GatewayError::Transport(_)
            | GatewayError::Endpoint(_) => ErrorKind::ProviderGeneric,
            GatewayError::NoImage | GatewayError::NoAudio => ErrorKind::NoContentReturned,
        }
    }
}

/// Shown when a failure carries no message of its own.
pub const GENERIC_ERROR_TEXT: &str = "I'm sorry, I encountered an error.";

/// Text shown to the user for a failed request, without decoration.
pub fn describe_error(err: &GatewayError) -> String {
    let message = err.to_string();
    let kind = match err.kind() {
        ErrorKind::ProviderGeneric => ErrorKind::sniff(&message),
        kind => kind,
    };
    match kind {
        ErrorKind::CredentialMissing =>
            "Error: Invalid API Key. Please check your configuration.".to_string(),
        ErrorKind::PermissionDenied =>
            "Error: Permission denied (403). Your API key might not have access to this model.".to_string(),
        ErrorKind::InvalidRequest =>
            "Error: Invalid request (400). The model might not support this specific prompt or configuration.".to_string(),
        _ if message.trim().is_empty() => GENERIC_ERROR_TEXT.to_string(),
        _ => format!("Error: {}", message),
    }
}

/// Content of the model message appended when a request fails.
pub fn error_message_content(err: &GatewayError) -> String {
    format!("⚠️ **{}**", describe_error(err))
}
