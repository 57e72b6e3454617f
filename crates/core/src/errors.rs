use thiserror::Error;

/// Unified error type for the entire valuta-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Amounts / Currencies ────────────────────────────────────────
    #[error("Invalid amount: {0} (must be a positive finite number)")]
    InvalidAmount(f64),

    #[error("Invalid currency code '{0}': must be 2-5 uppercase characters without whitespace")]
    InvalidCurrencyCode(String),

    #[error("Unknown currency '{0}'")]
    CurrencyNotFound(String),

    // ── Wallets ─────────────────────────────────────────────────────
    #[error("No wallet for currency '{0}'")]
    WalletNotFound(String),

    #[error("Wallet for currency '{0}' already exists")]
    DuplicateWallet(String),

    #[error("Insufficient funds: available {available} {code}, required {required} {code}")]
    InsufficientFunds {
        available: f64,
        required: f64,
        code: String,
    },

    // ── Rates / Providers ───────────────────────────────────────────
    #[error("Rate {from} → {to} not found")]
    RateNotFound { from: String, to: String },

    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("No rates available: every provider failed or returned nothing")]
    NoRatesAvailable,

    #[error("Rate snapshot is corrupt: {0}")]
    CorruptSnapshot(String),

    #[error("Unknown rate source '{0}'")]
    UnknownSource(String),

    // ── Users / Session ─────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not logged in")]
    NotLoggedIn,

    // ── Storage / Config ────────────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Build a `ProviderUnavailable` from any displayable reason.
    pub fn unavailable(provider: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CoreError::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly name of the variant, used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidAmount(_) => "InvalidAmount",
            CoreError::InvalidCurrencyCode(_) => "InvalidCurrencyCode",
            CoreError::CurrencyNotFound(_) => "CurrencyNotFound",
            CoreError::WalletNotFound(_) => "WalletNotFound",
            CoreError::DuplicateWallet(_) => "DuplicateWallet",
            CoreError::InsufficientFunds { .. } => "InsufficientFunds",
            CoreError::RateNotFound { .. } => "RateNotFound",
            CoreError::ProviderUnavailable { .. } => "ProviderUnavailable",
            CoreError::NoRatesAvailable => "NoRatesAvailable",
            CoreError::CorruptSnapshot(_) => "CorruptSnapshot",
            CoreError::UnknownSource(_) => "UnknownSource",
            CoreError::Validation(_) => "Validation",
            CoreError::UsernameTaken(_) => "UsernameTaken",
            CoreError::UserNotFound(_) => "UserNotFound",
            CoreError::InvalidCredentials => "InvalidCredentials",
            CoreError::NotLoggedIn => "NotLoggedIn",
            CoreError::FileIO(_) => "FileIO",
            CoreError::Serialization(_) => "Serialization",
            CoreError::Deserialization(_) => "Deserialization",
            CoreError::Config(_) => "Config",
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<tempfile::PersistError> for CoreError {
    fn from(e: tempfile::PersistError) -> Self {
        CoreError::FileIO(e.error.to_string())
    }
}

/// Strip secrets from a provider error message.
///
/// reqwest errors often carry the full request URL. Query parameters are
/// dropped, and the given secret (if any) is masked wherever it appears.
pub fn sanitize_message(msg: &str, secret: Option<&str>) -> String {
    let mut sanitized = match msg.find('?') {
        Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
        None => msg.to_string(),
    };
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        sanitized = sanitized.replace(secret, "<redacted>");
    }
    sanitized
}
