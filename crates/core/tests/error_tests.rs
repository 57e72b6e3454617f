// ═══════════════════════════════════════════════════════════════════
// Error Tests — CoreError variants, Display formatting, From impls
// ═══════════════════════════════════════════════════════════════════

use valuta_core::errors::{sanitize_message, CoreError};

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn invalid_amount() {
        let err = CoreError::InvalidAmount(-5.0);
        assert_eq!(
            err.to_string(),
            "Invalid amount: -5 (must be a positive finite number)"
        );
    }

    #[test]
    fn invalid_currency_code() {
        let err = CoreError::InvalidCurrencyCode("usd".into());
        assert!(err.to_string().contains("'usd'"));
    }

    #[test]
    fn insufficient_funds_names_both_amounts() {
        let err = CoreError::InsufficientFunds {
            available: 100.0,
            required: 150.0,
            code: "USD".into(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: available 100 USD, required 150 USD"
        );
    }

    #[test]
    fn rate_not_found() {
        let err = CoreError::RateNotFound {
            from: "BTC".into(),
            to: "RUB".into(),
        };
        assert_eq!(err.to_string(), "Rate BTC → RUB not found");
    }

    #[test]
    fn provider_unavailable() {
        let err = CoreError::unavailable("CoinGecko", "HTTP 429: request rate limit exceeded");
        assert_eq!(
            err.to_string(),
            "Provider CoinGecko unavailable: HTTP 429: request rate limit exceeded"
        );
    }

    #[test]
    fn no_rates_available() {
        assert!(CoreError::NoRatesAvailable.to_string().starts_with("No rates available"));
    }

    #[test]
    fn wallet_errors() {
        assert_eq!(
            CoreError::WalletNotFound("ETH".into()).to_string(),
            "No wallet for currency 'ETH'"
        );
        assert_eq!(
            CoreError::DuplicateWallet("ETH".into()).to_string(),
            "Wallet for currency 'ETH' already exists"
        );
    }

    #[test]
    fn session_errors() {
        assert_eq!(CoreError::NotLoggedIn.to_string(), "Not logged in");
        assert_eq!(
            CoreError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
        assert_eq!(
            CoreError::UsernameTaken("alice".into()).to_string(),
            "Username 'alice' is already taken"
        );
    }
}

// ── kind() ──────────────────────────────────────────────────────────

mod kind {
    use super::*;

    #[test]
    fn stable_names() {
        assert_eq!(CoreError::InvalidAmount(0.0).kind(), "InvalidAmount");
        assert_eq!(CoreError::NoRatesAvailable.kind(), "NoRatesAvailable");
        assert_eq!(CoreError::CorruptSnapshot("x".into()).kind(), "CorruptSnapshot");
        assert_eq!(CoreError::unavailable("p", "r").kind(), "ProviderUnavailable");
        assert_eq!(CoreError::NotLoggedIn.kind(), "NotLoggedIn");
    }
}

// ── From impls ──────────────────────────────────────────────────────

mod from_impls {
    use super::*;

    #[test]
    fn io_error_becomes_file_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::FileIO(ref m) if m.contains("denied")));
    }

    #[test]
    fn serde_json_error_becomes_deserialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn question_mark_propagates_io() {
        fn read_missing() -> Result<String, CoreError> {
            Ok(std::fs::read_to_string("/definitely/not/here/valuta.json")?)
        }
        assert!(matches!(read_missing(), Err(CoreError::FileIO(_))));
    }
}

// ── Secret redaction ────────────────────────────────────────────────

mod sanitize {
    use super::*;

    #[test]
    fn masks_key_and_query() {
        let msg = "error sending request for url (https://v6.exchangerate-api.com/v6/SECRET42/latest/USD?x=1)";
        let out = sanitize_message(msg, Some("SECRET42"));
        assert!(!out.contains("SECRET42"));
        assert!(!out.contains("x=1"));
    }

    #[test]
    fn empty_secret_is_ignored() {
        assert_eq!(sanitize_message("plain", Some("")), "plain");
    }
}
