//! Server configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Typed server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Pool size.
    pub database_max_connections: u32,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Apply embedded migrations at startup.
    pub run_migrations: bool,
    /// Payment provider base URL.
    pub payment_api_base_url: String,
    /// Bearer key for the payment provider.
    pub payment_api_key: String,
    /// HMAC secret for payment notifications.
    pub payment_webhook_secret: String,
    /// Largest accepted notification timestamp skew.
    pub payment_webhook_tolerance: chrono::Duration,
    /// Currency used for checkout sessions.
    pub payment_currency: String,
    /// Where the provider sends the customer after paying.
    pub checkout_success_url: String,
    /// Where the provider sends the customer after abandoning.
    pub checkout_cancel_url: String,
    /// Token granting the admin role.
    pub admin_api_token: String,
    /// Token granting the point-of-sale role, if tills are enabled.
    pub pos_api_token: Option<String>,
    /// Lifetime of vouchers bought in an order.
    pub voucher_validity: chrono::Duration,
    /// Interval between voucher expiry sweeps.
    pub voucher_sweep_interval: Duration,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let env = Env { lookup };
        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            database_max_connections: env.parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            host: env.optional("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: env.parsed("PORT", 3000)?,
            run_migrations: env.parsed("RUN_MIGRATIONS", true)?,
            payment_api_base_url: env.required("PAYMENT_API_BASE_URL")?,
            payment_api_key: env.required("PAYMENT_API_KEY")?,
            payment_webhook_secret: env.required("PAYMENT_WEBHOOK_SECRET")?,
            payment_webhook_tolerance: chrono::Duration::seconds(
                env.parsed("PAYMENT_WEBHOOK_TOLERANCE_SECS", 300)?,
            ),
            payment_currency: env
                .optional("PAYMENT_CURRENCY")
                .unwrap_or_else(|| "gbp".to_owned())
                .to_ascii_lowercase(),
            checkout_success_url: env.required("CHECKOUT_SUCCESS_URL")?,
            checkout_cancel_url: env.required("CHECKOUT_CANCEL_URL")?,
            admin_api_token: env.required("ADMIN_API_TOKEN")?,
            pos_api_token: env.optional("POS_API_TOKEN"),
            voucher_validity: chrono::Duration::days(env.parsed("VOUCHER_VALIDITY_DAYS", 365)?),
            voucher_sweep_interval: Duration::from_secs(
                env.parsed::<u64>("VOUCHER_SWEEP_INTERVAL_SECS", 3600)?.max(1),
            ),
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.optional(key)
            .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/marginalia"),
            ("PAYMENT_API_BASE_URL", "https://pay.example.test"),
            ("PAYMENT_API_KEY", "sk_test"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_test"),
            ("CHECKOUT_SUCCESS_URL", "https://shop.example.test/paid"),
            ("CHECKOUT_CANCEL_URL", "https://shop.example.test/cancelled"),
            ("ADMIN_API_TOKEN", "admin-token"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig, AppError> {
        AppConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()))
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&base()).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_max_connections, 10);
        assert!(config.run_migrations);
        assert_eq!(config.payment_currency, "gbp");
        assert_eq!(config.payment_webhook_tolerance, chrono::Duration::seconds(300));
        assert_eq!(config.voucher_validity, chrono::Duration::days(365));
        assert_eq!(config.voucher_sweep_interval, Duration::from_secs(3600));
        assert!(config.pos_api_token.is_none());
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars = base();
        vars.remove("PAYMENT_WEBHOOK_SECRET");

        let err = load(&vars).unwrap_err();

        assert!(err.to_string().contains("PAYMENT_WEBHOOK_SECRET"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = base();
        vars.insert("PORT", "eighty");

        assert!(matches!(load(&vars), Err(AppError::Config(_))));
    }

    #[test]
    fn test_overrides_parse() {
        let mut vars = base();
        vars.insert("PAYMENT_CURRENCY", "EUR");
        vars.insert("POS_API_TOKEN", "till-token");
        vars.insert("RUN_MIGRATIONS", "false");
        vars.insert("VOUCHER_VALIDITY_DAYS", "30");

        let config = load(&vars).unwrap();

        assert_eq!(config.payment_currency, "eur");
        assert_eq!(config.pos_api_token.as_deref(), Some("till-token"));
        assert!(!config.run_migrations);
        assert_eq!(config.voucher_validity, chrono::Duration::days(30));
    }
}
