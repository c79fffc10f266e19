use std::env;

/// Default mobile-money methods offered on the hosted checkout (Benin).
const DEFAULT_PAYMENT_METHODS: &str = "mtn_bj,moov_bj";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Captive-portal frontend; the gateway redirects customers to `{frontend_url}/payment/return`.
    pub frontend_url: String,
    pub gateway: GatewayConfig,
    /// Single settlement currency (no multi-currency support).
    pub currency: String,
    /// Operator API key for the admin endpoints. Admin routes reject everything when unset.
    pub admin_api_key: Option<String>,
    /// How often the pending-payment sweep runs (0 = disabled).
    pub pending_sweep_interval_secs: u64,
    /// Only payments pending for at least this long are re-verified by the sweep.
    pub pending_sweep_min_age_secs: i64,
    pub dev_mode: bool,
}

/// Moneroo aggregator settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API root including the `/v1` suffix.
    pub base_url: String,
    pub api_key: Option<String>,
    pub webhook_secret: String,
    pub timeout_secs: u64,
    pub methods: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("ZONETICKET_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let gateway_base = env::var("MONEROO_BASE_URL")
            .unwrap_or_else(|_| "https://api.moneroo.io".to_string());

        let methods = env::var("PAYMENT_METHODS")
            .unwrap_or_else(|_| DEFAULT_PAYMENT_METHODS.to_string());

        let webhook_secret = env::var("MONEROO_WEBHOOK_SECRET").unwrap_or_default();
        if webhook_secret.is_empty() {
            tracing::warn!("MONEROO_WEBHOOK_SECRET is not set - every webhook will be rejected");
        }

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "zoneticket.db".to_string()),
            base_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gateway: GatewayConfig {
                base_url: normalize_gateway_url(&gateway_base),
                api_key: env::var("MONEROO_API_KEY").ok().filter(|k| !k.is_empty()),
                webhook_secret,
                timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(15),
                methods: parse_list(&methods),
            },
            currency: env::var("CURRENCY").unwrap_or_else(|_| "XOF".to_string()),
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            pending_sweep_interval_secs: env::var("PENDING_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            pending_sweep_min_age_secs: env::var("PENDING_SWEEP_MIN_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Appends `/v1` unless the configured URL already ends with it.
pub fn normalize_gateway_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
