use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth_secret: AuthSecret,
    pub vnpay: VnPay,
    pub notifications: Notifications,
    pub worker: Worker,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct VnPay {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: Url,
    pub return_url: String,
    /// Where the customer lands after the gateway redirect is reconciled.
    pub result_page_url: Url,
    pub expire_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub webhook_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub sweep_interval_secs: u64,
    pub reminder_interval_secs: u64,
    pub expiry_warning_days: i64,
    pub low_stock_threshold: i32,
}
