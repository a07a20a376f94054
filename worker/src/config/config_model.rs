use backend::config::config_model::Worker;
use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub notifications: Notifications,
    pub schedule: Worker,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    pub webhook_url: Option<Url>,
}
