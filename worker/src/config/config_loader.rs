use anyhow::{Context, Result};
use backend::config::config_loader::get_worker;
use url::Url;

use super::config_model::{Database, DotEnvyConfig, Notifications};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let notifications = Notifications {
        webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| Url::parse(&v))
            .transpose()
            .context("NOTIFY_WEBHOOK_URL is invalid")?,
    };

    let schedule = get_worker()?;

    Ok(DotEnvyConfig {
        database,
        notifications,
        schedule,
    })
}
