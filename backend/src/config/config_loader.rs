use anyhow::{Ok, Result};
use url::Url;

use super::config_model::{
    AuthSecret, BackendServer, Database, DotEnvyConfig, Notifications, VnPay, Worker,
};

const DEFAULT_VNPAY_EXPIRE_MINUTES: i64 = 15;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 3600;
const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 30;
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 50;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let auth_secret = get_auth_secret()?;

    let vnpay = VnPay {
        tmn_code: std::env::var("VNPAY_TMN_CODE").expect("VNPAY_TMN_CODE is invalid"),
        hash_secret: std::env::var("VNPAY_HASH_SECRET").expect("VNPAY_HASH_SECRET is invalid"),
        pay_url: Url::parse(&std::env::var("VNPAY_PAY_URL").expect("VNPAY_PAY_URL is invalid"))?,
        return_url: std::env::var("VNPAY_RETURN_URL").expect("VNPAY_RETURN_URL is invalid"),
        result_page_url: Url::parse(
            &std::env::var("VNPAY_RESULT_PAGE_URL").expect("VNPAY_RESULT_PAGE_URL is invalid"),
        )?,
        expire_minutes: parse_or("VNPAY_EXPIRE_MINUTES", DEFAULT_VNPAY_EXPIRE_MINUTES)?,
    };

    let notifications = Notifications {
        webhook_url: match std::env::var("NOTIFY_WEBHOOK_URL") {
            std::result::Result::Ok(raw) if !raw.trim().is_empty() => Some(Url::parse(&raw)?),
            _ => None,
        },
    };

    let worker = get_worker()?;

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth_secret,
        vnpay,
        notifications,
        worker,
    })
}

pub fn get_auth_secret() -> Result<AuthSecret> {
    dotenvy::dotenv().ok();

    Ok(AuthSecret {
        jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET is invalid"),
    })
}

pub fn get_worker() -> Result<Worker> {
    dotenvy::dotenv().ok();

    Ok(Worker {
        sweep_interval_secs: parse_or("WORKER_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
        reminder_interval_secs: parse_or(
            "WORKER_REMINDER_INTERVAL_SECS",
            DEFAULT_REMINDER_INTERVAL_SECS,
        )?,
        expiry_warning_days: parse_or("WORKER_EXPIRY_WARNING_DAYS", DEFAULT_EXPIRY_WARNING_DAYS)?,
        low_stock_threshold: parse_or("WORKER_LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?,
    })
}

/// Optional variable; an unset or blank value falls back, a malformed one is an error.
fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        std::result::Result::Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().parse()?),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn optional_values_fall_back_when_unset() {
        unsafe {
            env::remove_var("WORKER_LOW_STOCK_THRESHOLD_TEST_UNSET");
        }
        let value: i32 = parse_or("WORKER_LOW_STOCK_THRESHOLD_TEST_UNSET", 50).unwrap();
        assert_eq!(value, 50);
    }

    #[test]
    fn malformed_optional_value_is_an_error() {
        unsafe {
            env::set_var("WORKER_SWEEP_INTERVAL_TEST_BAD", "soon");
        }
        assert!(parse_or::<u64>("WORKER_SWEEP_INTERVAL_TEST_BAD", 3600).is_err());
    }
}
