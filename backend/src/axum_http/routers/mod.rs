pub mod appointments;
pub mod payments;
pub mod screenings;
pub mod slots;
pub mod vaccination_records;
pub mod vaccine_lots;

use axum::http::HeaderMap;

const FALLBACK_CLIENT_IP: &str = "127.0.0.1";

/// First hop of `X-Forwarded-For`, as the gateway wants the customer's address.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(FALLBACK_CLIENT_IP)
        .to_string()
}
