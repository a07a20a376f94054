use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use url::{Url, form_urlencoded};

use crate::domain::value_objects::payments::GatewayCallback;

type HmacSha512 = Hmac<Sha512>;

const VERSION: &str = "2.1.0";
const COMMAND_PAY: &str = "pay";
const CURRENCY: &str = "VND";
const ORDER_TYPE: &str = "other";
const LOCALE: &str = "vn";
const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";
/// Gateway timestamps are local to Vietnam.
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Debug, Clone)]
pub struct VnPayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: Url,
    pub return_url: String,
    pub expire_minutes: i64,
}

/// Signed-redirect payment gateway client.
pub struct VnPayClient {
    config: VnPayConfig,
}

impl VnPayClient {
    pub fn new(config: VnPayConfig) -> Self {
        Self { config }
    }

    /// Builds the redirect URL the customer is sent to. `amount` is in whole VND.
    pub fn create_payment_url(
        &self,
        amount: i64,
        order_ref: &str,
        order_info: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)
            .context("invalid gateway utc offset")?;
        let created = now.with_timezone(&offset);
        let expires = created + Duration::minutes(self.config.expire_minutes);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), COMMAND_PAY.to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), (amount * 100).to_string());
        params.insert("vnp_CurrCode".to_string(), CURRENCY.to_string());
        params.insert("vnp_TxnRef".to_string(), order_ref.to_string());
        params.insert("vnp_OrderInfo".to_string(), order_info.to_string());
        params.insert("vnp_OrderType".to_string(), ORDER_TYPE.to_string());
        params.insert("vnp_Locale".to_string(), LOCALE.to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), client_ip.to_string());
        params.insert(
            "vnp_CreateDate".to_string(),
            created.format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            "vnp_ExpireDate".to_string(),
            expires.format("%Y%m%d%H%M%S").to_string(),
        );

        let query = canonical_query(&params);
        let secure_hash = self.sign(&query)?;

        Ok(format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, SECURE_HASH, secure_hash
        ))
    }

    /// Parses the return/IPN query string and checks its signature.
    /// An invalid or missing signature is reported, not raised.
    pub fn verify_callback(&self, raw_query: &str) -> Result<GatewayCallback> {
        let mut params = BTreeMap::new();
        let mut provided_hash = None;

        for (key, value) in form_urlencoded::parse(raw_query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                SECURE_HASH => provided_hash = Some(value.into_owned()),
                SECURE_HASH_TYPE => {}
                name if name.starts_with("vnp_") => {
                    params.insert(key.into_owned(), value.into_owned());
                }
                _ => {}
            }
        }

        let signature_valid = match provided_hash {
            Some(provided) => self.matches(&canonical_query(&params), &provided)?,
            None => false,
        };

        Ok(GatewayCallback {
            order_ref: params.get("vnp_TxnRef").cloned(),
            response_code: params.get("vnp_ResponseCode").cloned(),
            transaction_id: params.get("vnp_TransactionNo").cloned(),
            signature_valid,
        })
    }

    fn sign(&self, data: &str) -> Result<String> {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())?;
        mac.update(data.as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }

    fn matches(&self, data: &str, provided_hex: &str) -> Result<bool> {
        let Ok(provided) = hex::decode(provided_hex) else {
            return Ok(false);
        };
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())?;
        mac.update(data.as_bytes());
        Ok(mac.verify_slice(&provided).is_ok())
    }
}

/// Sorted `key=value` pairs with form-encoded values; empty values are skipped.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| {
            format!(
                "{}={}",
                key,
                form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
