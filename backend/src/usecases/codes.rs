use chrono::{DateTime, Local};
use rand::Rng;
use uuid::Uuid;

/// `BK-yyyyMMdd-HHmmss-NNNNNN`
pub fn booking_code(now: DateTime<Local>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("BK-{}-{:06}", now.format("%Y%m%d-%H%M%S"), suffix)
}

/// `INV-yyyyMMdd-HHmmss-NNNN`
pub fn invoice_number(now: DateTime<Local>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("INV-{}-{:04}", now.format("%Y%m%d-%H%M%S"), suffix)
}

/// `CERT-yyyyMMdd-XXXXXXXX`
pub fn certificate_number(now: DateTime<Local>) -> String {
    let token = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
    format!("CERT-{}-{}", now.format("%Y%m%d"), token)
}

pub fn cash_transaction_id(booking_code: &str) -> String {
    format!("CASH-{booking_code}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn codes_follow_their_formats() {
        let now = Local.with_ymd_and_hms(2030, 4, 2, 9, 5, 7).unwrap();

        let booking = booking_code(now);
        assert!(booking.starts_with("BK-20300402-090507-"));
        assert_eq!(booking.len(), "BK-20300402-090507-000000".len());

        let invoice = invoice_number(now);
        assert!(invoice.starts_with("INV-20300402-090507-"));
        assert_eq!(invoice.len(), "INV-20300402-090507-0000".len());

        let certificate = certificate_number(now);
        assert!(certificate.starts_with("CERT-20300402-"));
        assert_eq!(certificate.len(), "CERT-20300402-ABCDEF12".len());
    }

    #[test]
    fn same_second_booking_codes_rarely_repeat() {
        let now = Local.with_ymd_and_hms(2030, 4, 2, 9, 5, 7).unwrap();
        let codes: std::collections::HashSet<String> =
            (0..200).map(|_| booking_code(now)).collect();
        assert!(codes.len() >= 198);
    }
}
