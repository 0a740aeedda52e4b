//! Input validation for API requests.
//!
//! Request bodies are typed per endpoint; these helpers cover the formats the
//! types cannot express (emails, calendar fields, enum values, ranges).

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for a plausible email address
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Regex for a YYYY-MM month
    static ref MONTH_REGEX: Regex = Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate a calendar date (YYYY-MM-DD)
pub fn validate_date(date: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| format!("Invalid {} (expected YYYY-MM-DD)", field_name))
}

/// Normalize a month value to the first of month. Accepts YYYY-MM or a full
/// YYYY-MM-DD date; the day component is discarded.
pub fn normalize_month(month: &str) -> Result<String, String> {
    let ym = if month.len() >= 7 { &month[..7] } else { month };
    if !MONTH_REGEX.is_match(ym) {
        return Err("Invalid month (expected YYYY-MM)".to_string());
    }
    Ok(format!("{}-01", ym))
}

/// Validate a value against a fixed enum set (shift types, statuses)
pub fn validate_one_of(value: &str, allowed: &[&str], field_name: &str) -> Result<(), String> {
    if !allowed.contains(&value) {
        return Err(format!(
            "Invalid {}. Must be one of: {}",
            field_name,
            allowed.join(", ")
        ));
    }
    Ok(())
}

/// Validate a required, non-empty string field
pub fn validate_required(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }
    Ok(())
}

/// Validate a 1-5 satisfaction rating
pub fn validate_rating_value(value: i64) -> Result<(), String> {
    if !(1..=5).contains(&value) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(())
}

/// Minimal password policy for signup and resets
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ops@crown.example").is_ok());
        assert!(validate_email("a.b+tag@sub.domain.co").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "site_id").is_ok());
        assert!(validate_uuid("", "site_id").is_err());
        assert!(validate_uuid("not-a-uuid", "site_id").is_err());
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2025-06-30", "date").is_ok());
        assert!(validate_date("2025-02-29", "date").is_err()); // not a leap year
        assert!(validate_date("30-06-2025", "date").is_err());
        assert!(validate_date("", "date").is_err());
    }

    #[test]
    fn test_normalize_month() {
        assert_eq!(normalize_month("2025-06").unwrap(), "2025-06-01");
        assert_eq!(normalize_month("2025-06-15").unwrap(), "2025-06-01");
        assert!(normalize_month("2025-13").is_err());
        assert!(normalize_month("junk").is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("DAY", &["DAY", "EVENING", "NIGHT"], "shift_type").is_ok());
        assert!(validate_one_of("MORNING", &["DAY", "EVENING", "NIGHT"], "shift_type").is_err());
    }

    #[test]
    fn test_validate_rating_value() {
        for v in 1..=5 {
            assert!(validate_rating_value(v).is_ok());
        }
        assert!(validate_rating_value(0).is_err());
        assert!(validate_rating_value(6).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }
}
