use std::fmt;

pub const AMOUNT_MIN: i64 = 1;
pub const AMOUNT_MAX: i64 = 70_000;
pub const COUNTRY_CODE: &str = "254";
pub const MSISDN_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_amount(amount: i64) -> ValidationResult {
    if !(AMOUNT_MIN..=AMOUNT_MAX).contains(&amount) {
        return Err(ValidationError::new(
            "amount",
            format!("must be between KES {} and KES {}", AMOUNT_MIN, AMOUNT_MAX),
        ));
    }

    Ok(())
}

/// True for a normalized Kenyan mobile number: 254 followed by 7 or 1 and
/// eight more digits.
pub fn is_valid_msisdn(phone: &str) -> bool {
    phone.len() == MSISDN_LEN
        && phone.starts_with(COUNTRY_CODE)
        && matches!(phone.as_bytes()[3], b'1' | b'7')
        && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Normalizes a caller-supplied phone number to international format.
/// Accepts 07XXXXXXXX, 01XXXXXXXX, +2547XXXXXXXX, 2547XXXXXXXX and the
/// bare 9-digit local form. Idempotent: normalizing an already normalized
/// number returns it unchanged.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();

    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("{}{}", COUNTRY_CODE, rest)
    } else if !digits.starts_with(COUNTRY_CODE) && digits.len() == 9 {
        format!("{}{}", COUNTRY_CODE, digits)
    } else {
        digits
    };

    if !is_valid_msisdn(&normalized) {
        return Err(ValidationError::new(
            "phone",
            "must be a valid Kenyan mobile number (e.g. 0712345678, 0112345678)",
        ));
    }

    Ok(normalized)
}
