use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_LOCAL_DIGITS: usize = 7;
pub const MIN_NUMBER_DIGITS: usize = 8;
pub const MAX_NUMBER_DIGITS: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Valid phone number is required.")]
    TooShort,

    #[error("Phone number is too long.")]
    TooLong,

    #[error("Country code is invalid.")]
    InvalidCountryCode,
}

/// A phone number split the way players enter it, plus the full
/// international digit string used as the WhatsApp destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub country_code: String,
    pub local: String,
    pub whatsapp: String,
}

pub fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

impl PhoneNumber {
    /// Normalize raw input.
    ///
    /// Input starting with `+` is taken as a full international number;
    /// anything else is a local number under `country_code` (or the default),
    /// with a single trunk `0` removed.
    pub fn parse(
        raw: &str,
        country_code: Option<&str>,
        default_country_code: &str,
    ) -> Result<Self, PhoneError> {
        let cc_raw = country_code
            .map(str::trim)
            .filter(|cc| !cc.is_empty())
            .unwrap_or(default_country_code);
        let cc_digits = digits(cc_raw);
        if cc_digits.is_empty() || cc_digits.len() > 3 {
            return Err(PhoneError::InvalidCountryCode);
        }

        let raw = raw.trim();
        let (cc_digits, local) = if raw.starts_with('+') {
            let full = digits(raw);
            match full.strip_prefix(cc_digits.as_str()) {
                Some(rest) => (cc_digits.clone(), rest.to_string()),
                None => (String::new(), full),
            }
        } else {
            let local = digits(raw);
            let local = local.strip_prefix('0').map(str::to_string).unwrap_or(local);
            (cc_digits, local)
        };

        if local.len() < MIN_LOCAL_DIGITS {
            return Err(PhoneError::TooShort);
        }
        let whatsapp = format!("{cc_digits}{local}");
        if whatsapp.len() < MIN_NUMBER_DIGITS {
            return Err(PhoneError::TooShort);
        }
        if whatsapp.len() > MAX_NUMBER_DIGITS {
            return Err(PhoneError::TooLong);
        }

        let country_code = if cc_digits.is_empty() {
            String::new()
        } else {
            format!("+{cc_digits}")
        };

        Ok(Self {
            country_code,
            local,
            whatsapp,
        })
    }
}
