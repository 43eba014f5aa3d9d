//! One-time authorization codes.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::scope::Scopes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub session_token: String,
    pub scopes: Scopes,
    pub expires_at: DateTime<Utc>,
}

const SERIAL_FLOOR: u32 = 1000;
const SERIAL_CEILING: u32 = 9999;

/// Four-digit serial embedded in codes; cycles back to 1000 after 9999.
#[derive(Debug)]
pub struct CodeSerial {
    value: AtomicU32,
}

/// Shared by every flow in the process.
pub static CODE_SERIAL: CodeSerial = CodeSerial::starting_at(SERIAL_FLOOR);

impl CodeSerial {
    pub const fn starting_at(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
        }
    }

    pub fn next(&self) -> u32 {
        let advance = |v: u32| if v >= SERIAL_CEILING { SERIAL_FLOOR } else { v + 1 };
        match self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(advance(v)))
        {
            Ok(previous) | Err(previous) => advance(previous),
        }
    }

    /// A fresh code, `OC-<serial>-<uuid>`.
    pub fn new_code(&self) -> String {
        format!("OC-{}-{}", self.next(), Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_wraps_after_9999() {
        let serial = CodeSerial::starting_at(9998);
        assert_eq!(serial.next(), 9999);
        assert_eq!(serial.next(), 1000);
        assert_eq!(serial.next(), 1001);
    }

    #[test]
    fn codes_carry_the_serial() {
        let serial = CodeSerial::starting_at(1000);
        let code = serial.new_code();
        assert!(code.starts_with("OC-1001-"), "{code}");
        assert_eq!(code.len(), "OC-1001-".len() + 32);
    }
}
