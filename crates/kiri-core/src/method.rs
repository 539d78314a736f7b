//! HTTP methods understood by the bridge.

use std::fmt;

/// HTTP method carried in the first byte of a request frame.
///
/// The numeric value is the wire code shared with the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HttpMethod {
    /// `GET` (wire code 0).
    Get = 0,
}

impl HttpMethod {
    /// Returns the wire code of this method.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Maps a wire code back to a method, if it is known.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Get),
            _ => None,
        }
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(HttpMethod::Get.code(), 0);
        assert_eq!(HttpMethod::from_code(0), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_code(1), None);
        assert_eq!(HttpMethod::from_code(255), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
    }
}
