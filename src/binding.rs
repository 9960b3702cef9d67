//! Typed parameter binding
//!
//! Converts the raw strings captured for `{name}` path variables (and the
//! occasional raw body field) into typed values. String targets are
//! percent-decoded; primitives parse through their own `FromStr` so each
//! width gets the narrowest sufficient, range-checked parse; anything
//! structured goes through the [`Json`] delegate to `serde_json`.
//!
//! Conversion failures are [`BindError`]s, which the dispatcher converts to
//! 500 responses at its single fault boundary.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;

/// Error raised when a raw parameter string cannot convert to the
/// requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No binding with the requested name was captured for this route
    Missing {
        /// The variable name looked up
        name: String,
    },
    /// Not one of `true`/`1`/`false`/`0` (case-insensitive)
    InvalidBool {
        /// The offending raw value
        raw: String,
    },
    /// Non-numeric or out-of-range signed integer
    InvalidSigned {
        /// The offending raw value
        raw: String,
    },
    /// Non-numeric or out-of-range unsigned integer
    InvalidUnsigned {
        /// The offending raw value
        raw: String,
    },
    /// Unparseable floating point value
    InvalidFloat {
        /// The offending raw value
        raw: String,
    },
    /// Multi-character input that did not parse as a character code
    InvalidChar {
        /// The offending raw value
        raw: String,
    },
    /// Structured payload rejected by the deserializer
    InvalidJson {
        /// Deserializer error text
        detail: String,
    },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Missing { name } => write!(f, "Missing parameter: {}", name),
            BindError::InvalidBool { raw } => write!(f, "Invalid boolean value: {}", raw),
            BindError::InvalidSigned { raw } => {
                write!(f, "Invalid signed integer value: {}", raw)
            }
            BindError::InvalidUnsigned { raw } => {
                write!(f, "Invalid unsigned integer value: {}", raw)
            }
            BindError::InvalidFloat { raw } => {
                write!(f, "Invalid floating point value: {}", raw)
            }
            BindError::InvalidChar { raw } => write!(f, "Invalid character value: {}", raw),
            BindError::InvalidJson { detail } => write!(f, "Invalid payload: {}", detail),
        }
    }
}

impl std::error::Error for BindError {}

/// Decode a percent-encoded string.
///
/// `%XX` becomes the encoded byte when both digits are hexadecimal;
/// malformed or truncated escapes pass through literally. `+` decodes to a
/// space.
#[must_use]
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            b'+' => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Conversion from a raw captured string into a typed value.
pub trait FromParam: Sized {
    /// Convert `raw` into `Self`, or report why it cannot be done.
    fn from_param(raw: &str) -> Result<Self, BindError>;
}

/// Look up `name` in the captured bindings and convert it.
pub fn bind<T: FromParam>(
    bindings: &HashMap<String, String>,
    name: &str,
) -> Result<T, BindError> {
    let raw = bindings.get(name).ok_or_else(|| BindError::Missing {
        name: name.to_string(),
    })?;
    T::from_param(raw)
}

impl FromParam for String {
    fn from_param(raw: &str) -> Result<Self, BindError> {
        Ok(percent_decode(raw))
    }
}

impl FromParam for bool {
    fn from_param(raw: &str) -> Result<Self, BindError> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(BindError::InvalidBool {
                raw: raw.to_string(),
            }),
        }
    }
}

macro_rules! signed_from_param {
    ($($ty:ty),*) => {$(
        impl FromParam for $ty {
            fn from_param(raw: &str) -> Result<Self, BindError> {
                raw.parse().map_err(|_| BindError::InvalidSigned {
                    raw: raw.to_string(),
                })
            }
        }
    )*};
}

macro_rules! unsigned_from_param {
    ($($ty:ty),*) => {$(
        impl FromParam for $ty {
            fn from_param(raw: &str) -> Result<Self, BindError> {
                raw.parse().map_err(|_| BindError::InvalidUnsigned {
                    raw: raw.to_string(),
                })
            }
        }
    )*};
}

macro_rules! float_from_param {
    ($($ty:ty),*) => {$(
        impl FromParam for $ty {
            fn from_param(raw: &str) -> Result<Self, BindError> {
                raw.parse().map_err(|_| BindError::InvalidFloat {
                    raw: raw.to_string(),
                })
            }
        }
    )*};
}

signed_from_param!(i8, i16, i32, i64, isize);
unsigned_from_param!(u8, u16, u32, u64, usize);
float_from_param!(f32, f64);

impl FromParam for char {
    fn from_param(raw: &str) -> Result<Self, BindError> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            (None, _) => Ok('\0'),
            // Multi-character input: fall back to a numeric character code.
            (Some(_), Some(_)) => raw
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| BindError::InvalidChar {
                    raw: raw.to_string(),
                }),
        }
    }
}

/// Delegate for structured targets: deserializes the raw string as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> FromParam for Json<T> {
    fn from_param(raw: &str) -> Result<Self, BindError> {
        serde_json::from_str(raw)
            .map(Json)
            .map_err(|e| BindError::InvalidJson {
                detail: e.to_string(),
            })
    }
}
