//! Tagged value type for heterogeneous attribute and pixel elements, and
//! the lossless numeric coercion rules that convert between variants.
//!
//! Grounded on `examples/original_source/src/libhictk/variant/include/hictk/impl/variant_buff_impl.hpp`:
//! the original represents attribute/pixel values with a closed `std::variant`
//! set and converts between them with explicit, checked casts rather than
//! reflection (spec §9, "Tagged variant over runtime reflection").

use std::fmt;

use crate::error::{Error, Result};

/// A value of one of the twelve arithmetic/string types a Cool attribute or
/// pixel element may hold (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::I8(v) => write!(f, "{v}"),
            Variant::I16(v) => write!(f, "{v}"),
            Variant::I32(v) => write!(f, "{v}"),
            Variant::I64(v) => write!(f, "{v}"),
            Variant::U8(v) => write!(f, "{v}"),
            Variant::U16(v) => write!(f, "{v}"),
            Variant::U32(v) => write!(f, "{v}"),
            Variant::U64(v) => write!(f, "{v}"),
            Variant::F32(v) => write!(f, "{v}"),
            Variant::F64(v) => write!(f, "{v}"),
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::Str(v) => write!(f, "{v}"),
        }
    }
}

impl Variant {
    /// Name of the held variant, used in conversion-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::I8(_) => "i8",
            Variant::I16(_) => "i16",
            Variant::I32(_) => "i32",
            Variant::I64(_) => "i64",
            Variant::U8(_) => "u8",
            Variant::U16(_) => "u16",
            Variant::U32(_) => "u32",
            Variant::U64(_) => "u64",
            Variant::F32(_) => "f32",
            Variant::F64(_) => "f64",
            Variant::Bool(_) => "bool",
            Variant::Str(_) => "string",
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Variant::I8(v) => Some(*v as i128),
            Variant::I16(v) => Some(*v as i128),
            Variant::I32(v) => Some(*v as i128),
            Variant::I64(v) => Some(*v as i128),
            Variant::U8(v) => Some(*v as i128),
            Variant::U16(v) => Some(*v as i128),
            Variant::U32(v) => Some(*v as i128),
            Variant::U64(v) => Some(*v as i128),
            Variant::Bool(v) => Some(*v as i128),
            _ => None,
        }
    }

    fn as_f64_lossy(&self) -> Option<f64> {
        match self {
            Variant::F32(v) => Some(*v as f64),
            Variant::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert this value into `i64`, following spec §4.3's coercion rules:
    /// identity when already integral and representable, a checked
    /// round-trip floor test for floats, and a strict decimal parse for
    /// strings (rejecting trailing characters and out-of-range values).
    pub fn to_i64(&self) -> Result<i64> {
        if let Variant::Str(s) = self {
            return parse_integral_str(s, "i64");
        }
        if let Some(x) = self.as_f64_lossy() {
            return float_to_int(x, "i64", i64::MIN as f64, i64::MAX as f64)
                .map(|v| v as i64);
        }
        if let Some(v) = self.as_i128() {
            return i128::try_into(v).map_err(|_| Error::conversion_loss(self, "i64"));
        }
        Err(Error::conversion_loss(self, "i64"))
    }

    /// Convert this value into `u64`, per the same rules as [`Variant::to_i64`].
    pub fn to_u64(&self) -> Result<u64> {
        if let Variant::Str(s) = self {
            return parse_integral_str(s, "u64");
        }
        if let Some(x) = self.as_f64_lossy() {
            return float_to_int(x, "u64", 0.0, u64::MAX as f64).map(|v| v as u64);
        }
        if let Some(v) = self.as_i128() {
            return i128::try_into(v).map_err(|_| Error::conversion_loss(self, "u64"));
        }
        Err(Error::conversion_loss(self, "u64"))
    }

    /// Convert this value into `f64`. Float-to-float conversions are always
    /// permitted, per spec §4.3 ("both floating point: static cast, lossy
    /// permitted").
    pub fn to_f64(&self) -> Result<f64> {
        if let Variant::Str(s) = self {
            return s.parse::<f64>().map_err(|_| Error::conversion_loss(self, "f64"));
        }
        if let Some(x) = self.as_f64_lossy() {
            return Ok(x);
        }
        if let Some(v) = self.as_i128() {
            return Ok(v as f64);
        }
        Err(Error::conversion_loss(self, "f64"))
    }
}

fn parse_integral_str(s: &str, target_type: &'static str) -> Result<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.len() != s.len() {
        return Err(Error::conversion_loss(s, target_type));
    }
    // Reject trailing characters by requiring the whole token to parse as
    // either a decimal integer or an IEEE float, per spec §4.3.
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return float_to_int(v, target_type, i64::MIN as f64, i64::MAX as f64);
    }
    Err(Error::conversion_loss(s, target_type))
}

fn float_to_int(x: f64, target_type: &'static str, min: f64, max: f64) -> Result<i64> {
    if x.floor() != x || x < min || x > max {
        return Err(Error::conversion_loss(x, target_type));
    }
    Ok(x as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conversion_round_trips() {
        assert_eq!(Variant::I32(42).to_i64().unwrap(), 42);
        assert_eq!(Variant::U8(7).to_u64().unwrap(), 7);
    }

    #[test]
    fn float_to_int_requires_exact_value() {
        assert_eq!(Variant::F64(4.0).to_i64().unwrap(), 4);
        assert!(Variant::F64(4.5).to_i64().is_err());
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        assert!(Variant::I64(-1).to_u64().is_err());
    }

    #[test]
    fn string_parsing_accepts_decimal_and_rejects_trailing_chars() {
        assert_eq!(Variant::Str("123".to_string()).to_i64().unwrap(), 123);
        assert!(Variant::Str("123abc".to_string()).to_i64().is_err());
    }

    #[test]
    fn float_to_float_is_always_lossy_permitted() {
        assert!(Variant::F64(1.0 / 3.0).to_f64().is_ok());
    }
}
