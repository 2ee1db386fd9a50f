//! Scalar element encodings and packet format strings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TelemetryError};

/// Byte order of every element in a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Least significant byte first (`<`).
    Little,
    /// Most significant byte first (`>` or `!`).
    Big,
}

impl Endianness {
    /// Byte order of the host (`=` and `@` prefixes).
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") { Endianness::Little } else { Endianness::Big }
    }

    const fn prefix(self) -> char {
        match self {
            Endianness::Little => '<',
            Endianness::Big => '>',
        }
    }
}

/// Supported scalar element types.
///
/// Codes follow the usual struct-format letters, with standard sizes
/// (`l`/`L` are 4 bytes). Values travel as `f64`, so the 64-bit integer codes
/// `q`/`Q` are not accepted: they could not be decoded without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// `b`
    Int8,
    /// `B`
    UInt8,
    /// `h`
    Int16,
    /// `H`
    UInt16,
    /// `i` or `l`
    Int32,
    /// `I` or `L`
    UInt32,
    /// `f`
    Float32,
    /// `d`
    Float64,
    /// `?`
    Bool,
}

impl ElementType {
    /// Parse a single format code.
    pub fn from_code(code: char) -> Option<Self> {
        let element = match code {
            'b' => ElementType::Int8,
            'B' => ElementType::UInt8,
            'h' => ElementType::Int16,
            'H' => ElementType::UInt16,
            'i' | 'l' => ElementType::Int32,
            'I' | 'L' => ElementType::UInt32,
            'f' => ElementType::Float32,
            'd' => ElementType::Float64,
            '?' => ElementType::Bool,
            _ => return None,
        };
        Some(element)
    }

    /// Canonical format code for this type.
    pub const fn code(&self) -> char {
        match self {
            ElementType::Int8 => 'b',
            ElementType::UInt8 => 'B',
            ElementType::Int16 => 'h',
            ElementType::UInt16 => 'H',
            ElementType::Int32 => 'i',
            ElementType::UInt32 => 'I',
            ElementType::Float32 => 'f',
            ElementType::Float64 => 'd',
            ElementType::Bool => '?',
        }
    }

    /// Returns the size in bytes of this element type.
    pub const fn size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 | ElementType::Bool => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }

    /// Whether values must be whole numbers to be encoded.
    pub const fn is_integer(&self) -> bool {
        !matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    /// Inclusive range of values an integer encoding can hold. Every bound is
    /// exactly representable as `f64`.
    fn integer_range(&self) -> (f64, f64) {
        match self {
            ElementType::Int8 => (i8::MIN as f64, i8::MAX as f64),
            ElementType::UInt8 => (0.0, u8::MAX as f64),
            ElementType::Int16 => (i16::MIN as f64, i16::MAX as f64),
            ElementType::UInt16 => (0.0, u16::MAX as f64),
            ElementType::Int32 => (i32::MIN as f64, i32::MAX as f64),
            ElementType::UInt32 => (0.0, u32::MAX as f64),
            ElementType::Bool => (0.0, 1.0),
            ElementType::Float32 | ElementType::Float64 => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// Nearest value this type can encode: integers are rounded and clamped,
    /// non-finite values become 0. Floats pass through, clamped to the `f32`
    /// range for 32-bit encodings.
    pub fn nearest_representable(&self, value: f64) -> f64 {
        match self {
            ElementType::Float64 => value,
            ElementType::Float32 => value.clamp(f32::MIN as f64, f32::MAX as f64),
            _ if !value.is_finite() => 0.0,
            _ => {
                let (min, max) = self.integer_range();
                value.round().clamp(min, max)
            }
        }
    }

    /// Read one element from `bytes`, which must be exactly `size()` long.
    pub fn read(&self, bytes: &[u8], endianness: Endianness) -> f64 {
        macro_rules! read_as {
            ($ty:ty) => {{
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                match endianness {
                    Endianness::Little => <$ty>::from_le_bytes(raw),
                    Endianness::Big => <$ty>::from_be_bytes(raw),
                }
            }};
        }

        match self {
            ElementType::Int8 => read_as!(i8) as f64,
            ElementType::UInt8 => read_as!(u8) as f64,
            ElementType::Int16 => read_as!(i16) as f64,
            ElementType::UInt16 => read_as!(u16) as f64,
            ElementType::Int32 => read_as!(i32) as f64,
            ElementType::UInt32 => read_as!(u32) as f64,
            ElementType::Float32 => widen_f32(read_as!(f32)),
            ElementType::Float64 => read_as!(f64),
            ElementType::Bool => {
                if bytes.first().copied().unwrap_or(0) != 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Check that `value` can be represented, returning the reason when it cannot.
    pub fn check(&self, value: f64) -> std::result::Result<(), String> {
        match self {
            ElementType::Float64 => Ok(()),
            ElementType::Float32 => {
                if value.is_finite() && (value as f32).is_infinite() {
                    Err("value overflows a 32-bit float".to_string())
                } else {
                    Ok(())
                }
            }
            _ => {
                if !value.is_finite() {
                    return Err("integer encodings cannot hold NaN or infinity".to_string());
                }
                if value.fract() != 0.0 {
                    return Err("integer encodings require a whole number".to_string());
                }
                let (min, max) = self.integer_range();
                if value < min || value > max {
                    return Err(format!("value outside [{min}, {max}]"));
                }
                Ok(())
            }
        }
    }

    /// Append the encoding of `value` to `out`. Callers run [`check`](Self::check) first.
    pub fn write(&self, value: f64, endianness: Endianness, out: &mut Vec<u8>) {
        macro_rules! write_as {
            ($v:expr) => {{
                let v = $v;
                match endianness {
                    Endianness::Little => out.extend_from_slice(&v.to_le_bytes()),
                    Endianness::Big => out.extend_from_slice(&v.to_be_bytes()),
                }
            }};
        }

        match self {
            ElementType::Int8 => write_as!(value as i8),
            ElementType::UInt8 => write_as!(value as u8),
            ElementType::Int16 => write_as!(value as i16),
            ElementType::UInt16 => write_as!(value as u16),
            ElementType::Int32 => write_as!(value as i32),
            ElementType::UInt32 => write_as!(value as u32),
            ElementType::Float32 => write_as!(narrow_f64(value)),
            ElementType::Float64 => write_as!(value),
            ElementType::Bool => out.push(u8::from(value != 0.0)),
        }
    }
}

/// Widen an `f32`, keeping the payload and signalling bit of NaNs.
fn widen_f32(value: f32) -> f64 {
    if !value.is_nan() {
        return value as f64;
    }
    let bits = value.to_bits();
    let sign = u64::from(bits >> 31) << 63;
    let payload = u64::from(bits & 0x007f_ffff) << 29;
    f64::from_bits(sign | 0x7ff0_0000_0000_0000 | payload)
}

/// Inverse of [`widen_f32`]; a NaN whose payload does not fit stays quiet.
fn narrow_f64(value: f64) -> f32 {
    if !value.is_nan() {
        return value as f32;
    }
    let bits = value.to_bits();
    let sign = ((bits >> 63) as u32) << 31;
    let payload = match ((bits >> 29) & 0x007f_ffff) as u32 {
        0 => 0x0040_0000,
        payload => payload,
    };
    f32::from_bits(sign | 0x7f80_0000 | payload)
}

/// Largest UDP payload over IPv4; no layout may exceed it.
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

/// Layout of a fixed-size, homogeneous datagram, e.g. `<30f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PacketFormat {
    /// Byte order of every element
    pub endianness: Endianness,
    /// Element type shared by every slot
    pub element_type: ElementType,
    /// Number of elements per datagram
    pub count: usize,
}

impl PacketFormat {
    /// Create a format from its parts.
    pub fn new(endianness: Endianness, element_type: ElementType, count: usize) -> Self {
        Self { endianness, element_type, count }
    }

    /// Parse a struct-style format string.
    ///
    /// Accepts an optional byte-order prefix followed by one or more
    /// `[count]code` groups that all use the same code: `<30f`, `>4d`,
    /// `<fff`, `<2f1f`. Whitespace between groups is ignored. Without a prefix
    /// the host byte order is used.
    pub fn parse(format: &str) -> Result<Self> {
        let invalid = |details: String| TelemetryError::Parse {
            context: format!("packet format '{format}'"),
            details,
        };

        let mut chars = format.trim().chars().peekable();
        let endianness = match chars.peek() {
            Some('<') => Some(Endianness::Little),
            Some('>') | Some('!') => Some(Endianness::Big),
            Some('=') | Some('@') => Some(Endianness::native()),
            _ => None,
        };
        if endianness.is_some() {
            chars.next();
        }

        let mut element_type: Option<ElementType> = None;
        let mut count = 0usize;
        let mut repeat = String::new();

        for c in chars {
            if c.is_whitespace() {
                continue;
            }
            if c.is_ascii_digit() {
                repeat.push(c);
                continue;
            }

            let code = ElementType::from_code(c)
                .ok_or_else(|| invalid(format!("unsupported element code '{c}'")))?;
            match element_type {
                None => element_type = Some(code),
                Some(existing) if existing != code => {
                    return Err(invalid(format!(
                        "mixed element codes '{}' and '{}' are not supported",
                        existing.code(),
                        code.code()
                    )));
                }
                Some(_) => {}
            }

            let n = if repeat.is_empty() {
                1
            } else {
                repeat.parse::<usize>().map_err(|e| invalid(e.to_string()))?
            };
            repeat.clear();
            count = count.checked_add(n).ok_or_else(|| invalid("element count overflows".into()))?;
        }

        if !repeat.is_empty() {
            return Err(invalid(format!("repeat count '{repeat}' has no element code")));
        }
        let element_type = element_type.ok_or_else(|| invalid("no element code".to_string()))?;
        count
            .checked_mul(element_type.size())
            .filter(|&bytes| bytes <= MAX_DATAGRAM_BYTES)
            .ok_or_else(|| invalid(format!("layout exceeds the {MAX_DATAGRAM_BYTES}-byte datagram limit")))?;

        Ok(Self { endianness: endianness.unwrap_or_else(Endianness::native), element_type, count })
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        self.element_type.size()
    }

    /// Total datagram size in bytes, saturating for layouts built by hand
    /// with absurd counts ([`parse`](Self::parse) never yields one).
    pub fn byte_length(&self) -> usize {
        self.count.saturating_mul(self.element_size())
    }
}

impl fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.endianness.prefix(), self.count, self.element_type.code())
    }
}

impl FromStr for PacketFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PacketFormat {
    type Error = TelemetryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PacketFormat> for String {
    fn from(value: PacketFormat) -> Self {
        value.to_string()
    }
}
