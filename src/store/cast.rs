//! Conversions from untyped store values to Rust types.
//!
//! Values coming from files keep their parsed kind, while values coming from
//! environment variables and command-line flags are always strings, so every
//! conversion here accepts the string spelling of its target as well.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use config::{Value, ValueKind};
use std::time::Duration;

/// A type that can be read from and written to the typed store.
///
/// `cast` returns a human-readable reason on failure; the provider wraps it
/// into a [`ConfigError::CastError`](crate::error::ConfigError::CastError)
/// carrying the key. `Default` is the zero value handed out under the relaxed
/// cast policy, for values that fail to convert and for missing keys.
pub trait ConfigType: Sized + Clone + Default + Send + Sync + 'static {
    /// Name used in cast error messages.
    const TYPE_NAME: &'static str;

    /// Convert an untyped store value.
    fn cast(value: &Value) -> Result<Self, String>;

    /// Convert back into an untyped value, used when installing defaults.
    fn to_value(&self) -> Value;

    /// Value for a key no layer resolves.
    ///
    /// Scalars read as their zero value. Durations, times and slices have no
    /// meaningful zero and report the key as unset instead.
    fn cast_missing() -> Result<Self, String> {
        Ok(Self::default())
    }
}

fn not_set<T>() -> Result<T, String> {
    Err("key is not set".to_string())
}

fn unable(value: &Value, target: &str) -> String {
    format!("unable to cast {} to {}", describe(value), target)
}

fn describe(value: &Value) -> String {
    match &value.kind {
        ValueKind::Nil => "nil".to_string(),
        ValueKind::Boolean(b) => format!("bool {}", b),
        ValueKind::I64(i) => format!("integer {}", i),
        ValueKind::I128(i) => format!("integer {}", i),
        ValueKind::U64(u) => format!("integer {}", u),
        ValueKind::U128(u) => format!("integer {}", u),
        ValueKind::Float(f) => format!("float {}", f),
        ValueKind::String(s) => format!("string {:?}", s),
        ValueKind::Table(_) => "table".to_string(),
        ValueKind::Array(_) => "array".to_string(),
    }
}

/// Strips a trailing `.0`, `.00`, ... so that "10.0" is accepted as an integer.
fn trim_zero_decimal(s: &str) -> &str {
    match s.split_once('.') {
        Some((int_part, frac))
            if !int_part.is_empty() && !frac.is_empty() && frac.bytes().all(|b| b == b'0') =>
        {
            int_part
        }
        _ => s,
    }
}

fn parse_i128(raw: &str) -> Result<i128, String> {
    let s = trim_zero_decimal(raw.trim());
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    if digits.starts_with(['+', '-']) {
        return Err(format!("invalid integer {:?}: misplaced sign", raw));
    }
    let magnitude = i128::from_str_radix(digits, radix)
        .map_err(|e| format!("invalid integer {:?}: {}", raw, e))?;
    if !negative {
        return Ok(magnitude);
    }
    magnitude
        .checked_neg()
        .ok_or_else(|| format!("invalid integer {:?}: out of range", raw))
}

fn to_i128(value: &Value, target: &str) -> Result<i128, String> {
    match &value.kind {
        ValueKind::Nil => Ok(0),
        ValueKind::Boolean(b) => Ok(i128::from(*b)),
        ValueKind::I64(i) => Ok(i128::from(*i)),
        ValueKind::I128(i) => Ok(*i),
        ValueKind::U64(u) => Ok(i128::from(*u)),
        ValueKind::U128(u) => {
            i128::try_from(*u).map_err(|_| format!("{} overflows {}", u, target))
        }
        ValueKind::Float(f) if f.is_finite() => Ok(f.trunc() as i128),
        ValueKind::String(s) => parse_i128(s),
        _ => Err(unable(value, target)),
    }
}

fn to_signed<T: TryFrom<i128>>(value: &Value, target: &str) -> Result<T, String> {
    let wide = to_i128(value, target)?;
    T::try_from(wide).map_err(|_| format!("{} is out of range for {}", wide, target))
}

fn to_unsigned<T: TryFrom<i128>>(value: &Value, target: &str) -> Result<T, String> {
    let wide = to_i128(value, target)?;
    if wide < 0 {
        return Err(format!("unable to cast negative value {} to {}", wide, target));
    }
    T::try_from(wide).map_err(|_| format!("{} is out of range for {}", wide, target))
}

macro_rules! integer_type {
    ($ty:ty, $name:literal, $convert:ident) => {
        impl ConfigType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn cast(value: &Value) -> Result<Self, String> {
                $convert(value, $name)
            }

            fn to_value(&self) -> Value {
                Value::from(*self as i64)
            }
        }
    };
}

integer_type!(i32, "i32", to_signed);
integer_type!(i64, "i64", to_signed);
integer_type!(isize, "isize", to_signed);
integer_type!(u16, "u16", to_unsigned);
integer_type!(u32, "u32", to_unsigned);

impl ConfigType for u64 {
    const TYPE_NAME: &'static str = "u64";

    fn cast(value: &Value) -> Result<Self, String> {
        to_unsigned(value, Self::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ConfigType for usize {
    const TYPE_NAME: &'static str = "usize";

    fn cast(value: &Value) -> Result<Self, String> {
        to_unsigned(value, Self::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::from(*self as u64)
    }
}

impl ConfigType for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn cast(value: &Value) -> Result<Self, String> {
        match &value.kind {
            ValueKind::Nil => Ok(0.0),
            ValueKind::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            ValueKind::I64(i) => Ok(*i as f64),
            ValueKind::I128(i) => Ok(*i as f64),
            ValueKind::U64(u) => Ok(*u as f64),
            ValueKind::U128(u) => Ok(*u as f64),
            ValueKind::Float(f) => Ok(*f),
            ValueKind::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid float {:?}: {}", s, e)),
            _ => Err(unable(value, Self::TYPE_NAME)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

impl ConfigType for bool {
    const TYPE_NAME: &'static str = "bool";

    fn cast(value: &Value) -> Result<Self, String> {
        match &value.kind {
            ValueKind::Nil => Ok(false),
            ValueKind::Boolean(b) => Ok(*b),
            ValueKind::I64(i) => Ok(*i != 0),
            ValueKind::I128(i) => Ok(*i != 0),
            ValueKind::U64(u) => Ok(*u != 0),
            ValueKind::U128(u) => Ok(*u != 0),
            ValueKind::Float(f) => Ok(*f != 0.0),
            ValueKind::String(s) => {
                parse_bool(s).ok_or_else(|| format!("invalid boolean {:?}", s))
            }
            _ => Err(unable(value, Self::TYPE_NAME)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ConfigType for String {
    const TYPE_NAME: &'static str = "string";

    fn cast(value: &Value) -> Result<Self, String> {
        match &value.kind {
            ValueKind::Nil => Ok(String::new()),
            ValueKind::Boolean(b) => Ok(b.to_string()),
            ValueKind::I64(i) => Ok(i.to_string()),
            ValueKind::I128(i) => Ok(i.to_string()),
            ValueKind::U64(u) => Ok(u.to_string()),
            ValueKind::U128(u) => Ok(u.to_string()),
            ValueKind::Float(f) => Ok(f.to_string()),
            ValueKind::String(s) => Ok(s.clone()),
            _ => Err(unable(value, Self::TYPE_NAME)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(self.as_str())
    }
}

const NANOS_PER_UNIT: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("μs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
];

/// Parses Go-style duration strings such as `300ms`, `1h2m3.5s` or `-0`.
///
/// A bare number without any unit is taken as nanoseconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Some(rest) = s.strip_prefix('-') {
        if rest.trim_matches('0').is_empty() {
            return Ok(Duration::ZERO);
        }
        return Err(format!("negative duration {:?}", raw));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    if !s.chars().any(|c| c.is_alphabetic()) {
        let nanos = parse_i128(s).map_err(|_| format!("invalid duration {:?}", raw))?;
        let nanos = u64::try_from(nanos).map_err(|_| format!("invalid duration {:?}", raw))?;
        return Ok(Duration::from_nanos(nanos));
    }

    let mut total_nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", raw))?;
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", raw));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", raw))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let scale = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| format!("unknown unit {:?} in duration {:?}", unit, raw))?;
        total_nanos += number * scale;
        rest = &rest[unit_len..];
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration {:?} overflows", raw));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Formats a duration the way [`parse_duration`] reads it back, e.g. `1m30s`.
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    let nanos = duration.as_nanos();
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}us", trim_float(nanos as f64 / 1e3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", trim_float(nanos as f64 / 1e6));
    }

    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = (secs % 60) as f64 + f64::from(duration.subsec_nanos()) / 1e9;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{}s", trim_float(seconds)));
    out
}

fn trim_float(value: f64) -> String {
    let text = format!("{:.9}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl ConfigType for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn cast(value: &Value) -> Result<Self, String> {
        match &value.kind {
            ValueKind::Nil => Ok(Duration::ZERO),
            ValueKind::I64(_) | ValueKind::I128(_) | ValueKind::U64(_) | ValueKind::U128(_) => {
                let nanos: u64 = to_unsigned(value, Self::TYPE_NAME)?;
                Ok(Duration::from_nanos(nanos))
            }
            ValueKind::Float(f) if *f >= 0.0 && f.is_finite() => {
                Ok(Duration::from_nanos(f.trunc() as u64))
            }
            ValueKind::String(s) => parse_duration(s),
            _ => Err(unable(value, Self::TYPE_NAME)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(format_duration(*self))
    }

    fn cast_missing() -> Result<Self, String> {
        not_set()
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let s = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }
    Err(format!("unable to parse time {:?}", raw))
}

impl ConfigType for DateTime<Utc> {
    const TYPE_NAME: &'static str = "time";

    fn cast(value: &Value) -> Result<Self, String> {
        match &value.kind {
            ValueKind::Nil => Ok(DateTime::<Utc>::default()),
            ValueKind::I64(_) | ValueKind::I128(_) | ValueKind::U64(_) | ValueKind::U128(_) => {
                let secs: i64 = to_signed(value, Self::TYPE_NAME)?;
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| format!("timestamp {} is out of range", secs))
            }
            ValueKind::String(s) => parse_time(s),
            _ => Err(unable(value, Self::TYPE_NAME)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from(self.to_rfc3339())
    }

    fn cast_missing() -> Result<Self, String> {
        not_set()
    }
}

fn to_slice<T: ConfigType>(value: &Value, target: &str) -> Result<Vec<T>, String> {
    match &value.kind {
        ValueKind::Nil => Ok(Vec::new()),
        ValueKind::Array(items) => items.iter().map(T::cast).collect(),
        ValueKind::String(s) => s
            .split_whitespace()
            .map(|part| T::cast(&Value::from(part)))
            .collect(),
        _ => Err(unable(value, target)),
    }
}

impl ConfigType for Vec<i64> {
    const TYPE_NAME: &'static str = "[]i64";

    fn cast(value: &Value) -> Result<Self, String> {
        to_slice(value, Self::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn cast_missing() -> Result<Self, String> {
        not_set()
    }
}

impl ConfigType for Vec<String> {
    const TYPE_NAME: &'static str = "[]string";

    fn cast(value: &Value) -> Result<Self, String> {
        to_slice(value, Self::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn cast_missing() -> Result<Self, String> {
        not_set()
    }
}
