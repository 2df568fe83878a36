use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Column dtype, named the way data-frame tooling prints it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

impl DType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int64",
            Self::Float => "float64",
            Self::Bool => "bool",
            Self::Str => "object",
        }
    }

    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub const fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DType::Bool),
            Self::Int(_) => Some(DType::Int),
            Self::Float(_) => Some(DType::Float),
            Self::Str(_) => Some(DType::Str),
        }
    }

    /// Numeric view; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if !v.is_nan() => Some(*v),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls last, numbers compared by value,
    /// mixed kinds ordered bool < number < string.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(value: &Scalar) -> u8 {
            match value {
                _ if value.is_null() => 3,
                Scalar::Bool(_) => 0,
                Scalar::Int(_) | Scalar::Float(_) => 1,
                Scalar::Str(_) => 2,
                Scalar::Null => 3,
            }
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (a, b) if !a.is_null() && !b.is_null() && rank(a) == 1 && rank(b) == 1 => {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.total_cmp(&b)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_null() && b.is_null() => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits() || a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            _ if self.is_null() => 0u8.hash(state),
            Self::Bool(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Self::Int(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Self::Float(v) => {
                3u8.hash(state);
                // -0.0 and 0.0 compare equal, so they must hash equal.
                let v = if *v == 0.0 { 0.0f64 } else { *v };
                v.to_bits().hash(state);
            }
            Self::Str(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Self::Null => 0u8.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            _ if self.is_null() => f.write_str("NaN"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Null => f.write_str("NaN"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
