//! Typed packet fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::name::Name;

/// Primitive wire type of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Bool,
    Char,
    String,
}

impl ElementType {
    /// Size of one item on the wire in bytes
    pub fn item_size(self) -> usize {
        match self {
            ElementType::Int8
            | ElementType::Uint8
            | ElementType::Bool
            | ElementType::Char
            | ElementType::String => 1,
            ElementType::Int16 | ElementType::Uint16 => 2,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float => 4,
            ElementType::Int64 | ElementType::Uint64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ElementType::Int8
                | ElementType::Uint8
                | ElementType::Int16
                | ElementType::Uint16
                | ElementType::Int32
                | ElementType::Uint32
                | ElementType::Int64
                | ElementType::Uint64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ElementType::Int8 | ElementType::Int16 | ElementType::Int32 | ElementType::Int64
        )
    }

    /// Inclusive value range of an integer type, `None` for the others
    pub fn int_range(self) -> Option<(i128, i128)> {
        let bits = (self.item_size() * 8) as u32;
        if !self.is_integer() {
            None
        } else if self.is_signed() {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::Uint8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::Uint16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::Uint32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::Uint64 => "uint64",
            ElementType::Float => "float",
            ElementType::Bool => "bool",
            ElementType::Char => "char",
            ElementType::String => "string",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an element travels in the request or in the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Number of items carried by an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Scalar,
    Fixed(usize),
    /// Only used by derived high-level stream elements
    Variable { max: usize },
}

impl Cardinality {
    /// Map the config convention (1, n > 1, negative) to a cardinality
    pub fn from_count(count: i64, max: usize) -> Self {
        match count {
            1 => Cardinality::Scalar,
            n if n > 1 => Cardinality::Fixed(n as usize),
            _ => Cardinality::Variable { max },
        }
    }

    /// Item count on the wire, the maximum for variable streams
    pub fn count(self) -> usize {
        match self {
            Cardinality::Scalar => 1,
            Cardinality::Fixed(n) => n,
            Cardinality::Variable { max } => max,
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(self, Cardinality::Variable { .. })
    }

    /// Config convention: 1, n, or -1 for variable
    pub fn as_config(self) -> i64 {
        match self {
            Cardinality::Scalar => 1,
            Cardinality::Fixed(n) => n as i64,
            Cardinality::Variable { .. } => -1,
        }
    }
}

impl Serialize for Cardinality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_config())
    }
}

/// A typed field of a packet
#[derive(Debug, Clone)]
pub struct Element {
    pub name: Name,
    pub ty: ElementType,
    pub cardinality: Cardinality,
    pub direction: Direction,
    pub constant_group: Option<Name>,
    pub unit: Option<String>,
    pub divisor: Option<f64>,
    pub range: Option<(i64, i64)>,
    pub default: Option<serde_json::Value>,
}

impl Element {
    pub fn new(name: &str, ty: ElementType, cardinality: Cardinality, direction: Direction) -> Self {
        Self {
            name: Name::new(name),
            ty,
            cardinality,
            direction,
            constant_group: None,
            unit: None,
            divisor: None,
            range: None,
            default: None,
        }
    }

    /// Wire size in bytes; bool arrays are bit-packed
    pub fn size(&self) -> usize {
        match (self.ty, self.cardinality) {
            (ElementType::Bool, Cardinality::Fixed(n)) => n.div_ceil(8),
            (ElementType::Bool, Cardinality::Variable { max }) => max.div_ceil(8),
            (ty, cardinality) => ty.item_size() * cardinality.count(),
        }
    }

    /// Strings are a single value regardless of their byte length
    pub fn is_array(&self) -> bool {
        self.ty != ElementType::String && !matches!(self.cardinality, Cardinality::Scalar)
    }

    pub fn is_packed_bool_array(&self) -> bool {
        self.ty == ElementType::Bool && self.is_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        let e = Element::new("Value", ElementType::Int32, Cardinality::Scalar, Direction::Out);
        assert_eq!(e.size(), 4);

        let e = Element::new("Data", ElementType::Uint16, Cardinality::Fixed(30), Direction::In);
        assert_eq!(e.size(), 60);

        let e = Element::new("Text", ElementType::String, Cardinality::Fixed(16), Direction::In);
        assert_eq!(e.size(), 16);
        assert!(!e.is_array());
    }

    #[test]
    fn test_bool_arrays_are_bit_packed() {
        let e = Element::new("Values", ElementType::Bool, Cardinality::Fixed(9), Direction::Out);
        assert_eq!(e.size(), 2);
        assert!(e.is_packed_bool_array());

        let e = Element::new("Values", ElementType::Bool, Cardinality::Fixed(16), Direction::Out);
        assert_eq!(e.size(), 2);
    }

    #[test]
    fn test_int_range() {
        assert_eq!(ElementType::Uint16.int_range(), Some((0, 65535)));
        assert_eq!(ElementType::Int8.int_range(), Some((-128, 127)));
        assert_eq!(ElementType::Uint64.int_range(), Some((0, u64::MAX as i128)));
        assert_eq!(ElementType::Float.int_range(), None);
    }

    #[test]
    fn test_cardinality_from_count() {
        assert_eq!(Cardinality::from_count(1, 0), Cardinality::Scalar);
        assert_eq!(Cardinality::from_count(4, 0), Cardinality::Fixed(4));
        assert_eq!(Cardinality::from_count(-1, 118), Cardinality::Variable { max: 118 });
    }
}
