//! The `byte_converter` module of the runtime crate.
//!
//! Scalars always get `ToBytes`/`FromByteSlice` impls; fixed-size arrays only
//! for the element types and lengths some device packet actually uses.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::codegen::rust::primitive;
use crate::error::Result;
use crate::model::{Device, ElementType};

/// Scalars serialised through `byteorder`, with their size in bytes
const BYTEORDER_SCALARS: &[(ElementType, usize)] = &[
    (ElementType::Uint16, 2),
    (ElementType::Int16, 2),
    (ElementType::Uint32, 4),
    (ElementType::Int32, 4),
    (ElementType::Uint64, 8),
    (ElementType::Int64, 8),
    (ElementType::Float, 4),
];

const PREAMBLE: &str = r#"//! Traits for (de)serialization of structs to byte vectors.
use byteorder::*;
use crate::converting_receiver::BrickletError;

/// A trait to serialize the implementing type to a byte vector.
pub trait ToBytes {
    /// Serialize the implementing type to a byte vector.
    fn to_le_bytes(_: Self) -> Vec<u8>;

    /// Try to serialize the implementing type to a byte vector, padded with zero bytes to `max_len`.
    ///
    /// # Errors
    /// Returns an InvalidParameter error if the value is longer than `max_len`.
    fn try_to_le_bytes(var: Self, _max_len: usize) -> Result<Vec<u8>, BrickletError>
    where
        Self: std::marker::Sized,
    {
        Ok(Self::to_le_bytes(var))
    }
}

/// A trait to deserialize the implementing type from a byte slice.
pub trait FromByteSlice {
    /// Deserialize the implementing type from a byte slice.
    fn from_le_bytes(bytes: &[u8]) -> Self;
    /// Returns how many bytes are expected to deserialize an instance of the implementing type.
    fn bytes_expected() -> usize;
}

impl ToBytes for () {
    fn to_le_bytes(_: ()) -> Vec<u8> {
        vec![]
    }
}

impl FromByteSlice for () {
    fn from_le_bytes(_: &[u8]) {}

    fn bytes_expected() -> usize {
        0
    }
}

impl ToBytes for bool {
    fn to_le_bytes(b: bool) -> Vec<u8> {
        vec![b as u8]
    }
}

impl FromByteSlice for bool {
    fn from_le_bytes(bytes: &[u8]) -> bool {
        bytes[0] != 0
    }

    fn bytes_expected() -> usize {
        1
    }
}

impl ToBytes for u8 {
    fn to_le_bytes(num: u8) -> Vec<u8> {
        vec![num]
    }
}

impl FromByteSlice for u8 {
    fn from_le_bytes(bytes: &[u8]) -> u8 {
        bytes[0]
    }

    fn bytes_expected() -> usize {
        1
    }
}

impl ToBytes for i8 {
    fn to_le_bytes(num: i8) -> Vec<u8> {
        vec![num as u8]
    }
}

impl FromByteSlice for i8 {
    fn from_le_bytes(bytes: &[u8]) -> i8 {
        bytes[0] as i8
    }

    fn bytes_expected() -> usize {
        1
    }
}

impl ToBytes for char {
    fn to_le_bytes(c: char) -> Vec<u8> {
        vec![c as u8]
    }
}

impl FromByteSlice for char {
    fn from_le_bytes(bytes: &[u8]) -> char {
        bytes[0] as char
    }

    fn bytes_expected() -> usize {
        1
    }
}

impl ToBytes for String {
    fn to_le_bytes(s: String) -> Vec<u8> {
        s.chars().map(|c| c as u8).collect()
    }

    fn try_to_le_bytes(s: String, max_len: usize) -> Result<Vec<u8>, BrickletError> {
        let bytes = Self::to_le_bytes(s);
        if bytes.len() > max_len {
            return Err(BrickletError::InvalidParameter);
        }
        let mut result = vec![0u8; max_len];
        result[..bytes.len()].copy_from_slice(&bytes);
        Ok(result)
    }
}

impl FromByteSlice for String {
    fn from_le_bytes(bytes: &[u8]) -> String {
        bytes.iter().take_while(|b| **b != 0).map(|b| *b as char).collect()
    }

    fn bytes_expected() -> usize {
        1
    }
}
"#;

fn write_scalar(out: &mut String, ty: &str, size: usize) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "impl ToBytes for {} {{", ty)?;
    writeln!(out, "    fn to_le_bytes(num: {}) -> Vec<u8> {{", ty)?;
    writeln!(out, "        let mut buf = vec![0; {}];", size)?;
    writeln!(out, "        LittleEndian::write_{}(&mut buf, num);", ty)?;
    writeln!(out, "        buf")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl FromByteSlice for {} {{", ty)?;
    writeln!(out, "    fn from_le_bytes(bytes: &[u8]) -> {} {{", ty)?;
    writeln!(out, "        LittleEndian::read_{}(bytes)", ty)?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    fn bytes_expected() -> usize {{")?;
    writeln!(out, "        {}", size)?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_bool_array(out: &mut String, count: usize) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "impl ToBytes for [bool; {}] {{", count)?;
    writeln!(out, "    fn to_le_bytes(arr: [bool; {}]) -> Vec<u8> {{", count)?;
    writeln!(out, "        let mut buf = vec![0u8; {}];", count.div_ceil(8))?;
    writeln!(out, "        for (i, b) in arr.iter().enumerate() {{")?;
    writeln!(out, "            buf[i / 8] |= (*b as u8) << (i % 8);")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        buf")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl FromByteSlice for [bool; {}] {{", count)?;
    writeln!(out, "    fn from_le_bytes(bytes: &[u8]) -> [bool; {}] {{", count)?;
    writeln!(out, "        let mut result = [false; {}];", count)?;
    writeln!(out, "        for (i, b) in result.iter_mut().enumerate() {{")?;
    writeln!(out, "            *b = bytes[i / 8] & (1 << (i % 8)) != 0;")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        result")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    fn bytes_expected() -> usize {{")?;
    writeln!(out, "        {}", count.div_ceil(8))?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Arrays of one-byte items, converted item by item
fn write_byte_array(out: &mut String, ty: &str, count: usize) -> Result<()> {
    let zero = match ty {
        "char" => "'\\0'",
        _ => "0",
    };
    writeln!(out)?;
    writeln!(out, "impl ToBytes for [{}; {}] {{", ty, count)?;
    writeln!(out, "    fn to_le_bytes(arr: [{}; {}]) -> Vec<u8> {{", ty, count)?;
    if ty == "u8" {
        writeln!(out, "        arr.to_vec()")?;
    } else {
        writeln!(out, "        arr.iter().map(|item| *item as u8).collect()")?;
    }
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl FromByteSlice for [{}; {}] {{", ty, count)?;
    writeln!(out, "    fn from_le_bytes(bytes: &[u8]) -> [{}; {}] {{", ty, count)?;
    writeln!(out, "        let mut buf = [{}; {}];", zero, count)?;
    if ty == "u8" {
        writeln!(out, "        buf.copy_from_slice(&bytes[..{}]);", count)?;
    } else {
        writeln!(out, "        for (item, byte) in buf.iter_mut().zip(bytes) {{")?;
        writeln!(out, "            *item = *byte as {};", ty)?;
        writeln!(out, "        }}")?;
    }
    writeln!(out, "        buf")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    fn bytes_expected() -> usize {{")?;
    writeln!(out, "        {}", count)?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_wide_array(out: &mut String, ty: &str, size: usize, count: usize) -> Result<()> {
    let zero = if ty.starts_with('f') { "0.0" } else { "0" };
    writeln!(out)?;
    writeln!(out, "impl ToBytes for [{}; {}] {{", ty, count)?;
    writeln!(out, "    fn to_le_bytes(arr: [{}; {}]) -> Vec<u8> {{", ty, count)?;
    writeln!(out, "        let mut buf = vec![0; {}];", size * count)?;
    writeln!(out, "        LittleEndian::write_{}_into(&arr, &mut buf);", ty)?;
    writeln!(out, "        buf")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl FromByteSlice for [{}; {}] {{", ty, count)?;
    writeln!(out, "    fn from_le_bytes(bytes: &[u8]) -> [{}; {}] {{", ty, count)?;
    writeln!(out, "        let mut buf = [{}; {}];", zero, count)?;
    writeln!(out, "        LittleEndian::read_{}_into(&bytes[..{}], &mut buf);", ty, size * count)?;
    writeln!(out, "        buf")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    fn bytes_expected() -> usize {{")?;
    writeln!(out, "        {}", size * count)?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Fixed-size array types of all packets, ordered by item type and length
pub fn array_types(devices: &[Device]) -> BTreeSet<(ElementType, usize)> {
    devices
        .iter()
        .flat_map(|d| d.packets.iter())
        .flat_map(|p| p.elements.iter())
        .filter(|e| e.is_array() && e.ty != ElementType::String && !e.cardinality.is_variable())
        .map(|e| (e.ty, e.cardinality.count()))
        .collect()
}

/// Render `byte_converter.rs` for a set of devices
pub fn render_byte_converter(devices: &[Device]) -> Result<String> {
    let mut out = String::from(PREAMBLE);
    for (ty, size) in BYTEORDER_SCALARS {
        write_scalar(&mut out, primitive(*ty), *size)?;
    }

    for (ty, count) in array_types(devices) {
        let name = primitive(ty);
        match ty {
            ElementType::Bool => write_bool_array(&mut out, count)?,
            ElementType::Uint8 | ElementType::Int8 | ElementType::Char => write_byte_array(&mut out, name, count)?,
            _ => write_wide_array(&mut out, name, ty.item_size(), count)?,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::types::DeviceConfig;
    use crate::codegen::validation::build_device;

    const SENSOR: &str = r#"
name: Sensor
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 0]
device_identifier: 9002
packets:
  - type: function
    name: Set Flags
    elements:
      - { name: Flags, type: bool, cardinality: 10, direction: in }
  - type: function
    name: Get Samples
    elements:
      - { name: Samples, type: int16, cardinality: 4, direction: out }
      - { name: Label, type: char, cardinality: 6, direction: out }
"#;

    fn devices() -> Vec<Device> {
        let config: DeviceConfig = serde_yaml::from_str(SENSOR).unwrap();
        vec![build_device(config).unwrap()]
    }

    #[test]
    fn test_used_array_types() {
        let types = array_types(&devices());
        assert!(types.contains(&(ElementType::Bool, 10)));
        assert!(types.contains(&(ElementType::Int16, 4)));
        assert!(types.contains(&(ElementType::Char, 6)));
        // uid of get_identity is a string, never an array impl
        assert!(!types.iter().any(|(ty, _)| *ty == ElementType::String));
    }

    #[test]
    fn test_array_impls() {
        let rs = render_byte_converter(&devices()).unwrap();
        assert!(rs.starts_with("//! Traits for (de)serialization of structs to byte vectors.\n"));
        assert!(rs.contains("impl FromByteSlice for u32 {\n    fn from_le_bytes(bytes: &[u8]) -> u32 {\n        LittleEndian::read_u32(bytes)"));
        assert!(rs.contains("impl ToBytes for [bool; 10] {\n    fn to_le_bytes(arr: [bool; 10]) -> Vec<u8> {\n        let mut buf = vec![0u8; 2];"));
        assert!(rs.contains("        LittleEndian::read_i16_into(&bytes[..8], &mut buf);"));
        assert!(rs.contains("impl FromByteSlice for [char; 6] {"));
        assert!(rs.contains("        let mut buf = ['\\0'; 6];"));
        assert!(!rs.contains("[u32; "));
    }
}
