//! Rust bindings: one module per device with a function enum, constants,
//! result structs and byte-serialising methods, plus the `byte_converter`
//! and `mod.rs` shared by all of them.

pub mod bindings;
pub mod byte_converter;
pub mod examples;

use std::fmt::Write;

use tracing::debug;

use crate::codegen::utils::{escape_keyword, rewrite_links};
use crate::codegen::{Emitter, GeneratedFile, GenerationOptions, Language};
use crate::error::Result;
use crate::model::{ConstantValue, Device, Element, ElementType, Name};

pub struct RustEmitter;

pub const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "false", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self", "Self",
    "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become",
    "box", "do", "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
];

/// Device struct name, "HumidityV2Bricklet"
pub fn struct_name(device: &Device) -> String {
    format!("{}{}", device.name.camel(), device.category.as_str())
}

/// Module of the device, "humidity_v2_bricklet"
pub fn module_name(device: &Device) -> String {
    format!("{}_{}", device.name.under(), device.category.as_str().to_lowercase())
}

/// Prefix of module level constants, "HUMIDITY_V2_BRICKLET"
pub fn const_prefix(device: &Device) -> String {
    format!("{}_{}", device.name.upper(), device.category.as_str().to_uppercase())
}

pub fn function_enum(device: &Device) -> String {
    format!("{}Function", struct_name(device))
}

pub fn field_name(name: &Name) -> String {
    escape_keyword(name.under(), KEYWORDS)
}

pub fn param_name(element: &Element) -> String {
    field_name(&element.name)
}

pub fn primitive(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Int8 => "i8",
        ElementType::Uint8 => "u8",
        ElementType::Int16 => "i16",
        ElementType::Uint16 => "u16",
        ElementType::Int32 => "i32",
        ElementType::Uint32 => "u32",
        ElementType::Int64 => "i64",
        ElementType::Uint64 => "u64",
        ElementType::Float => "f32",
        ElementType::Bool => "bool",
        ElementType::Char => "char",
        ElementType::String => "String",
    }
}

/// Owned type of an element as stored in result structs
pub fn rust_type(element: &Element) -> String {
    if element.ty == ElementType::String {
        "String".to_string()
    } else if element.cardinality.is_variable() {
        format!("Vec<{}>", primitive(element.ty))
    } else if element.is_array() {
        format!("[{}; {}]", primitive(element.ty), element.cardinality.count())
    } else {
        primitive(element.ty).to_string()
    }
}

/// Type of an element taken as a method parameter
pub fn param_type(element: &Element) -> String {
    if element.ty == ElementType::String {
        "&str".to_string()
    } else if element.cardinality.is_variable() {
        format!("&[{}]", primitive(element.ty))
    } else {
        rust_type(element)
    }
}

pub fn constant_literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(b) => b.to_string(),
        ConstantValue::Int(i) => i.to_string(),
        ConstantValue::Char(c) => format!("'{}'", c.escape_default()),
    }
}

/// Default value used to pad stream chunks
pub fn default_value(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Char => "'\\0'",
        ElementType::Bool => "false",
        ElementType::Float => "0.0",
        _ => "0",
    }
}

/// Doc text with references as intra-doc links
pub fn doc_text(text: &str) -> String {
    rewrite_links(
        text,
        |name: &Name| format!("[`{0}`](Self::{0})", name.under()),
        |name: &Name| format!("[`get_{0}_callback_receiver`](Self::get_{0}_callback_receiver)", name.under()),
    )
}

impl Emitter for RustEmitter {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn bindings(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        Ok(vec![GeneratedFile::new(
            format!("{}.rs", module_name(device)),
            bindings::render_bindings(device, options)?,
        )])
    }

    fn examples(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        device
            .examples
            .iter()
            .filter(|e| e.supports(Language::Rust.key()))
            .map(|example| {
                Ok(GeneratedFile::new(
                    format!("example_{}.rs", example.name.under()),
                    examples::render_example(device, example, options)?,
                ))
            })
            .collect()
    }

    fn support(&self, devices: &[Device], _options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let mut modules = String::new();
        for device in devices.iter().filter(|d| d.released) {
            writeln!(modules, "pub mod {};", module_name(device))?;
        }
        debug!(devices = devices.len(), "Rendered shared Rust modules");

        Ok(vec![
            GeneratedFile::new("mod.rs", modules),
            GeneratedFile::new("byte_converter.rs", byte_converter::render_byte_converter(devices)?),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Direction};

    #[test]
    fn test_types() {
        let e = Element::new("Values", ElementType::Int16, Cardinality::Fixed(4), Direction::Out);
        assert_eq!(rust_type(&e), "[i16; 4]");
        let e = Element::new("Message", ElementType::Char, Cardinality::Variable { max: 100 }, Direction::In);
        assert_eq!(param_type(&e), "&[char]");
        assert_eq!(rust_type(&e), "Vec<char>");
        let e = Element::new("Type", ElementType::String, Cardinality::Fixed(8), Direction::In);
        assert_eq!(param_type(&e), "&str");
        assert_eq!(param_name(&e), "type_");
    }

    #[test]
    fn test_support_files() {
        let yaml = "name: Piezo Speaker V2\ncategory: Bricklet\nauthor: Jane Doe <jane@example.com>\n\
                    api_version: [2, 0, 0]\ndevice_identifier: 2145\nreleased: false\npackets: []\n";
        let unreleased = crate::codegen::build_device(serde_yaml::from_str(yaml).unwrap()).unwrap();
        let released = crate::codegen::build_device(
            serde_yaml::from_str(&yaml.replace("Piezo Speaker V2", "Motion Detector").replace("released: false", "released: true"))
                .unwrap(),
        )
        .unwrap();

        let files = RustEmitter
            .support(&[unreleased, released], &GenerationOptions::default())
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, std::path::PathBuf::from("mod.rs"));
        assert_eq!(files[0].contents, "pub mod motion_detector_bricklet;\n");
        assert_eq!(files[1].path, std::path::PathBuf::from("byte_converter.rs"));
        assert!(files[1].contents.contains("impl ToBytes for [u8; 3] {"));
    }
}
