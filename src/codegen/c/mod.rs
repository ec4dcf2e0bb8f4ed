//! C/C++ bindings: a header with IDs, constants and prototypes plus a source
//! file with packed wire structs and the function bodies.

pub mod examples;
pub mod header;
pub mod source;

use tracing::debug;

use crate::codegen::utils::escape_keyword;
use crate::codegen::{Emitter, GeneratedFile, GenerationOptions, Language};
use crate::error::Result;
use crate::model::{ConstantValue, Device, Direction, Element, ElementType, Packet, Stream};

pub struct CEmitter;

pub const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else", "enum", "extern",
    "float", "for", "goto", "if", "inline", "int", "long", "register", "restrict", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void", "volatile", "while", "bool",
    "class", "delete", "new", "private", "protected", "public", "template", "this", "throw", "try",
];

/// Function prefix of a device, "humidity_v2"
pub fn prefix(device: &Device) -> String {
    device.name.under()
}

/// Device handle type, "HumidityV2"
pub fn type_name(device: &Device) -> String {
    device.name.camel()
}

/// Prefix of preprocessor names, "HUMIDITY_V2"
pub fn macro_prefix(device: &Device) -> String {
    device.name.upper()
}

pub fn file_stem(device: &Device) -> String {
    device.full_name().under()
}

pub fn c_type(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Int8 => "int8_t",
        ElementType::Uint8 => "uint8_t",
        ElementType::Int16 => "int16_t",
        ElementType::Uint16 => "uint16_t",
        ElementType::Int32 => "int32_t",
        ElementType::Uint32 => "uint32_t",
        ElementType::Int64 => "int64_t",
        ElementType::Uint64 => "uint64_t",
        ElementType::Float => "float",
        ElementType::Bool => "bool",
        ElementType::Char | ElementType::String => "char",
    }
}

pub fn param_name(element: &Element) -> String {
    escape_keyword(element.name.under(), KEYWORDS)
}

/// Byte order conversion helper, `None` for single byte types
pub fn leconvert(ty: ElementType) -> Option<&'static str> {
    match ty {
        ElementType::Int16 => Some("int16"),
        ElementType::Uint16 => Some("uint16"),
        ElementType::Int32 => Some("int32"),
        ElementType::Uint32 => Some("uint32"),
        ElementType::Int64 => Some("int64"),
        ElementType::Uint64 => Some("uint64"),
        ElementType::Float => Some("float"),
        _ => None,
    }
}

pub fn constant_literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(b) => b.to_string(),
        ConstantValue::Int(i) => i.to_string(),
        ConstantValue::Char(c) => format!("'{}'", c),
    }
}

/// Parameter declaration of an element in a low-level function signature
pub fn param_decl(element: &Element) -> String {
    let name = param_name(element);
    let ty = c_type(element.ty);
    let count = element.cardinality.count();
    match (element.direction, element.ty == ElementType::String, element.is_array()) {
        (Direction::In, true, _) => format!("const char *{}", name),
        (Direction::In, false, true) => format!("const {} {}[{}]", ty, name, count),
        (Direction::In, false, false) => format!("{} {}", ty, name),
        (Direction::Out, true, _) => format!("char ret_{}[{}]", name, count),
        (Direction::Out, false, true) => format!("{} ret_{}[{}]", ty, name, count),
        (Direction::Out, false, false) => format!("{} *ret_{}", ty, name),
    }
}

/// Parameter declarations of a high-level element; streams add a length
pub fn high_level_param_decls(element: &Element, stream: &Stream) -> Vec<String> {
    if !element.cardinality.is_variable() {
        return vec![param_decl(element)];
    }
    let name = param_name(element);
    let ty = c_type(element.ty);
    let length_ty = c_type(stream.length_type);
    match element.direction {
        Direction::In => vec![
            format!("const {} *{}", ty, name),
            format!("{} {}_length", length_ty, name),
        ],
        Direction::Out => vec![
            format!("{} *ret_{}", ty, name),
            format!("{} *ret_{}_length", length_ty, name),
        ],
    }
}

/// Full argument list after the device handle
pub fn low_level_params(packet: &Packet) -> Vec<String> {
    packet
        .request_elements()
        .chain(packet.response_elements())
        .map(param_decl)
        .collect()
}

pub fn high_level_params(packet: &Packet, stream: &Stream) -> Vec<String> {
    packet
        .high_level_elements(Direction::In)
        .iter()
        .chain(packet.high_level_elements(Direction::Out).iter())
        .flat_map(|e| high_level_param_decls(e, stream))
        .collect()
}

/// Parameter types of a callback function pointer
pub fn callback_param_decl(element: &Element) -> String {
    let name = param_name(element);
    if element.ty == ElementType::String {
        format!("const char *{}", name)
    } else if element.is_array() {
        format!("{} *{}", c_type(element.ty), name)
    } else {
        format!("{} {}", c_type(element.ty), name)
    }
}

impl Emitter for CEmitter {
    fn language(&self) -> Language {
        Language::C
    }

    fn bindings(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let stem = file_stem(device);
        Ok(vec![
            GeneratedFile::new(format!("{}.h", stem), header::render_header(device, options)?),
            GeneratedFile::new(format!("{}.c", stem), source::render_source(device, options)?),
        ])
    }

    fn examples(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        for example in device.examples.iter().filter(|e| e.supports(Language::C.key())) {
            match examples::render_example(device, example, options)? {
                Some(contents) => {
                    files.push(GeneratedFile::new(format!("example_{}.c", example.name.under()), contents));
                }
                None => debug!(
                    device = %device.full_name(),
                    example = %example.name,
                    "Skipping example using a streamed callback"
                ),
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cardinality;

    #[test]
    fn test_param_decls() {
        let e = Element::new("Channel", ElementType::Uint8, Cardinality::Scalar, Direction::In);
        assert_eq!(param_decl(&e), "uint8_t channel");
        let e = Element::new("Values", ElementType::Int16, Cardinality::Fixed(4), Direction::Out);
        assert_eq!(param_decl(&e), "int16_t ret_values[4]");
        let e = Element::new("UID", ElementType::String, Cardinality::Fixed(8), Direction::Out);
        assert_eq!(param_decl(&e), "char ret_uid[8]");
        let e = Element::new("Default", ElementType::Bool, Cardinality::Scalar, Direction::In);
        assert_eq!(param_decl(&e), "bool default_");
    }
}
