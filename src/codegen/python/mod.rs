//! Python bindings and examples.

pub mod bindings;
pub mod examples;

use crate::codegen::utils::{escape_keyword, escape_string, rewrite_links};
use crate::codegen::{Emitter, GeneratedFile, GenerationOptions, Language};
use crate::error::Result;
use crate::model::{ConstantValue, Device, Element, ElementType, Name};

pub struct PythonEmitter;

/// Reserved words, escaped with a trailing underscore
pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

pub fn class_name(device: &Device) -> String {
    device.full_name().camel()
}

pub fn module_name(device: &Device) -> String {
    device.full_name().under()
}

/// Parameter or field name of an element
pub fn param_name(element: &Element) -> String {
    escape_keyword(element.name.under(), KEYWORDS)
}

pub fn constant_literal(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Bool(true) => "True".to_string(),
        ConstantValue::Bool(false) => "False".to_string(),
        ConstantValue::Int(i) => i.to_string(),
        ConstantValue::Char(c) => format!("'{}'", escape_string(&c.to_string())),
    }
}

/// Expression coercing a parameter to its wire type
pub fn coerce(element: &Element, name: &str) -> String {
    if element.ty == ElementType::String {
        return format!("create_string({})", name);
    }
    if element.is_array() {
        match element.ty {
            ElementType::Char => format!("create_char_list({})", name),
            ElementType::Bool => format!("list(map(bool, {}))", name),
            ElementType::Float => format!("list(map(float, {}))", name),
            _ => format!("list(map(int, {}))", name),
        }
    } else {
        match element.ty {
            ElementType::Char => format!("create_char({})", name),
            ElementType::Bool => format!("bool({})", name),
            ElementType::Float => format!("float({})", name),
            _ => format!("int({})", name),
        }
    }
}

/// Zero value used to pad stream chunks
pub fn padding(ty: ElementType) -> &'static str {
    match ty {
        ElementType::Char => "'\\0'",
        ElementType::Bool => "False",
        ElementType::Float => "0.0",
        _ => "0",
    }
}

/// Doc text with `:func:`/`:cb:` references in Python form
pub fn doc_text(text: &str) -> String {
    rewrite_links(
        text,
        |name: &Name| format!(":func:`{}()`", name.under()),
        |name: &Name| format!(":cb:`CALLBACK_{}`", name.upper()),
    )
}

impl Emitter for PythonEmitter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn bindings(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let file_name = format!("{}.py", module_name(device));
        Ok(vec![GeneratedFile::new(
            file_name,
            bindings::render_bindings(device, options)?,
        )])
    }

    fn examples(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let mut files = Vec::new();
        for example in device.examples.iter().filter(|e| e.supports(Language::Python.key())) {
            let file_name = format!("example_{}.py", example.name.under());
            files.push(GeneratedFile::new(
                file_name,
                examples::render_example(device, example, options)?,
            ));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, Direction};

    #[test]
    fn test_keyword_escaping() {
        let element = Element::new("Lambda", ElementType::Uint8, Cardinality::Scalar, Direction::In);
        assert_eq!(param_name(&element), "lambda_");
        let element = Element::new("Mode", ElementType::Uint8, Cardinality::Scalar, Direction::In);
        assert_eq!(param_name(&element), "mode");
    }

    #[test]
    fn test_coercion() {
        let flags = Element::new("Flags", ElementType::Bool, Cardinality::Fixed(4), Direction::In);
        assert_eq!(coerce(&flags, "flags"), "list(map(bool, flags))");
        let text = Element::new("Text", ElementType::String, Cardinality::Fixed(8), Direction::In);
        assert_eq!(coerce(&text, "text"), "create_string(text)");
        assert_eq!(constant_literal(&ConstantValue::Char('x')), "'x'");
    }
}
