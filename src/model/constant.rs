//! Named enumerations referenced by elements.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::element::ElementType;
use super::name::Name;

/// Literal value of a constant
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    Char(char),
}

impl ConstantValue {
    /// Check that the literal is representable in `ty`
    pub fn fits(&self, ty: ElementType) -> bool {
        match (self, ty) {
            (ConstantValue::Bool(_), ElementType::Bool) => true,
            (ConstantValue::Char(c), ElementType::Char) => c.is_ascii(),
            (ConstantValue::Int(v), ty) => match ty.int_range() {
                Some((min, max)) => (*v as i128) >= min && (*v as i128) <= max,
                None => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Bool(b) => write!(f, "{}", b),
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Char(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constant {
    pub name: Name,
    pub value: ConstantValue,
}

#[derive(Debug, Clone)]
pub struct ConstantGroup {
    pub name: Name,
    pub ty: ElementType,
    pub constants: Vec<Constant>,
}

impl ConstantGroup {
    /// Full name of a member, e.g. "Status LED Config Show Status"
    pub fn member_name(&self, constant: &Constant) -> Name {
        Name::new(&format!("{} {}", self.name.space(), constant.name.space()))
    }

    /// Find a member by its full name
    pub fn find(&self, full_name: &str) -> Option<&Constant> {
        let wanted = Name::new(full_name);
        self.constants.iter().find(|c| self.member_name(c) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_led() -> ConstantGroup {
        ConstantGroup {
            name: Name::new("Status LED Config"),
            ty: ElementType::Uint8,
            constants: vec![
                Constant { name: Name::new("Off"), value: ConstantValue::Int(0) },
                Constant { name: Name::new("Show Status"), value: ConstantValue::Int(3) },
            ],
        }
    }

    #[test]
    fn test_find_member() {
        let group = status_led();
        let c = group.find("Status LED Config Show Status").unwrap();
        assert_eq!(c.value, ConstantValue::Int(3));
        assert_eq!(group.member_name(c).upper(), "STATUS_LED_CONFIG_SHOW_STATUS");
        assert!(group.find("Show Status").is_none());
    }

    #[test]
    fn test_fits() {
        assert!(ConstantValue::Int(255).fits(ElementType::Uint8));
        assert!(!ConstantValue::Int(256).fits(ElementType::Uint8));
        assert!(!ConstantValue::Int(-1).fits(ElementType::Uint16));
        assert!(ConstantValue::Char('a').fits(ElementType::Char));
        assert!(!ConstantValue::Bool(true).fits(ElementType::Uint8));
    }
}
