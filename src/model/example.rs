//! Abstract example programs, rendered per language.

use super::constant::ConstantValue;
use super::element::{Cardinality, ElementType};
use super::name::Name;

/// Argument passed to a device function in an example
#[derive(Debug, Clone, PartialEq)]
pub enum ExampleArg {
    /// Reference to a constant, rendered by name in each language
    Constant {
        group: Name,
        constant: Name,
        value: ConstantValue,
    },
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Array(Vec<ExampleArg>),
}

/// A value printed by an example (getter result or callback parameter)
#[derive(Debug, Clone)]
pub struct ExampleValue {
    pub name: Name,
    pub ty: ElementType,
    pub cardinality: Cardinality,
    pub divisor: Option<f64>,
    pub unit: Option<String>,
    pub omit: bool,
}

/// Threshold configuration shared by threshold and callback configuration calls
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub option: char,
    pub minimum: f64,
    pub maximum: f64,
    /// Divisor of the threshold elements; minimum and maximum are in user units
    pub divisor: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum ExampleFunction {
    Getter {
        function: Name,
        arguments: Vec<ExampleArg>,
        results: Vec<ExampleValue>,
        comment: Option<String>,
    },
    Setter {
        function: Name,
        arguments: Vec<ExampleArg>,
        comment: Option<String>,
    },
    Callback {
        function: Name,
        parameters: Vec<ExampleValue>,
        comment: Option<String>,
        extra_message: Option<String>,
    },
    CallbackPeriod {
        function: Name,
        arguments: Vec<ExampleArg>,
        unit: String,
        period_ms: u32,
    },
    CallbackThreshold {
        function: Name,
        arguments: Vec<ExampleArg>,
        threshold: Threshold,
        unit: Option<String>,
    },
    CallbackConfiguration {
        function: Name,
        arguments: Vec<ExampleArg>,
        period_ms: u32,
        value_has_to_change: bool,
        threshold: Option<Threshold>,
        unit: Option<String>,
    },
    DebouncePeriod {
        function: Name,
        period_ms: u32,
    },
    Sleep {
        duration_ms: u32,
        comment: Option<String>,
    },
    Wait,
    LoopHeader {
        limit: u32,
        comment: Option<String>,
    },
    LoopFooter,
    Empty,
}

impl ExampleFunction {
    /// Device function invoked by this step, if any
    pub fn function(&self) -> Option<&Name> {
        match self {
            ExampleFunction::Getter { function, .. }
            | ExampleFunction::Setter { function, .. }
            | ExampleFunction::Callback { function, .. }
            | ExampleFunction::CallbackPeriod { function, .. }
            | ExampleFunction::CallbackThreshold { function, .. }
            | ExampleFunction::CallbackConfiguration { function, .. }
            | ExampleFunction::DebouncePeriod { function, .. } => Some(function),
            _ => None,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, ExampleFunction::Callback { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Example {
    pub name: Name,
    pub description: Option<String>,
    pub incomplete: bool,
    pub functions: Vec<ExampleFunction>,
    pub cleanups: Vec<ExampleFunction>,
    pub languages: Vec<String>,
}

impl Example {
    /// Whether the example is rendered for a language key
    pub fn supports(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    pub fn has_callbacks(&self) -> bool {
        self.functions.iter().any(ExampleFunction::is_callback)
    }

    /// Examples that register callbacks or configure thresholds keep running
    /// until the user presses enter
    pub fn waits_for_input(&self) -> bool {
        self.functions.iter().any(|f| matches!(f, ExampleFunction::Wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_language() {
        let mut example = Example {
            name: Name::new("Simple"),
            description: None,
            incomplete: false,
            functions: vec![ExampleFunction::Wait],
            cleanups: Vec::new(),
            languages: Vec::new(),
        };
        assert!(example.supports("python"));
        example.languages = vec!["c".to_string()];
        assert!(!example.supports("python"));
        assert!(example.waits_for_input());
    }

    #[test]
    fn test_function_reference() {
        let step = ExampleFunction::Setter {
            function: Name::new("Set Status LED Config"),
            arguments: vec![ExampleArg::Int(3)],
            comment: None,
        };
        assert_eq!(step.function().map(|n| n.space()), Some("Set Status LED Config".into()));
        assert!(ExampleFunction::Empty.function().is_none());
    }
}
