//! Type definitions for device configuration.
//!
//! These types mirror the structure of the device YAML files one to one.
//! They are converted into the validated `model` types by the loader and are
//! never handed to emitters directly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::constant::ConstantValue;
use crate::model::device::Category;
use crate::model::element::{Direction, ElementType};
use crate::model::packet::{DocKind, PacketType};

fn default_cardinality() -> i64 {
    1
}

fn default_manufacturer() -> String {
    "Tinkerforge".to_string()
}

fn default_true() -> bool {
    true
}

/// One device document
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub display_name: Option<String>,
    pub author: String,
    pub api_version: [u8; 3],
    #[serde(default)]
    pub api_version_extra: u8,
    pub device_identifier: u16,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default)]
    pub description: IndexMap<String, String>,
    #[serde(default = "default_true")]
    pub released: bool,
    #[serde(default = "default_true")]
    pub documented: bool,
    #[serde(default)]
    pub discontinued: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub constant_groups: Vec<ConstantGroupConfig>,
    #[serde(default)]
    pub packets: Vec<PacketConfig>,
    #[serde(default)]
    pub examples: Vec<ExampleConfig>,
}

/// Named enumeration of literal values
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantGroupConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ElementType,
    pub constants: Vec<ConstantConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantConfig {
    pub name: String,
    pub value: ConstantValue,
}

/// Unknown keys land in `text` and are checked against the documentation
/// languages by the loader.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocConfig {
    #[serde(default)]
    pub kind: DocKind,
    /// Text per documentation language (`en`, `de`)
    #[serde(flatten)]
    pub text: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PacketConfig {
    #[serde(rename = "type")]
    pub packet_type: PacketType,
    pub name: String,
    #[serde(default)]
    pub function_id: Option<u8>,
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub high_level: Option<HighLevelConfig>,
    #[serde(default)]
    pub since_firmware: Option<[u8; 3]>,
    #[serde(default)]
    pub doc: DocConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ElementConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ElementType,
    #[serde(default = "default_cardinality")]
    pub cardinality: i64,
    pub direction: Direction,
    #[serde(default)]
    pub constant_group: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub divisor: Option<f64>,
    #[serde(default)]
    pub range: Option<[i64; 2]>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HighLevelConfig {
    #[serde(default)]
    pub stream_in: Option<StreamConfig>,
    #[serde(default)]
    pub stream_out: Option<StreamConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub name: String,
    #[serde(default)]
    pub short_write: bool,
    #[serde(default)]
    pub single_chunk: bool,
    #[serde(default)]
    pub fixed_total_length: Option<usize>,
}

/// One example program
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub incomplete: bool,
    pub functions: Vec<ExampleFunctionConfig>,
    #[serde(default)]
    pub cleanups: Vec<ExampleFunctionConfig>,
    /// Restrict the example to these language keys; empty means all
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Abstract function call in an example
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExampleFunctionConfig {
    Getter {
        function: String,
        #[serde(default)]
        arguments: Vec<ExampleArgConfig>,
        results: Vec<ExampleValueConfig>,
        #[serde(default)]
        comment: Option<String>,
    },
    Setter {
        function: String,
        #[serde(default)]
        arguments: Vec<ExampleArgConfig>,
        #[serde(default)]
        comment: Option<String>,
    },
    Callback {
        function: String,
        parameters: Vec<ExampleValueConfig>,
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        extra_message: Option<String>,
    },
    CallbackPeriod {
        function: String,
        #[serde(default)]
        arguments: Vec<ExampleArgConfig>,
        unit: String,
        period_ms: u32,
    },
    CallbackThreshold {
        function: String,
        #[serde(default)]
        arguments: Vec<ExampleArgConfig>,
        option: char,
        minimum: f64,
        maximum: f64,
        #[serde(default)]
        unit: Option<String>,
    },
    CallbackConfiguration {
        function: String,
        #[serde(default)]
        arguments: Vec<ExampleArgConfig>,
        period_ms: u32,
        value_has_to_change: bool,
        #[serde(default)]
        option: Option<char>,
        #[serde(default)]
        minimum: Option<f64>,
        #[serde(default)]
        maximum: Option<f64>,
        #[serde(default)]
        unit: Option<String>,
    },
    DebouncePeriod {
        function: String,
        period_ms: u32,
    },
    Sleep {
        duration_ms: u32,
        #[serde(default)]
        comment: Option<String>,
    },
    Wait,
    LoopHeader {
        limit: u32,
        #[serde(default)]
        comment: Option<String>,
    },
    LoopFooter,
    Empty,
}

/// Argument of an example call: a constant reference or a literal
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ExampleArgConfig {
    Constant { constant: String },
    Literal(serde_yaml::Value),
}

/// Named value printed by an example (getter result, callback parameter)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleValueConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ElementType,
    #[serde(default = "default_cardinality")]
    pub cardinality: i64,
    #[serde(default)]
    pub divisor: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Value is part of the call but not printed
    #[serde(default)]
    pub omit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_device_parses() {
        let yaml = r#"
name: Humidity V2
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 2]
device_identifier: 283
packets:
  - type: function
    name: Get Humidity
    elements:
      - name: Humidity
        type: uint16
        direction: out
    doc:
      kind: bf
      en: Returns the humidity.
      de: Gibt die Luftfeuchtigkeit zurück.
"#;
        let config: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.category, Category::Bricklet);
        assert_eq!(config.manufacturer, "Tinkerforge");
        assert!(config.released);
        let packet = &config.packets[0];
        assert_eq!(packet.elements[0].cardinality, 1);
        assert_eq!(packet.doc.kind, DocKind::Bf);
        assert_eq!(packet.doc.text["de"], "Gibt die Luftfeuchtigkeit zurück.");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = r#"
name: Test
category: Bricklet
author: A
api_version: [2, 0, 0]
device_identifier: 1
colour: red
"#;
        let err = serde_yaml::from_str::<DeviceConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_example_functions_parse() {
        let yaml = r#"
name: Simple
functions:
  - kind: getter
    function: Get Humidity
    results:
      - name: Humidity
        type: uint16
        divisor: 100.0
        unit: "%RH"
  - kind: setter
    function: Set Status LED Config
    arguments:
      - constant: Status LED Config Show Status
  - kind: loop_header
    limit: 10
  - kind: sleep
    duration_ms: 1000
  - kind: loop_footer
  - kind: wait
"#;
        let example: ExampleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(example.functions.len(), 6);
        match &example.functions[1] {
            ExampleFunctionConfig::Setter { arguments, .. } => {
                assert!(matches!(arguments[0], ExampleArgConfig::Constant { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(example.functions[5], ExampleFunctionConfig::Wait));
    }
}
