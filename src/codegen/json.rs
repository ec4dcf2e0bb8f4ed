//! JSON dump of the normalised device model.
//!
//! The model types stay free of serde; this module maps them into plain view
//! structs so the dump format can evolve independently.

use indexmap::IndexMap;
use serde::Serialize;

use crate::codegen::{Emitter, GeneratedFile, GenerationOptions, Language};
use crate::error::{GeneratorError, Result};
use crate::layout::PacketLayout;
use crate::model::{
    Cardinality, ConstantGroup, ConstantValue, Device, Direction, Element, ElementType, Packet, Stream,
    StreamDirection,
};

pub struct JsonEmitter;

#[derive(Debug, Serialize)]
struct DeviceView<'a> {
    generator: GeneratorView,
    name: String,
    category: &'static str,
    display_name: DisplayNameView,
    author: &'a str,
    manufacturer: &'a str,
    api_version: [u8; 3],
    api_version_extra: u8,
    device_identifier: u16,
    released: bool,
    documented: bool,
    discontinued: bool,
    features: &'a [String],
    description: &'a IndexMap<String, String>,
    constant_groups: Vec<ConstantGroupView>,
    packets: Vec<PacketView<'a>>,
    examples: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GeneratorView {
    bindings_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_on: Option<String>,
}

#[derive(Debug, Serialize)]
struct DisplayNameView {
    short: String,
    long: String,
}

#[derive(Debug, Serialize)]
struct ConstantGroupView {
    name: String,
    #[serde(rename = "type")]
    ty: ElementType,
    constants: Vec<ConstantView>,
}

#[derive(Debug, Serialize)]
struct ConstantView {
    name: String,
    value: ConstantValue,
}

#[derive(Debug, Serialize)]
struct PacketView<'a> {
    #[serde(rename = "type")]
    packet_type: &'static str,
    name: String,
    function_id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    since_firmware: Option<[u8; 3]>,
    common: bool,
    request_size: usize,
    response_size: usize,
    elements: Vec<ElementView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    high_level: Option<StreamView>,
    doc: DocView<'a>,
}

#[derive(Debug, Serialize)]
struct ElementView {
    name: String,
    #[serde(rename = "type")]
    ty: ElementType,
    cardinality: Cardinality,
    direction: &'static str,
    offset: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    constant_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    divisor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<[i64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct StreamView {
    direction: &'static str,
    name: String,
    high_level_name: String,
    short_write: bool,
    single_chunk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_total_length: Option<usize>,
    data_type: ElementType,
    length_type: ElementType,
    chunk_capacity: usize,
    max_length: usize,
    roles: IndexMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct DocView<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a IndexMap<String, String>,
}

fn direction_str(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "in",
        Direction::Out => "out",
    }
}

fn group_view(group: &ConstantGroup) -> ConstantGroupView {
    ConstantGroupView {
        name: group.name.space(),
        ty: group.ty,
        constants: group
            .constants
            .iter()
            .map(|c| ConstantView {
                name: c.name.space(),
                value: c.value.clone(),
            })
            .collect(),
    }
}

fn element_view(element: &Element, offset: usize) -> ElementView {
    ElementView {
        name: element.name.space(),
        ty: element.ty,
        cardinality: element.cardinality,
        direction: direction_str(element.direction),
        offset,
        size: element.size(),
        constant_group: element.constant_group.as_ref().map(|g| g.space()),
        unit: element.unit.clone(),
        divisor: element.divisor,
        range: element.range.map(|(min, max)| [min, max]),
        default: element.default.clone(),
    }
}

fn stream_view(packet: &Packet, stream: &Stream) -> StreamView {
    let mut roles = IndexMap::new();
    let named = [
        ("length", stream.roles.length),
        ("chunk_offset", stream.roles.chunk_offset),
        ("chunk_data", Some(stream.roles.chunk_data)),
        ("chunk_written", stream.roles.chunk_written),
    ];
    for (role, index) in named {
        if let Some(element) = packet.role_element(index) {
            roles.insert(role, element.name.space());
        }
    }

    StreamView {
        direction: match stream.direction {
            StreamDirection::In => "in",
            StreamDirection::Out => "out",
        },
        name: stream.name.space(),
        high_level_name: packet.high_level_name().space(),
        short_write: stream.short_write,
        single_chunk: stream.single_chunk,
        fixed_total_length: stream.fixed_total_length,
        data_type: stream.data_type,
        length_type: stream.length_type,
        chunk_capacity: stream.chunk_capacity,
        max_length: stream.max_length,
        roles,
    }
}

fn packet_view(packet: &Packet) -> PacketView<'_> {
    let layout = PacketLayout::of(packet);

    // Elements keep declaration order; offsets come from the layout of their direction
    let elements = packet
        .elements
        .iter()
        .map(|element| {
            let offset = layout
                .fields(element.direction)
                .iter()
                .find(|f| std::ptr::eq(f.element, element))
                .map_or(0, |f| f.offset);
            element_view(element, offset)
        })
        .collect();

    PacketView {
        packet_type: if packet.is_callback() { "callback" } else { "function" },
        name: packet.name.space(),
        function_id: packet.function_id,
        since_firmware: packet.since_firmware,
        common: packet.is_common,
        request_size: layout.request_size(),
        response_size: layout.response_size(),
        elements,
        high_level: packet.stream.as_ref().map(|s| stream_view(packet, s)),
        doc: DocView {
            kind: packet.doc.kind.as_str(),
            text: &packet.doc.text,
        },
    }
}

/// Render the JSON document of one device
pub fn render_device(device: &Device, options: &GenerationOptions) -> Result<String> {
    let view = DeviceView {
        generator: GeneratorView {
            bindings_version: crate::codegen::utils::BINDINGS_VERSION,
            generated_on: options.date.map(|d| d.format("%Y-%m-%d").to_string()),
        },
        name: device.name.space(),
        category: device.category.as_str(),
        display_name: DisplayNameView {
            short: device.display_name.clone(),
            long: device.long_display_name(),
        },
        author: &device.author,
        manufacturer: &device.manufacturer,
        api_version: device.api_version,
        api_version_extra: device.api_version_extra,
        device_identifier: device.device_identifier,
        released: device.released,
        documented: device.documented,
        discontinued: device.discontinued,
        features: &device.features,
        description: &device.description,
        constant_groups: device.constant_groups.iter().map(group_view).collect(),
        packets: device.packets.iter().map(packet_view).collect(),
        examples: device.examples.iter().map(|e| e.name.space()).collect(),
    };

    let mut json = serde_json::to_string_pretty(&view)
        .map_err(|e| GeneratorError::render(&device.full_name().space(), "json", e.to_string()))?;
    json.push('\n');
    Ok(json)
}

impl Emitter for JsonEmitter {
    fn language(&self) -> Language {
        Language::Json
    }

    fn bindings(&self, device: &Device, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let file_name = format!("{}.json", device.full_name().under());
        Ok(vec![GeneratedFile::new(file_name, render_device(device, options)?)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::types::DeviceConfig;
    use crate::codegen::validation::build_device;

    const DEVICE: &str = r#"
name: Test Stream
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 1]
device_identifier: 2100
constant_groups:
  - name: Mode
    type: uint8
    constants:
      - { name: Off, value: 0 }
      - { name: On, value: 1 }
packets:
  - type: function
    name: Set Mode
    elements:
      - { name: Mode, type: uint8, direction: in, constant_group: Mode }
  - type: function
    name: Write Data Low Level
    high_level:
      stream_in: { name: Data }
    elements:
      - { name: Data Length, type: uint16, direction: in, range: [0, 118] }
      - { name: Data Chunk Offset, type: uint16, direction: in }
      - { name: Data Chunk Data, type: uint8, cardinality: 59, direction: in }
"#;

    fn device() -> Device {
        let config: DeviceConfig = serde_yaml::from_str(DEVICE).unwrap();
        build_device(config).unwrap()
    }

    #[test]
    fn test_json_contains_sizes_and_stream() {
        let json = render_device(&device(), &GenerationOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let packets = value["packets"].as_array().unwrap();
        let write = packets
            .iter()
            .find(|p| p["name"] == "Write Data Low Level")
            .unwrap();
        assert_eq!(write["request_size"], 63);
        assert_eq!(write["high_level"]["max_length"], 118);
        assert_eq!(write["high_level"]["chunk_capacity"], 59);
        assert_eq!(write["high_level"]["roles"]["chunk_offset"], "Data Chunk Offset");
        assert_eq!(write["elements"][2]["offset"], 4);

        let identity = packets.iter().find(|p| p["function_id"] == 255).unwrap();
        assert_eq!(identity["response_size"], 25);
        assert_eq!(identity["common"], true);
    }

    #[test]
    fn test_json_display_names_and_constants() {
        let json = render_device(&device(), &GenerationOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["display_name"]["long"], "Test Stream Bricklet");
        assert_eq!(value["constant_groups"][0]["constants"][1]["value"], 1);
        assert!(value["generator"].get("generated_on").is_none());
    }

    #[test]
    fn test_file_name() {
        let files = JsonEmitter.bindings(&device(), &GenerationOptions::default()).unwrap();
        assert_eq!(files[0].path.to_str(), Some("bricklet_test_stream.json"));
    }
}
