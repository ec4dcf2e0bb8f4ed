//! Conversion of parsed configs into the validated object model.
//!
//! All schema invariants that serde cannot express are checked here, once,
//! so emitters can rely on a consistent [`Device`].

use std::collections::HashSet;

use tracing::debug;

use crate::codegen::types::{
    ConstantGroupConfig, DeviceConfig, ElementConfig, ExampleArgConfig, ExampleConfig,
    ExampleFunctionConfig, ExampleValueConfig, PacketConfig, StreamConfig,
};
use crate::error::{GeneratorError, Result};
use crate::layout::{PacketLayout, MAX_PAYLOAD_SIZE};
use crate::model::common_packets::{common_constant_groups, common_packets, reserved_ids};
use crate::model::{
    Cardinality, Constant, ConstantGroup, Device, Direction, Doc, Element, ElementType, Example,
    ExampleArg, ExampleFunction, ExampleValue, Name, Packet, PacketType, Stream, StreamDirection,
    StreamRoles, Threshold,
};

/// Documentation languages every doc text may be given in
pub const DOC_LANGUAGES: [&str; 2] = ["en", "de"];

/// Build and validate a device from its config
pub fn build_device(config: DeviceConfig) -> Result<Device> {
    let device_name = config.name.clone();
    let fail = |message: String| GeneratorError::validation(&device_name, message);

    let name = Name::new(&config.name);
    if name.is_empty() {
        return Err(fail("device name is empty".to_string()));
    }
    if config.author.trim().is_empty() {
        return Err(fail("author is empty".to_string()));
    }
    check_doc_languages(config.description.keys(), "description").map_err(fail)?;

    let comcu = config.features.iter().any(|f| f == crate::model::device::FEATURE_COMCU);

    let mut constant_groups = Vec::new();
    for group in &config.constant_groups {
        constant_groups.push(build_constant_group(group).map_err(fail)?);
    }
    let mut seen = HashSet::new();
    for group in common_constant_groups(comcu) {
        if constant_groups.iter().any(|g: &ConstantGroup| g.name == group.name) {
            return Err(fail(format!("constant group '{}' is reserved", group.name)));
        }
        constant_groups.push(group);
    }
    for group in &constant_groups {
        if !seen.insert(group.name.clone()) {
            return Err(fail(format!("duplicate constant group '{}'", group.name)));
        }
    }

    let function_ids = assign_function_ids(&config.packets, &reserved_ids(comcu)).map_err(fail)?;

    let mut packets = Vec::new();
    for (packet, function_id) in config.packets.iter().zip(function_ids) {
        let packet = build_packet(packet, function_id, &constant_groups)
            .map_err(|m| fail(format!("packet '{}': {}", packet.name, m)))?;
        packets.push(packet);
    }
    let mut names = HashSet::new();
    for packet in &packets {
        if !names.insert((packet.packet_type, packet.name.clone())) {
            return Err(fail(format!("duplicate packet name '{}'", packet.name)));
        }
    }
    packets.extend(common_packets(comcu));
    packets.sort_by_key(|p| p.function_id);

    let display_name = config.display_name.clone().unwrap_or_else(|| name.space());

    let mut device = Device {
        name,
        category: config.category,
        display_name,
        author: config.author,
        api_version: config.api_version,
        api_version_extra: config.api_version_extra,
        device_identifier: config.device_identifier,
        manufacturer: config.manufacturer,
        description: config.description,
        released: config.released,
        documented: config.documented,
        discontinued: config.discontinued,
        features: config.features,
        constant_groups,
        packets,
        examples: Vec::new(),
    };

    let mut examples = Vec::new();
    for example in &config.examples {
        let built = build_example(example, &device)
            .map_err(|m| fail(format!("example '{}': {}", example.name, m)))?;
        examples.push(built);
    }
    device.examples = examples;

    debug!(
        device = %device.full_name(),
        packets = device.packets.len(),
        examples = device.examples.len(),
        "Built device model"
    );

    Ok(device)
}

fn check_doc_languages<'a>(keys: impl Iterator<Item = &'a String>, what: &str) -> std::result::Result<(), String> {
    for key in keys {
        if !DOC_LANGUAGES.contains(&key.as_str()) {
            return Err(format!("{} has unknown language '{}'", what, key));
        }
    }
    Ok(())
}

fn build_constant_group(config: &ConstantGroupConfig) -> std::result::Result<ConstantGroup, String> {
    let group = ConstantGroup {
        name: Name::new(&config.name),
        ty: config.ty,
        constants: config
            .constants
            .iter()
            .map(|c| Constant {
                name: Name::new(&c.name),
                value: c.value.clone(),
            })
            .collect(),
    };

    if group.constants.is_empty() {
        return Err(format!("constant group '{}' has no constants", group.name));
    }

    let mut names = HashSet::new();
    for constant in &group.constants {
        if !names.insert(constant.name.clone()) {
            return Err(format!(
                "constant group '{}' has duplicate constant '{}'",
                group.name, constant.name
            ));
        }
        if !constant.value.fits(group.ty) {
            return Err(format!(
                "constant '{}' value {} does not fit type {}",
                group.member_name(constant),
                constant.value,
                group.ty
            ));
        }
    }

    Ok(group)
}

/// Explicit IDs are kept, the rest are numbered from 1 in declaration order
fn assign_function_ids(packets: &[PacketConfig], reserved: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut taken: HashSet<u8> = reserved.iter().copied().collect();

    for packet in packets {
        if let Some(id) = packet.function_id {
            if id == 0 {
                return Err(format!("packet '{}' uses function ID 0", packet.name));
            }
            if reserved.contains(&id) {
                return Err(format!(
                    "packet '{}' uses function ID {} reserved for common packets",
                    packet.name, id
                ));
            }
            if !taken.insert(id) {
                return Err(format!("duplicate function ID {}", id));
            }
        }
    }

    let mut next: u16 = 1;
    let mut ids = Vec::with_capacity(packets.len());
    for packet in packets {
        match packet.function_id {
            Some(id) => ids.push(id),
            None => {
                while next <= 255 && taken.contains(&(next as u8)) {
                    next += 1;
                }
                if next > 255 {
                    return Err(format!("no function ID left for packet '{}'", packet.name));
                }
                let id = next as u8;
                taken.insert(id);
                ids.push(id);
            }
        }
    }

    Ok(ids)
}

fn build_element(config: &ElementConfig, groups: &[ConstantGroup]) -> std::result::Result<Element, String> {
    if config.cardinality < 1 {
        return Err(format!(
            "element '{}' has cardinality {}, config elements must be at least 1",
            config.name, config.cardinality
        ));
    }

    let mut element = Element::new(
        &config.name,
        config.ty,
        Cardinality::from_count(config.cardinality, 0),
        config.direction,
    );

    if let Some(group_name) = &config.constant_group {
        let group_name = Name::new(group_name);
        let group = groups
            .iter()
            .find(|g| g.name == group_name)
            .ok_or_else(|| format!("element '{}' references unknown constant group '{}'", config.name, group_name))?;
        if group.ty != config.ty {
            return Err(format!(
                "element '{}' has type {} but constant group '{}' has type {}",
                config.name, config.ty, group.name, group.ty
            ));
        }
        element.constant_group = Some(group_name);
    }

    if let Some([min, max]) = config.range {
        if min > max {
            return Err(format!("element '{}' has an empty range [{}, {}]", config.name, min, max));
        }
        if let Some((type_min, type_max)) = config.ty.int_range() {
            if (min as i128) < type_min || (max as i128) > type_max {
                return Err(format!(
                    "element '{}' range [{}, {}] exceeds type {}",
                    config.name, min, max, config.ty
                ));
            }
        }
        element.range = Some((min, max));
    }

    if let Some(divisor) = config.divisor {
        if divisor == 0.0 {
            return Err(format!("element '{}' has a divisor of 0", config.name));
        }
    }

    element.unit = config.unit.clone();
    element.divisor = config.divisor;
    element.default = match &config.default {
        Some(value) => Some(serde_json::to_value(value).map_err(|e| e.to_string())?),
        None => None,
    };

    Ok(element)
}

fn build_packet(config: &PacketConfig, function_id: u8, groups: &[ConstantGroup]) -> std::result::Result<Packet, String> {
    check_doc_languages(config.doc.text.keys(), "doc")?;

    let mut elements = Vec::new();
    let mut names = HashSet::new();
    for element in &config.elements {
        let element = build_element(element, groups)?;
        if !names.insert((element.direction, element.name.clone())) {
            return Err(format!("duplicate element '{}'", element.name));
        }
        elements.push(element);
    }

    if config.packet_type == PacketType::Callback && elements.iter().any(|e| e.direction == Direction::In) {
        return Err("callbacks can only have 'out' elements".to_string());
    }

    let mut packet = Packet {
        packet_type: config.packet_type,
        name: Name::new(&config.name),
        function_id,
        elements,
        stream: None,
        since_firmware: config.since_firmware,
        doc: Doc {
            kind: config.doc.kind,
            text: config.doc.text.clone(),
        },
        is_common: false,
    };

    let layout = PacketLayout::of(&packet);
    if layout.request_size() > MAX_PAYLOAD_SIZE {
        return Err(format!(
            "request payload of {} bytes exceeds {} bytes",
            layout.request_size(),
            MAX_PAYLOAD_SIZE
        ));
    }
    if layout.response_size() > MAX_PAYLOAD_SIZE {
        return Err(format!(
            "response payload of {} bytes exceeds {} bytes",
            layout.response_size(),
            MAX_PAYLOAD_SIZE
        ));
    }

    if let Some(high_level) = &config.high_level {
        if !packet.name.ends_with("Low Level") {
            return Err("streaming packets must be named '... Low Level'".to_string());
        }
        let stream = match (&high_level.stream_in, &high_level.stream_out) {
            (Some(s), None) => resolve_stream(&packet, s, StreamDirection::In)?,
            (None, Some(s)) => resolve_stream(&packet, s, StreamDirection::Out)?,
            (Some(_), Some(_)) => return Err("high_level declares both stream_in and stream_out".to_string()),
            (None, None) => return Err("high_level declares no stream".to_string()),
        };
        if packet.is_callback() && stream.direction == StreamDirection::In {
            return Err("callbacks cannot carry stream_in".to_string());
        }
        packet.stream = Some(stream);
    }

    Ok(packet)
}

fn find_role(packet: &Packet, name: &str, direction: Direction) -> std::result::Result<Option<usize>, String> {
    let wanted = Name::new(name);
    match packet.elements.iter().position(|e| e.name == wanted) {
        None => Ok(None),
        Some(i) if packet.elements[i].direction == direction => Ok(Some(i)),
        Some(_) => Err(format!(
            "stream element '{}' must have direction '{}'",
            name,
            match direction {
                Direction::In => "in",
                Direction::Out => "out",
            }
        )),
    }
}

fn resolve_stream(packet: &Packet, config: &StreamConfig, direction: StreamDirection) -> std::result::Result<Stream, String> {
    let n = config.name.trim();
    let data_direction = match direction {
        StreamDirection::In => Direction::In,
        StreamDirection::Out => Direction::Out,
    };

    let length = match find_role(packet, &format!("{} Length", n), data_direction)? {
        Some(i) => Some(i),
        None => find_role(packet, &format!("{} Total Length", n), data_direction)?,
    };

    let (chunk_offset, chunk_data, chunk_written) = if config.single_chunk {
        (
            None,
            find_role(packet, &format!("{} Data", n), data_direction)?,
            find_role(packet, &format!("{} Written", n), Direction::Out)?,
        )
    } else {
        (
            find_role(packet, &format!("{} Chunk Offset", n), data_direction)?,
            find_role(packet, &format!("{} Chunk Data", n), data_direction)?,
            find_role(packet, &format!("{} Chunk Written", n), Direction::Out)?,
        )
    };

    let chunk_data = chunk_data.ok_or_else(|| format!("stream '{}' has no chunk data element", n))?;
    let data = &packet.elements[chunk_data];
    if data.ty == ElementType::String || !data.is_array() {
        return Err(format!("stream '{}' chunk data must be an array", n));
    }
    let chunk_capacity = data.cardinality.count();

    if !config.single_chunk && chunk_offset.is_none() {
        return Err(format!("stream '{}' has no chunk offset element", n));
    }
    if config.fixed_total_length.is_none() && length.is_none() {
        return Err(format!("stream '{}' has no length element", n));
    }
    if config.fixed_total_length.is_some() && length.is_some() {
        return Err(format!("stream '{}' has a fixed total length and a length element", n));
    }

    if config.short_write {
        if direction != StreamDirection::In {
            return Err("short_write is only valid for stream_in".to_string());
        }
        if chunk_written.is_none() {
            return Err(format!("short write stream '{}' has no written element", n));
        }
    } else if chunk_written.is_some() {
        return Err(format!("stream '{}' has a written element but no short_write", n));
    }

    for index in [length, chunk_offset, chunk_written].into_iter().flatten() {
        let element = &packet.elements[index];
        if !element.ty.is_integer() || element.is_array() {
            return Err(format!("stream element '{}' must be a scalar integer", element.name));
        }
    }

    let length_element = length.map(|i| &packet.elements[i]);
    let max_length = if config.single_chunk {
        match config.fixed_total_length {
            Some(fixed) if fixed > chunk_capacity => {
                return Err(format!("single chunk stream '{}' cannot hold {} items", n, fixed));
            }
            Some(fixed) => fixed,
            None => chunk_capacity,
        }
    } else if let Some(fixed) = config.fixed_total_length {
        fixed
    } else if let Some(element) = length_element {
        match element.range {
            Some((_, max)) => max.max(0) as usize,
            None => type_max(element.ty),
        }
    } else {
        chunk_capacity
    };

    for index in [length, chunk_offset].into_iter().flatten() {
        let element = &packet.elements[index];
        if max_length > type_max(element.ty) {
            return Err(format!(
                "stream '{}' maximum length {} does not fit into '{}'",
                n, max_length, element.name
            ));
        }
    }

    let length_type = length_element
        .map(|e| e.ty)
        .or_else(|| chunk_offset.map(|i| packet.elements[i].ty))
        .unwrap_or(ElementType::Uint16);

    Ok(Stream {
        direction,
        name: Name::new(n),
        short_write: config.short_write,
        single_chunk: config.single_chunk,
        fixed_total_length: config.fixed_total_length,
        roles: StreamRoles {
            length,
            chunk_offset,
            chunk_data,
            chunk_written,
        },
        data_type: data.ty,
        length_type,
        chunk_capacity,
        max_length,
    })
}

fn type_max(ty: ElementType) -> usize {
    ty.int_range()
        .map(|(_, max)| max.min(usize::MAX as i128) as usize)
        .unwrap_or(usize::MAX)
}

fn build_value(config: &ExampleValueConfig) -> ExampleValue {
    ExampleValue {
        name: Name::new(&config.name),
        ty: config.ty,
        cardinality: Cardinality::from_count(config.cardinality, 0),
        divisor: config.divisor,
        unit: config.unit.clone(),
        omit: config.omit,
    }
}

fn resolve_constant(device: &Device, full_name: &str) -> std::result::Result<ExampleArg, String> {
    for group in &device.constant_groups {
        if let Some(constant) = group.find(full_name) {
            return Ok(ExampleArg::Constant {
                group: group.name.clone(),
                constant: group.member_name(constant),
                value: constant.value.clone(),
            });
        }
    }
    Err(format!("unknown constant '{}'", full_name))
}

fn literal_item(value: &serde_yaml::Value, ty: ElementType) -> std::result::Result<ExampleArg, String> {
    use serde_yaml::Value;

    let mismatch = || format!("value {:?} does not match type {}", value, ty);
    match (value, ty) {
        (Value::Bool(b), ElementType::Bool) => Ok(ExampleArg::Bool(*b)),
        (Value::Number(n), ElementType::Float) => n.as_f64().map(ExampleArg::Float).ok_or_else(mismatch),
        (Value::Number(n), ty) if ty.is_integer() => n.as_i64().map(ExampleArg::Int).ok_or_else(mismatch),
        (Value::String(s), ElementType::Char) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(ExampleArg::Char(c)),
                _ => Err(mismatch()),
            }
        }
        (Value::String(s), ElementType::String) => Ok(ExampleArg::Str(s.clone())),
        _ => Err(mismatch()),
    }
}

fn build_arg(device: &Device, config: &ExampleArgConfig, element: &Element) -> std::result::Result<ExampleArg, String> {
    match config {
        ExampleArgConfig::Constant { constant } => resolve_constant(device, constant),
        ExampleArgConfig::Literal(serde_yaml::Value::String(s))
            if element.ty == ElementType::Char && element.cardinality.is_variable() =>
        {
            Ok(ExampleArg::Str(s.clone()))
        }
        ExampleArgConfig::Literal(serde_yaml::Value::Sequence(items)) if element.is_array() => items
            .iter()
            .map(|item| literal_item(item, element.ty))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(ExampleArg::Array),
        ExampleArgConfig::Literal(value) => literal_item(value, element.ty),
    }
}

/// Convert the leading arguments of a call against the high-level request elements
fn build_args(
    device: &Device,
    packet: &Packet,
    args: &[ExampleArgConfig],
    appended: usize,
) -> std::result::Result<Vec<ExampleArg>, String> {
    let request = packet.high_level_elements(Direction::In);
    if args.len() + appended != request.len() {
        return Err(format!(
            "'{}' takes {} argument(s), example gives {}",
            packet.high_level_name(),
            request.len(),
            args.len() + appended
        ));
    }
    args.iter()
        .zip(&request)
        .map(|(arg, element)| build_arg(device, arg, element))
        .collect()
}

fn lookup<'a>(device: &'a Device, function: &str, packet_type: PacketType) -> std::result::Result<&'a Packet, String> {
    let name = Name::new(function);
    device
        .find_packet(&name, packet_type)
        .ok_or_else(|| {
            let kind = match packet_type {
                PacketType::Function => "function",
                PacketType::Callback => "callback",
            };
            format!("unknown {} '{}'", kind, function)
        })
}

fn check_value_count(packet: &Packet, values: &[ExampleValueConfig]) -> std::result::Result<(), String> {
    let expected = packet.high_level_elements(Direction::Out).len();
    if values.len() != expected {
        return Err(format!(
            "'{}' returns {} value(s), example lists {}",
            packet.high_level_name(),
            expected,
            values.len()
        ));
    }
    Ok(())
}

fn threshold_divisor(packet: &Packet, position: usize) -> Option<f64> {
    packet
        .high_level_elements(Direction::In)
        .get(position)
        .and_then(|e| e.divisor)
}

fn build_function(device: &Device, config: &ExampleFunctionConfig) -> std::result::Result<ExampleFunction, String> {
    Ok(match config {
        ExampleFunctionConfig::Getter { function, arguments, results, comment } => {
            let packet = lookup(device, function, PacketType::Function)?;
            check_value_count(packet, results)?;
            ExampleFunction::Getter {
                function: packet.high_level_name(),
                arguments: build_args(device, packet, arguments, 0)?,
                results: results.iter().map(build_value).collect(),
                comment: comment.clone(),
            }
        }
        ExampleFunctionConfig::Setter { function, arguments, comment } => {
            let packet = lookup(device, function, PacketType::Function)?;
            ExampleFunction::Setter {
                function: packet.high_level_name(),
                arguments: build_args(device, packet, arguments, 0)?,
                comment: comment.clone(),
            }
        }
        ExampleFunctionConfig::Callback { function, parameters, comment, extra_message } => {
            let packet = lookup(device, function, PacketType::Callback)?;
            check_value_count(packet, parameters)?;
            ExampleFunction::Callback {
                function: packet.high_level_name(),
                parameters: parameters.iter().map(build_value).collect(),
                comment: comment.clone(),
                extra_message: extra_message.clone(),
            }
        }
        ExampleFunctionConfig::CallbackPeriod { function, arguments, unit, period_ms } => {
            let packet = lookup(device, function, PacketType::Function)?;
            ExampleFunction::CallbackPeriod {
                function: packet.high_level_name(),
                arguments: build_args(device, packet, arguments, 1)?,
                unit: unit.clone(),
                period_ms: *period_ms,
            }
        }
        ExampleFunctionConfig::CallbackThreshold { function, arguments, option, minimum, maximum, unit } => {
            let packet = lookup(device, function, PacketType::Function)?;
            let arguments = build_args(device, packet, arguments, 3)?;
            let divisor = threshold_divisor(packet, arguments.len() + 1);
            ExampleFunction::CallbackThreshold {
                function: packet.high_level_name(),
                arguments,
                threshold: Threshold {
                    option: *option,
                    minimum: *minimum,
                    maximum: *maximum,
                    divisor,
                },
                unit: unit.clone(),
            }
        }
        ExampleFunctionConfig::CallbackConfiguration {
            function,
            arguments,
            period_ms,
            value_has_to_change,
            option,
            minimum,
            maximum,
            unit,
        } => {
            let packet = lookup(device, function, PacketType::Function)?;
            let threshold_parts = match (option, minimum, maximum) {
                (Some(option), Some(minimum), Some(maximum)) => Some((*option, *minimum, *maximum)),
                (None, None, None) => None,
                _ => return Err("callback configuration needs option, minimum and maximum together".to_string()),
            };
            let appended = if threshold_parts.is_some() { 5 } else { 2 };
            let arguments = build_args(device, packet, arguments, appended)?;
            let divisor = threshold_divisor(packet, arguments.len() + 3);
            ExampleFunction::CallbackConfiguration {
                function: packet.high_level_name(),
                arguments,
                period_ms: *period_ms,
                value_has_to_change: *value_has_to_change,
                threshold: threshold_parts.map(|(option, minimum, maximum)| Threshold {
                    option,
                    minimum,
                    maximum,
                    divisor,
                }),
                unit: unit.clone(),
            }
        }
        ExampleFunctionConfig::DebouncePeriod { function, period_ms } => {
            let packet = lookup(device, function, PacketType::Function)?;
            build_args(device, packet, &[], 1)?;
            ExampleFunction::DebouncePeriod {
                function: packet.high_level_name(),
                period_ms: *period_ms,
            }
        }
        ExampleFunctionConfig::Sleep { duration_ms, comment } => ExampleFunction::Sleep {
            duration_ms: *duration_ms,
            comment: comment.clone(),
        },
        ExampleFunctionConfig::Wait => ExampleFunction::Wait,
        ExampleFunctionConfig::LoopHeader { limit, comment } => ExampleFunction::LoopHeader {
            limit: *limit,
            comment: comment.clone(),
        },
        ExampleFunctionConfig::LoopFooter => ExampleFunction::LoopFooter,
        ExampleFunctionConfig::Empty => ExampleFunction::Empty,
    })
}

/// Every loop_footer closes an open loop_header and no loop stays open
fn check_loops(steps: &[ExampleFunction], section: &str) -> std::result::Result<(), String> {
    let mut depth = 0usize;
    for step in steps {
        match step {
            ExampleFunction::LoopHeader { .. } => depth += 1,
            ExampleFunction::LoopFooter => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("{} has a loop_footer without matching loop_header", section))?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!("{} has {} loop_header(s) without matching loop_footer", section, depth));
    }
    Ok(())
}

fn build_example(config: &ExampleConfig, device: &Device) -> std::result::Result<Example, String> {
    if config.functions.is_empty() {
        return Err("example has no functions".to_string());
    }
    let functions: Vec<ExampleFunction> = config
        .functions
        .iter()
        .map(|f| build_function(device, f))
        .collect::<std::result::Result<_, _>>()?;
    let cleanups: Vec<ExampleFunction> = config
        .cleanups
        .iter()
        .map(|f| build_function(device, f))
        .collect::<std::result::Result<_, _>>()?;
    check_loops(&functions, "functions")?;
    check_loops(&cleanups, "cleanups")?;

    Ok(Example {
        name: Name::new(&config.name),
        description: config.description.clone(),
        incomplete: config.incomplete,
        functions,
        cleanups,
        languages: config.languages.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> DeviceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const HEADER: &str = r#"
name: Test Device
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 0]
device_identifier: 9999
"#;

    fn device(body: &str) -> Result<Device> {
        build_device(parse(&format!("{}{}", HEADER, body)))
    }

    fn message(result: Result<Device>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_sequential_function_ids_skip_explicit() {
        let d = device(
            r#"
packets:
  - type: function
    name: Set A
    function_id: 2
  - type: function
    name: Set B
  - type: function
    name: Set C
"#,
        )
        .unwrap();
        let ids: Vec<(String, u8)> = d.packets.iter().map(|p| (p.name.space(), p.function_id)).collect();
        assert_eq!(
            ids,
            vec![
                ("Set B".to_string(), 1),
                ("Set A".to_string(), 2),
                ("Set C".to_string(), 3),
                ("Get Identity".to_string(), 255),
            ]
        );
    }

    #[test]
    fn test_duplicate_function_id_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Set A
    function_id: 3
  - type: function
    name: Set B
    function_id: 3
"#,
        ));
        assert!(err.contains("duplicate function ID 3"), "{}", err);
    }

    #[test]
    fn test_reserved_function_id_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Set A
    function_id: 255
"#,
        ));
        assert!(err.contains("reserved"), "{}", err);
    }

    #[test]
    fn test_unknown_constant_group_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Set Mode
    elements:
      - name: Mode
        type: uint8
        direction: in
        constant_group: Mode
"#,
        ));
        assert!(err.contains("unknown constant group 'Mode'"), "{}", err);
    }

    #[test]
    fn test_constant_group_type_mismatch_rejected() {
        let err = message(device(
            r#"
constant_groups:
  - name: Mode
    type: uint8
    constants:
      - name: Fast
        value: 1
packets:
  - type: function
    name: Set Mode
    elements:
      - name: Mode
        type: uint16
        direction: in
        constant_group: Mode
"#,
        ));
        assert!(err.contains("constant group 'Mode' has type uint8"), "{}", err);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Set Data
    elements:
      - name: Data
        type: uint32
        cardinality: 17
        direction: in
"#,
        ));
        assert!(err.contains("request payload of 68 bytes exceeds 64 bytes"), "{}", err);
    }

    #[test]
    fn test_stream_resolution() {
        let d = device(
            r#"
packets:
  - type: function
    name: Set Data Low Level
    elements:
      - name: Data Length
        type: uint16
        direction: in
        range: [0, 118]
      - name: Data Chunk Offset
        type: uint16
        direction: in
      - name: Data Chunk Data
        type: uint8
        cardinality: 59
        direction: in
    high_level:
      stream_in:
        name: Data
"#,
        )
        .unwrap();
        let packet = d.find_packet(&Name::new("Set Data"), PacketType::Function).unwrap();
        let stream = packet.stream.as_ref().unwrap();
        assert_eq!(stream.max_length, 118);
        assert_eq!(stream.chunk_capacity, 59);
        assert_eq!(stream.roles.chunk_data, 2);
    }

    #[test]
    fn test_stream_wrong_direction_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Get Data Low Level
    elements:
      - name: Data Length
        type: uint16
        direction: in
      - name: Data Chunk Offset
        type: uint16
        direction: out
      - name: Data Chunk Data
        type: uint8
        cardinality: 60
        direction: out
    high_level:
      stream_out:
        name: Data
"#,
        ));
        assert!(err.contains("'Data Length' must have direction 'out'"), "{}", err);
    }

    #[test]
    fn test_stream_requires_low_level_name() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Get Data
    elements:
      - name: Data
        type: uint8
        cardinality: 60
        direction: out
    high_level:
      stream_out:
        name: Data
        single_chunk: true
"#,
        ));
        assert!(err.contains("Low Level"), "{}", err);
    }

    #[test]
    fn test_example_constant_resolution() {
        let d = device(
            r#"
features: [comcu_bricklet]
examples:
  - name: Simple
    functions:
      - kind: setter
        function: Set Status LED Config
        arguments:
          - constant: Status LED Config Show Status
"#,
        )
        .unwrap();
        match &d.examples[0].functions[0] {
            ExampleFunction::Setter { arguments, .. } => match &arguments[0] {
                ExampleArg::Constant { constant, value, .. } => {
                    assert_eq!(constant.space(), "Status LED Config Show Status");
                    assert_eq!(*value, crate::model::ConstantValue::Int(3));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_example_loops_must_balance() {
        let err = message(device(
            r#"
examples:
  - name: Loop
    functions:
      - { kind: sleep, duration_ms: 100 }
      - kind: loop_footer
      - { kind: loop_header, limit: 3 }
"#,
        ));
        assert!(err.contains("functions has a loop_footer without matching loop_header"), "{}", err);

        let err = message(device(
            r#"
examples:
  - name: Loop
    functions:
      - { kind: loop_header, limit: 3 }
      - { kind: sleep, duration_ms: 100 }
      - kind: loop_footer
    cleanups:
      - { kind: loop_header, limit: 2 }
      - { kind: sleep, duration_ms: 100 }
"#,
        ));
        assert!(err.contains("cleanups has 1 loop_header(s) without matching loop_footer"), "{}", err);
    }

    #[test]
    fn test_example_unknown_function_rejected() {
        let err = message(device(
            r#"
examples:
  - name: Simple
    functions:
      - kind: setter
        function: Set Nothing
"#,
        ));
        assert!(err.contains("unknown function 'Set Nothing'"), "{}", err);
    }

    #[test]
    fn test_example_argument_count_checked() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Set Value
    elements:
      - name: Value
        type: uint8
        direction: in
examples:
  - name: Simple
    functions:
      - kind: setter
        function: Set Value
        arguments: [1, 2]
"#,
        ));
        assert!(err.contains("takes 1 argument(s), example gives 2"), "{}", err);
    }

    #[test]
    fn test_unknown_doc_language_rejected() {
        let err = message(device(
            r#"
packets:
  - type: function
    name: Reset Counter
    doc:
      kind: bf
      fr: Remet le compteur.
"#,
        ));
        assert!(err.contains("unknown language 'fr'"), "{}", err);
    }
}
