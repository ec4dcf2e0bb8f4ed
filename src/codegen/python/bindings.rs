//! Python bindings module: one device class per file.

use std::fmt::Write;

use crate::codegen::python::{class_name, coerce, constant_literal, doc_text, padding, param_name};
use crate::codegen::utils::{escape_string, hash_comment, header_lines};
use crate::codegen::GenerationOptions;
use crate::error::Result;
use crate::layout::{struct_format, PacketLayout};
use crate::model::{Device, Direction, DocKind, Element, Name, Packet, Stream, StreamDirection};

const IMPORTS: &str = "Device, IPConnection, Error, create_char, create_char_list, create_string, create_chunk_data";

fn write_docstring(out: &mut String, text: &str) -> Result<()> {
    writeln!(out, "        r\"\"\"")?;
    for line in doc_text(text).lines() {
        if line.trim().is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "        {}", line)?;
        }
    }
    writeln!(out, "        \"\"\"")?;
    Ok(())
}

fn tuple_literal(items: &[String]) -> String {
    match items.len() {
        0 => "()".to_string(),
        1 => format!("({},)", items[0]),
        _ => format!("({})", items.join(", ")),
    }
}

/// Name of the namedtuple returned by a function, without a leading "Get"
fn tuple_type_name(name: &Name) -> String {
    let camel = name.camel();
    match camel.strip_prefix("Get") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => camel,
    }
}

fn write_namedtuple(out: &mut String, name: &Name, elements: &[String]) -> Result<()> {
    let fields: Vec<String> = elements.iter().map(|e| format!("'{}'", e)).collect();
    writeln!(
        out,
        "{} = namedtuple('{}', [{}])",
        name.camel(),
        tuple_type_name(name),
        fields.join(", ")
    )?;
    Ok(())
}

fn write_namedtuples(out: &mut String, device: &Device) -> Result<()> {
    let mut any = false;
    for packet in device.functions() {
        let outs: Vec<String> = packet.response_elements().map(param_name).collect();
        if outs.len() > 1 {
            write_namedtuple(out, &packet.name, &outs)?;
            any = true;
        }
        if packet.stream.is_some() {
            let high: Vec<String> = packet.high_level_elements(Direction::Out).iter().map(param_name).collect();
            if high.len() > 1 {
                write_namedtuple(out, &packet.high_level_name(), &high)?;
                any = true;
            }
        }
    }
    if any {
        writeln!(out)?;
    }
    Ok(())
}

fn write_class_header(out: &mut String, device: &Device) -> Result<()> {
    let cls = class_name(device);
    writeln!(out, "class {}(Device):", cls)?;
    writeln!(out, "    r\"\"\"")?;
    let description = device.description.get("en").map(|d| d.trim()).unwrap_or("");
    writeln!(out, "    {}", description)?;
    writeln!(out, "    \"\"\"")?;
    writeln!(out)?;
    writeln!(out, "    DEVICE_IDENTIFIER = {}", device.device_identifier)?;
    writeln!(out, "    DEVICE_DISPLAY_NAME = '{}'", escape_string(&device.long_display_name()))?;
    writeln!(out, "    DEVICE_URL_PART = '{}' # internal", device.name.under())?;
    writeln!(out)?;

    let mut callbacks = false;
    for packet in device.callbacks() {
        writeln!(out, "    CALLBACK_{} = {}", packet.name.upper(), packet.function_id)?;
        callbacks = true;
    }
    for packet in device.callbacks().filter(|p| p.stream.is_some()) {
        writeln!(
            out,
            "    CALLBACK_{} = -{}",
            packet.high_level_name().upper(),
            packet.function_id
        )?;
    }
    if callbacks {
        writeln!(out)?;
    }

    for packet in device.functions() {
        writeln!(out, "    FUNCTION_{} = {}", packet.name.upper(), packet.function_id)?;
    }
    writeln!(out)?;

    for group in &device.constant_groups {
        for constant in &group.constants {
            writeln!(
                out,
                "    {} = {}",
                group.member_name(constant).upper(),
                constant_literal(&constant.value)
            )?;
        }
    }
    if !device.constant_groups.is_empty() {
        writeln!(out)?;
    }
    Ok(())
}

fn response_expected(packet: &Packet) -> &'static str {
    if packet.has_response_elements() {
        "RESPONSE_EXPECTED_ALWAYS_TRUE"
    } else if packet.doc.kind == DocKind::Ccf {
        "RESPONSE_EXPECTED_TRUE"
    } else {
        "RESPONSE_EXPECTED_FALSE"
    }
}

/// Per-element role names consumed by the runtime's high-level callback handling
fn callback_roles(packet: &Packet, stream: &Stream) -> String {
    let roles: Vec<&str> = packet
        .elements
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if Some(i) == stream.roles.length {
                "'stream_length'"
            } else if Some(i) == stream.roles.chunk_offset {
                "'stream_chunk_offset'"
            } else if i == stream.roles.chunk_data {
                "'stream_chunk_data'"
            } else {
                "None"
            }
        })
        .collect();
    if roles.len() == 1 {
        format!("({},)", roles[0])
    } else {
        format!("({})", roles.join(", "))
    }
}

fn write_init(out: &mut String, device: &Device) -> Result<()> {
    let cls = class_name(device);
    writeln!(out, "    def __init__(self, uid, ipcon):")?;
    writeln!(out, "        r\"\"\"")?;
    writeln!(out, "        Creates an object with the unique device ID *uid* and adds it to")?;
    writeln!(out, "        the IP Connection *ipcon*.")?;
    writeln!(out, "        \"\"\"")?;
    writeln!(
        out,
        "        Device.__init__(self, uid, ipcon, {0}.DEVICE_IDENTIFIER, {0}.DEVICE_DISPLAY_NAME)",
        cls
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "        self.api_version = ({}, {}, {})",
        device.api_version[0], device.api_version[1], device.api_version[2]
    )?;
    writeln!(out)?;

    for packet in device.functions() {
        writeln!(
            out,
            "        self.response_expected[{0}.FUNCTION_{1}] = {0}.{2}",
            cls,
            packet.name.upper(),
            response_expected(packet)
        )?;
    }
    writeln!(out)?;

    let mut callbacks = false;
    for packet in device.callbacks() {
        let layout = PacketLayout::of(packet);
        writeln!(
            out,
            "        self.callback_formats[{}.CALLBACK_{}] = ({}, '{}')",
            cls,
            packet.name.upper(),
            layout.response_length(),
            struct_format(packet.response_elements())
        )?;
        callbacks = true;
    }
    if callbacks {
        writeln!(out)?;
    }

    let mut high_level = false;
    for packet in device.callbacks() {
        if let Some(stream) = &packet.stream {
            let fixed = stream
                .fixed_total_length
                .map_or("None".to_string(), |n| n.to_string());
            writeln!(
                out,
                "        self.high_level_callbacks[{}.CALLBACK_{}] = [{}, {{'fixed_length': {}, 'single_chunk': {}}}, None]",
                cls,
                packet.high_level_name().upper(),
                callback_roles(packet, stream),
                fixed,
                if stream.single_chunk { "True" } else { "False" }
            )?;
            high_level = true;
        }
    }
    if high_level {
        writeln!(out)?;
    }

    writeln!(out, "        ipcon.add_device(self)")?;
    Ok(())
}

fn write_method(out: &mut String, device: &Device, packet: &Packet) -> Result<()> {
    let cls = class_name(device);
    let layout = PacketLayout::of(packet);
    let params: Vec<String> = packet.request_elements().map(param_name).collect();

    writeln!(out)?;
    if params.is_empty() {
        writeln!(out, "    def {}(self):", packet.name.under())?;
    } else {
        writeln!(out, "    def {}(self, {}):", packet.name.under(), params.join(", "))?;
    }
    write_docstring(out, packet.doc.text("en"))?;

    // Get Identity stays usable on devices of the wrong type
    if !(packet.is_common && packet.name.space() == "Get Identity") {
        writeln!(out, "        self.check_validity()")?;
        writeln!(out)?;
    }

    for element in packet.request_elements() {
        let name = param_name(element);
        writeln!(out, "        {} = {}", name, coerce(element, &name))?;
    }
    if !params.is_empty() {
        writeln!(out)?;
    }

    let request = format!(
        "self.ipcon.send_request(self, {}.FUNCTION_{}, {}, '{}', {}, '{}')",
        cls,
        packet.name.upper(),
        tuple_literal(&params),
        struct_format(packet.request_elements()),
        layout.response_length(),
        struct_format(packet.response_elements())
    );

    match packet.response_elements().count() {
        0 => writeln!(out, "        {}", request)?,
        1 => writeln!(out, "        return {}", request)?,
        _ => writeln!(out, "        return {}(*{})", packet.name.camel(), request)?,
    }
    Ok(())
}

/// Variable names of one stream, derived from the stream name
struct StreamVars {
    data: String,
    length: String,
    offset: String,
    chunk: String,
    written: String,
    out_of_sync: String,
}

impl StreamVars {
    fn new(stream: &Stream) -> Self {
        let base = stream.name.under();
        Self {
            data: base.clone(),
            length: format!("{}_length", base),
            offset: format!("{}_chunk_offset", base),
            chunk: format!("{}_chunk_data", base),
            written: format!("{}_written", base),
            out_of_sync: format!("{}_out_of_sync", base),
        }
    }
}

/// Arguments of the low-level call made by a high-level method
fn low_level_args(packet: &Packet, stream: &Stream, vars: &StreamVars, chunk: &str) -> String {
    packet
        .elements
        .iter()
        .enumerate()
        .filter(|(_, e)| e.direction == Direction::In)
        .map(|(i, e)| {
            if Some(i) == stream.roles.length {
                vars.length.clone()
            } else if Some(i) == stream.roles.chunk_offset {
                vars.offset.clone()
            } else if i == stream.roles.chunk_data {
                chunk.to_string()
            } else {
                param_name(e)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Access to a field of the low-level result `ret`
fn ret_field(packet: &Packet, element: &Element) -> String {
    if packet.response_elements().count() == 1 {
        "ret".to_string()
    } else {
        format!("ret.{}", param_name(element))
    }
}

fn write_return(out: &mut String, packet: &Packet, values: Vec<String>) -> Result<()> {
    match values.len() {
        0 => {}
        1 => writeln!(out, "        return {}", values[0])?,
        _ => writeln!(
            out,
            "        return {}({})",
            packet.high_level_name().camel(),
            values.join(", ")
        )?,
    }
    Ok(())
}

fn write_stream_in(out: &mut String, packet: &Packet, stream: &Stream) -> Result<()> {
    let vars = StreamVars::new(stream);
    let low = packet.name.under();
    let capacity = stream.chunk_capacity;
    let pad = padding(stream.data_type);
    let label = stream.name.space();
    let written_element = packet.role_element(stream.roles.chunk_written);
    let written_expr = written_element.map(|e| ret_field(packet, e));

    match stream.fixed_total_length {
        Some(fixed) => {
            writeln!(out, "        if len({}) != {}:", vars.data, fixed)?;
            writeln!(
                out,
                "            raise Error(Error.INVALID_PARAMETER, '{} has to be exactly {} items long')",
                label, fixed
            )?;
            writeln!(out)?;
            writeln!(out, "        {} = {}", vars.length, fixed)?;
        }
        None => {
            writeln!(out, "        if len({}) > {}:", vars.data, stream.max_length)?;
            writeln!(
                out,
                "            raise Error(Error.INVALID_PARAMETER, '{} can be at most {} items long')",
                label, stream.max_length
            )?;
            writeln!(out)?;
            writeln!(out, "        {} = len({})", vars.length, vars.data)?;
        }
    }

    if stream.single_chunk {
        writeln!(
            out,
            "        {} = list({}) + [{}] * ({} - {})",
            vars.chunk, vars.data, pad, capacity, vars.length
        )?;
        if stream.roles.chunk_offset.is_some() {
            writeln!(out, "        {} = 0", vars.offset)?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "        ret = self.{}({})",
            low,
            low_level_args(packet, stream, &vars, &vars.chunk)
        )?;
        if let Some(expr) = &written_expr {
            writeln!(out, "        {} = {}", vars.written, expr)?;
        }
    } else {
        writeln!(out, "        {} = 0", vars.offset)?;
        writeln!(out)?;
        writeln!(out, "        if {} == 0:", vars.length)?;
        writeln!(out, "            {} = [{}] * {}", vars.chunk, pad, capacity)?;
        writeln!(
            out,
            "            ret = self.{}({})",
            low,
            low_level_args(packet, stream, &vars, &vars.chunk)
        )?;
        if let Some(expr) = &written_expr {
            writeln!(out, "            {} = {}", vars.written, expr)?;
        }
        writeln!(out, "        else:")?;
        if written_expr.is_some() {
            writeln!(out, "            {} = 0", vars.written)?;
            writeln!(out)?;
        }
        writeln!(out, "            with self.stream_lock:")?;
        writeln!(out, "                while {} < {}:", vars.offset, vars.length)?;
        writeln!(
            out,
            "                    {} = create_chunk_data({}, {}, {}, {})",
            vars.chunk, vars.data, vars.offset, capacity, pad
        )?;
        writeln!(
            out,
            "                    ret = self.{}({})",
            low,
            low_level_args(packet, stream, &vars, &vars.chunk)
        )?;
        if let Some(expr) = &written_expr {
            writeln!(out, "                    {} += {}", vars.written, expr)?;
            writeln!(out)?;
            writeln!(out, "                    if {} < {}:", expr, capacity)?;
            writeln!(out, "                        break # either last chunk or short write")?;
            writeln!(out)?;
        }
        writeln!(out, "                    {} += {}", vars.offset, capacity)?;
    }

    let high_out = packet.high_level_elements(Direction::Out);
    let extras = packet.extra_elements(Direction::Out);
    if !high_out.is_empty() {
        writeln!(out)?;
    }
    let values = high_out
        .iter()
        .map(|e| match extras.iter().find(|x| x.name == e.name) {
            Some(extra) => ret_field(packet, extra),
            None => vars.written.clone(),
        })
        .collect();
    write_return(out, packet, values)
}

fn write_stream_out(out: &mut String, packet: &Packet, stream: &Stream) -> Result<()> {
    let vars = StreamVars::new(stream);
    let low = packet.name.under();
    let capacity = stream.chunk_capacity;
    let args = low_level_args(packet, stream, &vars, "");
    let data_element = packet.role_element(Some(stream.roles.chunk_data));
    let data_field = data_element.map_or("ret".to_string(), |e| ret_field(packet, e));
    let length_field = packet.role_element(stream.roles.length).map(|e| ret_field(packet, e));
    let offset_element = packet.role_element(stream.roles.chunk_offset);
    let label = stream.name.space();

    let length_expr = match (stream.fixed_total_length, &length_field) {
        (Some(fixed), _) => Some(fixed.to_string()),
        (None, Some(field)) => Some(field.clone()),
        (None, None) => None,
    };

    let result = match (stream.single_chunk, offset_element) {
        (false, Some(offset_element)) => {
            let offset_field = ret_field(packet, offset_element);
            let no_data = offset_element
                .ty
                .int_range()
                .map_or(0, |(_, max)| max);
            let length_expr = length_expr.clone().unwrap_or_else(|| capacity.to_string());

            writeln!(out, "        with self.stream_lock:")?;
            writeln!(out, "            ret = self.{}({})", low, args)?;
            writeln!(out, "            {} = {}", vars.length, length_expr)?;
            writeln!(out)?;
            writeln!(
                out,
                "            if {} == {}: # maximum chunk offset -> stream has no data",
                offset_field, no_data
            )?;
            writeln!(out, "                {} = 0", vars.length)?;
            writeln!(out, "                {} = False", vars.out_of_sync)?;
            writeln!(out, "                {} = ()", vars.data)?;
            writeln!(out, "            else:")?;
            writeln!(out, "                {} = {} != 0", vars.out_of_sync, offset_field)?;
            writeln!(out, "                {} = {}", vars.data, data_field)?;
            writeln!(out)?;
            writeln!(
                out,
                "            while not {} and len({}) < {}:",
                vars.out_of_sync, vars.data, vars.length
            )?;
            writeln!(out, "                ret = self.{}({})", low, args)?;
            if stream.fixed_total_length.is_none() {
                writeln!(out, "                {} = {}", vars.length, length_expr)?;
            }
            writeln!(
                out,
                "                {} = {} != len({})",
                vars.out_of_sync, offset_field, vars.data
            )?;
            writeln!(out, "                {} += {}", vars.data, data_field)?;
            writeln!(out)?;
            writeln!(
                out,
                "            if {}: # discard remaining stream to bring it back in-sync",
                vars.out_of_sync
            )?;
            writeln!(
                out,
                "                while {} + {} < {}:",
                offset_field, capacity, vars.length
            )?;
            writeln!(out, "                    ret = self.{}({})", low, args)?;
            if stream.fixed_total_length.is_none() {
                writeln!(out, "                    {} = {}", vars.length, length_expr)?;
            }
            writeln!(out)?;
            writeln!(
                out,
                "                raise Error(Error.STREAM_OUT_OF_SYNC, '{} stream is out-of-sync')",
                label
            )?;
            format!("{}[:{}]", vars.data, vars.length)
        }
        _ => {
            writeln!(out, "        ret = self.{}({})", low, args)?;
            match length_expr {
                Some(length) => format!("{}[:{}]", data_field, length),
                None => data_field.clone(),
            }
        }
    };

    let high_out = packet.high_level_elements(Direction::Out);
    let extras = packet.extra_elements(Direction::Out);
    writeln!(out)?;
    let values = high_out
        .iter()
        .map(|e| match extras.iter().find(|x| x.name == e.name) {
            Some(extra) => ret_field(packet, extra),
            None => result.clone(),
        })
        .collect();
    write_return(out, packet, values)
}

fn write_high_level_method(out: &mut String, packet: &Packet, stream: &Stream) -> Result<()> {
    let params: Vec<String> = packet.high_level_elements(Direction::In).iter().map(param_name).collect();

    writeln!(out)?;
    if params.is_empty() {
        writeln!(out, "    def {}(self):", packet.high_level_name().under())?;
    } else {
        writeln!(out, "    def {}(self, {}):", packet.high_level_name().under(), params.join(", "))?;
    }
    write_docstring(out, packet.doc.text("en"))?;

    for element in packet.high_level_elements(Direction::In) {
        let name = param_name(&element);
        writeln!(out, "        {} = {}", name, coerce(&element, &name))?;
    }
    if !params.is_empty() {
        writeln!(out)?;
    }

    match stream.direction {
        StreamDirection::In => write_stream_in(out, packet, stream),
        StreamDirection::Out => write_stream_out(out, packet, stream),
    }
}

fn write_register_callback(out: &mut String, device: &Device) -> Result<()> {
    if device.callbacks().next().is_none() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "    def register_callback(self, callback_id, function):")?;
    writeln!(out, "        r\"\"\"")?;
    writeln!(out, "        Registers the given *function* with the given *callback_id*.")?;
    writeln!(out, "        \"\"\"")?;
    writeln!(out, "        if function is None:")?;
    writeln!(out, "            self.registered_callbacks.pop(callback_id, None)")?;
    writeln!(out, "        else:")?;
    writeln!(out, "            self.registered_callbacks[callback_id] = function")?;
    Ok(())
}

/// Render the bindings module of one device
pub fn render_bindings(device: &Device, options: &GenerationOptions) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "# -*- coding: utf-8 -*-")?;
    out.push_str(&hash_comment(&header_lines(options, "Python")));
    writeln!(out)?;
    writeln!(out, "from collections import namedtuple")?;
    writeln!(out)?;
    writeln!(out, "try:")?;
    writeln!(out, "    from .ip_connection import {}", IMPORTS)?;
    writeln!(out, "except (ValueError, ImportError):")?;
    writeln!(out, "    from ip_connection import {}", IMPORTS)?;
    writeln!(out)?;

    write_namedtuples(&mut out, device)?;
    write_class_header(&mut out, device)?;
    write_init(&mut out, device)?;

    for packet in device.functions() {
        write_method(&mut out, device, packet)?;
    }
    for packet in device.functions() {
        if let Some(stream) = &packet.stream {
            write_high_level_method(&mut out, packet, stream)?;
        }
    }

    write_register_callback(&mut out, device)?;

    writeln!(out)?;
    writeln!(
        out,
        "{} = {} # for backward compatibility",
        device.name.camel(),
        class_name(device)
    )?;
    Ok(out)
}
