//! The `.h` file of a device.

use std::fmt::Write;

use crate::codegen::c::{
    callback_param_decl, constant_literal, file_stem, high_level_params, low_level_params, macro_prefix, prefix,
    type_name,
};
use crate::codegen::utils::{escape_string, header_lines, rewrite_links, star_comment};
use crate::codegen::GenerationOptions;
use crate::error::Result;
use crate::model::{Device, Name, Packet};

/// Doc text with links in C form
pub fn doc_text(device: &Device, text: &str) -> String {
    let p = prefix(device);
    let m = macro_prefix(device);
    rewrite_links(
        text,
        |name: &Name| format!("{}_{}", p, name.under()),
        |name: &Name| format!("{}_CALLBACK_{}", m, name.upper()),
    )
}

fn write_doc_block(out: &mut String, device: &Device, lines: &[String], text: &str) -> Result<()> {
    writeln!(out, "/**")?;
    writeln!(out, " * \\ingroup {}", device.full_name().camel())?;
    for line in lines {
        writeln!(out, " *")?;
        writeln!(out, " * {}", line)?;
    }
    let text = doc_text(device, text);
    if !text.is_empty() {
        writeln!(out, " *")?;
        for line in text.lines() {
            if line.trim().is_empty() {
                writeln!(out, " *")?;
            } else {
                writeln!(out, " * {}", line)?;
            }
        }
    }
    writeln!(out, " */")?;
    Ok(())
}

fn write_defines(out: &mut String, device: &Device) -> Result<()> {
    let m = macro_prefix(device);

    for packet in device.functions() {
        write_doc_block(out, device, &[], "")?;
        writeln!(out, "#define {}_FUNCTION_{} {}", m, packet.name.upper(), packet.function_id)?;
        writeln!(out)?;
    }

    for packet in device.callbacks() {
        let params: Vec<String> = packet
            .response_elements()
            .map(callback_param_decl)
            .chain(std::iter::once("void *user_data".to_string()))
            .collect();
        let signature = format!("Signature: \\code void callback({}) \\endcode", params.join(", "));
        write_doc_block(out, device, &[signature], packet.doc.text("en"))?;
        writeln!(out, "#define {}_CALLBACK_{} {}", m, packet.name.upper(), packet.function_id)?;
        writeln!(out)?;
    }

    for group in &device.constant_groups {
        for constant in &group.constants {
            write_doc_block(out, device, &[], "")?;
            writeln!(
                out,
                "#define {}_{} {}",
                m,
                group.member_name(constant).upper(),
                constant_literal(&constant.value)
            )?;
            writeln!(out)?;
        }
    }

    write_doc_block(
        out,
        device,
        &[format!("This constant is used to identify a {}.", device.long_display_name())],
        "",
    )?;
    writeln!(out, "#define {}_DEVICE_IDENTIFIER {}", m, device.device_identifier)?;
    writeln!(out)?;
    write_doc_block(out, device, &["This constant represents the display name of a device.".to_string()], "")?;
    writeln!(
        out,
        "#define {}_DEVICE_DISPLAY_NAME \"{}\"",
        m,
        escape_string(&device.long_display_name())
    )?;
    writeln!(out)?;
    Ok(())
}

fn prototype(device: &Device, name: &Name, params: &[String]) -> String {
    let p = prefix(device);
    let t = type_name(device);
    if params.is_empty() {
        format!("int {0}_{1}({2} *{0})", p, name.under(), t)
    } else {
        format!("int {0}_{1}({2} *{0}, {3})", p, name.under(), t, params.join(", "))
    }
}

/// Prototype of the low-level function of a packet
pub fn low_level_prototype(device: &Device, packet: &Packet) -> String {
    prototype(device, &packet.name, &low_level_params(packet))
}

/// Prototype of the high-level function of a streamed packet
pub fn high_level_prototype(device: &Device, packet: &Packet) -> Option<String> {
    let stream = packet.stream.as_ref()?;
    if packet.is_callback() {
        return None;
    }
    Some(prototype(device, &packet.high_level_name(), &high_level_params(packet, stream)))
}

fn write_management_prototypes(out: &mut String, device: &Device) -> Result<()> {
    let p = prefix(device);
    let t = type_name(device);

    write_doc_block(
        out,
        device,
        &[
            format!("Creates the device object \\c {} with the unique device ID \\c uid and adds", p),
            "it to the IPConnection \\c ipcon.".to_string(),
        ],
        "",
    )?;
    writeln!(out, "void {0}_create({1} *{0}, const char *uid, IPConnection *ipcon);", p, t)?;
    writeln!(out)?;

    write_doc_block(out, device, &["Removes the device object from its IPConnection and destroys it.".to_string()], "")?;
    writeln!(out, "void {0}_destroy({1} *{0});", p, t)?;
    writeln!(out)?;

    write_doc_block(out, device, &["Returns the response expected flag for the given function ID.".to_string()], "")?;
    writeln!(
        out,
        "int {0}_get_response_expected({1} *{0}, uint8_t function_id, bool *ret_response_expected);",
        p, t
    )?;
    writeln!(out)?;

    write_doc_block(out, device, &["Changes the response expected flag of the given function ID.".to_string()], "")?;
    writeln!(
        out,
        "int {0}_set_response_expected({1} *{0}, uint8_t function_id, bool response_expected);",
        p, t
    )?;
    writeln!(out)?;

    write_doc_block(
        out,
        device,
        &["Changes the response expected flag for all setter and callback configuration functions.".to_string()],
        "",
    )?;
    writeln!(
        out,
        "int {0}_set_response_expected_all({1} *{0}, bool response_expected);",
        p, t
    )?;
    writeln!(out)?;

    if device.callbacks().next().is_some() {
        write_doc_block(out, device, &["Registers the given \\c function with the given \\c callback_id.".to_string()], "")?;
        writeln!(
            out,
            "void {0}_register_callback({1} *{0}, int16_t callback_id, void (*function)(void), void *user_data);",
            p, t
        )?;
        writeln!(out)?;
    }

    write_doc_block(out, device, &["Returns the API version (major, minor, release) of the bindings.".to_string()], "")?;
    writeln!(out, "int {0}_get_api_version({1} *{0}, uint8_t ret_api_version[3]);", p, t)?;
    writeln!(out)?;
    Ok(())
}

/// Render the header of one device
pub fn render_header(device: &Device, options: &GenerationOptions) -> Result<String> {
    let guard = format!("{}_H", file_stem(device).to_uppercase());
    let group = device.full_name().camel();
    let mut out = String::new();

    out.push_str(&star_comment(&header_lines(options, "C/C++")));
    writeln!(out)?;
    writeln!(out, "#ifndef {}", guard)?;
    writeln!(out, "#define {}", guard)?;
    writeln!(out)?;
    writeln!(out, "#include \"ip_connection.h\"")?;
    writeln!(out)?;
    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "extern \"C\" {{")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;
    writeln!(out, "/**")?;
    writeln!(out, " * \\defgroup {} {}", group, device.long_display_name())?;
    writeln!(out, " */")?;
    writeln!(out)?;

    let description = device.description.get("en").map(|d| d.trim().to_string()).unwrap_or_default();
    write_doc_block(&mut out, device, &[], &description)?;
    writeln!(out, "typedef Device {};", type_name(device))?;
    writeln!(out)?;

    write_defines(&mut out, device)?;
    write_management_prototypes(&mut out, device)?;

    for packet in device.functions() {
        write_doc_block(&mut out, device, &[], packet.doc.text("en"))?;
        writeln!(out, "{};", low_level_prototype(device, packet))?;
        writeln!(out)?;
    }

    for packet in device.functions() {
        if let Some(prototype) = high_level_prototype(device, packet) {
            write_doc_block(&mut out, device, &[], packet.doc.text("en"))?;
            writeln!(out, "{};", prototype)?;
            writeln!(out)?;
        }
    }

    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "}}")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;
    writeln!(out, "#endif")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::types::DeviceConfig;
    use crate::codegen::validation::build_device;

    const DEVICE: &str = r#"
name: RS485
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 1]
device_identifier: 277
packets:
  - type: function
    name: Write Low Level
    high_level:
      stream_in: { name: Message, short_write: true }
    elements:
      - { name: Message Length, type: uint16, direction: in }
      - { name: Message Chunk Offset, type: uint16, direction: in }
      - { name: Message Chunk Data, type: char, cardinality: 60, direction: in }
      - { name: Message Chunk Written, type: uint8, direction: out }
    doc:
      en: Writes characters, see :func:`Get Identity`.
"#;

    #[test]
    fn test_header_prototypes() {
        let config: DeviceConfig = serde_yaml::from_str(DEVICE).unwrap();
        let device = build_device(config).unwrap();
        let h = render_header(&device, &GenerationOptions::default()).unwrap();

        assert!(h.contains("#ifndef BRICKLET_RS485_H"));
        assert!(h.contains("#define RS485_FUNCTION_WRITE_LOW_LEVEL 1\n"));
        assert!(h.contains("#define RS485_FUNCTION_GET_IDENTITY 255\n"));
        assert!(h.contains(
            "int rs485_write_low_level(RS485 *rs485, uint16_t message_length, uint16_t message_chunk_offset, \
             const char message_chunk_data[60], uint8_t *ret_message_chunk_written);"
        ));
        assert!(h.contains(
            "int rs485_write(RS485 *rs485, const char *message, uint16_t message_length, uint16_t *ret_message_written);"
        ));
        assert!(h.contains(" * Writes characters, see rs485_get_identity."));
        assert!(h.contains("#define RS485_DEVICE_IDENTIFIER 277"));
    }
}
