//! TCP/IP protocol documentation in reStructuredText.
//!
//! Documents the low-level wire view of every packet: function ID, request and
//! response elements with their wire types, and payload sizes.

use std::fmt::Write;

use crate::codegen::utils::{header_lines, rewrite_links, rst_comment};
use crate::codegen::{Emitter, GeneratedFile, GenerationOptions, Language};
use crate::error::Result;
use crate::layout::{Field, PacketLayout};
use crate::model::{Device, DocKind, Element, ElementType, Name, Packet};

pub struct TcpipEmitter;

/// Section titles by documentation language
struct Texts {
    basic: &'static str,
    advanced: &'static str,
    callback_configuration: &'static str,
    low_level: &'static str,
    internal: &'static str,
    callbacks: &'static str,
    empty_request: &'static str,
    no_response: &'static str,
    empty_response: &'static str,
    constants_intro: &'static str,
    payload: &'static str,
}

const EN: Texts = Texts {
    basic: "Basic Functions",
    advanced: "Advanced Functions",
    callback_configuration: "Callback Configuration Functions",
    low_level: "Low-Level Functions",
    internal: "Internal Functions",
    callbacks: "Callbacks",
    empty_request: "empty payload",
    no_response: "no response",
    empty_response: "empty payload",
    constants_intro: "The following meanings are defined for the elements of this function:",
    payload: "request {0} bytes, response {1} bytes",
};

const DE: Texts = Texts {
    basic: "Grundfunktionen",
    advanced: "Fortgeschrittene Funktionen",
    callback_configuration: "Konfigurationsfunktionen für Callbacks",
    low_level: "Low-Level Funktionen",
    internal: "Interne Funktionen",
    callbacks: "Callbacks",
    empty_request: "keine Nutzdaten",
    no_response: "keine Antwort",
    empty_response: "keine Nutzdaten",
    constants_intro: "Die folgenden Bedeutungen sind für die Elemente dieser Funktion definiert:",
    payload: "Anfrage {0} Byte, Antwort {1} Byte",
};

fn texts(doc_language: &str) -> &'static Texts {
    if doc_language == "de" {
        &DE
    } else {
        &EN
    }
}

/// Wire type as shown in the docs, `char[N]` for strings
fn wire_type(element: &Element) -> String {
    let base = match element.ty {
        ElementType::String => "char",
        ty => ty.as_str(),
    };
    match element.cardinality.count() {
        1 if element.ty != ElementType::String => base.to_string(),
        n => format!("{}[{}]", base, n),
    }
}

fn class_name(device: &Device) -> String {
    device.full_name().camel()
}

fn fix_links(device: &Device, text: &str) -> String {
    let cls = class_name(device);
    rewrite_links(
        text,
        |name: &Name| format!(":tcpip:func:`{}.{}`", cls, name.camel()),
        |name: &Name| format!(":tcpip:func:`CALLBACK_{} <{}.CALLBACK_{}>`", name.upper(), cls, name.upper()),
    )
}

fn ref_base(device: &Device) -> String {
    format!("{}_{}", device.name.under(), device.category.as_str().to_lowercase())
}

fn write_header(out: &mut String, device: &Device, doc_language: &str, options: &GenerationOptions) -> Result<()> {
    out.push_str(&rst_comment(&header_lines(options, "TCP/IP")));
    writeln!(out)?;
    writeln!(out, ".. _{}_tcpip:", ref_base(device))?;
    writeln!(out)?;

    let title = format!("TCP/IP - {}", device.long_display_name());
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(title.chars().count()))?;
    writeln!(out)?;

    let long = device.long_display_name();
    if doc_language == "de" {
        writeln!(
            out,
            "Dies ist die Beschreibung des TCP/IP Protokolls für das {}. Allgemeine",
            long
        )?;
        writeln!(
            out,
            "Informationen und technische Spezifikationen für das {} sind in dessen",
            long
        )?;
        writeln!(out, ":ref:`Hardware Beschreibung <{}>` zusammengefasst.", ref_base(device))?;
    } else {
        writeln!(out, "This is the description of the TCP/IP protocol for the {}.", long)?;
        writeln!(
            out,
            "General information and technical specifications for the {} are summarized",
            long
        )?;
        writeln!(out, "in its :ref:`hardware description <{}>`.", ref_base(device))?;
    }

    if let Some(description) = device.description.get(doc_language).or_else(|| device.description.get("en")) {
        writeln!(out)?;
        writeln!(out, "{}", description.trim())?;
    }

    writeln!(out)?;
    writeln!(out, "The device identifier is ``{}``.", device.device_identifier)?;
    Ok(())
}

fn write_elements(out: &mut String, tag: &str, fields: &[Field<'_>]) -> Result<()> {
    for field in fields {
        writeln!(out, " :{} {}: {}", tag, field.element.name.under(), wire_type(field.element))?;
    }
    Ok(())
}

fn write_constants(out: &mut String, device: &Device, packet: &Packet, t: &Texts) -> Result<()> {
    let grouped: Vec<(&Element, _)> = packet
        .elements
        .iter()
        .filter_map(|e| {
            e.constant_group
                .as_ref()
                .and_then(|g| device.constant_group(g))
                .map(|g| (e, g))
        })
        .collect();

    if grouped.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, " {}", t.constants_intro)?;
    for (element, group) in grouped {
        writeln!(out)?;
        writeln!(out, " * {}:", element.name.under())?;
        writeln!(out)?;
        for constant in &group.constants {
            writeln!(out, "  * {} = {}", constant.value, constant.name.space())?;
        }
    }
    Ok(())
}

fn write_packet(out: &mut String, device: &Device, packet: &Packet, doc_language: &str) -> Result<()> {
    let t = texts(doc_language);
    let layout = PacketLayout::of(packet);
    let cls = class_name(device);

    if packet.is_callback() {
        writeln!(out, ".. tcpip:function:: {}.CALLBACK_{}", cls, packet.name.upper())?;
    } else {
        writeln!(out, ".. tcpip:function:: {}.{}", cls, packet.name.camel())?;
    }
    writeln!(out)?;
    writeln!(out, " :functionid: {}", packet.function_id)?;

    if packet.is_function() {
        if layout.request.is_empty() {
            writeln!(out, " :emptyrequest: {}", t.empty_request)?;
        } else {
            write_elements(out, "request", &layout.request)?;
        }
    }

    if layout.response.is_empty() {
        if packet.is_callback() {
            writeln!(out, " :emptyresponse: {}", t.empty_response)?;
        } else {
            writeln!(out, " :noresponse: {}", t.no_response)?;
        }
    } else {
        write_elements(out, "response", &layout.response)?;
    }

    let payload = t
        .payload
        .replace("{0}", &layout.request_size().to_string())
        .replace("{1}", &layout.response_size().to_string());
    writeln!(out, " :payload: {}", payload)?;

    if let Some(since) = packet.since_firmware {
        writeln!(out, " :since: {}.{}.{}", since[0], since[1], since[2])?;
    }

    let text = fix_links(device, packet.doc.text(doc_language));
    if !text.is_empty() {
        writeln!(out)?;
        for line in text.lines() {
            if line.trim().is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, " {}", line)?;
            }
        }
    }

    write_constants(out, device, packet, t)?;
    writeln!(out)?;
    Ok(())
}

/// Render the TCP/IP page of one device in one documentation language
pub fn render_doc(device: &Device, doc_language: &str, options: &GenerationOptions) -> Result<String> {
    let t = texts(doc_language);
    let mut out = String::new();

    write_header(&mut out, device, doc_language, options)?;

    writeln!(out)?;
    writeln!(out, ".. _{}_tcpip_api:", ref_base(device))?;
    writeln!(out)?;
    writeln!(out, "API")?;
    writeln!(out, "---")?;
    writeln!(out)?;
    if doc_language == "de" {
        writeln!(out, "Eine allgemeine Beschreibung der TCP/IP Protokollstruktur findet sich")?;
        writeln!(out, ":ref:`hier <llproto_tcpip>`.")?;
    } else {
        writeln!(out, "A general description of the TCP/IP protocol structure can be found")?;
        writeln!(out, ":ref:`here <llproto_tcpip>`.")?;
    }

    let sections = [
        (DocKind::Bf, t.basic),
        (DocKind::Af, t.advanced),
        (DocKind::Llf, t.low_level),
        (DocKind::If, t.internal),
        (DocKind::Ccf, t.callback_configuration),
    ];

    for (kind, title) in sections {
        let packets: Vec<&Packet> = device.functions().filter(|p| p.doc.kind == kind).collect();
        if packets.is_empty() {
            continue;
        }
        writeln!(out)?;
        writeln!(out, "{}", title)?;
        writeln!(out, "{}", "^".repeat(title.chars().count()))?;
        writeln!(out)?;
        for packet in packets {
            write_packet(&mut out, device, packet, doc_language)?;
        }
    }

    let callbacks: Vec<&Packet> = device.callbacks().collect();
    if !callbacks.is_empty() {
        writeln!(out)?;
        writeln!(out, ".. _{}_tcpip_callbacks:", ref_base(device))?;
        writeln!(out)?;
        writeln!(out, "{}", t.callbacks)?;
        writeln!(out, "{}", "^".repeat(t.callbacks.chars().count()))?;
        writeln!(out)?;
        for packet in callbacks {
            write_packet(&mut out, device, packet, doc_language)?;
        }
    }

    Ok(out)
}

impl Emitter for TcpipEmitter {
    fn language(&self) -> Language {
        Language::Tcpip
    }

    /// The protocol itself is the binding; nothing to generate
    fn bindings(&self, _device: &Device, _options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        Ok(Vec::new())
    }

    fn doc(&self, device: &Device, doc_language: &str, options: &GenerationOptions) -> Result<Vec<GeneratedFile>> {
        let file_name = format!("{}_{}_TCPIP.rst", device.name.camel(), device.category.as_str());
        Ok(vec![GeneratedFile::new(file_name, render_doc(device, doc_language, options)?)])
    }
}
