//! The `.c` file of a device: packed wire structs, callback wrappers and
//! function bodies.

use std::fmt::Write;

use crate::codegen::c::header::{high_level_prototype, low_level_prototype};
use crate::codegen::c::{c_type, callback_param_decl, file_stem, leconvert, macro_prefix, param_name, prefix, type_name};
use crate::codegen::utils::{header_lines, star_comment};
use crate::codegen::GenerationOptions;
use crate::error::Result;
use crate::model::{Device, Direction, DocKind, Element, ElementType, Packet, Stream, StreamDirection};

/// Declaration of an element inside a packed wire struct
fn struct_field(element: &Element) -> String {
    let name = param_name(element);
    let count = element.cardinality.count();
    match (element.ty, element.is_array()) {
        (ElementType::String, _) => format!("char {}[{}];", name, count),
        (ElementType::Bool, true) => format!("uint8_t {}[{}];", name, element.size()),
        (ElementType::Bool, false) => format!("uint8_t {};", name),
        (ty, true) => format!("{} {}[{}];", c_type(ty), name, count),
        (ty, false) => format!("{} {};", c_type(ty), name),
    }
}

fn struct_name(packet: &Packet, suffix: &str) -> String {
    format!("{}_{}", packet.name.camel(), suffix)
}

fn write_struct<'a>(out: &mut String, name: &str, elements: impl Iterator<Item = &'a Element>) -> Result<()> {
    writeln!(out, "typedef struct {{")?;
    writeln!(out, "\tPacketHeader header;")?;
    for element in elements {
        writeln!(out, "\t{}", struct_field(element))?;
    }
    writeln!(out, "}} ATTRIBUTE_PACKED {};", name)?;
    writeln!(out)?;
    Ok(())
}

fn write_structs(out: &mut String, device: &Device) -> Result<()> {
    writeln!(out, "#if defined _MSC_VER || defined __BORLANDC__")?;
    writeln!(out, "\t#pragma pack(push)")?;
    writeln!(out, "\t#pragma pack(1)")?;
    writeln!(out, "\t#define ATTRIBUTE_PACKED")?;
    writeln!(out, "#elif defined __GNUC__")?;
    writeln!(out, "\t#ifdef _WIN32")?;
    writeln!(out, "\t\t// workaround struct packing bug in GCC 4.7 on Windows")?;
    writeln!(out, "\t\t// https://gcc.gnu.org/bugzilla/show_bug.cgi?id=52991")?;
    writeln!(out, "\t\t#define ATTRIBUTE_PACKED __attribute__((gcc_struct, packed))")?;
    writeln!(out, "\t#else")?;
    writeln!(out, "\t\t#define ATTRIBUTE_PACKED __attribute__((packed))")?;
    writeln!(out, "\t#endif")?;
    writeln!(out, "#else")?;
    writeln!(out, "\t#error unknown compiler, do not know how to enable struct packing")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;

    for packet in device.functions() {
        write_struct(out, &struct_name(packet, "Request"), packet.request_elements())?;
        if packet.has_response_elements() {
            write_struct(out, &struct_name(packet, "Response"), packet.response_elements())?;
        }
    }
    for packet in device.callbacks() {
        write_struct(out, &struct_name(packet, "Callback"), packet.response_elements())?;
    }

    writeln!(out, "#if defined _MSC_VER || defined __BORLANDC__")?;
    writeln!(out, "\t#pragma pack(pop)")?;
    writeln!(out, "#endif")?;
    writeln!(out, "#undef ATTRIBUTE_PACKED")?;
    writeln!(out)?;
    Ok(())
}

fn callback_function_type(packet: &Packet) -> String {
    format!("{}_CallbackFunction", packet.name.camel())
}

fn write_callback_wrapper(out: &mut String, device: &Device, packet: &Packet) -> Result<()> {
    let p = prefix(device);
    let id = format!("{}_CALLBACK_{}", macro_prefix(device), packet.name.upper());
    let function_type = callback_function_type(packet);
    let params: Vec<String> = packet
        .response_elements()
        .map(callback_param_decl)
        .chain(std::iter::once("void *user_data".to_string()))
        .collect();

    writeln!(out, "typedef void (*{})({});", function_type, params.join(", "))?;
    writeln!(out)?;
    writeln!(
        out,
        "static void {}_callback_wrapper_{}(DevicePrivate *device_p, Packet *packet) {{",
        p,
        packet.name.under()
    )?;
    writeln!(out, "\t{} callback_function;", function_type)?;
    writeln!(out, "\tvoid *user_data;")?;
    writeln!(
        out,
        "\t{0} *callback = ({0} *)packet;",
        struct_name(packet, "Callback")
    )?;

    let mut needs_index = false;
    for element in packet.response_elements() {
        let name = param_name(element);
        let count = element.cardinality.count();
        if element.ty == ElementType::String {
            writeln!(out, "\tchar {}[{}];", name, count + 1)?;
        } else if element.is_packed_bool_array() {
            writeln!(out, "\tbool unpacked_{}[{}];", name, count)?;
            needs_index = true;
        } else if element.is_array() && leconvert(element.ty).is_some() {
            needs_index = true;
        }
    }
    if needs_index {
        writeln!(out, "\tint i;")?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "\t*(void **)(&callback_function) = device_p->registered_callbacks[DEVICE_NUM_FUNCTION_IDS + {}];",
        id
    )?;
    writeln!(
        out,
        "\tuser_data = device_p->registered_callback_user_data[DEVICE_NUM_FUNCTION_IDS + {}];",
        id
    )?;

    let mut args = Vec::new();
    let mut conversions = Vec::new();
    for element in packet.response_elements() {
        let name = param_name(element);
        let count = element.cardinality.count();
        if element.ty == ElementType::String {
            conversions.push(format!("memcpy({0}, callback->{0}, {1});", name, count));
            conversions.push(format!("{}[{}] = '\\0';", name, count));
            args.push(name);
        } else if element.is_packed_bool_array() {
            conversions.push(format!(
                "for (i = 0; i < {1}; i++) unpacked_{0}[i] = (callback->{0}[i / 8] & (1 << (i % 8))) != 0;",
                name, count
            ));
            args.push(format!("unpacked_{}", name));
        } else if element.ty == ElementType::Bool {
            args.push(format!("callback->{} != 0", name));
        } else if let Some(conversion) = leconvert(element.ty) {
            if element.is_array() {
                conversions.push(format!(
                    "for (i = 0; i < {1}; i++) callback->{0}[i] = leconvert_{2}_from(callback->{0}[i]);",
                    name, count, conversion
                ));
            } else {
                conversions.push(format!(
                    "callback->{0} = leconvert_{1}_from(callback->{0});",
                    name, conversion
                ));
            }
            args.push(format!("callback->{}", name));
        } else {
            args.push(format!("callback->{}", name));
        }
    }
    args.push("user_data".to_string());

    for conversion in &conversions {
        writeln!(out, "\t{}", conversion)?;
    }
    writeln!(out)?;
    writeln!(out, "\tif (callback_function == NULL) {{")?;
    writeln!(out, "\t\treturn;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(out, "\tcallback_function({});", args.join(", "))?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

fn response_expected(packet: &Packet) -> &'static str {
    if packet.has_response_elements() {
        "DEVICE_RESPONSE_EXPECTED_ALWAYS_TRUE"
    } else if packet.doc.kind == DocKind::Ccf {
        "DEVICE_RESPONSE_EXPECTED_TRUE"
    } else {
        "DEVICE_RESPONSE_EXPECTED_FALSE"
    }
}

fn write_management(out: &mut String, device: &Device) -> Result<()> {
    let p = prefix(device);
    let t = type_name(device);
    let m = macro_prefix(device);
    let [major, minor, release] = device.api_version;

    writeln!(out, "void {0}_create({1} *{0}, const char *uid, IPConnection *ipcon) {{", p, t)?;
    writeln!(out, "\tIPConnectionPrivate *ipcon_p = ipcon->p;")?;
    writeln!(out, "\tDevicePrivate *device_p;")?;
    writeln!(out)?;
    writeln!(
        out,
        "\tdevice_create({}, uid, ipcon_p, {}, {}, {}, {}_DEVICE_IDENTIFIER);",
        p, major, minor, release, m
    )?;
    writeln!(out)?;
    writeln!(out, "\tdevice_p = {}->p;", p)?;
    writeln!(out)?;
    for packet in device.functions() {
        writeln!(
            out,
            "\tdevice_p->response_expected[{}_FUNCTION_{}] = {};",
            m,
            packet.name.upper(),
            response_expected(packet)
        )?;
    }
    writeln!(out)?;
    let mut callbacks = false;
    for packet in device.callbacks() {
        writeln!(
            out,
            "\tdevice_p->callback_wrappers[{}_CALLBACK_{}] = {}_callback_wrapper_{};",
            m,
            packet.name.upper(),
            p,
            packet.name.under()
        )?;
        callbacks = true;
    }
    if callbacks {
        writeln!(out)?;
    }
    writeln!(out, "\tipcon_add_device(ipcon_p, device_p);")?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "void {0}_destroy({1} *{0}) {{", p, t)?;
    writeln!(out, "\tdevice_release({}->p);", p)?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(
        out,
        "int {0}_get_response_expected({1} *{0}, uint8_t function_id, bool *ret_response_expected) {{",
        p, t
    )?;
    writeln!(
        out,
        "\treturn device_get_response_expected({}->p, function_id, ret_response_expected);",
        p
    )?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(
        out,
        "int {0}_set_response_expected({1} *{0}, uint8_t function_id, bool response_expected) {{",
        p, t
    )?;
    writeln!(
        out,
        "\treturn device_set_response_expected({}->p, function_id, response_expected);",
        p
    )?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(
        out,
        "int {0}_set_response_expected_all({1} *{0}, bool response_expected) {{",
        p, t
    )?;
    writeln!(
        out,
        "\treturn device_set_response_expected_all({}->p, response_expected);",
        p
    )?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    if device.callbacks().next().is_some() {
        writeln!(
            out,
            "void {0}_register_callback({1} *{0}, int16_t callback_id, void (*function)(void), void *user_data) {{",
            p, t
        )?;
        writeln!(
            out,
            "\tdevice_register_callback({}->p, callback_id, function, user_data);",
            p
        )?;
        writeln!(out, "}}")?;
        writeln!(out)?;
    }

    writeln!(out, "int {0}_get_api_version({1} *{0}, uint8_t ret_api_version[3]) {{", p, t)?;
    writeln!(out, "\treturn device_get_api_version({}->p, ret_api_version);", p)?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

fn request_conversion(element: &Element) -> String {
    let name = param_name(element);
    let count = element.cardinality.count();
    if element.ty == ElementType::String {
        format!("strncpy(request.{0}, {0}, {1});", name, count)
    } else if element.is_packed_bool_array() {
        format!(
            "memset(request.{0}, 0, {2}); for (i = 0; i < {1}; i++) request.{0}[i / 8] |= ({0}[i] ? 1 : 0) << (i % 8);",
            name,
            count,
            element.size()
        )
    } else if element.ty == ElementType::Bool {
        format!("request.{0} = {0} ? 1 : 0;", name)
    } else if let Some(conversion) = leconvert(element.ty) {
        if element.is_array() {
            format!(
                "for (i = 0; i < {1}; i++) request.{0}[i] = leconvert_{2}_to({0}[i]);",
                name, count, conversion
            )
        } else {
            format!("request.{0} = leconvert_{1}_to({0});", name, conversion)
        }
    } else if element.is_array() {
        format!("memcpy(request.{0}, {0}, {1} * sizeof({2}));", name, count, c_type(element.ty))
    } else {
        format!("request.{0} = {0};", name)
    }
}

fn response_conversion(element: &Element) -> String {
    let name = param_name(element);
    let count = element.cardinality.count();
    if element.ty == ElementType::String {
        format!("strncpy(ret_{0}, response.{0}, {1});", name, count)
    } else if element.is_packed_bool_array() {
        format!(
            "for (i = 0; i < {1}; i++) ret_{0}[i] = (response.{0}[i / 8] & (1 << (i % 8))) != 0;",
            name, count
        )
    } else if element.ty == ElementType::Bool {
        format!("*ret_{0} = response.{0} != 0;", name)
    } else if let Some(conversion) = leconvert(element.ty) {
        if element.is_array() {
            format!(
                "for (i = 0; i < {1}; i++) ret_{0}[i] = leconvert_{2}_from(response.{0}[i]);",
                name, count, conversion
            )
        } else {
            format!("*ret_{0} = leconvert_{1}_from(response.{0});", name, conversion)
        }
    } else if element.is_array() {
        format!("memcpy(ret_{0}, response.{0}, {1} * sizeof({2}));", name, count, c_type(element.ty))
    } else {
        format!("*ret_{0} = response.{0};", name)
    }
}

fn needs_index(element: &Element) -> bool {
    element.is_packed_bool_array() || (element.is_array() && leconvert(element.ty).is_some())
}

fn write_function(out: &mut String, device: &Device, packet: &Packet) -> Result<()> {
    let p = prefix(device);
    let has_response = packet.has_response_elements();

    writeln!(out, "{} {{", low_level_prototype(device, packet))?;
    writeln!(out, "\tDevicePrivate *device_p = {}->p;", p)?;
    writeln!(out, "\t{} request;", struct_name(packet, "Request"))?;
    if has_response {
        writeln!(out, "\t{} response;", struct_name(packet, "Response"))?;
    }
    writeln!(out, "\tint ret;")?;
    if packet.elements.iter().any(needs_index) {
        writeln!(out, "\tint i;")?;
    }
    writeln!(out)?;

    if !(packet.is_common && packet.name.space() == "Get Identity") {
        writeln!(out, "\tret = device_check_validity(device_p);")?;
        writeln!(out)?;
        writeln!(out, "\tif (ret < 0) {{")?;
        writeln!(out, "\t\treturn ret;")?;
        writeln!(out, "\t}}")?;
        writeln!(out)?;
    }

    writeln!(
        out,
        "\tret = packet_header_create(&request.header, sizeof(request), {}_FUNCTION_{}, device_p->ipcon_p, device_p);",
        macro_prefix(device),
        packet.name.upper()
    )?;
    writeln!(out)?;
    writeln!(out, "\tif (ret < 0) {{")?;
    writeln!(out, "\t\treturn ret;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;

    let mut requests = false;
    for element in packet.request_elements() {
        writeln!(out, "\t{}", request_conversion(element))?;
        requests = true;
    }
    if requests {
        writeln!(out)?;
    }

    if has_response {
        writeln!(
            out,
            "\tret = device_send_request(device_p, (Packet *)&request, (Packet *)&response, sizeof(response));"
        )?;
    } else {
        writeln!(out, "\tret = device_send_request(device_p, (Packet *)&request, NULL, 0);")?;
    }
    writeln!(out)?;
    writeln!(out, "\tif (ret < 0) {{")?;
    writeln!(out, "\t\treturn ret;")?;
    writeln!(out, "\t}}")?;

    if has_response {
        writeln!(out)?;
        for element in packet.response_elements() {
            writeln!(out, "\t{}", response_conversion(element))?;
        }
    }
    writeln!(out)?;
    writeln!(out, "\treturn ret;")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

/// Local variable names of one stream
struct StreamVars {
    data: String,
    length: String,
    offset: String,
    chunk: String,
    chunk_length: String,
    written: String,
    chunk_written: String,
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
            chunk_length: format!("{}_chunk_length", base),
            written: format!("ret_{}_written", base),
            chunk_written: format!("{}_chunk_written", base),
            out_of_sync: format!("{}_out_of_sync", base),
        }
    }
}

/// Arguments of the low-level call made by a high-level function, requests
/// first like the low-level prototype
fn low_level_args(packet: &Packet, stream: &Stream, vars: &StreamVars) -> String {
    let roles = stream.roles;
    let arg = |i: usize, element: &Element| -> String {
        let reference = if element.direction == Direction::Out { "&" } else { "" };
        if Some(i) == roles.length {
            format!("{}{}", reference, vars.length)
        } else if Some(i) == roles.chunk_offset {
            format!("{}{}", reference, vars.offset)
        } else if i == roles.chunk_data {
            vars.chunk.clone()
        } else if Some(i) == roles.chunk_written {
            format!("&{}", vars.chunk_written)
        } else if element.direction == Direction::Out {
            format!("ret_{}", param_name(element))
        } else {
            param_name(element)
        }
    };
    let indexed = || packet.elements.iter().enumerate();
    indexed()
        .filter(|(_, e)| e.direction == Direction::In)
        .chain(indexed().filter(|(_, e)| e.direction == Direction::Out))
        .map(|(i, e)| arg(i, e))
        .collect::<Vec<_>>()
        .join(", ")
}

fn role_type(packet: &Packet, index: Option<usize>) -> Option<&'static str> {
    packet.role_element(index).map(|e| c_type(e.ty))
}

fn write_stream_in(out: &mut String, device: &Device, packet: &Packet, stream: &Stream) -> Result<()> {
    let vars = StreamVars::new(stream);
    let low = format!("{}_{}", prefix(device), packet.name.under());
    let call = format!("{}({}, {})", low, prefix(device), low_level_args(packet, stream, &vars));
    let capacity = stream.chunk_capacity;
    let data_type = c_type(stream.data_type);
    let length_type = c_type(stream.length_type);
    let written_type = role_type(packet, stream.roles.chunk_written);

    writeln!(out, "\tDevicePrivate *device_p = {}->p;", prefix(device))?;
    writeln!(out, "\tint ret = 0;")?;
    if let Some(offset_type) = role_type(packet, stream.roles.chunk_offset) {
        writeln!(out, "\t{} {} = 0;", offset_type, vars.offset)?;
    }
    writeln!(out, "\t{} {}[{}];", data_type, vars.chunk, capacity)?;
    writeln!(out, "\t{} {};", length_type, vars.chunk_length)?;
    if let Some(written_type) = written_type {
        writeln!(out, "\t{} {};", written_type, vars.chunk_written)?;
    }
    writeln!(out)?;

    match stream.fixed_total_length {
        Some(fixed) => writeln!(out, "\tif ({} != {}) {{", vars.length, fixed)?,
        None => writeln!(out, "\tif ({} > {}) {{", vars.length, stream.max_length)?,
    }
    writeln!(out, "\t\treturn E_INVALID_PARAMETER;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    if written_type.is_some() {
        writeln!(out, "\t*{} = 0;", vars.written)?;
        writeln!(out)?;
    }

    if stream.single_chunk {
        writeln!(out, "\t{} = {};", vars.chunk_length, vars.length)?;
        writeln!(
            out,
            "\tmemcpy({}, {}, sizeof({}) * {});",
            vars.chunk, vars.data, data_type, vars.chunk_length
        )?;
        writeln!(
            out,
            "\tmemset(&{}[{}], 0, sizeof({}) * ({} - {}));",
            vars.chunk, vars.chunk_length, data_type, capacity, vars.chunk_length
        )?;
        writeln!(out)?;
        writeln!(out, "\tret = {};", call)?;
        if written_type.is_some() {
            writeln!(out)?;
            writeln!(out, "\tif (ret == 0) {{")?;
            writeln!(out, "\t\t*{} = {};", vars.written, vars.chunk_written)?;
            writeln!(out, "\t}}")?;
        }
        writeln!(out)?;
        writeln!(out, "\treturn ret;")?;
        return Ok(());
    }

    writeln!(out, "\tif ({} == 0) {{", vars.length)?;
    writeln!(out, "\t\tmemset(&{}, 0, sizeof({}) * {});", vars.chunk, data_type, capacity)?;
    writeln!(out)?;
    writeln!(out, "\t\tret = {};", call)?;
    if written_type.is_some() {
        writeln!(out)?;
        writeln!(out, "\t\tif (ret == 0) {{")?;
        writeln!(out, "\t\t\t*{} = {};", vars.written, vars.chunk_written)?;
        writeln!(out, "\t\t}}")?;
    }
    writeln!(out, "\t}} else {{")?;
    writeln!(out, "\t\tmutex_lock(&device_p->stream_mutex);")?;
    writeln!(out)?;
    writeln!(out, "\t\twhile ({} < {}) {{", vars.offset, vars.length)?;
    writeln!(out, "\t\t\t{} = {} - {};", vars.chunk_length, vars.length, vars.offset)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif ({} > {}) {{", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t\t\t{} = {};", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out)?;
    writeln!(
        out,
        "\t\t\tmemcpy({}, &{}[{}], sizeof({}) * {});",
        vars.chunk, vars.data, vars.offset, data_type, vars.chunk_length
    )?;
    writeln!(
        out,
        "\t\t\tmemset(&{}[{}], 0, sizeof({}) * ({} - {}));",
        vars.chunk, vars.chunk_length, data_type, capacity, vars.chunk_length
    )?;
    writeln!(out)?;
    writeln!(out, "\t\t\tret = {};", call)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif (ret < 0) {{")?;
    if written_type.is_some() {
        writeln!(out, "\t\t\t\t*{} = 0;", vars.written)?;
        writeln!(out)?;
    }
    writeln!(out, "\t\t\t\tbreak;")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out)?;
    if written_type.is_some() {
        writeln!(out, "\t\t\t*{} += {};", vars.written, vars.chunk_written)?;
        writeln!(out)?;
        writeln!(out, "\t\t\tif ({} < {}) {{", vars.chunk_written, capacity)?;
        writeln!(out, "\t\t\t\tbreak; // either last chunk or short write")?;
        writeln!(out, "\t\t\t}}")?;
        writeln!(out)?;
    }
    writeln!(out, "\t\t\t{} += {};", vars.offset, capacity)?;
    writeln!(out, "\t\t}}")?;
    writeln!(out)?;
    writeln!(out, "\t\tmutex_unlock(&device_p->stream_mutex);")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(out, "\treturn ret;")?;
    Ok(())
}

fn write_stream_out(out: &mut String, device: &Device, packet: &Packet, stream: &Stream) -> Result<()> {
    let vars = StreamVars::new(stream);
    let low = format!("{}_{}", prefix(device), packet.name.under());
    let call = format!("{}({}, {})", low, prefix(device), low_level_args(packet, stream, &vars));
    let capacity = stream.chunk_capacity;
    let data_type = c_type(stream.data_type);
    let length_type = c_type(stream.length_type);
    let ret_length = format!("ret_{}_length", vars.data);
    let ret_data = format!("ret_{}", vars.data);
    let offset_element = packet.role_element(stream.roles.chunk_offset);
    let length_init = stream.fixed_total_length.unwrap_or(0);

    writeln!(out, "\tDevicePrivate *device_p = {}->p;", prefix(device))?;
    writeln!(out, "\tint ret = 0;")?;
    writeln!(out, "\t{} {} = {};", length_type, vars.length, length_init)?;
    if let Some(offset_element) = offset_element {
        writeln!(out, "\t{} {} = 0;", c_type(offset_element.ty), vars.offset)?;
    }
    writeln!(out, "\t{} {}[{}];", data_type, vars.chunk, capacity)?;
    if offset_element.is_some() && !stream.single_chunk {
        writeln!(out, "\tbool {} = false;", vars.out_of_sync)?;
    }
    writeln!(out, "\t{} {};", length_type, vars.chunk_length)?;
    writeln!(out)?;
    writeln!(out, "\t*{} = 0;", ret_length)?;
    writeln!(out)?;

    let offset_element = match offset_element {
        Some(e) if !stream.single_chunk => e,
        _ => {
            writeln!(out, "\tret = {};", call)?;
            writeln!(out)?;
            writeln!(out, "\tif (ret < 0) {{")?;
            writeln!(out, "\t\treturn ret;")?;
            writeln!(out, "\t}}")?;
            writeln!(out)?;
            writeln!(out, "\t{} = {};", vars.chunk_length, vars.length)?;
            writeln!(out)?;
            writeln!(out, "\tif ({} > {}) {{", vars.chunk_length, capacity)?;
            writeln!(out, "\t\t{} = {};", vars.chunk_length, capacity)?;
            writeln!(out, "\t}}")?;
            writeln!(out)?;
            writeln!(
                out,
                "\tmemcpy({}, {}, sizeof({}) * {});",
                ret_data, vars.chunk, data_type, vars.chunk_length
            )?;
            writeln!(out, "\t*{} = {};", ret_length, vars.chunk_length)?;
            writeln!(out)?;
            writeln!(out, "\treturn ret;")?;
            return Ok(());
        }
    };
    let no_data = offset_element.ty.int_range().map_or(0, |(_, max)| max);

    writeln!(out, "\tmutex_lock(&device_p->stream_mutex);")?;
    writeln!(out)?;
    writeln!(out, "\tret = {};", call)?;
    writeln!(out)?;
    writeln!(out, "\tif (ret < 0) {{")?;
    writeln!(out, "\t\tgoto unlock;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(
        out,
        "\tif ({} == {}) {{ // maximum chunk offset -> stream has no data",
        vars.offset, no_data
    )?;
    writeln!(out, "\t\tgoto unlock;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(out, "\t{} = {} != 0;", vars.out_of_sync, vars.offset)?;
    writeln!(out)?;
    writeln!(out, "\tif (!{}) {{", vars.out_of_sync)?;
    writeln!(out, "\t\t{} = {} - {};", vars.chunk_length, vars.length, vars.offset)?;
    writeln!(out)?;
    writeln!(out, "\t\tif ({} > {}) {{", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t\t{} = {};", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t}}")?;
    writeln!(out)?;
    writeln!(
        out,
        "\t\tmemcpy({}, {}, sizeof({}) * {});",
        ret_data, vars.chunk, data_type, vars.chunk_length
    )?;
    writeln!(out, "\t\t*{} = {};", ret_length, vars.chunk_length)?;
    writeln!(out)?;
    writeln!(out, "\t\twhile (*{} < {}) {{", ret_length, vars.length)?;
    writeln!(out, "\t\t\tret = {};", call)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif (ret < 0) {{")?;
    writeln!(out, "\t\t\t\tgoto unlock;")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out)?;
    writeln!(out, "\t\t\t{} = {} != *{};", vars.out_of_sync, vars.offset, ret_length)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif ({}) {{", vars.out_of_sync)?;
    writeln!(out, "\t\t\t\tbreak;")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out)?;
    writeln!(out, "\t\t\t{} = {} - {};", vars.chunk_length, vars.length, vars.offset)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif ({} > {}) {{", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t\t\t{} = {};", vars.chunk_length, capacity)?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out)?;
    writeln!(
        out,
        "\t\t\tmemcpy(&{}[*{}], {}, sizeof({}) * {});",
        ret_data, ret_length, vars.chunk, data_type, vars.chunk_length
    )?;
    writeln!(out)?;
    writeln!(out, "\t\t\t*{} += {};", ret_length, vars.chunk_length)?;
    writeln!(out, "\t\t}}")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(out, "\tif ({}) {{", vars.out_of_sync)?;
    writeln!(out, "\t\t*{} = 0; // return empty array", ret_length)?;
    writeln!(out)?;
    writeln!(out, "\t\t// discard remaining stream to bring it back in-sync")?;
    writeln!(out, "\t\twhile ({} + {} < {}) {{", vars.offset, capacity, vars.length)?;
    writeln!(out, "\t\t\tret = {};", call)?;
    writeln!(out)?;
    writeln!(out, "\t\t\tif (ret < 0) {{")?;
    writeln!(out, "\t\t\t\tgoto unlock;")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out, "\t\t}}")?;
    writeln!(out)?;
    writeln!(out, "\t\tret = E_STREAM_OUT_OF_SYNC;")?;
    writeln!(out, "\t}}")?;
    writeln!(out)?;
    writeln!(out, "unlock:")?;
    writeln!(out, "\tmutex_unlock(&device_p->stream_mutex);")?;
    writeln!(out)?;
    writeln!(out, "\treturn ret;")?;
    Ok(())
}

fn write_high_level_function(out: &mut String, device: &Device, packet: &Packet, stream: &Stream) -> Result<()> {
    let Some(prototype) = high_level_prototype(device, packet) else {
        return Ok(());
    };
    writeln!(out, "{} {{", prototype)?;
    match stream.direction {
        StreamDirection::In => write_stream_in(out, device, packet, stream)?,
        StreamDirection::Out => write_stream_out(out, device, packet, stream)?,
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

/// Render the source file of one device
pub fn render_source(device: &Device, options: &GenerationOptions) -> Result<String> {
    let mut out = String::new();

    out.push_str(&star_comment(&header_lines(options, "C/C++")));
    writeln!(out)?;
    writeln!(out, "#define IPCON_EXPOSE_INTERNALS")?;
    writeln!(out)?;
    writeln!(out, "#include \"{}.h\"", file_stem(device))?;
    writeln!(out)?;
    writeln!(out, "#include <string.h>")?;
    writeln!(out)?;
    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "extern \"C\" {{")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;

    write_structs(&mut out, device)?;
    for packet in device.callbacks() {
        write_callback_wrapper(&mut out, device, packet)?;
    }
    write_management(&mut out, device)?;
    for packet in device.functions() {
        write_function(&mut out, device, packet)?;
    }
    for packet in device.functions() {
        if let Some(stream) = &packet.stream {
            write_high_level_function(&mut out, device, packet, stream)?;
        }
    }

    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "}}")?;
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
features: [comcu_bricklet]
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
  - type: function
    name: Read Low Level
    high_level:
      stream_out: { name: Message }
    elements:
      - { name: Length, type: uint16, direction: in }
      - { name: Message Length, type: uint16, direction: out }
      - { name: Message Chunk Offset, type: uint16, direction: out }
      - { name: Message Chunk Data, type: char, cardinality: 60, direction: out }
  - type: function
    name: Set Flags
    elements:
      - { name: Flags, type: bool, cardinality: 10, direction: in }
  - type: callback
    name: Error Count
    elements:
      - { name: Overrun Error Count, type: uint32, direction: out }
      - { name: Parity Error Count, type: uint32, direction: out }
"#;

    fn render() -> String {
        let config: DeviceConfig = serde_yaml::from_str(DEVICE).unwrap();
        let device = build_device(config).unwrap();
        render_source(&device, &GenerationOptions::default()).unwrap()
    }

    const DATA_LOGGER: &str = r#"
name: Data Logger
category: Bricklet
author: Jane Doe <jane@example.com>
api_version: [2, 0, 0]
device_identifier: 2150
packets:
  - type: function
    name: Set Calibration Low Level
    high_level:
      stream_in: { name: Calibration, fixed_total_length: 80 }
    elements:
      - { name: Calibration Chunk Offset, type: uint16, direction: in }
      - { name: Calibration Chunk Data, type: int16, cardinality: 30, direction: in }
  - type: function
    name: Get Calibration Low Level
    high_level:
      stream_out: { name: Calibration, fixed_total_length: 80 }
    elements:
      - { name: Calibration Chunk Offset, type: uint16, direction: out }
      - { name: Calibration Chunk Data, type: int16, cardinality: 30, direction: out }
  - type: function
    name: Set Label Low Level
    high_level:
      stream_in: { name: Label, single_chunk: true }
    elements:
      - { name: Label Length, type: uint8, direction: in }
      - { name: Label Data, type: char, cardinality: 32, direction: in }
"#;

    fn render_data_logger() -> String {
        let config: DeviceConfig = serde_yaml::from_str(DATA_LOGGER).unwrap();
        render_source(&build_device(config).unwrap(), &GenerationOptions::default()).unwrap()
    }

    #[test]
    fn test_fixed_length_streams() {
        let c = render_data_logger();
        assert!(c.contains("\tif (calibration_length != 80) {\n\t\treturn E_INVALID_PARAMETER;\n\t}"));
        assert!(c.contains("\tuint16_t calibration_length = 80;\n"));
        assert!(c.contains(
            "\tif (calibration_chunk_offset == 65535) { // maximum chunk offset -> stream has no data\n\t\tgoto unlock;\n\t}"
        ));
        assert!(c.contains("\t*ret_calibration_length = 0;\n"));
    }

    #[test]
    fn test_single_chunk_stream_in() {
        let c = render_data_logger();
        assert!(c.contains("\tif (label_length > 32) {\n"));
        assert!(c.contains("\tlabel_chunk_length = label_length;\n"));
        assert!(c.contains("\tmemset(&label_chunk_data[label_chunk_length], 0, sizeof(char) * (32 - label_chunk_length));\n"));
        assert!(!c.contains("label_chunk_offset"));
    }

    #[test]
    fn test_packed_structs() {
        let c = render();
        assert!(c.contains(
            "typedef struct {\n\tPacketHeader header;\n\tuint16_t message_length;\n\tuint16_t message_chunk_offset;\n\
             \tchar message_chunk_data[60];\n} ATTRIBUTE_PACKED WriteLowLevel_Request;"
        ));
        assert!(c.contains("\tuint8_t flags[2];\n} ATTRIBUTE_PACKED SetFlags_Request;"));
        assert!(!c.contains("SetFlags_Response"));
    }

    #[test]
    fn test_short_write_loop() {
        let c = render();
        assert!(c.contains("int rs485_write(RS485 *rs485, const char *message, uint16_t message_length, uint16_t *ret_message_written) {"));
        assert!(c.contains(
            "ret = rs485_write_low_level(rs485, message_length, message_chunk_offset, message_chunk_data, &message_chunk_written);"
        ));
        assert!(c.contains("\t\t\t*ret_message_written += message_chunk_written;\n"));
        assert!(c.contains("\t\t\tif (message_chunk_written < 60) {\n\t\t\t\tbreak; // either last chunk or short write"));
        assert!(c.contains("\tif (message_length > 65535) {"));
    }

    #[test]
    fn test_stream_out_sync() {
        let c = render();
        assert!(c.contains("if (message_chunk_offset == 65535) { // maximum chunk offset -> stream has no data"));
        assert!(c.contains("ret = rs485_read_low_level(rs485, length, &message_length, &message_chunk_offset, message_chunk_data);"));
        assert!(c.contains("ret = E_STREAM_OUT_OF_SYNC;"));
    }

    #[test]
    fn test_conversions_and_wrappers() {
        let c = render();
        assert!(c.contains("request.message_length = leconvert_uint16_to(message_length);"));
        assert!(c.contains("request.flags[i / 8] |= (flags[i] ? 1 : 0) << (i % 8);"));
        assert!(c.contains("*ret_message_chunk_written = response.message_chunk_written;"));
        assert!(c.contains("callback->overrun_error_count = leconvert_uint32_from(callback->overrun_error_count);"));
        assert!(c.contains("device_p->callback_wrappers[RS485_CALLBACK_ERROR_COUNT] = rs485_callback_wrapper_error_count;"));
        assert!(c.contains(
            "device_p->response_expected[RS485_FUNCTION_SET_FLAGS] = DEVICE_RESPONSE_EXPECTED_FALSE;"
        ));
    }
}
