//! C example programs.

use std::fmt::Write;

use crate::codegen::c::{c_type, file_stem, macro_prefix, prefix, type_name, KEYWORDS};
use crate::codegen::context::FormatterContext;
use crate::codegen::utils::{
    comment_name, escape_keyword, escape_string, format_float, format_period, scale_to_wire, threshold_comment,
};
use crate::codegen::GenerationOptions;
use crate::error::{GeneratorError, Result};
use crate::model::{
    Device, Direction, ElementType, Example, ExampleArg, ExampleFunction, ExampleValue, Name, Packet,
    PacketType, Threshold,
};

const LANGUAGE: &str = "c";

fn arg_source(device: &Device, arg: &ExampleArg) -> String {
    match arg {
        ExampleArg::Constant { constant, .. } => format!("{}_{}", macro_prefix(device), constant.upper()),
        ExampleArg::Bool(b) => b.to_string(),
        ExampleArg::Int(i) => i.to_string(),
        ExampleArg::Float(f) => format_float(*f),
        ExampleArg::Char(c) => format!("'{}'", escape_string(&c.to_string())),
        ExampleArg::Str(s) => format!("\"{}\"", escape_string(s)),
        ExampleArg::Array(items) => format!(
            "{{{}}}",
            items.iter().map(|i| arg_source(device, i)).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn variable(value_name: &Name) -> String {
    escape_keyword(value_name.under(), KEYWORDS)
}

fn packet_for<'a>(device: &'a Device, function: &Name) -> Result<&'a Packet> {
    device.find_packet(function, PacketType::Function).ok_or_else(|| {
        GeneratorError::render(
            &device.full_name().space(),
            LANGUAGE,
            format!("example references unknown function '{}'", function),
        )
    })
}

/// Array arguments become local variables declared before the call
fn call_args(
    ctx: &FormatterContext,
    out: &mut String,
    device: &Device,
    packet: &Packet,
    args: &[ExampleArg],
) -> Result<Vec<String>> {
    let inputs = packet.high_level_elements(Direction::In);
    let mut rendered = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        match (arg, inputs.get(i)) {
            (ExampleArg::Array(items), Some(element)) => {
                let name = variable(&element.name);
                ctx.line(
                    out,
                    &format!(
                        "{} {}[{}] = {};",
                        c_type(element.ty),
                        name,
                        items.len(),
                        arg_source(device, arg)
                    ),
                )?;
                rendered.push(name);
                if element.cardinality.is_variable() {
                    rendered.push(items.len().to_string());
                }
            }
            (ExampleArg::Str(s), Some(element)) if element.cardinality.is_variable() => {
                rendered.push(arg_source(device, arg));
                rendered.push(s.chars().count().to_string());
            }
            _ => rendered.push(arg_source(device, arg)),
        }
    }
    Ok(rendered)
}

fn call(device: &Device, function: &Name, args: &[String]) -> String {
    let p = prefix(device);
    let d = device.name.initial();
    if args.is_empty() {
        format!("{}_{}(&{})", p, function.under(), d)
    } else {
        format!("{}_{}(&{}, {})", p, function.under(), d, args.join(", "))
    }
}

/// printf format and arguments of one printed value, `None` when omitted
fn print_line(value: &ExampleValue, access: &str) -> Option<String> {
    if value.omit {
        return None;
    }
    let label = escape_string(&value.name.space());
    let unit = value
        .unit
        .as_ref()
        .map(|u| format!(" {}", escape_string(u).replace('%', "%%")))
        .unwrap_or_default();
    let count = value.cardinality.count();

    let (format, expr) = match value.ty {
        ElementType::String => ("%s", access.to_string()),
        ElementType::Char if count > 1 => ("%s", access.to_string()),
        ElementType::Char => ("%c", access.to_string()),
        ElementType::Bool => ("%s", format!("{} ? \"true\" : \"false\"", access)),
        ElementType::Float => ("%f", access.to_string()),
        _ if value.divisor.is_some() && count == 1 => (
            "%f",
            format!("{}/{}", access, value.divisor.map(format_float).unwrap_or_default()),
        ),
        ElementType::Uint32 => ("%u", access.to_string()),
        ElementType::Int64 => ("%lld", format!("(long long){}", access)),
        ElementType::Uint64 => ("%llu", format!("(unsigned long long){}", access)),
        _ => ("%d", access.to_string()),
    };
    Some(format!("printf(\"{}: {}{}\\n\", {});", label, format, unit, expr))
}

/// Print lines of a value; fixed arrays print one line per item
fn print_lines(value: &ExampleValue) -> Vec<String> {
    let name = variable(&value.name);
    let count = value.cardinality.count();
    let is_text = matches!(value.ty, ElementType::String | ElementType::Char);
    if value.cardinality.is_variable() {
        if value.omit {
            return Vec::new();
        }
        let label = escape_string(&value.name.space());
        return if is_text {
            vec![format!("printf(\"{}: %.*s\\n\", (int){}_length, {});", label, name, name)]
        } else {
            vec![format!("printf(\"{} Length: %d\\n\", {}_length);", label, name)]
        };
    }
    if count > 1 && !is_text {
        return (0..count)
            .filter_map(|i| {
                let mut item = value.clone();
                item.name = Name::new(&format!("{} {}", value.name.space(), i));
                item.cardinality = crate::model::Cardinality::Scalar;
                print_line(&item, &format!("{}[{}]", name, i))
            })
            .collect();
    }
    print_line(value, &name).into_iter().collect()
}

/// Local variables receiving a getter result; streams are sized by their maximum
fn declaration(value: &ExampleValue, packet: &Packet) -> Vec<String> {
    let name = variable(&value.name);
    let ty = c_type(value.ty);
    let count = value.cardinality.count();
    if let (true, Some(stream)) = (value.cardinality.is_variable(), &packet.stream) {
        vec![
            format!("{} {}[{}];", ty, name, stream.max_length),
            format!("{} {}_length;", c_type(stream.length_type), name),
        ]
    } else if value.ty == ElementType::String {
        vec![format!("char {}[{}];", name, count + 1)]
    } else if count > 1 {
        vec![format!("{} {}[{}];", ty, name, count)]
    } else {
        vec![format!("{} {};", ty, name)]
    }
}

fn result_args(value: &ExampleValue) -> Vec<String> {
    let name = variable(&value.name);
    if value.cardinality.is_variable() {
        vec![name.clone(), format!("&{}_length", name)]
    } else if value.ty == ElementType::String || value.cardinality.count() > 1 {
        vec![name]
    } else {
        vec![format!("&{}", name)]
    }
}

fn callback_param(value: &ExampleValue) -> String {
    let name = variable(&value.name);
    if value.ty == ElementType::String {
        format!("const char *{}", name)
    } else if value.cardinality.count() > 1 {
        format!("{} *{}", c_type(value.ty), name)
    } else {
        format!("{} {}", c_type(value.ty), name)
    }
}

fn callback_function(
    out: &mut String,
    function: &Name,
    parameters: &[ExampleValue],
    comment: Option<&str>,
    extra_message: Option<&str>,
) -> Result<()> {
    match comment {
        Some(comment) => {
            for line in comment.lines() {
                writeln!(out, "// {}", line)?;
            }
        }
        None => writeln!(out, "// Callback function for {} callback", comment_name(function))?,
    }
    let params: Vec<String> = parameters
        .iter()
        .map(callback_param)
        .chain(std::iter::once("void *user_data".to_string()))
        .collect();
    writeln!(out, "void cb_{}({}) {{", function.under(), params.join(", "))?;
    writeln!(out, "\t(void)user_data; // avoid unused parameter warning")?;
    writeln!(out)?;

    let prints: Vec<String> = parameters.iter().flat_map(print_lines).collect();
    for line in &prints {
        writeln!(out, "\t{}", line)?;
    }
    if let Some(message) = extra_message {
        writeln!(out, "\tprintf(\"{}\\n\");", escape_string(message).replace('%', "%%"))?;
    }
    if prints.len() > 1 {
        writeln!(out, "\tprintf(\"\\n\");")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

fn threshold_args(threshold: &Threshold) -> Vec<String> {
    vec![
        format!("'{}'", threshold.option),
        scale_to_wire(threshold.minimum, threshold.divisor),
        scale_to_wire(threshold.maximum, threshold.divisor),
    ]
}

fn with_appended(
    ctx: &FormatterContext,
    out: &mut String,
    device: &Device,
    function: &Name,
    arguments: &[ExampleArg],
    appended: Vec<String>,
) -> Result<Vec<String>> {
    let packet = packet_for(device, function)?;
    let mut args = call_args(ctx, out, device, packet, arguments)?;
    args.extend(appended);
    Ok(args)
}

fn render_step(ctx: &mut FormatterContext, out: &mut String, device: &Device, step: &ExampleFunction) -> Result<()> {
    match step {
        ExampleFunction::Getter {
            function,
            arguments,
            results,
            comment,
        } => {
            let packet = packet_for(device, function)?;
            match comment {
                Some(comment) => ctx.line(out, &format!("// {}", comment))?,
                None => ctx.line(out, &format!("// Get current {}", comment_name(function)))?,
            }
            for result in results {
                for line in declaration(result, packet) {
                    ctx.line(out, &line)?;
                }
            }
            let mut args = call_args(ctx, out, device, packet, arguments)?;
            args.extend(results.iter().flat_map(result_args));
            ctx.line(out, &format!("if({} < 0) {{", call(device, function, &args)))?;
            ctx.line(
                out,
                &format!(
                    "\tfprintf(stderr, \"Could not get {}, probably timeout\\n\");",
                    comment_name(function)
                ),
            )?;
            ctx.line(out, "\treturn 1;")?;
            ctx.line(out, "}")?;

            let prints: Vec<String> = results.iter().flat_map(print_lines).collect();
            if !prints.is_empty() {
                ctx.line(out, "")?;
            }
            for line in prints {
                ctx.line(out, &line)?;
            }
        }
        ExampleFunction::Setter {
            function,
            arguments,
            comment,
        } => {
            if let Some(comment) = comment {
                for line in comment.lines() {
                    ctx.line(out, &format!("// {}", line))?;
                }
            }
            let mut args = with_appended(ctx, out, device, function, arguments, Vec::new())?;
            for element in packet_for(device, function)?.high_level_elements(Direction::Out) {
                let name = variable(&element.name);
                ctx.line(out, &format!("{} {};", c_type(element.ty), name))?;
                args.push(format!("&{}", name));
            }
            ctx.line(out, &format!("{};", call(device, function, &args)))?;
        }
        ExampleFunction::Callback { function, .. } => {
            ctx.line(
                out,
                &format!(
                    "// Register {} callback to function cb_{}",
                    comment_name(function),
                    function.under()
                ),
            )?;
            ctx.line(
                out,
                &format!(
                    "{}_register_callback(&{}, {}_CALLBACK_{}, (void (*)(void))cb_{}, NULL);",
                    prefix(device),
                    device.name.initial(),
                    macro_prefix(device),
                    function.upper(),
                    function.under()
                ),
            )?;
        }
        ExampleFunction::CallbackPeriod {
            function,
            arguments,
            unit,
            period_ms,
        } => {
            let name = comment_name(function);
            let (short, long) = format_period(*period_ms);
            ctx.line(
                out,
                &format!("// Set period for {} callback to {} ({}ms)", name, short, period_ms),
            )?;
            ctx.line(out, &format!("// Note: The {} callback is only called every {}", name, long))?;
            ctx.line(out, &format!("//       if the {} has changed since the last call!", unit))?;
            let args = with_appended(ctx, out, device, function, arguments, vec![period_ms.to_string()])?;
            ctx.line(out, &format!("{};", call(device, function, &args)))?;
        }
        ExampleFunction::CallbackThreshold {
            function,
            arguments,
            threshold,
            unit,
        } => {
            ctx.line(
                out,
                &format!(
                    "// Configure threshold for {} \"{}\"",
                    comment_name(function),
                    threshold_comment(threshold.option, threshold.minimum, threshold.maximum, unit.as_deref())
                ),
            )?;
            let args = with_appended(ctx, out, device, function, arguments, threshold_args(threshold))?;
            ctx.line(out, &format!("{};", call(device, function, &args)))?;
        }
        ExampleFunction::CallbackConfiguration {
            function,
            arguments,
            period_ms,
            value_has_to_change,
            threshold,
            unit,
        } => {
            let name = comment_name(function);
            let (short, _) = format_period(*period_ms);
            let mut appended = vec![period_ms.to_string(), value_has_to_change.to_string()];
            match threshold.as_ref().filter(|t| t.option != 'x') {
                Some(t) => {
                    ctx.line(
                        out,
                        &format!(
                            "// Configure threshold for {} \"{}\"",
                            name,
                            threshold_comment(t.option, t.minimum, t.maximum, unit.as_deref())
                        ),
                    )?;
                    ctx.line(out, &format!("// with a debounce period of {} ({}ms)", short, period_ms))?;
                }
                None => ctx.line(
                    out,
                    &format!(
                        "// Set period for {} callback to {} ({}ms) without a threshold",
                        name, short, period_ms
                    ),
                )?,
            }
            if let Some(t) = threshold {
                appended.extend(threshold_args(t));
            }
            let args = with_appended(ctx, out, device, function, arguments, appended)?;
            ctx.line(out, &format!("{};", call(device, function, &args)))?;
        }
        ExampleFunction::DebouncePeriod { function, period_ms } => {
            let (_, long) = format_period(*period_ms);
            ctx.line(
                out,
                &format!("// Get threshold callbacks with a debounce time of {} ({}ms)", long, period_ms),
            )?;
            ctx.line(out, &format!("{};", call(device, function, &[period_ms.to_string()])))?;
        }
        ExampleFunction::Sleep { duration_ms, comment } => match comment {
            Some(comment) => ctx.line(out, &format!("millisleep({}); // {}", duration_ms, comment))?,
            None => ctx.line(out, &format!("millisleep({});", duration_ms))?,
        },
        ExampleFunction::Wait => {
            ctx.line(out, "printf(\"Press key to exit\\n\");")?;
            ctx.line(out, "getchar();")?;
        }
        ExampleFunction::LoopHeader { limit, comment } => {
            if let Some(comment) = comment {
                ctx.line(out, &format!("// {}", comment))?;
            }
            ctx.line(out, &format!("for (int i = 0; i < {}; ++i) {{", limit))?;
            ctx.enter_loop();
        }
        ExampleFunction::LoopFooter => {
            ctx.exit_loop()?;
            ctx.line(out, "}")?;
        }
        ExampleFunction::Empty => {}
    }
    Ok(())
}

fn render_steps(ctx: &mut FormatterContext, out: &mut String, device: &Device, steps: &[ExampleFunction]) -> Result<()> {
    let mut previous: Option<&ExampleFunction> = None;
    for step in steps {
        let separate = !matches!(step, ExampleFunction::LoopFooter | ExampleFunction::Empty)
            && !matches!(previous, Some(ExampleFunction::LoopHeader { .. }));
        if separate {
            writeln!(out)?;
        }
        render_step(ctx, out, device, step)?;
        previous = Some(step);
    }
    Ok(())
}

/// Whether a callback step registers a callback that only exists as a stream
fn uses_streamed_callback(device: &Device, step: &ExampleFunction) -> bool {
    match step {
        ExampleFunction::Callback { function, .. } => device
            .callbacks()
            .any(|p| p.stream.is_some() && (&p.name == function || &p.high_level_name() == function)),
        _ => false,
    }
}

/// Render one example as a standalone program
///
/// Returns `None` for examples registering streamed callbacks, which the C
/// bindings expose only in their low-level form.
pub fn render_example(device: &Device, example: &Example, _options: &GenerationOptions) -> Result<Option<String>> {
    let all_steps = || example.functions.iter().chain(example.cleanups.iter());
    if all_steps().any(|step| uses_streamed_callback(device, step)) {
        return Ok(None);
    }

    let p = prefix(device);
    let d = device.name.initial();
    let mut out = String::new();

    writeln!(out, "#include <stdio.h>")?;
    writeln!(out)?;
    writeln!(out, "#include \"ip_connection.h\"")?;
    writeln!(out, "#include \"{}.h\"", file_stem(device))?;
    writeln!(out)?;
    if example.incomplete {
        writeln!(out, "// FIXME: This example is incomplete")?;
        writeln!(out)?;
    }
    if let Some(description) = &example.description {
        for line in description.lines() {
            writeln!(out, "// {}", line)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "#define HOST \"localhost\"")?;
    writeln!(out, "#define PORT 4223")?;
    writeln!(
        out,
        "#define UID \"{0}\" // Change {0} to the UID of your {1}",
        device.dummy_uid(),
        device.long_display_name()
    )?;
    writeln!(out)?;

    for step in all_steps() {
        if let ExampleFunction::Callback {
            function,
            parameters,
            comment,
            extra_message,
        } = step
        {
            callback_function(
                &mut out,
                function,
                parameters,
                comment.as_deref(),
                extra_message.as_deref(),
            )?;
        }
    }

    writeln!(out, "int main(void) {{")?;
    writeln!(out, "\t// Create IP connection")?;
    writeln!(out, "\tIPConnection ipcon;")?;
    writeln!(out, "\tipcon_create(&ipcon);")?;
    writeln!(out)?;
    writeln!(out, "\t// Create device object")?;
    writeln!(out, "\t{} {};", type_name(device), d)?;
    writeln!(out, "\t{}_create(&{}, UID, &ipcon);", p, d)?;
    writeln!(out)?;
    writeln!(out, "\t// Connect to brickd")?;
    writeln!(out, "\tif(ipcon_connect(&ipcon, HOST, PORT) < 0) {{")?;
    writeln!(out, "\t\tfprintf(stderr, \"Could not connect\\n\");")?;
    writeln!(out, "\t\treturn 1;")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\t// Don't use device before ipcon is connected")?;

    let full = device.full_name().space();
    let mut ctx = FormatterContext::new("\t", 1, &full, LANGUAGE);
    render_steps(&mut ctx, &mut out, device, &example.functions)?;
    ctx.finish()?;
    if !example.cleanups.is_empty() {
        render_steps(&mut ctx, &mut out, device, &example.cleanups)?;
        ctx.finish()?;
    }

    writeln!(out)?;
    writeln!(out, "\t{}_destroy(&{});", p, d)?;
    writeln!(out, "\tipcon_destroy(&ipcon); // Calls ipcon_disconnect internally")?;
    writeln!(out, "\treturn 0;")?;
    writeln!(out, "}}")?;
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::types::DeviceConfig;
    use crate::codegen::validation::build_device;

    const DEVICE: &str = r#"
name: Humidity V2
category: Bricklet
display_name: Humidity 2.0
author: Jane Doe <jane@example.com>
api_version: [2, 0, 2]
device_identifier: 283
features: [comcu_bricklet]
packets:
  - type: function
    name: Get Humidity
    elements:
      - { name: Humidity, type: uint16, direction: out }
  - type: function
    name: Set Humidity Callback Configuration
    doc: { kind: ccf }
    elements:
      - { name: Period, type: uint32, direction: in }
      - { name: Value Has To Change, type: bool, direction: in }
      - { name: Option, type: char, direction: in }
      - { name: Min, type: uint16, direction: in, divisor: 100 }
      - { name: Max, type: uint16, direction: in, divisor: 100 }
  - type: callback
    name: Humidity
    elements:
      - { name: Humidity, type: uint16, direction: out }
  - type: callback
    name: Data Low Level
    high_level:
      stream_out: { name: Data }
    elements:
      - { name: Data Length, type: uint16, direction: out }
      - { name: Data Chunk Offset, type: uint16, direction: out }
      - { name: Data Chunk Data, type: uint8, cardinality: 59, direction: out }
examples:
  - name: Callback
    functions:
      - kind: callback
        function: Humidity
        parameters:
          - { name: Humidity, type: uint16, divisor: 100, unit: "%RH" }
      - kind: callback_configuration
        function: Set Humidity Callback Configuration
        period_ms: 1000
        value_has_to_change: false
        option: o
        minimum: 30
        maximum: 60
        unit: "%RH"
      - kind: wait
  - name: Loop
    functions:
      - { kind: loop_header, limit: 10 }
      - kind: getter
        function: Get Humidity
        results:
          - { name: Humidity, type: uint16, divisor: 100, unit: "%RH" }
      - { kind: sleep, duration_ms: 500 }
      - kind: loop_footer
  - name: Stream
    functions:
      - kind: callback
        function: Data Low Level
        parameters:
          - { name: Data, type: uint8, cardinality: -1 }
      - kind: wait
"#;

    fn device() -> Device {
        let config: DeviceConfig = serde_yaml::from_str(DEVICE).unwrap();
        build_device(config).unwrap()
    }

    #[test]
    fn test_callback_example() {
        let device = device();
        let c = render_example(&device, &device.examples[0], &GenerationOptions::default())
            .unwrap()
            .unwrap();
        assert!(c.contains("void cb_humidity(uint16_t humidity, void *user_data) {"));
        assert!(c.contains("\tprintf(\"Humidity: %f %%RH\\n\", humidity/100.0);"));
        assert!(c.contains(
            "\thumidity_v2_register_callback(&h, HUMIDITY_V2_CALLBACK_HUMIDITY, (void (*)(void))cb_humidity, NULL);"
        ));
        assert!(c.contains("\thumidity_v2_set_humidity_callback_configuration(&h, 1000, false, 'o', 3000, 6000);"));
        assert!(c.contains("\tprintf(\"Press key to exit\\n\");\n\tgetchar();\n"));
        assert!(c.contains("#define UID \"XYZ\" // Change XYZ to the UID of your Humidity Bricklet 2.0"));
    }

    #[test]
    fn test_loop_and_getter() {
        let device = device();
        let c = render_example(&device, &device.examples[1], &GenerationOptions::default())
            .unwrap()
            .unwrap();
        assert!(c.contains("\tfor (int i = 0; i < 10; ++i) {\n\t\t// Get current humidity\n\t\tuint16_t humidity;\n"));
        assert!(c.contains("\t\tif(humidity_v2_get_humidity(&h, &humidity) < 0) {"));
        assert!(c.contains("\t\tmillisleep(500);\n\t}\n"));
    }

    #[test]
    fn test_streamed_callback_is_skipped() {
        let device = device();
        let c = render_example(&device, &device.examples[2], &GenerationOptions::default()).unwrap();
        assert!(c.is_none());
    }
}
