//! Rust example programs.

use std::fmt::Write;

use crate::codegen::context::FormatterContext;
use crate::codegen::rust::{const_prefix, field_name, module_name, struct_name};
use crate::codegen::utils::{
    comment_name, escape_string, format_float, format_period, scale_to_wire, threshold_comment,
};
use crate::codegen::GenerationOptions;
use crate::error::{GeneratorError, Result};
use crate::model::{
    Device, Direction, ElementType, Example, ExampleArg, ExampleFunction, ExampleValue, Name, Packet, PacketType,
    Threshold,
};

const LANGUAGE: &str = "rust";

fn arg_source(device: &Device, arg: &ExampleArg, variable_length: bool) -> String {
    match arg {
        ExampleArg::Constant { constant, .. } => format!("{}_{}", const_prefix(device), constant.upper()),
        ExampleArg::Bool(b) => b.to_string(),
        ExampleArg::Int(i) => i.to_string(),
        ExampleArg::Float(f) => format_float(*f),
        ExampleArg::Char(c) => format!("'{}'", c.escape_default()),
        ExampleArg::Str(s) if variable_length => {
            format!("&\"{}\".chars().collect::<Vec<char>>()", escape_string(s))
        }
        ExampleArg::Str(s) => format!("\"{}\"", escape_string(s)),
        ExampleArg::Array(items) => format!(
            "{}[{}]",
            if variable_length { "&" } else { "" },
            items
                .iter()
                .map(|i| arg_source(device, i, false))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
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

fn arg_list(device: &Device, function: &Name, args: &[ExampleArg], appended: &[String]) -> Result<String> {
    let inputs = packet_for(device, function)?.high_level_elements(Direction::In);
    Ok(args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let variable_length = inputs.get(i).is_some_and(|e| e.cardinality.is_variable());
            arg_source(device, arg, variable_length)
        })
        .chain(appended.iter().cloned())
        .collect::<Vec<_>>()
        .join(", "))
}

fn variable(device: &Device, name: &Name) -> String {
    let name = field_name(name);
    if name == device.name.initial() {
        format!("{}_", name)
    } else {
        name
    }
}

/// println! line of one value reachable through `access`
fn print_line(value: &ExampleValue, access: &str) -> Option<String> {
    if value.omit {
        return None;
    }
    let label = escape_string(&value.name.space());
    let unit = value
        .unit
        .as_ref()
        .map(|u| format!(" {}", escape_string(u)))
        .unwrap_or_default();
    let single = value.cardinality.count() == 1 && !value.cardinality.is_variable();

    let (format, expr) = match value.ty {
        ElementType::Char if value.cardinality.is_variable() => {
            ("{}", format!("{}.iter().collect::<String>()", access))
        }
        ElementType::String | ElementType::Char | ElementType::Bool if single || value.ty == ElementType::String => {
            ("{}", access.to_string())
        }
        _ if single => match value.divisor {
            Some(divisor) => ("{}", format!("{} as f32 / {}", access, format_float(divisor))),
            None => ("{}", access.to_string()),
        },
        _ => ("{:?}", access.to_string()),
    };
    Some(format!("println!(\"{}: {}{}\", {});", label, format, unit, expr))
}

fn write_prints(
    ctx: &FormatterContext,
    out: &mut String,
    indent: &str,
    parameters: &[ExampleValue],
    accesses: &[String],
    extra_message: Option<&str>,
) -> Result<()> {
    let prints: Vec<String> = parameters
        .iter()
        .zip(accesses)
        .filter_map(|(p, access)| print_line(p, access))
        .collect();
    for line in &prints {
        ctx.line(out, &format!("{}{}", indent, line))?;
    }
    if let Some(message) = extra_message {
        ctx.line(out, &format!("{}println!(\"{}\");", indent, escape_string(message)))?;
    }
    if prints.len() > 1 {
        ctx.line(out, &format!("{}println!();", indent))?;
    }
    Ok(())
}

fn callback_handler(ctx: &FormatterContext, out: &mut String, device: &Device, step: &ExampleFunction) -> Result<()> {
    let ExampleFunction::Callback {
        function,
        parameters,
        extra_message,
        ..
    } = step
    else {
        return Ok(());
    };
    let d = device.name.initial();
    let receiver = format!("{}_receiver", function.under());
    let stream = device
        .find_packet(function, PacketType::Callback)
        .and_then(|p| p.stream.as_ref().map(|s| (p, s)));

    ctx.line(
        out,
        &format!("let {} = {}.get_{}_callback_receiver();", receiver, d, function.under()),
    )?;
    ctx.line(out, "")?;
    ctx.line(out, "// Spawn thread to handle received callback messages.")?;
    ctx.line(out, &format!("// This thread ends when the `{}` object", d))?;
    ctx.line(out, "// is dropped, so there is no need for manual cleanup.")?;
    ctx.line(out, "thread::spawn(move || {")?;

    if let Some((packet, stream)) = stream {
        // payload and the per-stream values arrive together once a stream is complete
        let payload = variable(device, &stream.name);
        let outputs = packet.high_level_elements(Direction::Out);
        let accesses: Vec<String> = outputs
            .iter()
            .map(|e| {
                if e.name == stream.name {
                    payload.clone()
                } else {
                    format!("result.{}", field_name(&e.name))
                }
            })
            .collect();
        let result = if outputs.len() > 1 { "result" } else { "_result" };

        ctx.line(out, &format!("    for event in {} {{", receiver))?;
        ctx.line(out, "        match event {")?;
        ctx.line(out, &format!("            Some(({}, {})) => {{", payload, result))?;
        write_prints(ctx, out, "                ", parameters, &accesses, extra_message.as_deref())?;
        ctx.line(out, "            }")?;
        ctx.line(out, "            None => println!(\"Stream was out of sync.\"),")?;
        ctx.line(out, "        }")?;
        ctx.line(out, "    }")?;
        ctx.line(out, "});")?;
        return Ok(());
    }

    let (binding, accesses): (String, Vec<String>) = if parameters.len() == 1 {
        let name = variable(device, &parameters[0].name);
        (name.clone(), vec![name])
    } else {
        (
            "event".to_string(),
            parameters
                .iter()
                .map(|p| format!("event.{}", field_name(&p.name)))
                .collect(),
        )
    };
    ctx.line(out, &format!("    for {} in {} {{", binding, receiver))?;
    write_prints(ctx, out, "        ", parameters, &accesses, extra_message.as_deref())?;
    ctx.line(out, "    }")?;
    ctx.line(out, "});")?;
    Ok(())
}

fn threshold_args(threshold: &Threshold) -> Vec<String> {
    vec![
        format!("'{}'", threshold.option),
        scale_to_wire(threshold.minimum, threshold.divisor),
        scale_to_wire(threshold.maximum, threshold.divisor),
    ]
}

fn render_step(ctx: &mut FormatterContext, out: &mut String, device: &Device, step: &ExampleFunction) -> Result<()> {
    let d = device.name.initial();
    match step {
        ExampleFunction::Getter {
            function,
            arguments,
            results,
            comment,
        } => {
            match comment {
                Some(comment) => ctx.line(out, &format!("// {}.", comment.trim_end_matches('.')))?,
                None => ctx.line(out, &format!("// Get current {}.", comment_name(function)))?,
            }
            // high-level stream methods return a Result directly
            let receive = if packet_for(device, function)?.stream.is_some() {
                "?"
            } else {
                ".recv()?"
            };
            let call = format!(
                "{}.{}({}){}",
                d,
                function.under(),
                arg_list(device, function, arguments, &[])?,
                receive
            );
            if results.len() == 1 {
                let var = variable(device, &results[0].name);
                ctx.line(out, &format!("let {} = {};", var, call))?;
                if let Some(line) = print_line(&results[0], &var) {
                    ctx.line(out, &line)?;
                }
            } else {
                let result = format!("{}_result", function.under());
                ctx.line(out, &format!("let {} = {};", result, call))?;
                ctx.line(out, "")?;
                for value in results {
                    let access = format!("{}.{}", result, field_name(&value.name));
                    if let Some(line) = print_line(value, &access) {
                        ctx.line(out, &line)?;
                    }
                }
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
            let packet = packet_for(device, function)?;
            let args = arg_list(device, function, arguments, &[])?;
            if packet.stream.is_some() {
                ctx.line(out, &format!("{}.{}({})?;", d, function.under(), args))?;
            } else {
                ctx.line(out, &format!("{}.{}({});", d, function.under(), args))?;
            }
        }
        ExampleFunction::Callback { function, .. } => {
            ctx.line(
                out,
                &format!("// Create receiver for {} events.", comment_name(function)),
            )?;
            callback_handler(ctx, out, device, step)?;
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
                &format!("// Set period for {} receiver to {} ({}ms).", name, short, period_ms),
            )?;
            ctx.line(out, &format!("// Note: The {} callback is only called every {}", name, long))?;
            ctx.line(out, &format!("//       if the {} has changed since the last call!", unit))?;
            ctx.line(
                out,
                &format!(
                    "{}.{}({});",
                    d,
                    function.under(),
                    arg_list(device, function, arguments, &[period_ms.to_string()])?
                ),
            )?;
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
                    "// Configure threshold for {} \"{}\".",
                    comment_name(function),
                    threshold_comment(threshold.option, threshold.minimum, threshold.maximum, unit.as_deref())
                ),
            )?;
            ctx.line(
                out,
                &format!(
                    "{}.{}({});",
                    d,
                    function.under(),
                    arg_list(device, function, arguments, &threshold_args(threshold))?
                ),
            )?;
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
                    ctx.line(out, &format!("// with a debounce period of {} ({}ms).", short, period_ms))?;
                }
                None => ctx.line(
                    out,
                    &format!(
                        "// Set period for {} callback to {} ({}ms) without a threshold.",
                        name, short, period_ms
                    ),
                )?,
            }
            if let Some(t) = threshold {
                appended.extend(threshold_args(t));
            }
            ctx.line(
                out,
                &format!(
                    "{}.{}({});",
                    d,
                    function.under(),
                    arg_list(device, function, arguments, &appended)?
                ),
            )?;
        }
        ExampleFunction::DebouncePeriod { function, period_ms } => {
            let (_, long) = format_period(*period_ms);
            ctx.line(
                out,
                &format!("// Get threshold receivers with a debounce time of {} ({}ms).", long, period_ms),
            )?;
            ctx.line(out, &format!("{}.{}({});", d, function.under(), period_ms))?;
        }
        ExampleFunction::Sleep { duration_ms, comment } => match comment {
            Some(comment) => ctx.line(
                out,
                &format!("thread::sleep(Duration::from_millis({})); // {}", duration_ms, comment),
            )?,
            None => ctx.line(out, &format!("thread::sleep(Duration::from_millis({}));", duration_ms))?,
        },
        ExampleFunction::Wait => {
            ctx.line(out, "println!(\"Press enter to exit.\");")?;
            ctx.line(out, "let mut _input = String::new();")?;
            ctx.line(out, "io::stdin().read_line(&mut _input)?;")?;
        }
        ExampleFunction::LoopHeader { limit, comment } => {
            if let Some(comment) = comment {
                ctx.line(out, &format!("// {}", comment))?;
            }
            ctx.line(out, &format!("for _i in 0..{} {{", limit))?;
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

/// Render one example as a standalone program
pub fn render_example(device: &Device, example: &Example, _options: &GenerationOptions) -> Result<String> {
    let all_steps = || example.functions.iter().chain(example.cleanups.iter());

    let d = device.name.initial();
    let mut std_imports = vec!["error::Error"];
    if all_steps().any(|s| matches!(s, ExampleFunction::Wait)) {
        std_imports.push("io");
    }
    let sleeps = all_steps().any(|s| matches!(s, ExampleFunction::Sleep { .. }));
    if sleeps || all_steps().any(ExampleFunction::is_callback) {
        std_imports.push("thread");
    }
    if sleeps {
        std_imports.push("time::Duration");
    }

    let mut out = String::new();
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
    if std_imports.len() == 1 {
        writeln!(out, "use std::{};", std_imports[0])?;
    } else {
        writeln!(out, "use std::{{{}}};", std_imports.join(", "))?;
    }
    writeln!(
        out,
        "use tinkerforge::{{{}::*, ip_connection::IpConnection}};",
        module_name(device)
    )?;
    writeln!(out)?;
    writeln!(out, "const HOST: &str = \"localhost\";")?;
    writeln!(out, "const PORT: u16 = 4223;")?;
    writeln!(
        out,
        "const UID: &str = \"{0}\"; // Change {0} to the UID of your {1}.",
        device.dummy_uid(),
        device.long_display_name()
    )?;
    writeln!(out)?;
    writeln!(out, "fn main() -> Result<(), Box<dyn Error>> {{")?;
    writeln!(out, "    let ipcon = IpConnection::new(); // Create IP connection.")?;
    writeln!(
        out,
        "    let {} = {}::new(UID, &ipcon); // Create device object.",
        d,
        struct_name(device)
    )?;
    writeln!(out)?;
    writeln!(out, "    ipcon.connect((HOST, PORT)).recv()??; // Connect to brickd.")?;
    writeln!(out, "    // Don't use device before ipcon is connected.")?;

    let full = device.full_name().space();
    let mut ctx = FormatterContext::new("    ", 1, &full, LANGUAGE);
    render_steps(&mut ctx, &mut out, device, &example.functions)?;
    ctx.finish()?;
    if !example.cleanups.is_empty() {
        render_steps(&mut ctx, &mut out, device, &example.cleanups)?;
        ctx.finish()?;
    }

    writeln!(out)?;
    writeln!(out, "    ipcon.disconnect();")?;
    writeln!(out, "    Ok(())")?;
    writeln!(out, "}}")?;
    Ok(out)
}
