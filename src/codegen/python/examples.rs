//! Python example programs.

use std::fmt::Write;

use crate::codegen::context::FormatterContext;
use crate::codegen::python::{class_name, module_name, KEYWORDS};
use crate::codegen::utils::{
    comment_name, escape_keyword, escape_string, format_float, format_number, format_period, scale_to_wire,
    threshold_comment,
};
use crate::codegen::GenerationOptions;
use crate::error::Result;
use crate::model::{Device, ElementType, Example, ExampleArg, ExampleFunction, ExampleValue, Name, Threshold};

fn arg_source(device: &Device, arg: &ExampleArg) -> String {
    match arg {
        ExampleArg::Constant { constant, .. } => format!("{}.{}", device.name.initial(), constant.upper()),
        ExampleArg::Bool(true) => "True".to_string(),
        ExampleArg::Bool(false) => "False".to_string(),
        ExampleArg::Int(i) => i.to_string(),
        ExampleArg::Float(f) => format_float(*f),
        ExampleArg::Char(c) => format!("\"{}\"", escape_string(&c.to_string())),
        ExampleArg::Str(s) => format!("\"{}\"", escape_string(s)),
        ExampleArg::Array(items) => format!(
            "[{}]",
            items.iter().map(|i| arg_source(device, i)).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn arg_list(device: &Device, args: &[ExampleArg], appended: &[String]) -> String {
    args.iter()
        .map(|a| arg_source(device, a))
        .chain(appended.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn variable(device: &Device, value: &ExampleValue) -> String {
    let name = escape_keyword(value.name.under(), KEYWORDS);
    if name == device.name.initial() {
        format!("{}_", name)
    } else {
        name
    }
}

fn print_line(device: &Device, value: &ExampleValue) -> Option<String> {
    if value.omit {
        return None;
    }
    let var = variable(device, value);
    let label = escape_string(&value.name.space());
    let unit = value
        .unit
        .as_ref()
        .map(|u| format!(" + \" {}\"", escape_string(u)))
        .unwrap_or_default();

    let text = match value.ty {
        ElementType::Char | ElementType::String
            if value.cardinality.count() == 1 || value.ty == ElementType::String =>
        {
            var
        }
        _ => match value.divisor {
            Some(divisor) if value.cardinality.count() == 1 => format!("str({}/{})", var, format_float(divisor)),
            _ => format!("str({})", var),
        },
    };
    Some(format!("print(\"{}: \" + {}{})", label, text, unit))
}

/// Top-level callback function
fn callback_function(
    out: &mut String,
    device: &Device,
    function: &Name,
    parameters: &[ExampleValue],
    comment: Option<&str>,
    extra_message: Option<&str>,
) -> Result<()> {
    match comment {
        Some(comment) => {
            for line in comment.lines() {
                writeln!(out, "# {}", line)?;
            }
        }
        None => writeln!(out, "# Callback function for {} callback", comment_name(function))?,
    }
    let params: Vec<String> = parameters.iter().map(|p| variable(device, p)).collect();
    writeln!(out, "def cb_{}({}):", function.under(), params.join(", "))?;

    let prints: Vec<String> = parameters.iter().filter_map(|p| print_line(device, p)).collect();
    for line in &prints {
        writeln!(out, "    {}", line)?;
    }
    if let Some(message) = extra_message {
        writeln!(out, "    print(\"{}\")", escape_string(message))?;
    }
    if prints.len() > 1 {
        writeln!(out, "    print(\"\")")?;
    }
    if prints.is_empty() && extra_message.is_none() {
        writeln!(out, "    pass")?;
    }
    writeln!(out)?;
    Ok(())
}

fn threshold_args(threshold: &Threshold) -> Vec<String> {
    vec![
        format!("\"{}\"", threshold.option),
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
                Some(comment) => ctx.line(out, &format!("# {}", comment))?,
                None => ctx.line(out, &format!("# Get current {}", comment_name(function)))?,
            }
            let vars: Vec<String> = results.iter().map(|r| variable(device, r)).collect();
            ctx.line(
                out,
                &format!(
                    "{} = {}.{}({})",
                    vars.join(", "),
                    d,
                    function.under(),
                    arg_list(device, arguments, &[])
                ),
            )?;
            let prints: Vec<String> = results.iter().filter_map(|r| print_line(device, r)).collect();
            if prints.len() > 1 {
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
                    ctx.line(out, &format!("# {}", line))?;
                }
            }
            ctx.line(
                out,
                &format!("{}.{}({})", d, function.under(), arg_list(device, arguments, &[])),
            )?;
        }
        ExampleFunction::Callback { function, .. } => {
            let name = comment_name(function);
            ctx.line(
                out,
                &format!("# Register {} callback to function cb_{}", name, function.under()),
            )?;
            ctx.line(
                out,
                &format!(
                    "{0}.register_callback({0}.CALLBACK_{1}, cb_{2})",
                    d,
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
                &format!("# Set period for {} callback to {} ({}ms)", name, short, period_ms),
            )?;
            ctx.line(
                out,
                &format!("# Note: The {} callback is only called every {}", name, long),
            )?;
            ctx.line(out, &format!("#       if the {} has changed since the last call!", unit))?;
            ctx.line(
                out,
                &format!(
                    "{}.{}({})",
                    d,
                    function.under(),
                    arg_list(device, arguments, &[period_ms.to_string()])
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
                    "# Configure threshold for {} \"{}\"",
                    comment_name(function),
                    threshold_comment(threshold.option, threshold.minimum, threshold.maximum, unit.as_deref())
                ),
            )?;
            ctx.line(
                out,
                &format!(
                    "{}.{}({})",
                    d,
                    function.under(),
                    arg_list(device, arguments, &threshold_args(threshold))
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
            let mut appended = vec![
                period_ms.to_string(),
                if *value_has_to_change { "True" } else { "False" }.to_string(),
            ];
            match threshold.as_ref().filter(|t| t.option != 'x') {
                Some(t) => {
                    ctx.line(
                        out,
                        &format!(
                            "# Configure threshold for {} \"{}\"",
                            name,
                            threshold_comment(t.option, t.minimum, t.maximum, unit.as_deref())
                        ),
                    )?;
                    ctx.line(out, &format!("# with a debounce period of {} ({}ms)", short, period_ms))?;
                }
                None => ctx.line(
                    out,
                    &format!(
                        "# Set period for {} callback to {} ({}ms) without a threshold",
                        name, short, period_ms
                    ),
                )?,
            }
            if let Some(t) = threshold {
                appended.extend(threshold_args(t));
            }
            ctx.line(
                out,
                &format!("{}.{}({})", d, function.under(), arg_list(device, arguments, &appended)),
            )?;
        }
        ExampleFunction::DebouncePeriod { function, period_ms } => {
            let (_, long) = format_period(*period_ms);
            ctx.line(
                out,
                &format!("# Get threshold callbacks with a debounce time of {} ({}ms)", long, period_ms),
            )?;
            ctx.line(out, &format!("{}.{}({})", d, function.under(), period_ms))?;
        }
        ExampleFunction::Sleep { duration_ms, comment } => {
            let seconds = format_number(f64::from(*duration_ms) / 1000.0);
            match comment {
                Some(comment) => ctx.line(out, &format!("time.sleep({}) # {}", seconds, comment))?,
                None => ctx.line(out, &format!("time.sleep({})", seconds))?,
            }
        }
        ExampleFunction::Wait => {
            ctx.line(out, "input(\"Press key to exit\\n\") # Use raw_input() in Python 2")?;
        }
        ExampleFunction::LoopHeader { limit, comment } => {
            if let Some(comment) = comment {
                ctx.line(out, &format!("# {}", comment))?;
            }
            ctx.line(out, &format!("for i in range({}):", limit))?;
            ctx.enter_loop();
        }
        ExampleFunction::LoopFooter => ctx.exit_loop()?,
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

/// Render one example as a standalone script
pub fn render_example(device: &Device, example: &Example, _options: &GenerationOptions) -> Result<String> {
    let cls = class_name(device);
    let d = device.name.initial();
    let full = device.full_name().space();
    let mut out = String::new();

    writeln!(out, "#!/usr/bin/env python")?;
    writeln!(out, "# -*- coding: utf-8 -*-")?;
    if example.incomplete {
        writeln!(out)?;
        writeln!(out, "# FIXME: This example is incomplete")?;
    }
    if let Some(description) = &example.description {
        writeln!(out)?;
        for line in description.lines() {
            writeln!(out, "# {}", line)?;
        }
    }
    writeln!(out)?;
    writeln!(out, "HOST = \"localhost\"")?;
    writeln!(out, "PORT = 4223")?;
    writeln!(
        out,
        "UID = \"{0}\" # Change {0} to the UID of your {1}",
        device.dummy_uid(),
        device.long_display_name()
    )?;
    writeln!(out)?;

    let all_steps = || example.functions.iter().chain(example.cleanups.iter());
    if all_steps().any(|f| matches!(f, ExampleFunction::Sleep { .. })) {
        writeln!(out, "import time")?;
        writeln!(out)?;
    }
    writeln!(out, "from tinkerforge.ip_connection import IPConnection")?;
    writeln!(out, "from tinkerforge.{} import {}", module_name(device), cls)?;
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
                device,
                function,
                parameters,
                comment.as_deref(),
                extra_message.as_deref(),
            )?;
        }
    }

    writeln!(out, "if __name__ == \"__main__\":")?;
    writeln!(out, "    ipcon = IPConnection() # Create IP connection")?;
    writeln!(out, "    {} = {}(UID, ipcon) # Create device object", d, cls)?;
    writeln!(out)?;
    writeln!(out, "    ipcon.connect(HOST, PORT) # Connect to brickd")?;
    writeln!(out, "    # Don't use device before ipcon is connected")?;

    let mut ctx = FormatterContext::new("    ", 1, &full, "python");
    render_steps(&mut ctx, &mut out, device, &example.functions)?;
    ctx.finish()?;

    if !example.cleanups.is_empty() {
        render_steps(&mut ctx, &mut out, device, &example.cleanups)?;
        ctx.finish()?;
    }

    writeln!(out)?;
    writeln!(out, "    ipcon.disconnect()")?;
    Ok(out)
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
      - { kind: loop_header, limit: 10, comment: Poll ten times }
      - kind: getter
        function: Get Humidity
        results:
          - { name: Humidity, type: uint16, divisor: 100, unit: "%RH" }
      - { kind: sleep, duration_ms: 500 }
      - kind: loop_footer
    cleanups:
      - kind: setter
        function: Set Status LED Config
        arguments:
          - constant: Status LED Config Show Status
"#;

    fn device() -> Device {
        let config: DeviceConfig = serde_yaml::from_str(DEVICE).unwrap();
        build_device(config).unwrap()
    }

    #[test]
    fn test_callback_example() {
        let device = device();
        let py = render_example(&device, &device.examples[0], &GenerationOptions::default()).unwrap();
        assert!(py.contains("def cb_humidity(humidity):\n    print(\"Humidity: \" + str(humidity/100.0) + \" %RH\")"));
        assert!(py.contains("    h.register_callback(h.CALLBACK_HUMIDITY, cb_humidity)"));
        assert!(py.contains("# Configure threshold for humidity \"outside of 30 %RH to 60 %RH\""));
        assert!(py.contains("    h.set_humidity_callback_configuration(1000, False, \"o\", 3000, 6000)"));
        assert!(py.contains("    input(\"Press key to exit\\n\")"));
        assert!(py.contains("UID = \"XYZ\" # Change XYZ to the UID of your Humidity Bricklet 2.0"));
    }

    #[test]
    fn test_loop_indentation() {
        let device = device();
        let py = render_example(&device, &device.examples[1], &GenerationOptions::default()).unwrap();
        assert!(py.contains("import time\n"));
        assert!(py.contains("    # Poll ten times\n    for i in range(10):\n        # Get current humidity\n"));
        assert!(py.contains("        humidity = h.get_humidity()\n"));
        assert!(py.contains("        time.sleep(0.5)\n"));
        assert!(py.contains("\n    h.set_status_led_config(h.STATUS_LED_CONFIG_SHOW_STATUS)\n"));
    }
}
