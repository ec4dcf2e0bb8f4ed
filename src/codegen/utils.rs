//! Utility functions for code generation.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::codegen::GenerationOptions;
use crate::model::Name;

/// Version stamped into generated file headers
pub const BINDINGS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lines of the "automatically generated" notice shared by all files
pub fn header_lines(options: &GenerationOptions, bindings: &str) -> Vec<String> {
    let generated = match options.date {
        Some(date) => format!("This file was automatically generated on {}.", date.format("%Y-%m-%d")),
        None => "This file was automatically generated.".to_string(),
    };
    vec![
        generated,
        String::new(),
        format!("{} Bindings Version {}", bindings, BINDINGS_VERSION),
        String::new(),
        "If you have a bugfix for this file and want to commit it,".to_string(),
        "please fix the bug in the generator.".to_string(),
    ]
}

fn box_width(lines: &[String]) -> usize {
    lines.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}

/// Boxed `/* ... */` comment used by C and Rust files
pub fn star_comment(lines: &[String]) -> String {
    let width = box_width(lines);
    let mut out = format!("/* {} \n", "*".repeat(width + 2));
    for line in lines {
        out.push_str(&format!(" * {:<width$} *\n", line, width = width));
    }
    out.push_str(&format!(" {}/\n", "*".repeat(width + 4)));
    out
}

/// Boxed `#` comment used by Python files
pub fn hash_comment(lines: &[String]) -> String {
    let width = box_width(lines);
    let mut out = format!("{}\n", "#".repeat(width + 4));
    for line in lines {
        out.push_str(&format!("# {:<width$} #\n", line, width = width));
    }
    out.push_str(&format!("{}\n", "#".repeat(width + 4)));
    out
}

/// RST comment block used by documentation pages
pub fn rst_comment(lines: &[String]) -> String {
    let mut out = "..\n".to_string();
    for line in lines {
        if line.is_empty() {
            out.push_str(" \n");
        } else {
            out.push_str(&format!(" {}\n", line));
        }
    }
    out
}

/// Append `_` to identifiers that collide with a reserved word
pub fn escape_keyword(name: String, keywords: &[&str]) -> String {
    if keywords.contains(&name.as_str()) {
        format!("{}_", name)
    } else {
        name
    }
}

/// Escape a string for use in C, Python or Rust double quoted literals
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Float literal that always carries a decimal point
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn link_regex() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r":(func|cb):`([^`]+)`").ok()).as_ref()
}

/// Rewrite `:func:` and `:cb:` references in doc text
///
/// `func` renders a function name, `callback` a callback name, both in the
/// lexical form of the target language.
pub fn rewrite_links<F, C>(text: &str, func: F, callback: C) -> String
where
    F: Fn(&Name) -> String,
    C: Fn(&Name) -> String,
{
    let Some(re) = link_regex() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures| {
        let name = Name::new(&caps[2]);
        if &caps[1] == "func" {
            func(&name)
        } else {
            callback(&name)
        }
    })
    .into_owned()
}

/// Prefix every line of `text`, trimming trailing whitespace of blank lines
pub fn comment_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number without a needless fractional part ("1000", "0.5")
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Short and long form of a period, ("1s", "second") for 1000 ms
pub fn format_period(period_ms: u32) -> (String, String) {
    let seconds = format_number(f64::from(period_ms) / 1000.0);
    let long = if period_ms == 1000 {
        "second".to_string()
    } else {
        format!("{} seconds", seconds)
    };
    (format!("{}s", seconds), long)
}

/// Scale a value given in user units to the wire value of an element
pub fn scale_to_wire(value: f64, divisor: Option<f64>) -> String {
    match divisor {
        Some(divisor) => format_number((value * divisor).round()),
        None => format_number(value),
    }
}

/// Human readable meaning of a threshold option character
pub fn threshold_option_comment(option: char) -> &'static str {
    match option {
        'o' => "outside of",
        'i' => "inside of",
        '<' => "smaller than",
        '>' => "greater than",
        _ => "off",
    }
}

/// Text of a threshold comment, e.g. "greater than 20 °C"
pub fn threshold_comment(option: char, minimum: f64, maximum: f64, unit: Option<&str>) -> String {
    let unit = unit.map(|u| format!(" {}", u)).unwrap_or_default();
    match option {
        'o' | 'i' => format!(
            "{} {}{} to {}{}",
            threshold_option_comment(option),
            format_number(minimum),
            unit,
            format_number(maximum),
            unit
        ),
        '<' | '>' => format!(
            "{} {}{}",
            threshold_option_comment(option),
            format_number(minimum),
            unit
        ),
        _ => threshold_option_comment(option).to_string(),
    }
}

/// What an example step refers to, in comment form
///
/// "Set Humidity Callback Configuration" and "Get Humidity" both give
/// "humidity".
pub fn comment_name(function: &Name) -> String {
    const SUFFIXES: [&str; 4] = [
        "Callback Configuration",
        "Callback Threshold",
        "Callback Period",
        "Debounce Period",
    ];

    let mut name = function.clone();
    for suffix in SUFFIXES {
        if name.ends_with(suffix) {
            name = name.without_last(suffix.split_whitespace().count());
            break;
        }
    }

    let words = name.words();
    let words = match words.first().map(String::as_str) {
        Some("Get") | Some("Set") | Some("Is") if words.len() > 1 => &words[1..],
        _ => words,
    };

    words
        .iter()
        .map(|w| {
            if w.chars().skip(1).any(|c| c.is_ascii_uppercase()) {
                w.clone()
            } else {
                w.to_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_header_without_date_is_stable() {
        let options = GenerationOptions::default();
        let lines = header_lines(&options, "Python");
        assert_eq!(lines[0], "This file was automatically generated.");
        assert!(lines[2].starts_with("Python Bindings Version "));
    }

    #[test]
    fn test_header_with_date() {
        let options = GenerationOptions {
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        let lines = header_lines(&options, "C/C++");
        assert_eq!(lines[0], "This file was automatically generated on 2024-03-01.");
    }

    #[test]
    fn test_star_comment_is_boxed() {
        let text = star_comment(&["ab".to_string(), "abcd".to_string()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "/* ****** ");
        assert_eq!(lines[1], " * ab   *");
        assert_eq!(lines[2], " * abcd *");
        assert_eq!(lines[3], " ********/");
    }

    #[test]
    fn test_escape_keyword() {
        assert_eq!(escape_keyword("type".to_string(), &["type", "in"]), "type_");
        assert_eq!(escape_keyword("mode".to_string(), &["type", "in"]), "mode");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(100.0), "100.0");
        assert_eq!(format_float(0.5), "0.5");
    }

    #[test]
    fn test_rewrite_links() {
        let text = "See :func:`Set Bootloader Mode` and :cb:`Humidity`.";
        let out = rewrite_links(text, |n| format!("{}()", n.under()), |n| format!("CALLBACK_{}", n.upper()));
        assert_eq!(out, "See set_bootloader_mode() and CALLBACK_HUMIDITY.");
    }

    #[test]
    fn test_periods_and_thresholds() {
        assert_eq!(format_period(1000), ("1s".to_string(), "second".to_string()));
        assert_eq!(format_period(500), ("0.5s".to_string(), "0.5 seconds".to_string()));
        assert_eq!(scale_to_wire(30.0, Some(100.0)), "3000");
        assert_eq!(
            threshold_comment('o', 30.0, 60.0, Some("%RH")),
            "outside of 30 %RH to 60 %RH"
        );
        assert_eq!(threshold_comment('>', 20.0, 0.0, None), "greater than 20");
    }

    #[test]
    fn test_comment_name() {
        assert_eq!(comment_name(&Name::new("Set Humidity Callback Configuration")), "humidity");
        assert_eq!(comment_name(&Name::new("Get Status LED Config")), "status LED config");
        assert_eq!(comment_name(&Name::new("Write")), "write");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("say \"hi\"\n"), "say \\\"hi\\\"\\n");
    }
}
