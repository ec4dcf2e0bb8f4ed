//! Indentation state threaded through example renderers.

use std::fmt::Write;

use crate::error::{GeneratorError, Result};

/// Line prefix state for one rendered example
///
/// `base` is the indentation of the enclosing function body, `loops` grows
/// with every `loop_header` and shrinks with every `loop_footer`.
#[derive(Debug, Clone)]
pub struct FormatterContext {
    unit: &'static str,
    base: usize,
    loops: usize,
    device: String,
    language: &'static str,
}

impl FormatterContext {
    pub fn new(unit: &'static str, base: usize, device: &str, language: &'static str) -> Self {
        Self {
            unit,
            base,
            loops: 0,
            device: device.to_string(),
            language,
        }
    }

    pub fn prefix(&self) -> String {
        self.unit.repeat(self.base + self.loops)
    }

    pub fn depth(&self) -> usize {
        self.loops
    }

    /// Write one line at the current indentation; empty lines stay empty
    pub fn line(&self, out: &mut String, text: &str) -> Result<()> {
        if text.is_empty() {
            writeln!(out)?;
        } else {
            writeln!(out, "{}{}", self.prefix(), text)?;
        }
        Ok(())
    }

    /// Write several lines, each at the current indentation
    pub fn lines(&self, out: &mut String, text: &str) -> Result<()> {
        for line in text.lines() {
            self.line(out, line)?;
        }
        Ok(())
    }

    pub fn enter_loop(&mut self) {
        self.loops += 1;
    }

    pub fn exit_loop(&mut self) -> Result<()> {
        if self.loops == 0 {
            return Err(GeneratorError::render(
                &self.device,
                self.language,
                "loop_footer without matching loop_header",
            ));
        }
        self.loops -= 1;
        Ok(())
    }

    /// Check that every opened loop was closed
    pub fn finish(&self) -> Result<()> {
        if self.loops != 0 {
            return Err(GeneratorError::render(
                &self.device,
                self.language,
                format!("{} loop_header(s) without matching loop_footer", self.loops),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_prefix() {
        let mut ctx = FormatterContext::new("    ", 1, "Humidity V2", "python");
        assert_eq!(ctx.prefix(), "    ");
        ctx.enter_loop();
        assert_eq!(ctx.prefix(), "        ");

        let mut out = String::new();
        ctx.line(&mut out, "x = 1").unwrap();
        ctx.line(&mut out, "").unwrap();
        assert_eq!(out, "        x = 1\n\n");

        ctx.exit_loop().unwrap();
        assert!(ctx.finish().is_ok());
    }

    #[test]
    fn test_unbalanced_footer() {
        let mut ctx = FormatterContext::new("\t", 1, "Humidity V2", "c");
        let err = ctx.exit_loop().unwrap_err();
        assert!(err.to_string().contains("loop_footer without matching loop_header"));
    }

    #[test]
    fn test_unclosed_header() {
        let mut ctx = FormatterContext::new("\t", 1, "Humidity V2", "c");
        ctx.enter_loop();
        assert!(ctx.finish().is_err());
    }
}
