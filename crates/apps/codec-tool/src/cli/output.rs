use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Prints `value` as pretty JSON.
    pub fn emit_status<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn emit_lines(&self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub fn emit_message(&self, message: impl AsRef<str>) {
        println!("{}", message.as_ref());
    }
}
