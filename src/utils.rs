use std::io::{Read, Write};
use std::path::Path;

use env_logger::{fmt::Color, Builder};
use log::LevelFilter;

use crate::error::GptError;

pub fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            let mut timestamp_style = buf.style();
            timestamp_style.set_color(Color::Black).set_intense(true);

            writeln!(
                buf,
                "{} [{}] - {}",
                timestamp_style.value(buf.timestamp()),
                buf.default_styled_level(record.level()),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Read text from a file, or from stdin when no path (or `-`) is given
pub fn read_text(input: Option<&Path>) -> Result<String, GptError> {
    match input {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Shorten long text for console previews
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
