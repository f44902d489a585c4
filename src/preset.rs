//! Option presets.
//!
//! Loads [`ResolveOptions`] from TOML files and provides the builtin presets.
//! A TOML file only needs the fields it changes; the rest keep their
//! defaults.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::options::ResolveOptions;

/// Errors that can occur when loading options.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid options: {0}")]
    Invalid(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

/// Parses and validates options from TOML text.
///
/// # Examples
///
/// ```
/// use citemap::parse_options;
///
/// let options = parse_options("dedup_radius = 8\nspaced_digits = false").unwrap();
/// assert_eq!(options.dedup_radius, 8);
/// assert!(!options.spaced_digits);
/// assert_eq!(options.range_cap, 10);
/// ```
pub fn parse_options(text: &str) -> Result<ResolveOptions, OptionsError> {
    let options: ResolveOptions = toml::from_str(text)?;
    options.validate().map_err(OptionsError::Invalid)?;
    Ok(options)
}

/// Loads options from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, names an
/// unknown field, or holds values rejected by [`ResolveOptions::validate`].
pub fn load_options(path: &Path) -> Result<ResolveOptions, OptionsError> {
    let content = fs::read_to_string(path)?;
    parse_options(&content)
}

/// Single source of truth for builtin presets: (name, TOML content).
const BUILTIN_PRESETS: &[(&str, &str)] = &[
    ("default", DEFAULT_PRESET),
    ("contiguous", CONTIGUOUS_PRESET),
    ("window", WINDOW_PRESET),
    ("bracket-only", BRACKET_ONLY_PRESET),
];

/// Returns the options of a builtin preset.
pub fn builtin_preset(name: &str) -> Result<ResolveOptions, OptionsError> {
    let (_, content) = BUILTIN_PRESETS
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| OptionsError::UnknownPreset(name.to_string()))?;
    parse_options(content)
}

/// Returns the list of available builtin preset names.
pub fn builtin_preset_names() -> Vec<&'static str> {
    BUILTIN_PRESETS.iter().map(|(n, _)| *n).collect()
}

const DEFAULT_PRESET: &str = "# All defaults.\n";

/// For converters that never split digits: `[ 1 2 ]` is always two citations.
const CONTIGUOUS_PRESET: &str = r#"spaced_digits = false
"#;

/// Short contexts around each marker instead of whole paragraphs.
const WINDOW_PRESET: &str = r#"context_mode = "window"
context_radius = 150
max_context_len = 300
"#;

const BRACKET_ONLY_PRESET: &str = r#"author_year = false
"#;
