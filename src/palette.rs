use crate::error::SurveyError;
use crate::report::Outcome;
use log::{debug, warn};
use plotters::style::RGBColor;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// Lines carrying a color code contain this marker.
pub const HEX_MARKER: &str = "HEX:";

/// Only the first few palette entries (primary and accent) are used.
pub const MAX_PALETTE: usize = 5;

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#(?:[0-9a-fA-F]{3}){1,2}").expect("valid hex pattern"))
}

/// Colors used when the brand document is absent or too short.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallbackColors {
    pub default: String,
    pub highlight: String,
    pub secondary: String,
}

impl Default for FallbackColors {
    fn default() -> Self {
        Self {
            default: "#003E7E".to_string(),
            highlight: "#FFB81C".to_string(),
            secondary: "#D9EAD3".to_string(),
        }
    }
}

/// Extract the palette from a brand styling document.
pub fn parse_palette(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.contains(HEX_MARKER))
        .filter_map(|line| hex_pattern().find(line))
        .map(|m| m.as_str().to_string())
        .take(MAX_PALETTE)
        .collect()
}

/// Read the palette from `path`. An absent file is a warning, never an error.
pub fn load_palette(path: &Path) -> Result<Vec<String>, SurveyError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_palette(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SurveyError::StylingAbsent {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(SurveyError::read(path, e)),
    }
}

/// Load the palette for a run. A document without any `HEX:` line yields
/// `Done(None)`; an absent or unreadable one is skipped with a warning. In
/// both cases the charts fall back to the configured colors.
pub fn resolve_palette(path: &Path) -> Outcome<Option<Vec<String>>> {
    let outcome: Outcome<Vec<String>> = load_palette(path).into();
    match outcome {
        Outcome::Done(colors) if colors.is_empty() => {
            debug!("No {} lines in {:?}", HEX_MARKER, path);
            Outcome::Done(None)
        }
        Outcome::Done(colors) => Outcome::Done(Some(colors)),
        Outcome::Skipped(e) => {
            warn!("{}", e);
            Outcome::Skipped(e)
        }
    }
}

/// The three colors the charts draw with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrandColors {
    pub default: RGBColor,
    pub highlight: RGBColor,
    pub secondary: RGBColor,
}

impl BrandColors {
    /// First palette entry is the default bar color, the second the
    /// comparison color and the third the highlight.
    pub fn resolve(palette: Option<&[String]>, fallback: &FallbackColors) -> Self {
        let pick = |idx: usize, fallback_hex: &str| {
            palette
                .and_then(|p| p.get(idx))
                .and_then(|hex| parse_hex_color(hex))
                .or_else(|| parse_hex_color(fallback_hex))
                .unwrap_or(RGBColor(0, 62, 126))
        };
        Self {
            default: pick(0, &fallback.default),
            secondary: pick(1, &fallback.secondary),
            highlight: pick(2, &fallback.highlight),
        }
    }
}

impl Default for BrandColors {
    fn default() -> Self {
        Self::resolve(None, &FallbackColors::default())
    }
}

/// Parse hex color (#RRGGBB or #RGB)
pub fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}
