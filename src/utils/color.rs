//! Color parsing and conversion utilities

use crate::{config::BackgroundColor, error::BgRemovalError, error::Result};

/// Utility for parsing and converting colors
pub struct ColorParser;

impl ColorParser {
    /// Parse a hex color string to `BackgroundColor`
    ///
    /// Supports both #RRGGBB and #RGB formats, with or without the `#` prefix.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_server::utils::ColorParser;
    ///
    /// # fn main() -> bgremove_server::Result<()> {
    /// let gray = ColorParser::parse_hex("#f7f7f7")?;
    /// assert_eq!((gray.r, gray.g, gray.b), (247, 247, 247));
    ///
    /// let red = ColorParser::parse_hex("f00")?;
    /// assert_eq!(red.r, 255);
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_hex(hex: &str) -> Result<BackgroundColor> {
        let digits = hex.trim().trim_start_matches('#');

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BgRemovalError::invalid_config(format!(
                "Invalid hex color '{}': non-hex characters",
                hex
            )));
        }

        let component = |range: std::ops::Range<usize>, name: &str| -> Result<u8> {
            digits
                .get(range)
                .and_then(|part| u8::from_str_radix(part, 16).ok())
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(format!(
                        "Invalid {} component in hex color '{}'",
                        name, hex
                    ))
                })
        };

        match digits.len() {
            6 => Ok(BackgroundColor::new(
                component(0..2, "red")?,
                component(2..4, "green")?,
                component(4..6, "blue")?,
            )),
            // #RGB expands each digit (f -> ff)
            3 => Ok(BackgroundColor::new(
                component(0..1, "red")? * 17,
                component(1..2, "green")? * 17,
                component(2..3, "blue")? * 17,
            )),
            _ => Err(BgRemovalError::invalid_config(format!(
                "Color '{}' must be in #RRGGBB or #RGB format",
                hex
            ))),
        }
    }

    /// Convert `BackgroundColor` to a lowercase hex string
    #[must_use]
    pub fn to_hex(color: &BackgroundColor, include_hash: bool) -> String {
        if include_hash {
            format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        } else {
            format!("{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6_digit() {
        let white = ColorParser::parse_hex("#ffffff").unwrap();
        assert_eq!((white.r, white.g, white.b), (255, 255, 255));

        let gray = ColorParser::parse_hex("#F7F7F7").unwrap();
        assert_eq!((gray.r, gray.g, gray.b), (247, 247, 247));

        let no_hash = ColorParser::parse_hex("0000ff").unwrap();
        assert_eq!((no_hash.r, no_hash.g, no_hash.b), (0, 0, 255));
    }

    #[test]
    fn test_parse_hex_3_digit() {
        let red = ColorParser::parse_hex("#f00").unwrap();
        assert_eq!((red.r, red.g, red.b), (255, 0, 0));

        let mid = ColorParser::parse_hex("#888").unwrap();
        assert_eq!((mid.r, mid.g, mid.b), (136, 136, 136));
    }

    #[test]
    fn test_parse_hex_invalid() {
        assert!(ColorParser::parse_hex("").is_err());
        assert!(ColorParser::parse_hex("#ff").is_err());
        assert!(ColorParser::parse_hex("#fffffff").is_err());
        assert!(ColorParser::parse_hex("#gggggg").is_err());
        // Multi-byte characters must not cause slicing panics
        assert!(ColorParser::parse_hex("#ffé").is_err());
    }

    #[test]
    fn test_to_hex_round_trip() {
        let color = BackgroundColor::new(255, 0, 128);
        assert_eq!(ColorParser::to_hex(&color, true), "#ff0080");
        assert_eq!(ColorParser::to_hex(&color, false), "ff0080");
        assert_eq!(ColorParser::parse_hex(&ColorParser::to_hex(&color, true)).unwrap(), color);
    }
}
