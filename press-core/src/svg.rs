//! Logo recolouring: strip the near-black parts of an SVG and paint the rest
//! in a single colour.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SvgError {
    #[error("malformed SVG: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed SVG attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("SVG is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("failed to write SVG: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{0}` is not a hex colour (expected e.g. FF0000 or #f00)")]
    InvalidColor(String),
}

const COLOR_ATTRIBUTES: [&str; 3] = ["fill", "stroke", "color"];

/// Every component below this counts as almost black
const DARK_THRESHOLD: u8 = 40;

static STYLE_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:fill|stroke|color):\s*(#[0-9a-fA-F]{3,6}|rgb\(\s*\d+\s*,\s*\d+\s*,\s*\d+\s*\)|rgba\(\s*\d+\s*,\s*\d+\s*,\s*\d+\s*,\s*[\d.]+\s*\))",
    )
    .expect("style colour pattern is valid")
});

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hex colour pattern is valid")
});

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Validate a user supplied colour and make sure it starts with `#`.
pub fn normalize_hex_color(color: &str) -> Result<String, SvgError> {
    if !HEX_COLOR.is_match(color) {
        return Err(SvgError::InvalidColor(color.to_string()));
    }
    Ok(if color.starts_with('#') {
        color.to_string()
    } else {
        format!("#{color}")
    })
}

/// Parse `#rgb`, `#rrggbb`, `rgb(...)` and `rgba(...)` into RGB components.
pub fn parse_color(color: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = color.strip_prefix('#') {
        let hex: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return Some((channel(0)?, channel(2)?, channel(4)?));
    }

    if color.starts_with("rgb") {
        let mut numbers = DIGITS
            .find_iter(color)
            .map(|m| m.as_str().parse::<u32>().map(|n| n.min(255) as u8));
        let mut next = || numbers.next()?.ok();
        return Some((next()?, next()?, next()?));
    }

    None
}

pub fn is_almost_black((r, g, b): (u8, u8, u8)) -> bool {
    r < DARK_THRESHOLD && g < DARK_THRESHOLD && b < DARK_THRESHOLD
}

fn is_dark_color(color: &str) -> bool {
    parse_color(color).is_some_and(is_almost_black)
}

fn is_paintable(value: &str) -> bool {
    value != "none" && value != "transparent"
}

/// Whether any colour on the element, direct or in `style`, is almost black.
fn is_dark_element(element: &BytesStart) -> Result<bool, SvgError> {
    for attr in element.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        let value = attr.unescape_value()?;

        let dark = if COLOR_ATTRIBUTES.iter().any(|a| a.as_bytes() == key) {
            is_paintable(&value) && is_dark_color(&value)
        } else if key == b"style" {
            STYLE_COLOR
                .captures_iter(&value)
                .any(|caps| is_dark_color(&caps[1]))
        } else {
            false
        };

        if dark {
            return Ok(true);
        }
    }
    Ok(false)
}

fn recolor_style(style: &str, fill: &str) -> String {
    STYLE_COLOR
        .replace_all(style, |caps: &Captures| {
            let color = &caps[1];
            if parse_color(color).is_some_and(|rgb| !is_almost_black(rgb)) {
                caps[0].replacen(color, fill, 1)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn recolor_element(element: &BytesStart, fill: &str) -> Result<BytesStart<'static>, SvgError> {
    let name = std::str::from_utf8(element.name().as_ref())?.to_string();
    let mut out = BytesStart::new(name);

    for attr in element.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr.unescape_value()?;

        let value = if COLOR_ATTRIBUTES.contains(&key) && is_paintable(&value) {
            fill.to_string()
        } else if key == "style" {
            recolor_style(&value, fill)
        } else {
            value.into_owned()
        };
        out.push_attribute((key, value.as_str()));
    }

    Ok(out)
}

/// Remove every dark element (with its children) below the root and paint
/// every remaining colour with `fill`.
///
/// Darkness is judged on the original colours. The root element is never
/// removed; if it is dark it is left untouched.
pub fn recolor_svg(svg: &str, fill: &str) -> Result<String, SvgError> {
    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::new());

    let mut depth = 0usize;
    // Depth of the dark element currently being dropped
    let mut skipping: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(element) => {
                if skipping.is_some() {
                    depth += 1;
                    continue;
                }
                let dark = is_dark_element(&element)?;
                if dark && depth > 0 {
                    skipping = Some(depth);
                } else if dark {
                    writer.write_event(Event::Start(element))?;
                } else {
                    writer.write_event(Event::Start(recolor_element(&element, fill)?))?;
                }
                depth += 1;
            }
            Event::End(element) => {
                depth = depth.saturating_sub(1);
                if let Some(level) = skipping {
                    if level == depth {
                        skipping = None;
                    }
                    continue;
                }
                writer.write_event(Event::End(element))?;
            }
            Event::Empty(element) => {
                if skipping.is_some() {
                    continue;
                }
                let dark = is_dark_element(&element)?;
                if dark && depth > 0 {
                    continue;
                } else if dark {
                    writer.write_event(Event::Empty(element))?;
                } else {
                    writer.write_event(Event::Empty(recolor_element(&element, fill)?))?;
                }
            }
            event => {
                if skipping.is_none() {
                    writer.write_event(event)?;
                }
            }
        }
    }

    Ok(String::from_utf8(writer.into_inner()).map_err(|e| e.utf8_error())?)
}

/// Colour usage split into the colours that would be removed and the ones
/// that would be repainted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ColorReport {
    pub dark: BTreeMap<String, usize>,
    pub other: BTreeMap<String, usize>,
}

impl ColorReport {
    fn count(&mut self, color: &str) {
        let Some(rgb) = parse_color(color) else {
            return;
        };
        let bucket = if is_almost_black(rgb) {
            &mut self.dark
        } else {
            &mut self.other
        };
        *bucket.entry(color.to_string()).or_default() += 1;
    }
}

pub fn analyze_svg_colors(svg: &str) -> Result<ColorReport, SvgError> {
    let mut reader = Reader::from_str(svg);
    let mut report = ColorReport::default();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(element) | Event::Empty(element) => {
                for attr in element.attributes() {
                    let attr = attr?;
                    let key = attr.key.as_ref();
                    let value = attr.unescape_value()?;

                    if COLOR_ATTRIBUTES.iter().any(|a| a.as_bytes() == key) {
                        if is_paintable(&value) {
                            report.count(&value);
                        }
                    } else if key == b"style" {
                        for caps in STYLE_COLOR.captures_iter(&value) {
                            report.count(&caps[1]);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" fill="#ffffff"><g fill="#111"><path d="M0 0"/><path fill="#fff" d="M1 1"/></g><path fill="#ff8800" d="M2 2"/><rect style="fill: rgb(200, 10, 10); stroke:#000000" width="1"/><circle stroke="none" fill="url(#grad)" r="1"/></svg>"##;

    #[test]
    fn parses_supported_color_forms() {
        assert_eq!(parse_color("#abc"), Some((0xaa, 0xbb, 0xcc)));
        assert_eq!(parse_color("#102030"), Some((0x10, 0x20, 0x30)));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some((1, 2, 3)));
        assert_eq!(parse_color("rgba(10,20,30,0.5)"), Some((10, 20, 30)));
        assert_eq!(parse_color("#abcd"), None);
        assert_eq!(parse_color("red"), None);
    }

    #[test]
    fn darkness_threshold() {
        assert!(is_almost_black((39, 39, 39)));
        assert!(!is_almost_black((40, 0, 0)));
    }

    #[test]
    fn normalizes_hex_input() {
        assert_eq!(normalize_hex_color("FF0000").unwrap(), "#FF0000");
        assert_eq!(normalize_hex_color("#abc").unwrap(), "#abc");
        assert!(matches!(normalize_hex_color("orange"), Err(SvgError::InvalidColor(_))));
        // four digits is not a colour
        assert!(normalize_hex_color("abcd").is_err());
    }

    #[test]
    fn removes_dark_elements_and_repaints_the_rest() {
        let out = recolor_svg(LOGO, "#00ff00").unwrap();

        // the dark group goes, children included
        assert!(!out.contains("M0 0"));
        assert!(!out.contains("M1 1"));
        assert!(!out.contains("<g"));
        // the style carries a dark stroke, so the whole rect goes
        assert!(!out.contains("<rect"));

        assert!(out.starts_with(r##"<svg xmlns="http://www.w3.org/2000/svg" fill="#00ff00">"##));
        assert!(out.contains(r##"<path fill="#00ff00" d="M2 2"/>"##));
        assert!(out.contains(r##"<circle stroke="none" fill="#00ff00" r="1"/>"##));
        assert!(out.ends_with("</svg>"));
    }

    #[test]
    fn style_colors_are_repainted() {
        let svg = r##"<svg><path style="fill:#ff0000;opacity:0.5;stroke: rgb(0, 0, 0)"/></svg>"##;
        assert_eq!(
            recolor_style("fill:#ff0000;opacity:0.5", "#123456"),
            "fill:#123456;opacity:0.5"
        );
        // dark stroke marks the path as dark, so it is removed
        assert_eq!(recolor_svg(svg, "#123456").unwrap(), "<svg></svg>");
    }

    #[test]
    fn dark_root_is_kept_untouched() {
        let svg = r##"<svg fill="#000"><path fill="#eee"/></svg>"##;
        assert_eq!(
            recolor_svg(svg, "#ff0000").unwrap(),
            r##"<svg fill="#000"><path fill="#ff0000"/></svg>"##
        );
    }

    #[test]
    fn analysis_counts_colors() {
        let report = analyze_svg_colors(LOGO).unwrap();
        assert_eq!(report.dark.get("#111"), Some(&1));
        assert_eq!(report.dark.get("#000000"), Some(&1));
        assert_eq!(report.other.get("#fff"), Some(&1));
        assert_eq!(report.other.get("#ffffff"), Some(&1));
        assert_eq!(report.other.get("rgb(200, 10, 10)"), Some(&1));
        // url(...) and none are not colours
        assert_eq!(report.dark.len() + report.other.len(), 6);
    }
}
