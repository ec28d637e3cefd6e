//! XML style attributes → Docs API style objects.
//!
//! The pull side factorizes API styles into flat attribute dictionaries
//! (`bold="1"`, `size="11pt"`, `borderTop="1,#FF0000,SOLID"`); this module is
//! the inverse, producing `textStyle` / `paragraphStyle` / `tableCellStyle`
//! values plus the `fields` mask for each request.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

static DIMENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d.]+)\s*(?i)(pt|in|mm)?$").expect("valid regex"));

/// Style properties as attribute name → value.
pub type StyleProps = BTreeMap<String, String>;

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Parse a dimension string like `11pt` into `{magnitude, unit}`.
pub fn parse_dimension(value: &str) -> Option<Value> {
    let caps = DIMENSION.captures(value.trim())?;
    let magnitude: f64 = caps[1].parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_else(|| "PT".to_string());
    Some(json!({ "magnitude": magnitude, "unit": unit }))
}

/// Parse `#RRGGBB` into an `OptionalColor` value.
pub fn parse_color(value: &str) -> Option<Value> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let red = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let green = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let blue = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(json!({
        "color": {
            "rgbColor": {
                "red": f64::from(red) / 255.0,
                "green": f64::from(green) / 255.0,
                "blue": f64::from(blue) / 255.0,
            }
        }
    }))
}

/// Parse a border string `width,#color,dashStyle` into a border value.
pub fn parse_border(value: &str) -> Option<Value> {
    let mut parts = value.splitn(3, ',');
    let width = parts.next()?.trim();
    let color = parts.next().unwrap_or("#000000").trim();
    let dash_style = parts.next().unwrap_or("SOLID").trim();

    let magnitude: f64 = width.parse().ok()?;
    let color_value = parse_color(color).unwrap_or_else(|| {
        json!({ "color": { "rgbColor": { "red": 0.0, "green": 0.0, "blue": 0.0 } } })
    });

    Some(json!({
        "color": color_value,
        "width": { "magnitude": magnitude, "unit": "PT" },
        "dashStyle": dash_style,
    }))
}

fn push(style: &mut Map<String, Value>, fields: &mut Vec<String>, name: &str, value: Value) {
    style.insert(name.to_string(), value);
    fields.push(name.to_string());
}

/// Convert run attributes into a `textStyle` object and field mask.
pub fn convert_text_styles(styles: &StyleProps) -> (Map<String, Value>, Vec<String>) {
    let mut out = Map::new();
    let mut fields = Vec::new();

    for (key, value) in styles {
        match key.as_str() {
            "bold" | "italic" | "underline" | "strikethrough" if is_truthy(value) => {
                push(&mut out, &mut fields, key, json!(true));
            }
            "superscript" if is_truthy(value) => {
                push(&mut out, &mut fields, "baselineOffset", json!("SUPERSCRIPT"));
            }
            "subscript" if is_truthy(value) => {
                push(&mut out, &mut fields, "baselineOffset", json!("SUBSCRIPT"));
            }
            "link" if !value.is_empty() => {
                push(&mut out, &mut fields, "link", json!({ "url": value }));
            }
            "font" if !value.is_empty() => {
                push(
                    &mut out,
                    &mut fields,
                    "weightedFontFamily",
                    json!({ "fontFamily": value }),
                );
            }
            "size" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, "fontSize", dim);
                }
            }
            "color" => {
                if let Some(color) = parse_color(value) {
                    push(&mut out, &mut fields, "foregroundColor", color);
                }
            }
            "bg" => {
                if let Some(color) = parse_color(value) {
                    push(&mut out, &mut fields, "backgroundColor", color);
                }
            }
            _ => {}
        }
    }

    (out, fields)
}

/// Convert paragraph attributes into a `paragraphStyle` object and field mask.
pub fn convert_paragraph_styles(styles: &StyleProps) -> (Map<String, Value>, Vec<String>) {
    let mut out = Map::new();
    let mut fields = Vec::new();

    for (key, value) in styles {
        match key.as_str() {
            "align" if !value.is_empty() => {
                push(&mut out, &mut fields, "alignment", json!(value));
            }
            "lineSpacing" => {
                if let Ok(spacing) = value.parse::<f64>() {
                    push(&mut out, &mut fields, "lineSpacing", json!(spacing));
                }
            }
            "spaceAbove" | "spaceBelow" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, key, dim);
                }
            }
            "indentLeft" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, "indentStart", dim);
                }
            }
            "indentRight" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, "indentEnd", dim);
                }
            }
            "indentFirst" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, "indentFirstLine", dim);
                }
            }
            "keepTogether" if is_truthy(value) => {
                push(&mut out, &mut fields, "keepLinesTogether", json!(true));
            }
            "keepNext" if is_truthy(value) => {
                push(&mut out, &mut fields, "keepWithNext", json!(true));
            }
            "avoidWidow" if is_truthy(value) => {
                push(&mut out, &mut fields, "avoidWidowAndOrphan", json!(true));
            }
            "direction" if !value.is_empty() => {
                push(&mut out, &mut fields, "direction", json!(value));
            }
            "bgColor" => {
                if let Some(color) = parse_color(value) {
                    push(
                        &mut out,
                        &mut fields,
                        "shading",
                        json!({ "backgroundColor": color }),
                    );
                }
            }
            "borderTop" | "borderBottom" | "borderLeft" | "borderRight" => {
                if let Some(border) = parse_border(value) {
                    push(&mut out, &mut fields, key, border);
                }
            }
            _ => {}
        }
    }

    (out, fields)
}

/// Convert cell attributes into a `tableCellStyle` object and field mask.
pub fn convert_cell_styles(styles: &StyleProps) -> (Map<String, Value>, Vec<String>) {
    let mut out = Map::new();
    let mut fields = Vec::new();

    for (key, value) in styles {
        match key.as_str() {
            "bg" => {
                if let Some(color) = parse_color(value) {
                    push(&mut out, &mut fields, "backgroundColor", color);
                }
            }
            "valign" => {
                let alignment = match value.to_ascii_lowercase().as_str() {
                    "top" => Some("TOP"),
                    "middle" => Some("MIDDLE"),
                    "bottom" => Some("BOTTOM"),
                    _ => None,
                };
                if let Some(alignment) = alignment {
                    push(&mut out, &mut fields, "contentAlignment", json!(alignment));
                }
            }
            "paddingTop" | "paddingBottom" | "paddingLeft" | "paddingRight" => {
                if let Some(dim) = parse_dimension(value) {
                    push(&mut out, &mut fields, key, dim);
                }
            }
            "borderTop" | "borderBottom" | "borderLeft" | "borderRight" => {
                if let Some(border) = parse_border(value) {
                    push(&mut out, &mut fields, key, border);
                }
            }
            _ => {}
        }
    }

    (out, fields)
}
