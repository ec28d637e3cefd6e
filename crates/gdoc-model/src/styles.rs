use std::collections::BTreeMap;

use crate::error::Result;
use crate::xml;

/// Properties of one style class, keyed by attribute name.
pub type StyleProps = BTreeMap<String, String>;

/// The style-class dictionaries from `styles.xml`.
///
/// Classes whose id starts with `cell-` style table cells and are kept apart
/// from the text dictionary handed to the content generator.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    pub text_styles: BTreeMap<String, StyleProps>,
    pub cell_styles: BTreeMap<String, StyleProps>,
}

impl StyleSheet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `styles.xml` document: `<styles><style id=… …/>…</styles>`.
    pub fn parse(styles_xml: &str) -> Result<Self> {
        let root = xml::parse(styles_xml)?;
        let mut sheet = StyleSheet::default();

        for style_elem in root.find_all("style") {
            let id = style_elem.attr("id").unwrap_or_default().to_string();
            let props: StyleProps = style_elem
                .attrs
                .iter()
                .filter(|(k, _)| k != "id")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if props.is_empty() {
                continue;
            }
            if id.starts_with("cell-") {
                sheet.cell_styles.insert(id, props);
            } else {
                sheet.text_styles.insert(id, props);
            }
        }

        Ok(sheet)
    }

    /// Parse if present; an absent styles file is an empty sheet.
    pub fn parse_opt(styles_xml: Option<&str>) -> Result<Self> {
        match styles_xml {
            Some(content) => Self::parse(content),
            None => Ok(Self::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_cell_styles_from_text_styles() {
        let sheet = StyleSheet::parse(concat!(
            r#"<styles>"#,
            r#"<style id="_base" font="Arial" size="11pt"/>"#,
            r#"<style id="kX9_m" bold="1"/>"#,
            r##"<style id="cell-a1b2c" bg="#F5F5F5" valign="middle"/>"##,
            r#"</styles>"#
        ))
        .expect("parse");
        assert_eq!(sheet.text_styles.len(), 2);
        assert_eq!(sheet.cell_styles.len(), 1);
        assert_eq!(
            sheet.text_styles["kX9_m"].get("bold").map(String::as_str),
            Some("1")
        );
        assert_eq!(
            sheet.cell_styles["cell-a1b2c"].get("valign").map(String::as_str),
            Some("middle")
        );
    }

    #[test]
    fn styles_without_properties_are_dropped() {
        let sheet = StyleSheet::parse(r#"<styles><style id="empty"/></styles>"#).expect("parse");
        assert!(sheet.text_styles.is_empty());
    }

    #[test]
    fn absent_sheet_is_empty() {
        let sheet = StyleSheet::parse_opt(None).expect("parse");
        assert!(sheet.text_styles.is_empty());
        assert!(sheet.cell_styles.is_empty());
    }
}
