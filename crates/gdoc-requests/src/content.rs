//! Content-block request generation.
//!
//! Turns `content_block` change nodes into `batchUpdate` requests:
//! range deletes with the segment-end and before-table clamps, and the
//! ordered insert sequence (text, style resets, breaks, footnotes, paragraph
//! styles, bullets, styled runs). Modified blocks are delete-then-insert.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use gdoc_diff::{ChangeNode, ChangeOp};
use gdoc_model::xml::{XmlElement, XmlNode};
use gdoc_model::{utf16_len, xml, Result};

use crate::style::{convert_paragraph_styles, convert_text_styles, StyleProps};
use crate::walker::SegmentContext;

/// Inline tags the generator can reproduce or must anchor around. Other
/// special tags (person, date, richlink, equation) are preserved-only.
const SPECIAL_ELEMENT_TAGS: [&str; 5] = ["hr", "pagebreak", "columnbreak", "image", "footnote"];

/// Paragraph-level override attributes.
const PARA_STYLE_ATTRS: [&str; 16] = [
    "align",
    "lineSpacing",
    "spaceAbove",
    "spaceBelow",
    "indentLeft",
    "indentRight",
    "indentFirst",
    "keepTogether",
    "keepNext",
    "avoidWidow",
    "direction",
    "bgColor",
    "borderTop",
    "borderBottom",
    "borderLeft",
    "borderRight",
];

/// Attribute names that style text runs when they come from a class.
const TEXT_CLASS_PROPS: [&str; 8] = [
    "bg",
    "color",
    "font",
    "size",
    "bold",
    "italic",
    "underline",
    "strikethrough",
];

/// Field mask for the full paragraph-property reset. Applied before any
/// explicit overrides so the insert never inherits style from its neighbors.
const PARA_RESET_FIELDS: &str = "namedStyleType,alignment,lineSpacing,spaceAbove,spaceBelow,\
indentStart,indentEnd,indentFirstLine,keepLinesTogether,keepWithNext,avoidWidowAndOrphan,\
direction,shading,borderTop,borderBottom,borderLeft,borderRight";

fn named_style_for_tag(tag: &str) -> &'static str {
    match tag {
        "title" => "TITLE",
        "subtitle" => "SUBTITLE",
        "h1" => "HEADING_1",
        "h2" => "HEADING_2",
        "h3" => "HEADING_3",
        "h4" => "HEADING_4",
        "h5" => "HEADING_5",
        "h6" => "HEADING_6",
        _ => "NORMAL_TEXT",
    }
}

fn bullet_preset(bullet_type: &str) -> &'static str {
    match bullet_type {
        "decimal" => "NUMBERED_DECIMAL_NESTED",
        "alpha" => "NUMBERED_UPPERCASE_ALPHA",
        "roman" => "NUMBERED_UPPERCASE_ROMAN",
        "checkbox" => "BULLET_CHECKBOX",
        _ => "BULLET_DISC_CIRCLE_SQUARE",
    }
}

fn inline_style_key(tag: &str) -> Option<&'static str> {
    match tag {
        "b" => Some("bold"),
        "i" => Some("italic"),
        "u" => Some("underline"),
        "s" => Some("strikethrough"),
        "sup" => Some("superscript"),
        "sub" => Some("subscript"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ParsedContent
// ---------------------------------------------------------------------------

/// A special inline element at a block-relative offset.
#[derive(Debug, Clone)]
pub struct SpecialElement {
    pub offset: usize,
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
}

/// A paragraph span with its named style.
#[derive(Debug, Clone)]
pub struct ParagraphSpan {
    pub start: usize,
    pub end: usize,
    pub named_style: String,
}

/// Explicit paragraph-style overrides over a span.
#[derive(Debug, Clone)]
pub struct ParagraphProps {
    pub start: usize,
    pub end: usize,
    pub props: StyleProps,
}

/// A bullet paragraph span.
#[derive(Debug, Clone)]
pub struct BulletSpan {
    pub start: usize,
    pub end: usize,
    pub bullet_type: String,
    pub level: usize,
}

/// A styled text run.
#[derive(Debug, Clone)]
pub struct StyledRun {
    pub start: usize,
    pub end: usize,
    pub styles: StyleProps,
}

/// Parsed content block, ready for request generation.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    pub plain_text: String,
    pub specials: Vec<SpecialElement>,
    pub paragraph_styles: Vec<ParagraphSpan>,
    pub paragraph_props: Vec<ParagraphProps>,
    pub bullets: Vec<BulletSpan>,
    pub text_styles: Vec<StyledRun>,
    /// Offsets of page-break-only paragraphs. `insertPageBreak` emits both
    /// the break and its trailing newline (2 units), so these paragraphs
    /// contribute no plain text.
    pub pagebreak_offsets: Vec<usize>,
}

// ---------------------------------------------------------------------------
// ContentGenerator
// ---------------------------------------------------------------------------

/// Generates requests for content-block change nodes.
pub struct ContentGenerator {
    style_defs: BTreeMap<String, StyleProps>,
}

impl ContentGenerator {
    pub fn new(style_defs: BTreeMap<String, StyleProps>) -> Self {
        Self { style_defs }
    }

    /// Emit requests for a content-block change.
    ///
    /// Returns `(requests, segment_end_consumed)`.
    pub fn emit(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<(Vec<Value>, bool)> {
        match node.op {
            ChangeOp::Deleted => Ok((self.delete(node, ctx), false)),
            ChangeOp::Added => self.add(node, ctx),
            ChangeOp::Modified => self.modify(node, ctx),
            ChangeOp::Unchanged => Ok((Vec::new(), false)),
        }
    }

    // --- DELETE ---

    fn delete(&self, node: &ChangeNode, ctx: &SegmentContext) -> Vec<Value> {
        if node.before_xml.is_none() || node.pristine_end <= node.pristine_start {
            return Vec::new();
        }

        let start = node.pristine_start;
        let mut end = node.pristine_end;

        // Never delete the segment's terminal newline.
        if ctx.segment_end > 0 && end >= ctx.segment_end {
            end = ctx.segment_end - 1;
        }
        // Never delete the newline before a table/TOC.
        if ctx.before_structural_element && end == node.pristine_end {
            end = node.pristine_end - 1;
        }

        if start >= end {
            return Vec::new();
        }

        vec![json!({ "deleteContentRange": { "range": ctx.range(start, end) } })]
    }

    // --- ADD ---

    fn add(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<(Vec<Value>, bool)> {
        let Some(after_xml) = node.after_xml.as_deref() else {
            return Ok((Vec::new(), false));
        };

        let segment_start = if ctx.segment_id.is_none() { 1 } else { 0 };
        let mut insert_idx = node.pristine_start;
        if insert_idx == 0 {
            insert_idx = segment_start;
        }
        if ctx.segment_end > 0 && insert_idx > ctx.segment_end - 1 {
            insert_idx = ctx.segment_end - 1;
        }

        let at_seg_end = ctx.segment_end > 0 && insert_idx >= ctx.segment_end - 1;
        let strip_for_seg_end = at_seg_end && !ctx.segment_end_consumed;
        let strip_nl = ctx.followed_by_added_table || strip_for_seg_end;
        let consumed = strip_for_seg_end && !ctx.inside_table_cell;

        let requests = self.content_insert_requests(after_xml, ctx, insert_idx, strip_nl, true)?;
        Ok((requests, consumed))
    }

    // --- MODIFY (delete-then-insert) ---

    fn modify(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<(Vec<Value>, bool)> {
        let mut requests: Vec<Value> = Vec::new();
        let mut consumed = false;
        let mut d_start = node.pristine_start;
        let mut d_end = node.pristine_start; // no delete by default

        if node.before_xml.is_some() && node.pristine_end > node.pristine_start {
            d_start = node.pristine_start;
            d_end = node.pristine_end;
            if ctx.segment_end > 0 && d_end >= ctx.segment_end {
                d_end = ctx.segment_end - 1;
            }
            if ctx.before_structural_element && d_end == node.pristine_end {
                d_end = node.pristine_end - 1;
            }
            if d_start < d_end {
                requests.push(json!({
                    "deleteContentRange": { "range": ctx.range(d_start, d_end) }
                }));
            }
        }

        if let Some(after_xml) = node.after_xml.as_deref() {
            let segment_start = if ctx.segment_id.is_none() { 1 } else { 0 };
            let mut insert_idx = node.pristine_start;
            if insert_idx == 0 {
                insert_idx = segment_start;
            }
            if ctx.segment_end > 0 && insert_idx > ctx.segment_end - 1 {
                insert_idx = ctx.segment_end - 1;
            }

            let at_seg_end = ctx.segment_end > 0 && insert_idx >= ctx.segment_end - 1;
            let strip_for_seg_end = at_seg_end && !ctx.segment_end_consumed;
            // A delete that reaches segment_end - 1 leaves the insert point
            // effectively at the segment end even though pristine indexes
            // don't reflect it yet.
            let deletes_to_seg_end =
                ctx.segment_end > 0 && d_start < d_end && d_end >= ctx.segment_end - 1;
            // When the delete was clamped to keep the newline before a
            // structural element, the insert must strip its own trailing
            // newline to avoid a ghost empty paragraph.
            let clamped_before_structural =
                ctx.before_structural_element && d_start < d_end && d_end < node.pristine_end;
            let strip_nl = ctx.followed_by_added_table
                || strip_for_seg_end
                || deletes_to_seg_end
                || clamped_before_structural;
            if strip_for_seg_end && !ctx.inside_table_cell {
                consumed = true;
            }

            requests
                .extend(self.content_insert_requests(after_xml, ctx, insert_idx, strip_nl, true)?);
        }

        Ok((requests, consumed))
    }

    // --- Insert request generation ---

    /// Generate the ordered insert-request sequence for content XML at
    /// `insert_index`.
    pub fn content_insert_requests(
        &self,
        xml_content: &str,
        ctx: &SegmentContext,
        insert_index: usize,
        strip_trailing_newline: bool,
        delete_existing_bullets: bool,
    ) -> Result<Vec<Value>> {
        if xml_content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut parsed = self.parse_content_block(xml_content)?;
        if strip_trailing_newline && parsed.plain_text.ends_with('\n') {
            parsed.plain_text.pop();
        }

        if parsed.plain_text.is_empty() && parsed.pagebreak_offsets.is_empty() {
            return Ok(Vec::new());
        }

        let mut requests: Vec<Value> = Vec::new();

        let mut pb_offsets = parsed.pagebreak_offsets.clone();
        pb_offsets.sort_unstable();

        // Each insertPageBreak adds 2 units (break + newline) before any
        // style request runs; footnote creation adds 1 per reference.
        let pb_shift = |offset: usize, inclusive: bool| -> usize {
            2 * count_at_or_before(&pb_offsets, offset, inclusive)
        };

        let location = |index: usize| ctx.location(insert_index + index);
        let range = |start: usize, end: usize| ctx.range(insert_index + start, insert_index + end);

        // 1. Plain text, then a full text-style reset over it so the insert
        //    never picks up formatting from the neighbor it lands next to.
        if !parsed.plain_text.is_empty() {
            requests.push(json!({
                "insertText": { "location": location(0), "text": parsed.plain_text }
            }));

            let text_len = utf16_len(&parsed.plain_text);
            requests.push(json!({
                "updateTextStyle": {
                    "range": range(0, text_len),
                    "textStyle": {
                        "bold": false,
                        "italic": false,
                        "underline": false,
                        "strikethrough": false,
                        "baselineOffset": "NONE",
                    },
                    "fields": "bold,italic,underline,strikethrough,baselineOffset",
                }
            }));
        }

        // 2. Page/column breaks, highest offset first so earlier inserts
        //    don't invalidate later offsets.
        let mut breaks: Vec<&SpecialElement> = parsed
            .specials
            .iter()
            .filter(|s| s.tag == "pagebreak" || s.tag == "columnbreak")
            .collect();
        breaks.sort_by(|a, b| b.offset.cmp(&a.offset));
        for special in breaks {
            if special.tag == "pagebreak" {
                requests.push(json!({
                    "insertPageBreak": { "location": location(special.offset) }
                }));
            } else {
                requests.push(json!({
                    "insertSectionBreak": {
                        "location": location(special.offset),
                        "sectionType": "CONTINUOUS",
                    }
                }));
            }
        }

        // 3. Footnote creation at inline positions, highest offset first.
        //    The placeholder id rides along for the push orchestrator.
        let mut footnote_specials: Vec<&SpecialElement> = parsed
            .specials
            .iter()
            .filter(|s| s.tag == "footnote")
            .collect();
        let mut fn_offsets: Vec<usize> = footnote_specials.iter().map(|s| s.offset).collect();
        fn_offsets.sort_unstable();
        footnote_specials.sort_by(|a, b| b.offset.cmp(&a.offset));

        for special in &footnote_specials {
            let placeholder = special.attrs.get("id").cloned().unwrap_or_default();
            let adj_offset = special.offset + pb_shift(special.offset, true);
            requests.push(json!({
                "createFootnote": { "location": location(adj_offset) },
                "_placeholderFootnoteId": placeholder,
            }));
        }

        let fn_shift = |offset: usize, inclusive: bool| -> usize {
            count_at_or_before(&fn_offsets, offset, inclusive)
        };

        let has_shifts = !pb_offsets.is_empty() || !fn_offsets.is_empty();
        let style_range = |start: usize, end: usize| -> Value {
            if has_shifts {
                ctx.range(
                    insert_index + start + pb_shift(start, true) + fn_shift(start, true),
                    insert_index + end + pb_shift(end, false) + fn_shift(end, false),
                )
            } else {
                ctx.range(insert_index + start, insert_index + end)
            }
        };

        // 4. Paragraph styles: full reset to the named style, then explicit
        //    overrides on top.
        for span in &parsed.paragraph_styles {
            requests.push(json!({
                "updateParagraphStyle": {
                    "range": style_range(span.start, span.end),
                    "paragraphStyle": { "namedStyleType": span.named_style },
                    "fields": PARA_RESET_FIELDS,
                }
            }));
        }

        // Page-break-only paragraphs inherit the insertion point's style;
        // reset them to NORMAL_TEXT.
        for &pb_offset in &pb_offsets {
            let shift = pb_shift(pb_offset, false) + fn_shift(pb_offset, false);
            let pb_start = pb_offset + shift;
            requests.push(json!({
                "updateParagraphStyle": {
                    "range": range(pb_start, pb_start + 2),
                    "paragraphStyle": { "namedStyleType": "NORMAL_TEXT" },
                    "fields": PARA_RESET_FIELDS,
                }
            }));
        }

        for para_props in &parsed.paragraph_props {
            let (para_style, fields) = convert_paragraph_styles(&para_props.props);
            if !para_style.is_empty() && !fields.is_empty() {
                requests.push(json!({
                    "updateParagraphStyle": {
                        "range": style_range(para_props.start, para_props.end),
                        "paragraphStyle": Value::Object(para_style),
                        "fields": fields.join(","),
                    }
                }));
            }
        }

        // 5. Bullets: one createParagraphBullets per contiguous run (separate
        //    calls merge server-side and can swallow the next paragraph).
        if !parsed.bullets.is_empty() {
            let mut bullet_groups: Vec<(usize, usize, &'static str)> = Vec::new();
            for bullet in &parsed.bullets {
                let preset = bullet_preset(&bullet.bullet_type);
                let merged = match bullet_groups.last_mut() {
                    // Contiguous with the previous run: extend, keep the
                    // first run's preset.
                    Some(group) if group.1 == bullet.start => {
                        group.1 = bullet.end;
                        true
                    }
                    _ => false,
                };
                if !merged {
                    bullet_groups.push((bullet.start, bullet.end, preset));
                }
            }
            for (start, end, preset) in bullet_groups {
                requests.push(json!({
                    "createParagraphBullets": {
                        "range": style_range(start, end),
                        "bulletPreset": preset,
                    }
                }));
            }
        }

        // Clear inherited list state on non-bullet paragraphs.
        if delete_existing_bullets {
            let bullet_ranges: Vec<(usize, usize)> =
                parsed.bullets.iter().map(|b| (b.start, b.end)).collect();
            for span in &parsed.paragraph_styles {
                if bullet_ranges.contains(&(span.start, span.end)) {
                    continue;
                }
                let mut span_end = span.end;
                if strip_trailing_newline {
                    let text_len = utf16_len(&parsed.plain_text);
                    if span.end > text_len {
                        span_end = text_len + 1;
                    }
                }
                requests.push(json!({
                    "deleteParagraphBullets": { "range": style_range(span.start, span_end) }
                }));
            }
        }

        // 6. Styled runs.
        for run in &parsed.text_styles {
            let (text_style, fields) = convert_text_styles(&run.styles);
            if !text_style.is_empty() && !fields.is_empty() {
                requests.push(json!({
                    "updateTextStyle": {
                        "range": style_range(run.start, run.end),
                        "textStyle": Value::Object(text_style),
                        "fields": fields.join(","),
                    }
                }));
            }
        }

        Ok(requests)
    }

    // --- Content parsing ---

    /// Parse content-block XML into [`ParsedContent`].
    pub fn parse_content_block(&self, xml_content: &str) -> Result<ParsedContent> {
        let wrapper = xml::parse_fragment(xml_content)?;
        let mut parsed = ParsedContent::default();
        let mut plain_text_parts: Vec<String> = Vec::new();
        let mut current_offset = 0usize;

        for para_elem in wrapper.child_elements() {
            let tag = para_elem.name.as_str();
            let para_start = current_offset;

            let named_style = named_style_for_tag(tag);
            let mut bullet_type: Option<String> = None;
            let mut bullet_level = 0usize;
            if tag == "li" {
                bullet_type = Some(para_elem.attr("type").unwrap_or("bullet").to_string());
                bullet_level = para_elem
                    .attr("level")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }

            let mut extract = Extractor {
                text: String::new(),
                specials: Vec::new(),
                runs: Vec::new(),
                offset: current_offset,
                style_defs: &self.style_defs,
            };
            extract.walk(&para_elem.children, &StyleProps::new());
            let Extractor {
                text: mut para_text,
                specials: mut para_specials,
                runs: mut para_runs,
                ..
            } = extract;

            // Nested bullets are indented with one tab per level.
            if bullet_level > 0 {
                let tabs = "\t".repeat(bullet_level);
                let tab_len = utf16_len(&tabs);
                para_text = format!("{tabs}{para_text}");
                for special in &mut para_specials {
                    special.offset += tab_len;
                }
                for run in &mut para_runs {
                    run.start += tab_len;
                    run.end += tab_len;
                }
            }

            // Page-break-only paragraphs: insertPageBreak provides its own
            // newline, so no text, no paragraph span, no offset advance.
            let is_pagebreak_only =
                para_text.is_empty() && para_specials.len() == 1 && para_specials[0].tag == "pagebreak";
            if is_pagebreak_only {
                parsed.specials.append(&mut para_specials);
                parsed.pagebreak_offsets.push(para_start);
                continue;
            }

            let para_end = current_offset + utf16_len(&para_text) + 1;

            parsed.specials.append(&mut para_specials);
            parsed.text_styles.append(&mut para_runs);
            parsed.paragraph_styles.push(ParagraphSpan {
                start: para_start,
                end: para_end,
                named_style: named_style.to_string(),
            });

            let mut para_props: StyleProps = para_elem
                .attrs
                .iter()
                .filter(|(k, _)| PARA_STYLE_ATTRS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            // Resolve the class attribute into paragraph and text styles.
            if let Some(class_name) = para_elem.attr("class") {
                if let Some(class_props) = self.style_defs.get(class_name) {
                    let mut text_class_styles = StyleProps::new();
                    for (prop, value) in class_props {
                        let mapped = if prop == "alignment" { "align" } else { prop.as_str() };
                        if PARA_STYLE_ATTRS.contains(&mapped) {
                            para_props
                                .entry(mapped.to_string())
                                .or_insert_with(|| value.clone());
                        } else if TEXT_CLASS_PROPS.contains(&prop.as_str()) {
                            text_class_styles.insert(prop.clone(), value.clone());
                        }
                    }
                    if !text_class_styles.is_empty() && !para_text.is_empty() {
                        let text_start = para_start + bullet_level;
                        let text_end = para_start + utf16_len(&para_text);
                        if text_start < text_end {
                            parsed.text_styles.push(StyledRun {
                                start: text_start,
                                end: text_end,
                                styles: text_class_styles,
                            });
                        }
                    }
                }
            }

            if !para_props.is_empty() {
                parsed.paragraph_props.push(ParagraphProps {
                    start: para_start,
                    end: para_end,
                    props: para_props,
                });
            }

            if let Some(bullet_type) = bullet_type {
                parsed.bullets.push(BulletSpan {
                    start: para_start,
                    end: para_end,
                    bullet_type,
                    level: bullet_level,
                });
            }

            plain_text_parts.push(para_text);
            current_offset = para_end;
        }

        parsed.plain_text = plain_text_parts.join("\n");
        if !plain_text_parts.is_empty() {
            parsed.plain_text.push('\n');
        }

        Ok(parsed)
    }
}

/// Count offsets at-or-before (`inclusive`) or strictly before the position.
fn count_at_or_before(offsets: &[usize], position: usize, inclusive: bool) -> usize {
    offsets
        .iter()
        .take_while(|&&o| if inclusive { o <= position } else { o < position })
        .count()
}

// ---------------------------------------------------------------------------
// Paragraph text extraction
// ---------------------------------------------------------------------------

struct Extractor<'a> {
    text: String,
    specials: Vec<SpecialElement>,
    runs: Vec<StyledRun>,
    offset: usize,
    style_defs: &'a BTreeMap<String, StyleProps>,
}

impl Extractor<'_> {
    fn walk(&mut self, children: &[XmlNode], styles: &StyleProps) {
        for node in children {
            match node {
                XmlNode::Text(text) => {
                    let len = utf16_len(text);
                    self.text.push_str(text);
                    let style_dict: StyleProps = styles
                        .iter()
                        .filter(|(_, v)| !v.is_empty())
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if !style_dict.is_empty() && len > 0 {
                        self.runs.push(StyledRun {
                            start: self.offset,
                            end: self.offset + len,
                            styles: style_dict,
                        });
                    }
                    self.offset += len;
                }
                XmlNode::Element(elem) => {
                    if SPECIAL_ELEMENT_TAGS.contains(&elem.name.as_str()) {
                        self.specials.push(SpecialElement {
                            offset: self.offset,
                            tag: elem.name.clone(),
                            attrs: elem
                                .attrs
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect(),
                        });
                    } else {
                        let child_styles = self.derive_styles(elem, styles);
                        self.walk(&elem.children, &child_styles);
                    }
                }
            }
        }
    }

    fn derive_styles(&self, elem: &XmlElement, inherited: &StyleProps) -> StyleProps {
        let mut styles = inherited.clone();
        if let Some(key) = inline_style_key(&elem.name) {
            styles.insert(key.to_string(), "1".to_string());
        } else if elem.name == "a" {
            if let Some(href) = elem.attr("href") {
                if !href.is_empty() {
                    styles.insert("link".to_string(), href.to_string());
                }
            }
        } else if elem.name == "span" {
            if let Some(class_name) = elem.attr("class") {
                if let Some(class_props) = self.style_defs.get(class_name) {
                    for (k, v) in class_props {
                        styles.insert(k.clone(), v.clone());
                    }
                }
            }
            for (attr, value) in &elem.attrs {
                if attr != "class" {
                    styles.insert(attr.clone(), value.clone());
                }
            }
        }
        styles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdoc_diff::NodeKind;

    fn generator() -> ContentGenerator {
        ContentGenerator::new(BTreeMap::new())
    }

    fn body_ctx(segment_end: usize) -> SegmentContext {
        SegmentContext {
            segment_id: None,
            segment_end,
            tab_id: "t".to_string(),
            ..Default::default()
        }
    }

    fn request_kind(request: &Value) -> &str {
        request
            .as_object()
            .expect("object")
            .keys()
            .find(|k| !k.starts_with('_'))
            .expect("kind")
    }

    #[test]
    fn parse_joins_paragraphs_with_newlines() {
        let parsed = generator()
            .parse_content_block("<p>one</p><p>two</p>")
            .expect("parse");
        assert_eq!(parsed.plain_text, "one\ntwo\n");
        assert_eq!(parsed.paragraph_styles.len(), 2);
        assert_eq!(parsed.paragraph_styles[0].start, 0);
        assert_eq!(parsed.paragraph_styles[0].end, 4);
        assert_eq!(parsed.paragraph_styles[1].start, 4);
        assert_eq!(parsed.paragraph_styles[1].end, 8);
    }

    #[test]
    fn parse_captures_inline_styles_with_offsets() {
        let parsed = generator()
            .parse_content_block("<p>a<b>bc</b>d</p>")
            .expect("parse");
        assert_eq!(parsed.plain_text, "abcd\n");
        assert_eq!(parsed.text_styles.len(), 1);
        let run = &parsed.text_styles[0];
        assert_eq!((run.start, run.end), (1, 3));
        assert_eq!(run.styles.get("bold").map(String::as_str), Some("1"));
    }

    #[test]
    fn parse_nested_styles_inherit() {
        let parsed = generator()
            .parse_content_block("<p><b>x<i>y</i></b></p>")
            .expect("parse");
        assert_eq!(parsed.text_styles.len(), 2);
        let inner = &parsed.text_styles[1];
        assert!(inner.styles.contains_key("bold"));
        assert!(inner.styles.contains_key("italic"));
    }

    #[test]
    fn parse_link_becomes_style() {
        let parsed = generator()
            .parse_content_block(r#"<p><a href="https://x.test">go</a></p>"#)
            .expect("parse");
        assert_eq!(
            parsed.text_styles[0].styles.get("link").map(String::as_str),
            Some("https://x.test")
        );
    }

    #[test]
    fn parse_bullets_prepend_level_tabs() {
        let parsed = generator()
            .parse_content_block(r#"<li type="bullet" level="2">item</li>"#)
            .expect("parse");
        assert_eq!(parsed.plain_text, "\t\titem\n");
        assert_eq!(parsed.bullets.len(), 1);
        assert_eq!(parsed.bullets[0].level, 2);
    }

    #[test]
    fn parse_pagebreak_only_paragraph_is_elided() {
        let parsed = generator()
            .parse_content_block("<p>a</p><p><pagebreak/></p><p>b</p>")
            .expect("parse");
        assert_eq!(parsed.plain_text, "a\nb\n");
        assert_eq!(parsed.pagebreak_offsets, vec![2]);
        assert_eq!(parsed.paragraph_styles.len(), 2);
    }

    #[test]
    fn parse_comment_refs_are_transparent() {
        let parsed = generator()
            .parse_content_block(r#"<p>a<comment-ref id="c">b</comment-ref>c</p>"#)
            .expect("parse");
        assert_eq!(parsed.plain_text, "abc\n");
        assert!(parsed.text_styles.is_empty());
    }

    #[test]
    fn delete_clamps_to_segment_end() {
        let node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op: ChangeOp::Deleted,
            before_xml: Some("<p>bye</p>".to_string()),
            pristine_start: 1,
            pristine_end: 5,
            ..Default::default()
        };
        let requests = generator().delete(&node, &body_ctx(5));
        assert_eq!(requests.len(), 1);
        let range = &requests[0]["deleteContentRange"]["range"];
        assert_eq!(range["startIndex"], json!(1));
        assert_eq!(range["endIndex"], json!(4));
    }

    #[test]
    fn delete_clamps_before_structural_element() {
        let node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: true,
            },
            op: ChangeOp::Deleted,
            before_xml: Some("<p>x</p>".to_string()),
            pristine_start: 1,
            pristine_end: 3,
            ..Default::default()
        };
        let ctx = SegmentContext {
            before_structural_element: true,
            ..body_ctx(20)
        };
        let requests = generator().delete(&node, &ctx);
        let range = &requests[0]["deleteContentRange"]["range"];
        assert_eq!(range["endIndex"], json!(2));
    }

    #[test]
    fn empty_clamped_delete_is_skipped() {
        let node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op: ChangeOp::Deleted,
            before_xml: Some("<p></p>".to_string()),
            pristine_start: 4,
            pristine_end: 5,
            ..Default::default()
        };
        let requests = generator().delete(&node, &body_ctx(5));
        assert!(requests.is_empty());
    }

    #[test]
    fn insert_emits_text_then_reset_then_paragraph_styles() {
        let ctx = body_ctx(2);
        let node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op: ChangeOp::Added,
            after_xml: Some("<h1>Title</h1>".to_string()),
            pristine_start: 1,
            pristine_end: 1,
            ..Default::default()
        };
        let (requests, _) = generator().emit(&node, &ctx).expect("emit");
        let kinds: Vec<&str> = requests.iter().map(request_kind).collect();
        assert_eq!(
            kinds,
            vec![
                "insertText",
                "updateTextStyle",
                "updateParagraphStyle",
                "deleteParagraphBullets"
            ]
        );
        // Insert at segment end strips the trailing newline.
        assert_eq!(requests[0]["insertText"]["text"], json!("Title"));
        let para = &requests[2]["updateParagraphStyle"];
        assert_eq!(para["paragraphStyle"]["namedStyleType"], json!("HEADING_1"));
        assert!(para["fields"]
            .as_str()
            .expect("fields")
            .starts_with("namedStyleType,"));
    }

    #[test]
    fn bullet_run_emits_single_create_request() {
        let ctx = body_ctx(20);
        let gen = generator();
        let requests = gen
            .content_insert_requests(
                concat!(
                    r#"<li type="bullet">a</li>"#,
                    r#"<li type="bullet">b</li>"#,
                    r#"<li type="bullet">c</li>"#
                ),
                &ctx,
                1,
                false,
                true,
            )
            .expect("generate");
        let bullet_requests: Vec<&Value> = requests
            .iter()
            .filter(|r| r.get("createParagraphBullets").is_some())
            .collect();
        assert_eq!(bullet_requests.len(), 1);
        let req = &bullet_requests[0]["createParagraphBullets"];
        assert_eq!(req["bulletPreset"], json!("BULLET_DISC_CIRCLE_SQUARE"));
        // Union of "a\n" "b\n" "c\n" → 0..6, shifted by insert index 1.
        assert_eq!(req["range"]["startIndex"], json!(1));
        assert_eq!(req["range"]["endIndex"], json!(7));
        // No deleteParagraphBullets for bullet paragraphs.
        assert!(requests
            .iter()
            .all(|r| r.get("deleteParagraphBullets").is_none()));
    }

    #[test]
    fn footnote_insert_carries_placeholder_and_shifts_styles() {
        let ctx = body_ctx(20);
        let gen = generator();
        let requests = gen
            .content_insert_requests(
                r#"<p>see<footnote id="f_new"><p>n</p></footnote><b>x</b></p>"#,
                &ctx,
                1,
                false,
                true,
            )
            .expect("generate");
        let footnote = requests
            .iter()
            .find(|r| r.get("createFootnote").is_some())
            .expect("createFootnote");
        assert_eq!(footnote["_placeholderFootnoteId"], json!("f_new"));
        // Placed after "see" at block offset 3 → absolute 4.
        assert_eq!(footnote["createFootnote"]["location"]["index"], json!(4));
        // The bold run after the reference shifts by one unit.
        let bold = requests
            .iter()
            .filter(|r| r.get("updateTextStyle").is_some())
            .find(|r| r["updateTextStyle"]["textStyle"]["bold"] == json!(true))
            .expect("bold run");
        // "seex" puts x at 3..4; footnote shift makes it 4..5; +1 insert index.
        assert_eq!(bold["updateTextStyle"]["range"]["startIndex"], json!(5));
        assert_eq!(bold["updateTextStyle"]["range"]["endIndex"], json!(6));
    }

    #[test]
    fn pagebreak_only_paragraph_generates_break_and_reset() {
        let ctx = body_ctx(20);
        let gen = generator();
        let requests = gen
            .content_insert_requests("<p>a</p><p><pagebreak/></p><p>b</p>", &ctx, 1, false, true)
            .expect("generate");
        assert_eq!(requests[0]["insertText"]["text"], json!("a\nb\n"));
        let page_break = requests
            .iter()
            .find(|r| r.get("insertPageBreak").is_some())
            .expect("insertPageBreak");
        assert_eq!(page_break["insertPageBreak"]["location"]["index"], json!(3));
        // The second text paragraph's style range shifts past the 2-unit break.
        let para_ranges: Vec<(i64, i64)> = requests
            .iter()
            .filter_map(|r| r.get("updateParagraphStyle"))
            .map(|p| {
                (
                    p["range"]["startIndex"].as_i64().expect("start"),
                    p["range"]["endIndex"].as_i64().expect("end"),
                )
            })
            .collect();
        // "a\n" at 1..3; the break paragraph at 3..5; "b\n" at 5..7.
        assert!(para_ranges.contains(&(1, 3)));
        assert!(para_ranges.contains(&(3, 5)));
        assert!(para_ranges.contains(&(5, 7)));
    }

    #[test]
    fn modify_deletes_then_inserts() {
        let ctx = body_ctx(7);
        let node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op: ChangeOp::Modified,
            before_xml: Some("<p>Hello</p>".to_string()),
            after_xml: Some("<p>World</p>".to_string()),
            pristine_start: 1,
            pristine_end: 7,
            ..Default::default()
        };
        let (requests, _) = generator().emit(&node, &ctx).expect("emit");
        let kinds: Vec<&str> = requests.iter().map(request_kind).collect();
        assert_eq!(kinds[0], "deleteContentRange");
        assert_eq!(kinds[1], "insertText");
        let range = &requests[0]["deleteContentRange"]["range"];
        assert_eq!(range["startIndex"], json!(1));
        assert_eq!(range["endIndex"], json!(6));
        // Delete reached segment_end - 1 → the insert strips its newline.
        assert_eq!(requests[1]["insertText"]["text"], json!("World"));
    }

    #[test]
    fn tab_id_is_stamped_into_locations_and_ranges() {
        let ctx = body_ctx(20);
        let gen = generator();
        let requests = gen
            .content_insert_requests("<p>x</p>", &ctx, 1, false, false)
            .expect("generate");
        assert_eq!(requests[0]["insertText"]["location"]["tabId"], json!("t"));
        assert_eq!(requests[1]["updateTextStyle"]["range"]["tabId"], json!("t"));
    }

    #[test]
    fn class_attribute_resolves_to_text_and_paragraph_styles() {
        let mut defs = BTreeMap::new();
        defs.insert(
            "c1".to_string(),
            StyleProps::from([
                ("bold".to_string(), "1".to_string()),
                ("alignment".to_string(), "CENTER".to_string()),
            ]),
        );
        let gen = ContentGenerator::new(defs);
        let parsed = gen
            .parse_content_block(r#"<p class="c1">hi</p>"#)
            .expect("parse");
        assert_eq!(parsed.paragraph_props.len(), 1);
        assert_eq!(
            parsed.paragraph_props[0].props.get("align").map(String::as_str),
            Some("CENTER")
        );
        assert_eq!(parsed.text_styles.len(), 1);
        assert_eq!(
            parsed.text_styles[0].styles.get("bold").map(String::as_str),
            Some("1")
        );
    }
}
