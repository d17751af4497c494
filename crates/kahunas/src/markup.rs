//! Minimal HTML scanning for the day-preview widget.
//!
//! The markup dialect is narrow (nested `<div>`/`<table>` blocks carrying
//! `data-*` attributes), so blocks are matched by counting open and close
//! tags instead of building a DOM. Every function degrades gracefully on
//! malformed input.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static DIV_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("valid div regex"));

static TABLE_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").expect("valid table regex"));

static DAY_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<div\b[^>]*\bid\s*=\s*["']day_content_(\d+)["'][^>]*>"#)
        .expect("valid day content regex")
});

static DATA_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bdata-([a-z0-9_\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid data attribute regex")
});

/// Entities decoded in attribute values, applied in this order
const ENTITIES: [(&str, &str); 7] = [
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
];

pub fn decode_entities(value: &str) -> String {
    ENTITIES
        .iter()
        .fold(value.to_string(), |acc, (entity, ch)| acc.replace(entity, ch))
}

/// Return the balanced block opened at `start`, counting nested tags matched by `tags`.
///
/// Unclosed blocks yield the rest of the input.
fn extract_balanced_block<'a>(html: &'a str, start: usize, tags: &Regex) -> &'a str {
    let Some(rest) = html.get(start..) else {
        return "";
    };

    let mut depth = 0usize;
    for caps in tags.captures_iter(rest) {
        let Some(whole) = caps.get(0) else { continue };
        let closing = caps.get(1).is_some_and(|c| !c.as_str().is_empty());
        if closing {
            if depth == 0 {
                // Stray close before any open; keep scanning
                continue;
            }
            depth -= 1;
            if depth == 0 {
                return &rest[..whole.end()];
            }
        } else {
            depth += 1;
        }
    }

    rest
}

/// Extract the `<div>` block whose opening tag starts at `start`
pub fn extract_div_block(html: &str, start: usize) -> &str {
    extract_balanced_block(html, start, &DIV_TAGS)
}

/// Extract the `<table>` block whose opening tag starts at `start`
pub fn extract_table_block(html: &str, start: usize) -> &str {
    extract_balanced_block(html, start, &TABLE_TAGS)
}

/// Byte offset of the last `<div` at or before `pos`, ignoring case
fn enclosing_div_start(html: &str, pos: usize) -> Option<usize> {
    let head = html.get(..pos)?.to_ascii_lowercase();
    head.rfind("<div")
}

/// Extract the div enclosing the first occurrence of `class_name`
pub fn extract_section_html<'a>(html: &'a str, class_name: &str) -> Option<&'a str> {
    let marker = html.find(class_name)?;
    let start = enclosing_div_start(html, marker)?;
    Some(extract_div_block(html, start))
}

/// One `<div id="day_content_N">` block of the preview widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBlock<'a> {
    pub index: usize,
    /// The opening `<div ...>` tag
    pub open_tag: &'a str,
    pub html: &'a str,
    pub offset: usize,
}

impl DayBlock<'_> {
    /// Whether the tab is the one shown (`display:block` inline style)
    pub fn is_visible(&self) -> bool {
        extract_attribute(self.open_tag, "style")
            .map(|style| {
                style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase()
                    .contains("display:block")
            })
            .unwrap_or(false)
    }
}

/// Find every day block, in document order. A repeated index keeps its first block.
pub fn extract_workout_day_blocks(html: &str) -> Vec<DayBlock<'_>> {
    let mut blocks: Vec<DayBlock<'_>> = Vec::new();

    for caps in DAY_CONTENT.captures_iter(html) {
        let (Some(open), Some(num)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(index) = num.as_str().parse::<usize>() else {
            continue;
        };
        if blocks.iter().any(|b| b.index == index) {
            continue;
        }
        blocks.push(DayBlock {
            index,
            open_tag: open.as_str(),
            html: extract_div_block(html, open.start()),
            offset: open.start(),
        });
    }

    blocks
}

/// Choose the day block to parse.
///
/// Precedence: exact index, index - 1, the only block, the visible block,
/// then the first block.
pub fn select_workout_day_block<'b, 'a>(
    blocks: &'b [DayBlock<'a>],
    day_index: Option<usize>,
) -> Option<&'b DayBlock<'a>> {
    if let Some(index) = day_index {
        if let Some(block) = blocks.iter().find(|b| b.index == index) {
            return Some(block);
        }
        if let Some(prev) = index.checked_sub(1) {
            if let Some(block) = blocks.iter().find(|b| b.index == prev) {
                return Some(block);
            }
        }
    }

    if blocks.len() == 1 {
        return blocks.first();
    }

    blocks
        .iter()
        .find(|b| b.is_visible())
        .or_else(|| blocks.first())
}

/// All `data-*` attributes of one tag, keys lower-cased, values entity-decoded
pub fn extract_data_attributes(tag: &str) -> BTreeMap<String, String> {
    DATA_ATTR
        .captures_iter(tag)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((key, decode_entities(value)))
        })
        .collect()
}

/// A single named attribute of one tag, entity-decoded
pub fn extract_attribute(tag: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#"(?i)(?:^|[\s<])(?:{})\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(tag)?;
    let value = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(decode_entities(value))
}

/// Opening tags `<name ...>` with their byte offsets
pub fn find_open_tags<'a>(html: &'a str, name: &str) -> Vec<(usize, &'a str)> {
    let pattern = format!(r"(?i)<{}\b[^>]*>", regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.find_iter(html).map(|m| (m.start(), m.as_str())).collect()
}
