//! SVG card template.
//!
//! The template is plain SVG text with `{{name}}` placeholders:
//!
//! | placeholder | content |
//! |---|---|
//! | `offerItems`, `requestItems` | the four slot cards of each side |
//! | `offerValue`, `offerRap`, `requestValue`, `requestRap` | comma-grouped totals |
//! | `offerStatsX`, `requestStatsX` | horizontal centre of each slot row |
//!
//! Every occurrence of a placeholder is replaced.

use std::fmt::Write as _;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::card::{CardLayout, Slot, SlotRow};
use crate::error::PipelineError;

/// Built-in template used when no override path is configured.
pub const DEFAULT_TEMPLATE: &str = include_str!("../assets/trade_card.svg");

pub const OFFER_START_X: u32 = 60;
pub const REQUEST_START_X: u32 = 640;
pub const SLOT_Y: u32 = 70;
pub const SLOT_STRIDE: u32 = 140;
pub const CARD_SIZE: u32 = 120;

const CARD_RADIUS: u32 = 14;
const CARD_FILL: &str = "#2a2f36";
const ICON_INSET: u32 = 10;
const ICON_SIZE: u32 = 100;

/// Read the template at `path`, or return the built-in one.
pub fn load_template(path: Option<&Path>) -> Result<String, PipelineError> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| PipelineError::Template {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Format with `,` thousands separators: `1234567` -> `"1,234,567"`.
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Horizontal centre of a row of `count` slots starting at `start_x`.
pub fn center_x(start_x: u32, count: usize) -> u32 {
    if count == 0 {
        return 0;
    }
    let last_right = start_x + (count as u32 - 1) * SLOT_STRIDE + CARD_SIZE;
    start_x + (last_right - start_x) / 2
}

fn render_row(row: &SlotRow, start_x: u32) -> String {
    let mut out = String::new();
    for (i, slot) in row.iter().enumerate() {
        let x = start_x + i as u32 * SLOT_STRIDE;
        render_slot(&mut out, slot, x, SLOT_Y);
    }
    out
}

fn render_slot(out: &mut String, slot: &Slot, x: u32, y: u32) {
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        r#"<g transform="translate({x}, {y})"><rect width="{CARD_SIZE}" height="{CARD_SIZE}" rx="{CARD_RADIUS}" fill="{CARD_FILL}"/>"#
    );
    if let Some(icon) = slot.icon() {
        let _ = write!(
            out,
            r#"<image href="data:image/png;base64,{}" x="{ICON_INSET}" y="{ICON_INSET}" width="{ICON_SIZE}" height="{ICON_SIZE}" preserveAspectRatio="xMidYMid meet"/>"#,
            STANDARD.encode(icon)
        );
    }
    out.push_str("</g>");
}

/// Substitute every placeholder in `template` for `layout`.
pub fn render_svg(template: &str, layout: &CardLayout) -> String {
    let totals = &layout.totals;
    let replacements = [
        ("offerItems", render_row(&layout.offer, OFFER_START_X)),
        ("requestItems", render_row(&layout.request, REQUEST_START_X)),
        ("offerValue", format_number(totals.offer_value)),
        ("offerRap", format_number(totals.offer_rap)),
        ("requestValue", format_number(totals.request_value)),
        ("requestRap", format_number(totals.request_rap)),
        ("offerStatsX", center_x(OFFER_START_X, layout.offer.len()).to_string()),
        ("requestStatsX", center_x(REQUEST_START_X, layout.request.len()).to_string()),
    ];

    let mut svg = template.to_string();
    for (name, value) in replacements {
        svg = svg.replace(&format!("{{{{{name}}}}}"), &value);
    }
    svg
}
