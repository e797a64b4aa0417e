//! Static trade tag table.
//!
//! Tags are the non-item wishes a trader can attach to the request side
//! ("any", "demand", "upgrade", ...). Each has a label, an accent color and
//! a hosted icon.

use serde::Serialize;

use crate::types::TagId;

/// Display data for a trade tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagInfo {
    pub label: &'static str,
    pub color: &'static str,
    /// `None` only for the unknown-tag placeholder.
    pub image_url: Option<&'static str>,
}

/// Placeholder returned for ids missing from the table.
pub const UNKNOWN_TAG: TagInfo = TagInfo {
    label: "UNKNOWN",
    color: "#555",
    image_url: None,
};

const TAGS: &[(TagId, TagInfo)] = &[
    (1, tag("ANY", "#22c55e", "https://www.rolimons.com/images/tradetagany-420.png")),
    (2, tag("DEMAND", "#7c3aed", "https://www.rolimons.com/images/tradetagdemand-420.png")),
    (4, tag("RARES", "#10b981", "https://www.rolimons.com/images/tradetagrares-420.png")),
    (5, tag("RAP", "#22c55e", "https://www.rolimons.com/images/tradetagrap-420.png")),
    (6, tag("WISHLIST", "#3b82f6", "https://www.rolimons.com/images/tradetagwishlist-420.png")),
    (7, tag("ROBUX", "#6366f1", "https://www.rolimons.com/images/tradetagrobux-420.png")),
    (8, tag("UPGRADE", "#ef4444", "https://www.rolimons.com/images/tradetagupgrade-420.png")),
    (9, tag("DOWNGRADES", "#f59e0b", "https://www.rolimons.com/images/tradetagdowngrade-420.png")),
    (10, tag("ADDS", "#f59e0b", "https://www.rolimons.com/images/tradetagadds-420.png")),
];

const fn tag(label: &'static str, color: &'static str, url: &'static str) -> TagInfo {
    TagInfo {
        label,
        color,
        image_url: Some(url),
    }
}

/// Look up a tag, falling back to [`UNKNOWN_TAG`].
pub fn tag_info(id: TagId) -> TagInfo {
    TAGS.iter()
        .find(|(tag_id, _)| *tag_id == id)
        .map(|(_, info)| *info)
        .unwrap_or(UNKNOWN_TAG)
}
