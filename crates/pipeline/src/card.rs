//! Card content: the two fixed-width slot rows and the value totals.

use tradecard_core::tags::{tag_info, TagInfo};
use tradecard_core::types::{ItemCatalog, ItemId, ItemRecord, TagId, TradeAd, TradeSide};

use crate::icons::{Icon, IconMap};

/// Slots per side of the card.
pub const SLOT_COUNT: usize = 4;

/// One card position.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Item { id: ItemId, icon: Option<Icon> },
    Tag { id: TagId, tag: TagInfo, icon: Option<Icon> },
    Empty,
}

impl Slot {
    pub fn kind(&self) -> &'static str {
        match self {
            Slot::Item { .. } => "item",
            Slot::Tag { .. } => "tag",
            Slot::Empty => "empty",
        }
    }

    pub fn icon(&self) -> Option<&Icon> {
        match self {
            Slot::Item { icon, .. } | Slot::Tag { icon, .. } => icon.as_ref(),
            Slot::Empty => None,
        }
    }
}

/// A full side of the card, always exactly [`SLOT_COUNT`] wide.
pub type SlotRow = [Slot; SLOT_COUNT];

/// Truncate to [`SLOT_COUNT`] and fill the rest with [`Slot::Empty`].
pub fn pad(slots: impl IntoIterator<Item = Slot>) -> SlotRow {
    let mut slots = slots.into_iter();
    std::array::from_fn(|_| slots.next().unwrap_or(Slot::Empty))
}

fn item_slots<'a>(
    items: &'a [ItemId],
    icons: &'a IconMap<ItemId>,
) -> impl Iterator<Item = Slot> + 'a {
    items.iter().map(|id| Slot::Item {
        id: *id,
        icon: icons.get(id).cloned(),
    })
}

/// Offer row: items only.
pub fn offer_slots(side: &TradeSide, item_icons: &IconMap<ItemId>) -> SlotRow {
    pad(item_slots(&side.items, item_icons))
}

/// Request row: tags in supplied order, then items.
pub fn request_slots(
    side: &TradeSide,
    item_icons: &IconMap<ItemId>,
    tag_icons: &IconMap<TagId>,
) -> SlotRow {
    let tags = side.tags.iter().map(|id| Slot::Tag {
        id: *id,
        tag: tag_info(*id),
        icon: tag_icons.get(id).cloned(),
    });
    pad(tags.chain(item_slots(&side.items, item_icons)))
}

/// Summed value and RAP of each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeTotals {
    pub offer_value: i64,
    pub offer_rap: i64,
    pub request_value: i64,
    pub request_rap: i64,
}

/// Totals over every listed item, duplicates included. Items missing from
/// the catalog contribute zero.
pub fn compute_totals(ad: &TradeAd, catalog: &ItemCatalog) -> TradeTotals {
    let sum = |items: &[ItemId], pick: fn(&ItemRecord) -> i64| -> i64 {
        items
            .iter()
            .filter_map(|id| catalog.get(id))
            .map(pick)
            .sum()
    };

    TradeTotals {
        offer_value: sum(&ad.offer.items, ItemRecord::effective_value),
        offer_rap: sum(&ad.offer.items, ItemRecord::effective_rap),
        request_value: sum(&ad.request.items, ItemRecord::effective_value),
        request_rap: sum(&ad.request.items, ItemRecord::effective_rap),
    }
}

/// Everything the template needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub offer: SlotRow,
    pub request: SlotRow,
    pub totals: TradeTotals,
}

impl CardLayout {
    pub fn build(
        ad: &TradeAd,
        catalog: &ItemCatalog,
        item_icons: &IconMap<ItemId>,
        tag_icons: &IconMap<TagId>,
    ) -> Self {
        Self {
            offer: offer_slots(&ad.offer, item_icons),
            request: request_slots(&ad.request, item_icons, tag_icons),
            totals: compute_totals(ad, catalog),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn kinds(row: &SlotRow) -> Vec<&'static str> {
        row.iter().map(Slot::kind).collect()
    }

    fn item(id: ItemId) -> Slot {
        Slot::Item { id, icon: None }
    }

    #[test]
    fn pad_fills_short_rows() {
        for len in 0..=SLOT_COUNT {
            let row = pad((1..=len as u64).map(item));
            let filled = row.iter().filter(|s| **s != Slot::Empty).count();
            assert_eq!(filled, len);
            assert!(row[len..].iter().all(|s| *s == Slot::Empty));
        }
    }

    #[test]
    fn pad_truncates_long_rows() {
        let row = pad((1..=6).map(item));
        assert_eq!(row, [item(1), item(2), item(3), item(4)]);
    }

    #[test]
    fn request_puts_tags_before_items() {
        let side = TradeSide {
            items: vec![10, 11, 12],
            tags: vec![8, 999],
            robux: None,
        };
        let row = request_slots(&side, &IconMap::new(), &IconMap::new());
        assert_eq!(kinds(&row), ["tag", "tag", "item", "item"]);

        let Slot::Tag { tag, .. } = &row[1] else {
            panic!("expected tag slot");
        };
        assert_eq!(tag.label, "UNKNOWN");
    }

    #[test]
    fn offer_ignores_tags() {
        let side = TradeSide {
            items: vec![1],
            tags: vec![1, 2],
            robux: None,
        };
        let row = offer_slots(&side, &IconMap::new());
        assert_eq!(kinds(&row), ["item", "empty", "empty", "empty"]);
    }

    #[test]
    fn icons_attach_to_matching_slots() {
        let icon: Icon = Arc::from(&b"png"[..]);
        let mut icons = IconMap::new();
        icons.insert(2, icon.clone());

        let side = TradeSide {
            items: vec![1, 2],
            ..Default::default()
        };
        let row = offer_slots(&side, &icons);
        assert!(row[0].icon().is_none());
        assert_eq!(row[1].icon(), Some(&icon));
    }

    #[test]
    fn totals_fall_back_to_rap_and_skip_unknown_items() {
        let mut catalog = ItemCatalog::new();
        catalog.insert(
            1,
            ItemRecord {
                value: Some(10),
                ..Default::default()
            },
        );
        catalog.insert(
            2,
            ItemRecord {
                rap: Some(5),
                ..Default::default()
            },
        );

        let ad = TradeAd::from_value(&json!([
            1, 0, 1, "u",
            { "items": [1, 2, 404] },
            { "items": [2, 2] }
        ]))
        .unwrap();

        let totals = compute_totals(&ad, &catalog);
        assert_eq!(
            totals,
            TradeTotals {
                offer_value: 15,
                offer_rap: 5,
                request_value: 10,
                request_rap: 10,
            }
        );
    }

    #[test]
    fn layout_for_typical_ad() {
        let ad = TradeAd::from_value(&json!([
            1, 0, 1, "u",
            { "items": [1, 2] },
            { "items": [3], "tags": [1] }
        ]))
        .unwrap();

        let layout = CardLayout::build(&ad, &ItemCatalog::new(), &IconMap::new(), &IconMap::new());
        assert_eq!(kinds(&layout.offer), ["item", "item", "empty", "empty"]);
        assert_eq!(kinds(&layout.request), ["tag", "item", "empty", "empty"]);
        assert_eq!(layout.totals, TradeTotals::default());
    }
}
