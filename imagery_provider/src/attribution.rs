//! Per-tile attribution, for servers which tell which data supplier covers which area.

use crate::tiling_scheme::Rectangle;

/// Text to be displayed on the map to credit the data supplier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credit {
    pub text: String,
    pub url: Option<String>,
}

impl Credit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
        }
    }
}

/// Area covered by a data supplier, within a range of zoom levels.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageArea {
    /// First zoom level covered, inclusive. Zoom levels start at 1.
    pub zoom_min: u32,
    /// Last zoom level covered, inclusive.
    pub zoom_max: u32,
    pub bbox: Rectangle,
}

impl CoverageArea {
    fn covers(&self, rectangle: &Rectangle, zoom: u32) -> bool {
        (self.zoom_min..=self.zoom_max).contains(&zoom) && self.bbox.intersects(rectangle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributionEntry {
    pub credit: Credit,
    pub coverage_areas: Vec<CoverageArea>,
}

/// Credits along with areas they apply to. Built once from the metadata, and queried for every
/// tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributionIndex {
    entries: Vec<AttributionEntry>,
}

impl AttributionIndex {
    pub fn new(entries: Vec<AttributionEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AttributionEntry] {
        &self.entries
    }

    /// Credits of all suppliers whose coverage intersects the `rectangle` at tile `level`.
    /// Order of the entries is kept, and every credit is listed once.
    pub fn credits_for(&self, rectangle: &Rectangle, level: u32) -> Vec<Credit> {
        // Coverage zoom levels are 1-based, tile levels are not.
        let zoom = level.saturating_add(1);

        let mut credits: Vec<Credit> = Vec::new();
        for entry in &self.entries {
            if entry
                .coverage_areas
                .iter()
                .any(|area| area.covers(rectangle, zoom))
                && !credits.contains(&entry.credit)
            {
                credits.push(entry.credit.clone());
            }
        }
        credits
    }
}
