use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::{AppError, AppResult};

pub type RawRow = Vec<Option<String>>;

pub const COL_ID: usize = 0;
pub const COL_CATEGORY: usize = 1;
pub const COL_CITY: usize = 2;
pub const COL_NAME: usize = 3;
pub const COL_ADDRESS: usize = 5;
pub const COL_WEBSITE: usize = 7;
pub const DETAIL_COLUMNS: [usize; 3] = [6, 7, 8];
pub const NOTE_COLUMNS: std::ops::Range<usize> = 9..12;

pub const WEBSITE_PLACEHOLDER: &str = "HP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Listing {
    cells: Vec<String>,
}

impl Listing {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn from_raw(raw: RawRow) -> Self {
        Self {
            cells: raw.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn set_cell(&mut self, index: usize, value: impl Into<String>) {
        if self.cells.len() <= index {
            self.cells.resize(index + 1, String::new());
        }
        self.cells[index] = value.into();
    }

    pub fn id(&self) -> &str {
        self.cell(COL_ID)
    }

    pub fn category(&self) -> &str {
        self.cell(COL_CATEGORY)
    }

    pub fn city(&self) -> &str {
        self.cell(COL_CITY)
    }

    pub fn name(&self) -> &str {
        self.cell(COL_NAME)
    }

    pub fn address(&self) -> &str {
        self.cell(COL_ADDRESS)
    }

    pub fn website(&self) -> &str {
        self.cell(COL_WEBSITE)
    }

    pub fn number(&self) -> AppResult<u64> {
        self.id().trim().parse::<u64>().map_err(|_| {
            AppError::Integrity(format!("identifier {:?} is not a number", self.id()))
        })
    }

    pub fn dedupe_key(&self) -> (&str, &str) {
        (self.city(), self.name())
    }

    pub fn name_query(&self) -> String {
        format!("{} {}", self.city(), self.name())
    }

    pub fn address_query(&self, prefecture: &str) -> String {
        format!("{prefecture}{}", self.address())
    }
}

/// A listing with its resolved position. `distance_m` is the gap between the
/// name and address candidates, or zero when no cross-check ran.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedListing {
    pub listing: Listing,
    pub lat: f64,
    pub lng: f64,
    pub distance_m: f64,
}

impl Serialize for GeocodedListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cells = self.listing.cells();
        let mut seq = serializer.serialize_seq(Some(cells.len() + 3))?;
        for cell in cells {
            seq.serialize_element(cell)?;
        }
        seq.serialize_element(&self.lat)?;
        seq.serialize_element(&self.lng)?;
        seq.serialize_element(&self.distance_m)?;
        seq.end()
    }
}

#[cfg(test)]
pub(crate) fn listing(id: &str, category: &str, city: &str, name: &str) -> Listing {
    let mut cells = vec![String::new(); 12];
    cells[COL_ID] = id.to_string();
    cells[COL_CATEGORY] = category.to_string();
    cells[COL_CITY] = city.to_string();
    cells[COL_NAME] = name.to_string();
    cells[COL_ADDRESS] = format!("{city}1-{id}");
    Listing::new(cells)
}
