use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppResult;
use crate::geodesy::LatLng;
use crate::store;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<bool>,
}

impl GeoFix {
    pub fn at(location: LatLng) -> Self {
        Self {
            lat: Some(location.lat),
            lng: Some(location.lng),
            addr: None,
        }
    }

    pub fn skip_address_check() -> Self {
        Self {
            addr: Some(false),
            ..Self::default()
        }
    }

    pub fn location(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }

    pub fn checks_address(&self) -> bool {
        self.addr.unwrap_or(true)
    }
}

/// Identifier → correction map, rewritten in full after every change so an
/// interrupted run keeps every answer given so far.
#[derive(Debug)]
pub struct GeoFixes {
    path: PathBuf,
    entries: IndexMap<String, GeoFix>,
}

impl GeoFixes {
    pub fn load(path: &Path) -> AppResult<Self> {
        let entries = if path.exists() {
            store::read_json(path)?
        } else {
            warn!(path = %path.display(), "geo-fix file missing; starting empty");
            IndexMap::new()
        };
        info!(path = %path.display(), entries = entries.len(), "geo fixes loaded");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, id: &str) -> Option<&GeoFix> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, id: &str, fix: GeoFix) -> AppResult<()> {
        info!(id, ?fix, "recording geo fix");
        self.entries.insert(id.to_string(), fix);
        store::write_json(&self.path, &self.entries)
    }
}
