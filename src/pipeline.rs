use std::fs;

use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::extract::{self, TableSource};
use crate::fixes::GeoFixes;
use crate::geocode::{OperatorPrompt, ResolutionStats, Resolver, ResolverSettings};
use crate::geodesy::{LatLng, MarkerOffset};
use crate::kml::KmlRenderer;
use crate::listing::{GeocodedListing, Listing};
use crate::normalize::{self, NormalizationStats};
use crate::places::PlacesService;
use crate::store;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows_extracted: usize,
    pub links_substituted: usize,
    pub duplicates_removed: usize,
    pub rows_geocoded: usize,
    pub geocoding: ResolutionStats,
    pub documents_written: usize,
    pub markers_written: usize,
}

impl RunSummary {
    fn new(
        normalization: NormalizationStats,
        geocoding: ResolutionStats,
        rows_geocoded: usize,
        documents_written: usize,
        markers_written: usize,
    ) -> Self {
        Self {
            rows_extracted: normalization.input_rows,
            links_substituted: normalization.links_substituted,
            duplicates_removed: normalization.duplicates_removed,
            rows_geocoded,
            geocoding,
            documents_written,
            markers_written,
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    places: PlacesService,
    prompt: &'a mut dyn OperatorPrompt,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a AppConfig,
        places: PlacesService,
        prompt: &'a mut dyn OperatorPrompt,
    ) -> Self {
        Self {
            config,
            places,
            prompt,
        }
    }

    pub async fn run(&mut self, source: &dyn TableSource) -> AppResult<RunSummary> {
        let config = self.config;
        fs::create_dir_all(&config.results_dir)?;
        fs::create_dir_all(&config.geo_cache_dir)?;

        let links = source.hyperlinks()?;
        info!(links = links.len(), "hyperlinks collected");

        let raw = extract::load_rows(&config.table_cache_path(), source)?;
        let listings = raw.into_iter().map(Listing::from_raw).collect();
        let (listings, normalization) = normalize::normalize(listings, &links)?;

        let mut fixes = GeoFixes::load(&config.geo_fix_path)?;
        let settings = ResolverSettings {
            prefecture: config.prefecture.clone(),
            mismatch_warn_m: config.address_mismatch_warn_meters,
        };
        let mut resolver = Resolver::new(&self.places, &mut fixes, &mut *self.prompt, settings);
        let mut rows = resolver.resolve_all(listings).await?;
        let geocoding = resolver.stats().clone();

        store::write_json(&config.geocoded_rows_path(), &rows)?;
        info!(path = %config.geocoded_rows_path().display(), rows = rows.len(), "geocoded rows written");

        apply_offset(&mut rows, MarkerOffset::north(config.marker_offset_meters));

        let renderer = KmlRenderer::new(config.kml_title.clone(), config.prefecture.clone());
        let layers = renderer.write_all(&rows, &config.results_dir)?;
        let markers_written = layers.iter().map(|layer| layer.markers).sum();

        let summary = RunSummary::new(
            normalization,
            geocoding,
            rows.len(),
            layers.len(),
            markers_written,
        );
        info!(?summary, "run complete");
        Ok(summary)
    }
}

pub fn apply_offset(rows: &mut [GeocodedListing], offset: MarkerOffset) {
    for row in rows.iter_mut() {
        let moved = offset.apply(LatLng::new(row.lat, row.lng));
        row.lat = moved.lat;
        row.lng = moved.lng;
    }
}
