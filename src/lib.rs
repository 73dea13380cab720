mod config;
mod errors;
mod extract;
mod fixes;
mod geocode;
mod geodesy;
mod kml;
mod listing;
mod normalize;
mod pipeline;
mod places;
mod secrets;
mod store;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::{AppConfig, PublicAppConfig, DEFAULT_PLACES_ENDPOINT};
pub use errors::{AppError, AppResult};
pub use extract::{extract_rows, load_rows, PdfTableSource, TableSource, HEADER_ROWS};
pub use fixes::{GeoFix, GeoFixes};
pub use geocode::{
    parse_lat_lng, ConsolePrompt, OperatorPrompt, Prompt, ResolutionStats, Resolver,
    ResolverSettings,
};
pub use geodesy::{distance_m, LatLng, MarkerOffset};
pub use kml::{group_by_category, KmlDocument, KmlRenderer, WrittenLayer};
pub use listing::{GeocodedListing, Listing, RawRow, WEBSITE_PLACEHOLDER};
pub use normalize::{normalize, NormalizationStats};
pub use pipeline::{apply_offset, Pipeline, RunSummary};
pub use places::{
    FindPlaceResponse, HttpPlacesClient, Lookup, PlaceCandidate, PlaceLookup, PlacesService,
};
pub use secrets::{load_api_key, resolve_api_key};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,listing_geocoder=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    });
}
