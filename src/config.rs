use std::path::{Path, PathBuf};
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_PLACES_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/place/findplacefromtext/json";
const DEFAULT_PREFECTURE: &str = "長野県";
const DEFAULT_KML_TITLE: &str = "信州割クーポン対象店舗";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pdf_path: PathBuf,
    pub results_dir: PathBuf,
    pub geo_cache_dir: PathBuf,
    pub geo_fix_path: PathBuf,
    pub api_key_path: PathBuf,
    pub google_places_api_key: Option<SecretString>,
    pub places_endpoint: String,
    pub places_request_delay_ms: u64,
    pub places_language: String,
    pub prefecture: String,
    pub marker_offset_meters: f64,
    pub address_mismatch_warn_meters: f64,
    pub kml_title: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub pdf_path: String,
    pub results_dir: String,
    pub geo_cache_dir: String,
    pub geo_fix_path: String,
    pub places_endpoint: String,
    pub places_request_delay_ms: u64,
    pub places_language: String,
    pub prefecture: String,
    pub marker_offset_meters: f64,
    pub address_mismatch_warn_meters: f64,
    pub has_google_places_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            pdf_path: parse_path("LISTING_PDF_PATH", "./list-k-adv.pdf"),
            results_dir: parse_path("RESULTS_DIR", "./results"),
            geo_cache_dir: parse_path("GEO_CACHE_DIR", "./geo"),
            geo_fix_path: parse_path("GEO_FIX_PATH", "./geo-fix_updated.json"),
            api_key_path: parse_path("API_KEY_PATH", "./apikey.json"),
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::new(v.into())),
            places_endpoint: env::var("PLACES_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PLACES_ENDPOINT.to_string()),
            places_request_delay_ms: parse_u64("PLACES_REQUEST_DELAY_MS", 200),
            places_language: parse_string("PLACES_LANGUAGE", "ja"),
            prefecture: parse_string("PREFECTURE_NAME", DEFAULT_PREFECTURE),
            marker_offset_meters: parse_f64("MARKER_OFFSET_METERS", 3.0),
            address_mismatch_warn_meters: parse_f64("ADDRESS_MISMATCH_WARN_METERS", 500.0),
            kml_title: parse_string("KML_TITLE", DEFAULT_KML_TITLE),
        }
    }

    pub fn rooted_at(root: &Path) -> Self {
        Self {
            pdf_path: root.join("list-k-adv.pdf"),
            results_dir: root.join("results"),
            geo_cache_dir: root.join("geo"),
            geo_fix_path: root.join("geo-fix_updated.json"),
            api_key_path: root.join("apikey.json"),
            google_places_api_key: None,
            places_endpoint: DEFAULT_PLACES_ENDPOINT.to_string(),
            places_request_delay_ms: 200,
            places_language: "ja".to_string(),
            prefecture: DEFAULT_PREFECTURE.to_string(),
            marker_offset_meters: 3.0,
            address_mismatch_warn_meters: 500.0,
            kml_title: DEFAULT_KML_TITLE.to_string(),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            pdf_path: self.pdf_path.display().to_string(),
            results_dir: self.results_dir.display().to_string(),
            geo_cache_dir: self.geo_cache_dir.display().to_string(),
            geo_fix_path: self.geo_fix_path.display().to_string(),
            places_endpoint: self.places_endpoint.clone(),
            places_request_delay_ms: self.places_request_delay_ms,
            places_language: self.places_language.clone(),
            prefecture: self.prefecture.clone(),
            marker_offset_meters: self.marker_offset_meters,
            address_mismatch_warn_meters: self.address_mismatch_warn_meters,
            has_google_places_key: self.google_places_api_key.is_some(),
        }
    }

    pub fn table_cache_path(&self) -> PathBuf {
        self.results_dir.join("table_values.json")
    }

    pub fn geocoded_rows_path(&self) -> PathBuf {
        self.results_dir.join("data.json")
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn parse_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(parse_string(key, default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_public_profile_without_secrets() {
        env::set_var("GOOGLE_PLACES_API_KEY", "secret");
        env::set_var("RESULTS_DIR", "/tmp/out");
        env::set_var("PLACES_REQUEST_DELAY_MS", "50");
        env::set_var("MARKER_OFFSET_METERS", "not-a-number");

        let config = AppConfig::from_env();
        let public = config.public_profile();

        assert_eq!(public.results_dir, "/tmp/out");
        assert_eq!(public.places_request_delay_ms, 50);
        assert_eq!(public.marker_offset_meters, 3.0);
        assert!(public.has_google_places_key);
        assert!(config.google_places_api_key.is_some());
        assert_eq!(
            config.table_cache_path(),
            PathBuf::from("/tmp/out").join("table_values.json")
        );
        let rendered = serde_json::to_string(&public).unwrap();
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn rooted_config_keeps_artifacts_together() {
        let root = Path::new("/data/run");
        let config = AppConfig::rooted_at(root);
        assert_eq!(config.geocoded_rows_path(), root.join("results").join("data.json"));
        assert_eq!(config.geo_fix_path, root.join("geo-fix_updated.json"));
        assert!(config.google_places_api_key.is_none());
    }
}
