use std::io::{self, BufRead, Write};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::fixes::{GeoFix, GeoFixes};
use crate::geodesy::{distance_m, LatLng};
use crate::listing::{GeocodedListing, Listing};
use crate::places::{Lookup, PlaceCandidate, PlacesService};

const CONFIRM: &str = "y";

#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    ConfirmMissingAddress {
        listing: &'a Listing,
        candidate: LatLng,
    },
    ManualLocation {
        listing: &'a Listing,
        hint: Option<LatLng>,
    },
}

impl Prompt<'_> {
    pub fn listing(&self) -> &Listing {
        match self {
            Prompt::ConfirmMissingAddress { listing, .. } | Prompt::ManualLocation { listing, .. } => {
                *listing
            }
        }
    }
}

pub trait OperatorPrompt: Send {
    fn ask(&mut self, prompt: &Prompt<'_>) -> AppResult<String>;
}

#[derive(Default)]
pub struct ConsolePrompt;

impl OperatorPrompt for ConsolePrompt {
    fn ask(&mut self, prompt: &Prompt<'_>) -> AppResult<String> {
        let mut stdout = io::stdout().lock();
        let listing = prompt.listing();
        writeln!(
            stdout,
            "No.{} {} {} {}",
            listing.id(),
            listing.city(),
            listing.name(),
            listing.address()
        )?;
        match prompt {
            Prompt::ConfirmMissingAddress { candidate, .. } => {
                writeln!(stdout, "({}, {})", candidate.lat, candidate.lng)?;
                write!(stdout, "address not found. ignore? [\"y\" or lat,lng]: ")?;
            }
            Prompt::ManualLocation { hint, .. } => {
                if let Some(hint) = hint {
                    writeln!(stdout, "({}, {})", hint.lat, hint.lng)?;
                }
                write!(stdout, "Lat,Lng: ")?;
            }
        }
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Parses operator input of the form `lat,lng`. Exactly two components, both
/// non-zero; anything else is rejected without retry.
pub fn parse_lat_lng(text: &str) -> AppResult<LatLng> {
    let values = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| AppError::OperatorInput(format!("{text:?} is not lat,lng")))
        })
        .collect::<AppResult<Vec<_>>>()?;
    match values.as_slice() {
        [lat, lng] if *lat != 0.0 && *lng != 0.0 => Ok(LatLng::new(*lat, *lng)),
        [_, _] => Err(AppError::OperatorInput(format!(
            "{text:?} contains a zero coordinate"
        ))),
        _ => Err(AppError::OperatorInput(format!(
            "{text:?} must have exactly two values"
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub total_rows: usize,
    pub overrides: usize,
    pub cache_hits: usize,
    pub places_calls: usize,
    pub cross_checked: usize,
    pub prompts: usize,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub prefecture: String,
    pub mismatch_warn_m: f64,
}

pub struct Resolver<'a> {
    places: &'a PlacesService,
    fixes: &'a mut GeoFixes,
    prompt: &'a mut dyn OperatorPrompt,
    settings: ResolverSettings,
    stats: ResolutionStats,
}

impl<'a> Resolver<'a> {
    pub fn new(
        places: &'a PlacesService,
        fixes: &'a mut GeoFixes,
        prompt: &'a mut dyn OperatorPrompt,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            places,
            fixes,
            prompt,
            settings,
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    pub async fn resolve_all(&mut self, rows: Vec<Listing>) -> AppResult<Vec<GeocodedListing>> {
        let mut resolved = Vec::with_capacity(rows.len());
        for listing in rows {
            resolved.push(self.resolve(listing).await?);
        }
        info!(
            total = self.stats.total_rows,
            overrides = self.stats.overrides,
            places_calls = self.stats.places_calls,
            cache_hits = self.stats.cache_hits,
            prompts = self.stats.prompts,
            "geocoding finished"
        );
        Ok(resolved)
    }

    pub async fn resolve(&mut self, listing: Listing) -> AppResult<GeocodedListing> {
        self.stats.total_rows += 1;
        debug!(
            id = listing.id(),
            city = listing.city(),
            name = listing.name(),
            address = listing.address(),
            "resolving"
        );

        let fix = self.fixes.get(listing.id()).cloned();
        if let Some(location) = fix.as_ref().and_then(GeoFix::location) {
            self.stats.overrides += 1;
            return Ok(positioned(listing, location, 0.0));
        }
        let check_address = fix.map_or(true, |fix| fix.checks_address());

        let by_name = self.places.by_name(&listing).await?;
        self.count(&by_name);
        let by_address = if check_address {
            let lookup = self.places.by_address(&listing, &self.settings.prefecture).await?;
            self.count(&lookup);
            Some(lookup)
        } else {
            None
        };

        let top = by_name.top().map(PlaceCandidate::location);
        let accepted = by_name
            .top()
            .filter(|candidate| self.accepts(&listing, candidate))
            .map(PlaceCandidate::location);

        let Some(location) = accepted else {
            let answer = self.ask(&Prompt::ManualLocation {
                listing: &listing,
                hint: top,
            })?;
            let location = parse_lat_lng(&answer)?;
            self.fixes.record(listing.id(), GeoFix::at(location))?;
            return Ok(positioned(listing, location, 0.0));
        };

        let Some(by_address) = by_address else {
            return Ok(positioned(listing, location, 0.0));
        };

        match by_address.top().map(PlaceCandidate::location) {
            Some(address_location) => {
                self.stats.cross_checked += 1;
                let distance = distance_m(location, address_location);
                debug!(id = listing.id(), ?location, ?address_location, distance, "cross-checked");
                if distance > self.settings.mismatch_warn_m {
                    warn!(
                        id = listing.id(),
                        distance,
                        "name and address candidates are far apart"
                    );
                }
                Ok(positioned(listing, location, distance))
            }
            None => {
                let answer = self.ask(&Prompt::ConfirmMissingAddress {
                    listing: &listing,
                    candidate: location,
                })?;
                if answer.trim() == CONFIRM {
                    self.fixes
                        .record(listing.id(), GeoFix::skip_address_check())?;
                    Ok(positioned(listing, location, 0.0))
                } else {
                    let pinned = parse_lat_lng(&answer)?;
                    self.fixes.record(listing.id(), GeoFix::at(pinned))?;
                    Ok(positioned(listing, pinned, 0.0))
                }
            }
        }
    }

    fn accepts(&self, listing: &Listing, candidate: &PlaceCandidate) -> bool {
        let address = &candidate.formatted_address;
        address.contains(self.settings.prefecture.as_str()) && address.contains(listing.city())
    }

    fn count(&mut self, lookup: &Lookup) {
        if lookup.from_cache {
            self.stats.cache_hits += 1;
        } else {
            self.stats.places_calls += 1;
        }
    }

    fn ask(&mut self, prompt: &Prompt<'_>) -> AppResult<String> {
        self.stats.prompts += 1;
        self.prompt.ask(prompt)
    }
}

fn positioned(listing: Listing, location: LatLng, distance_m: f64) -> GeocodedListing {
    GeocodedListing {
        listing,
        lat: location.lat,
        lng: location.lng,
        distance_m,
    }
}


#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::testing::ScriptedPrompt;
    use super::*;
    use crate::listing::listing;
    use crate::places::testing::{candidate, ScriptedLookup};

    fn settings() -> ResolverSettings {
        ResolverSettings {
            prefecture: "長野県".into(),
            mismatch_warn_m: 500.0,
        }
    }

    fn service(dir: &Path, lookup: &Arc<ScriptedLookup>) -> PlacesService {
        PlacesService::new(lookup.clone(), &dir.join("geo"), Duration::ZERO)
    }

    #[test]
    fn parses_operator_coordinates() {
        assert_eq!(
            parse_lat_lng(" 36.5 , 138.25").unwrap(),
            LatLng::new(36.5, 138.25)
        );
        for bad in ["y", "36.5", "36.5,138.2,0", "0,138.2", "36.5,0", "", "a,b"] {
            assert!(
                matches!(parse_lat_lng(bad), Err(AppError::OperatorInput(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn explicit_override_skips_places_entirely() {
        let dir = tempdir().unwrap();
        let lookup = Arc::new(ScriptedLookup::default());
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&dir.path().join("fix.json")).unwrap();
        fixes.record("1", GeoFix::at(LatLng::new(36.2, 137.9))).unwrap();
        let mut prompt = ScriptedPrompt::default();

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let row = resolver
            .resolve(listing("1", "飲食", "松本市", "喫茶"))
            .await
            .unwrap();

        assert_eq!((row.lat, row.lng, row.distance_m), (36.2, 137.9, 0.0));
        assert_eq!(resolver.stats().overrides, 1);
        assert_eq!(lookup.query_count(), 0);
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn accepted_candidate_records_cross_check_distance() {
        let dir = tempdir().unwrap();
        let lookup = Arc::new(
            ScriptedLookup::default()
                .with("長野市 そば処", candidate("日本、長野県長野市大字長野", 36.6600, 138.1900))
                .with("長野県長野市1-2", candidate("日本、長野県長野市", 36.6610, 138.1900)),
        );
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&dir.path().join("fix.json")).unwrap();
        let mut prompt = ScriptedPrompt::default();

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let row = resolver
            .resolve(listing("2", "飲食", "長野市", "そば処"))
            .await
            .unwrap();

        assert_eq!((row.lat, row.lng), (36.66, 138.19));
        assert!(row.distance_m > 100.0 && row.distance_m < 120.0);
        assert_eq!(resolver.stats().places_calls, 2);
        assert_eq!(resolver.stats().cross_checked, 1);
        assert!(prompt.asked.is_empty());
        assert!(fixes.is_empty());
    }

    #[tokio::test]
    async fn far_apart_candidates_are_kept() {
        let dir = tempdir().unwrap();
        let lookup = Arc::new(
            ScriptedLookup::default()
                .with("長野市 そば処", candidate("長野県長野市", 36.66, 138.19))
                .with("長野県長野市1-2", candidate("長野県松本市", 36.23, 137.97)),
        );
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&dir.path().join("fix.json")).unwrap();
        let mut prompt = ScriptedPrompt::default();

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let row = resolver
            .resolve(listing("2", "飲食", "長野市", "そば処"))
            .await
            .unwrap();

        assert!(row.distance_m > 40_000.0);
        assert_eq!((row.lat, row.lng), (36.66, 138.19));
    }

    #[tokio::test]
    async fn candidate_outside_city_asks_for_manual_location() {
        let dir = tempdir().unwrap();
        let fix_path = dir.path().join("fix.json");
        let lookup = Arc::new(
            ScriptedLookup::default()
                .with("上田市 旅館", candidate("日本、群馬県高崎市", 36.32, 139.0)),
        );
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&fix_path).unwrap();
        let mut prompt = ScriptedPrompt::answering(&["36.40,138.25"]);

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let row = resolver
            .resolve(listing("3", "宿泊", "上田市", "旅館"))
            .await
            .unwrap();
        assert_eq!(resolver.stats().prompts, 1);

        assert_eq!((row.lat, row.lng, row.distance_m), (36.40, 138.25, 0.0));
        assert_eq!(prompt.asked, vec!["manual:3"]);
        let persisted = GeoFixes::load(&fix_path).unwrap();
        assert_eq!(
            persisted.get("3").unwrap().location(),
            Some(LatLng::new(36.40, 138.25))
        );
    }

    #[tokio::test]
    async fn missing_address_confirmation_disables_cross_check() {
        let dir = tempdir().unwrap();
        let fix_path = dir.path().join("fix.json");
        let lookup = Arc::new(
            ScriptedLookup::default()
                .with("飯田市 酒店", candidate("長野県飯田市本町", 35.51, 137.82)),
        );
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&fix_path).unwrap();
        let mut prompt = ScriptedPrompt::answering(&["y"]);

        {
            let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
            let row = resolver
                .resolve(listing("4", "物販", "飯田市", "酒店"))
                .await
                .unwrap();
            assert_eq!((row.lat, row.lng, row.distance_m), (35.51, 137.82, 0.0));
        }
        assert_eq!(prompt.asked, vec!["confirm:4"]);
        assert!(!fixes.get("4").unwrap().checks_address());

        // Second run: cached name lookup, no address lookup, no question.
        let mut fixes = GeoFixes::load(&fix_path).unwrap();
        let mut prompt = ScriptedPrompt::default();
        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        resolver
            .resolve(listing("4", "物販", "飯田市", "酒店"))
            .await
            .unwrap();
        assert_eq!(resolver.stats().cache_hits, 1);
        assert_eq!(resolver.stats().places_calls, 0);
        assert_eq!(lookup.query_count(), 2);
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn missing_address_answered_with_coordinates_pins_position() {
        let dir = tempdir().unwrap();
        let lookup = Arc::new(
            ScriptedLookup::default()
                .with("飯田市 酒店", candidate("長野県飯田市本町", 35.51, 137.82)),
        );
        let places = service(dir.path(), &lookup);
        let mut fixes = GeoFixes::load(&dir.path().join("fix.json")).unwrap();
        let mut prompt = ScriptedPrompt::answering(&["35.52,137.83"]);

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let row = resolver
            .resolve(listing("4", "物販", "飯田市", "酒店"))
            .await
            .unwrap();

        assert_eq!((row.lat, row.lng), (35.52, 137.83));
        assert_eq!(
            fixes.get("4").unwrap().location(),
            Some(LatLng::new(35.52, 137.83))
        );
    }

    #[tokio::test]
    async fn malformed_answer_aborts() {
        let dir = tempdir().unwrap();
        let lookup = Arc::new(ScriptedLookup::default());
        let places = service(dir.path(), &lookup);
        let fix_path = dir.path().join("fix.json");
        let mut fixes = GeoFixes::load(&fix_path).unwrap();
        let mut prompt = ScriptedPrompt::answering(&["36.4"]);

        let mut resolver = Resolver::new(&places, &mut fixes, &mut prompt, settings());
        let err = resolver
            .resolve(listing("5", "飲食", "諏訪市", "食堂"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::OperatorInput(_)));
        assert!(!fix_path.exists());
    }
}
