use std::collections::HashSet;

use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::listing::{Listing, COL_WEBSITE, WEBSITE_PLACEHOLDER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationStats {
    pub input_rows: usize,
    pub links_substituted: usize,
    pub duplicates_removed: usize,
}

pub fn normalize(
    mut rows: Vec<Listing>,
    links: &[String],
) -> AppResult<(Vec<Listing>, NormalizationStats)> {
    let input_rows = rows.len();
    ensure_unique_ids(&rows)?;
    let links_substituted = substitute_links(&mut rows, links)?;
    let mut rows = dedupe_by_city_and_name(rows);
    let duplicates_removed = input_rows - rows.len();
    sort_by_number(&mut rows)?;

    info!(
        input_rows,
        links_substituted, duplicates_removed, "listings normalized"
    );
    Ok((
        rows,
        NormalizationStats {
            input_rows,
            links_substituted,
            duplicates_removed,
        },
    ))
}

pub fn ensure_unique_ids(rows: &[Listing]) -> AppResult<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(row.id()) {
            return Err(AppError::Integrity(format!(
                "duplicate identifier {:?}",
                row.id()
            )));
        }
    }
    Ok(())
}

/// Replaces website placeholders with link targets in encounter order.
/// Both sides must be fully consumed.
pub fn substitute_links(rows: &mut [Listing], links: &[String]) -> AppResult<usize> {
    let mut next = links.iter();
    let mut used = 0;
    for row in rows.iter_mut() {
        if row.website() != WEBSITE_PLACEHOLDER {
            continue;
        }
        let link = next.next().ok_or_else(|| {
            AppError::Integrity(format!(
                "row {} needs a link but only {} were found",
                row.id(),
                links.len()
            ))
        })?;
        row.set_cell(COL_WEBSITE, link.clone());
        used += 1;
    }
    if used != links.len() {
        return Err(AppError::Integrity(format!(
            "{} links found but {used} placeholders",
            links.len()
        )));
    }
    Ok(used)
}

pub fn dedupe_by_city_and_name(mut rows: Vec<Listing>) -> Vec<Listing> {
    rows.sort_by(|a, b| a.dedupe_key().cmp(&b.dedupe_key()));
    rows.dedup_by(|later, kept| later.dedupe_key() == kept.dedupe_key());
    rows
}

pub fn sort_by_number(rows: &mut Vec<Listing>) -> AppResult<()> {
    let mut keyed = rows
        .drain(..)
        .map(|row| row.number().map(|number| (number, row)))
        .collect::<AppResult<Vec<_>>>()?;
    keyed.sort_by_key(|(number, _)| *number);
    rows.extend(keyed.into_iter().map(|(_, row)| row));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::listing;

    fn with_website(mut row: Listing, website: &str) -> Listing {
        row.set_cell(COL_WEBSITE, website);
        row
    }

    #[test]
    fn duplicate_identifier_is_fatal() {
        let rows = vec![
            listing("1", "飲食", "長野市", "A"),
            listing("1", "飲食", "松本市", "B"),
        ];
        let err = normalize(rows, &[]).unwrap_err();
        assert!(matches!(err, AppError::Integrity(msg) if msg.contains("\"1\"")));
    }

    #[test]
    fn links_replace_placeholders_in_order() {
        let mut rows = vec![
            with_website(listing("1", "", "c", "a"), "HP"),
            with_website(listing("2", "", "c", "b"), "-"),
            with_website(listing("3", "", "c", "d"), "HP"),
        ];
        let links = vec!["https://a.example".to_string(), "https://d.example".to_string()];
        assert_eq!(substitute_links(&mut rows, &links).unwrap(), 2);
        assert_eq!(rows[0].website(), "https://a.example");
        assert_eq!(rows[1].website(), "-");
        assert_eq!(rows[2].website(), "https://d.example");
    }

    #[test]
    fn link_count_mismatch_is_fatal() {
        let mut rows = vec![with_website(listing("1", "", "c", "a"), "HP")];
        let extra = vec!["https://a".to_string(), "https://b".to_string()];
        assert!(matches!(
            substitute_links(&mut rows, &extra),
            Err(AppError::Integrity(_))
        ));

        let mut rows = vec![
            with_website(listing("1", "", "c", "a"), "HP"),
            with_website(listing("2", "", "c", "b"), "HP"),
        ];
        let short = vec!["https://a".to_string()];
        assert!(matches!(
            substitute_links(&mut rows, &short),
            Err(AppError::Integrity(_))
        ));
    }

    #[test]
    fn first_row_per_city_and_name_wins() {
        let rows = vec![
            listing("10", "飲食", "長野市", "そば処"),
            listing("2", "宿泊", "松本市", "ホテル"),
            listing("7", "物販", "長野市", "そば処"),
            listing("4", "飲食", "上田市", "そば処"),
        ];
        let (rows, stats) = normalize(rows, &[]).unwrap();
        let ids: Vec<_> = rows.iter().map(Listing::id).collect();
        assert_eq!(ids, vec!["2", "4", "10"]);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(rows[2].category(), "飲食");
    }

    #[test]
    fn orders_numerically_not_lexically() {
        let mut rows = vec![
            listing("100", "", "a", "x"),
            listing("9", "", "b", "y"),
            listing("20", "", "c", "z"),
        ];
        sort_by_number(&mut rows).unwrap();
        let ids: Vec<_> = rows.iter().map(Listing::id).collect();
        assert_eq!(ids, vec!["9", "20", "100"]);
    }
}
