use std::path::Path;

use pdfplumber::{Pdf, TableSettings};
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::listing::RawRow;
use crate::store;

pub const HEADER_ROWS: usize = 2;

pub trait TableSource {
    fn page_count(&self) -> usize;

    /// The main table of a zero-based page, or `None` when the page has none.
    fn page_table(&self, page_index: usize) -> AppResult<Option<Vec<RawRow>>>;

    /// URI link targets in page order, then annotation order.
    fn hyperlinks(&self) -> AppResult<Vec<String>>;
}

pub struct PdfTableSource {
    pdf: Pdf,
    settings: TableSettings,
}

impl PdfTableSource {
    pub fn open(path: &Path) -> AppResult<Self> {
        let pdf = Pdf::open_file(path, None)
            .map_err(|err| AppError::Pdf(format!("{}: {err}", path.display())))?;
        info!(path = %path.display(), pages = pdf.page_count(), "opened listing pdf");
        Ok(Self {
            pdf,
            settings: TableSettings::default(),
        })
    }
}

impl TableSource for PdfTableSource {
    fn page_count(&self) -> usize {
        self.pdf.page_count()
    }

    fn page_table(&self, page_index: usize) -> AppResult<Option<Vec<RawRow>>> {
        let page = self
            .pdf
            .page(page_index)
            .map_err(|err| AppError::Pdf(format!("page {}: {err}", page_index + 1)))?;
        Ok(page.extract_table(&self.settings))
    }

    fn hyperlinks(&self) -> AppResult<Vec<String>> {
        let mut links = Vec::new();
        for index in 0..self.pdf.page_count() {
            let page = self
                .pdf
                .page(index)
                .map_err(|err| AppError::Pdf(format!("page {}: {err}", index + 1)))?;
            links.extend(page.hyperlinks().iter().map(|link| link.uri.clone()));
        }
        Ok(links)
    }
}

pub fn extract_rows(source: &dyn TableSource) -> AppResult<Vec<RawRow>> {
    let mut rows = Vec::new();
    for index in 0..source.page_count() {
        debug!(page = index + 1, "extracting table");
        let table = source
            .page_table(index)?
            .ok_or_else(|| AppError::Pdf(format!("page {} has no table", index + 1)))?;
        rows.extend(table.into_iter().skip(HEADER_ROWS));
    }
    Ok(rows)
}

/// Tables are only read from `source` when the cache is missing.
pub fn load_rows(cache_path: &Path, source: &dyn TableSource) -> AppResult<Vec<RawRow>> {
    let rows: Vec<RawRow> = store::cache_json(cache_path, || extract_rows(source))?;
    info!(rows = rows.len(), cache = %cache_path.display(), "table rows loaded");
    Ok(rows)
}
