use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use quick_xml::escape::partial_escape;
use tracing::{info, warn};

use crate::errors::AppResult;
use crate::listing::{GeocodedListing, COL_ADDRESS, DETAIL_COLUMNS, NOTE_COLUMNS};

const STYLE_ID: &str = "icon-1899-0288D1";
const LINE_BREAK: &str = "<br>";

const STYLES: &str = r#"    <Style id="icon-1899-0288D1-normal">
      <IconStyle>
        <color>ffd18802</color>
        <scale>1</scale>
        <Icon>
          <href>https://www.gstatic.com/mapspro/images/stock/503-wht-blank_maps.png</href>
        </Icon>
        <hotSpot x="32" xunits="pixels" y="64" yunits="insetPixels"/>
      </IconStyle>
      <LabelStyle>
        <scale>0</scale>
      </LabelStyle>
    </Style>
    <Style id="icon-1899-0288D1-highlight">
      <IconStyle>
        <color>ffd18802</color>
        <scale>1</scale>
        <Icon>
          <href>https://www.gstatic.com/mapspro/images/stock/503-wht-blank_maps.png</href>
        </Icon>
        <hotSpot x="32" xunits="pixels" y="64" yunits="insetPixels"/>
      </IconStyle>
      <LabelStyle>
        <scale>1</scale>
      </LabelStyle>
    </Style>
    <StyleMap id="icon-1899-0288D1">
      <Pair>
        <key>normal</key>
        <styleUrl>#icon-1899-0288D1-normal</styleUrl>
      </Pair>
      <Pair>
        <key>highlight</key>
        <styleUrl>#icon-1899-0288D1-highlight</styleUrl>
      </Pair>
    </StyleMap>
"#;

#[derive(Debug, Clone)]
pub struct KmlDocument {
    pub category: String,
    pub markers: usize,
    pub body: String,
}

impl KmlDocument {
    pub fn file_name(&self) -> String {
        let safe: String = self
            .category
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("result_{safe}.kml")
    }
}

#[derive(Debug, Clone)]
pub struct WrittenLayer {
    pub path: PathBuf,
    pub markers: usize,
}

pub struct KmlRenderer {
    title: String,
    prefecture: String,
}

impl KmlRenderer {
    pub fn new(title: impl Into<String>, prefecture: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            prefecture: prefecture.into(),
        }
    }

    pub fn render(&self, rows: &[GeocodedListing]) -> Vec<KmlDocument> {
        group_by_category(rows)
            .into_iter()
            .map(|(category, members)| {
                info!(category, markers = members.len(), "rendering layer");
                KmlDocument {
                    body: self.document(category, &members),
                    markers: members.len(),
                    category: category.to_string(),
                }
            })
            .collect()
    }

    pub fn write_all(&self, rows: &[GeocodedListing], dir: &Path) -> AppResult<Vec<WrittenLayer>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        let mut taken = HashSet::new();
        for document in self.render(rows) {
            let path = dir.join(unique_name(&document, &mut taken));
            fs::write(&path, document.body.as_bytes())?;
            info!(path = %path.display(), markers = document.markers, "layer written");
            written.push(WrittenLayer {
                path,
                markers: document.markers,
            });
        }
        Ok(written)
    }

    fn document(&self, category: &str, members: &[&GeocodedListing]) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n  <Document>\n");
        let _ = writeln!(
            out,
            "    <name>{}</name>",
            partial_escape(&format!("{} ({category})", self.title))
        );
        out.push_str("    <description/>\n");
        out.push_str(STYLES);
        out.push_str("    <Folder>\n");
        let _ = writeln!(out, "      <name>{}</name>", partial_escape(category));
        for row in members {
            self.placemark(&mut out, row);
        }
        out.push_str("    </Folder>\n  </Document>\n</kml>\n");
        out
    }

    fn placemark(&self, out: &mut String, row: &GeocodedListing) {
        let listing = &row.listing;
        let _ = write!(
            out,
            "      <Placemark>\n        <name>{}</name>\n",
            partial_escape(listing.name())
        );
        let _ = writeln!(
            out,
            "        <description><![CDATA[{}]]></description>",
            cdata_safe(&self.description(row))
        );
        let _ = writeln!(out, "        <styleUrl>#{STYLE_ID}</styleUrl>");
        let _ = writeln!(
            out,
            "        <Point><coordinates>{},{},0</coordinates></Point>",
            row.lng, row.lat
        );
        out.push_str("      </Placemark>\n");
    }

    /// Marker body as raw HTML; cell text is embedded without escaping.
    pub fn description(&self, row: &GeocodedListing) -> String {
        let listing = &row.listing;
        let mut parts = vec![
            format!("No.{}", listing.id()),
            format!("{}{}", self.prefecture, listing.cell(COL_ADDRESS)),
        ];
        parts.extend(DETAIL_COLUMNS.iter().map(|&col| listing.cell(col).to_string()));
        let notes: Vec<&str> = NOTE_COLUMNS
            .map(|col| listing.cell(col))
            .filter(|cell| !cell.is_empty())
            .collect();
        parts.push(notes.join(LINE_BREAK));
        parts.join(LINE_BREAK)
    }
}

pub fn group_by_category(rows: &[GeocodedListing]) -> IndexMap<&str, Vec<&GeocodedListing>> {
    let mut groups: IndexMap<&str, Vec<&GeocodedListing>> = IndexMap::new();
    for row in rows {
        groups.entry(row.listing.category()).or_default().push(row);
    }
    groups
}

/// Sanitizing can map distinct categories onto one name; later ones get a
/// numeric suffix instead of overwriting the earlier layer.
fn unique_name(document: &KmlDocument, taken: &mut HashSet<String>) -> String {
    let base = document.file_name();
    let stem = base.trim_end_matches(".kml");
    let mut name = base.clone();
    let mut n = 2;
    while !taken.insert(name.clone()) {
        warn!(category = %document.category, clashes_with = %base, "layer file name already used");
        name = format!("{stem}_{n}.kml");
        n += 1;
    }
    name
}

/// A literal `]]>` would close the section early; split it across two.
fn cdata_safe(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}
