//! Legacy-image to destination-asset lookup.
//!
//! Loaded once per batch run from a flat CSV table and injected read-only
//! into the mappers. Lookups try the exact key first, then the key with
//! its path stripped; a miss is a logged gap, never an error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::fragment::image_filename;

#[derive(Debug, Default)]
pub struct AssetLookup {
    by_key: HashMap<String, String>,
}

impl AssetLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the lookup table. The header row names the columns; `name` and
    /// `url` columns key the rows, `asset_id` carries the value.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read asset table {}", path.display()))?;
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());

        let header = lines.next().context("asset table is empty")?;
        let columns = split_csv_line(header);
        let name_column = columns.iter().position(|column| column == "name");
        let url_column = columns.iter().position(|column| column == "url");
        let id_column = columns
            .iter()
            .position(|column| column == "asset_id")
            .context("asset table has no asset_id column")?;
        if name_column.is_none() && url_column.is_none() {
            bail!("asset table has neither a name nor a url column");
        }

        let mut by_key = HashMap::new();
        for line in lines {
            let fields = split_csv_line(line);
            let Some(asset_id) = fields.get(id_column).filter(|value| !value.is_empty()) else {
                continue;
            };
            for column in [name_column, url_column].into_iter().flatten() {
                if let Some(key) = fields.get(column).filter(|value| !value.is_empty()) {
                    by_key.insert(key.clone(), asset_id.clone());
                }
            }
        }
        Ok(Self { by_key })
    }

    pub fn insert(&mut self, key: &str, asset_id: &str) {
        self.by_key.insert(key.to_string(), asset_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Resolve a filename or URL to a destination asset ID.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if let Some(asset_id) = self.by_key.get(key) {
            return Some(asset_id.as_str());
        }
        self.by_key
            .get(&image_filename(key))
            .map(String::as_str)
    }
}

/// Split one CSV line into fields, honoring double-quoted fields with `""`
/// escapes. The asset table is machine-written; anything fancier than this
/// does not occur in it.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field = String::new();
            }
            _ => field.push(ch),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
