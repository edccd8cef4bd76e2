//! Catalog validation.

use std::collections::BTreeMap;
use std::path::Path;

use outpost_core::catalog::BuildingCatalog;

use crate::error::{Result, ToolError};

/// Summary of a catalog that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogReport {
    /// Number of definitions.
    pub definitions: usize,
    /// Definitions per category, by category name.
    pub by_category: BTreeMap<String, usize>,
    /// Definitions that can never be demolished.
    pub indestructible: Vec<String>,
}

impl CatalogReport {
    /// Summarize a loaded catalog.
    #[must_use]
    pub fn of(catalog: &BuildingCatalog) -> Self {
        let mut by_category = BTreeMap::new();
        let mut indestructible = Vec::new();
        for definition in catalog.iter() {
            *by_category
                .entry(format!("{:?}", definition.category))
                .or_insert(0) += 1;
            if !definition.destructible {
                indestructible.push(definition.id.to_string());
            }
        }
        Self {
            definitions: catalog.len(),
            by_category,
            indestructible,
        }
    }
}

/// Parse and check catalog text.
pub fn validate_catalog_str(text: &str) -> Result<CatalogReport> {
    let catalog = BuildingCatalog::from_ron_str(text)?;
    Ok(CatalogReport::of(&catalog))
}

/// Load and check one catalog file.
pub fn validate_catalog_file(path: &Path) -> Result<CatalogReport> {
    if !path.exists() {
        return Err(ToolError::FileNotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    validate_catalog_str(&text)
}

/// Validate every `.ron` catalog in a directory, logging each result.
///
/// # Errors
///
/// Returns [`ToolError::DirectoryInvalid`] if any file fails.
pub fn validate_data_directory(path: &Path) -> Result<usize> {
    if !path.is_dir() {
        return Err(ToolError::FileNotFound(path.display().to_string()));
    }
    let mut files: Vec<_> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();

    let mut failed = 0;
    for file in &files {
        match validate_catalog_file(file) {
            Ok(report) => {
                tracing::info!(file = %file.display(), definitions = report.definitions, "Catalog ok");
            }
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "Catalog invalid");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(ToolError::DirectoryInvalid {
            checked: files.len(),
            failed,
        });
    }
    Ok(files.len())
}
