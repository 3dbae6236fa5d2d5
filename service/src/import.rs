//! Patent catalogue import.
//!
//! Reads a JSON array of rows, either in the spreadsheet's column headings
//! (`Patent Name`, `Category_Index`, `Low Example`, ...) or in the item's own
//! camelCase field names, and replaces the whole catalogue in one
//! transaction.

use std::path::Path;

use serde::Deserialize;
use study_core::Category;
use study_core::Item;
use study_core::ItemId;
use study_core::PatentStatus;
use study_core::SeverityVariants;
use study_core::StoreError;
use study_core::store::ItemStore;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid import file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("row {row}: unknown category '{category}'")]
    UnknownCategory { row: usize, category: String },

    #[error("row {row}: unknown status '{status}'")]
    UnknownStatus { row: usize, status: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRow {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default, alias = "Category_Index", alias = "categoryIndex")]
    category_order: Option<i64>,
    #[serde(default, alias = "Category")]
    category: Option<String>,
    #[serde(default, alias = "Classifications")]
    classifications: Option<String>,
    #[serde(default, alias = "Patent Name", alias = "patentName")]
    name: Option<String>,
    #[serde(default, alias = "Patent Link", alias = "patentLink")]
    link: Option<String>,
    #[serde(default, alias = "Patent Description", alias = "patentDescription")]
    description: Option<String>,
    #[serde(default, alias = "Status")]
    status: Option<String>,
    #[serde(default, alias = "Year")]
    year: Option<i32>,
    #[serde(default, alias = "Low Example", alias = "lowHallucinationExample")]
    low_example: Option<String>,
    #[serde(default, alias = "Medium Example", alias = "mediumHallucinationExample")]
    medium_example: Option<String>,
    #[serde(default, alias = "High Example", alias = "highHallucinationExample")]
    high_example: Option<String>,
}

impl ImportRow {
    /// `index` is zero-based; messages and default names count from one.
    fn into_item(self, index: usize) -> Result<Item, ImportError> {
        let row = index + 1;
        let label = self.category.unwrap_or_default();
        let category = Category::parse(&label).ok_or_else(|| ImportError::UnknownCategory {
            row,
            category: label,
        })?;

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => PatentStatus::Active,
            Some(raw) => PatentStatus::parse(raw).ok_or_else(|| ImportError::UnknownStatus {
                row,
                status: raw.to_string(),
            })?,
        };

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Unnamed Patent {row}"));

        Ok(Item {
            id: self.id.map_or_else(ItemId::new, ItemId::from_uuid),
            category,
            category_order: self.category_order.unwrap_or(0),
            classifications: self.classifications.unwrap_or_default(),
            name,
            link: self.link.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status,
            year: self.year,
            severity_variants: SeverityVariants {
                low: self.low_example.unwrap_or_default(),
                medium: self.medium_example.unwrap_or_default(),
                high: self.high_example.unwrap_or_default(),
            },
        })
    }
}

/// Parse import rows into items. Fails on the first unusable row.
pub fn parse_items(json: &str) -> Result<Vec<Item>, ImportError> {
    let rows: Vec<ImportRow> = serde_json::from_str(json)?;
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row.into_item(index))
        .collect()
}

/// Replace the catalogue with the rows in `path`. Returns the item count.
pub async fn import_file<S>(store: &S, path: &Path) -> Result<usize, ImportError>
where
    S: ItemStore + ?Sized,
{
    let contents = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let items = parse_items(&contents)?;
    let count = store.replace_all_items(items).await?;
    tracing::info!(path = %path.display(), count, "patent catalogue replaced");
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spreadsheet_headings_are_accepted() {
        let json = r#"[
            {
                "Category_Index": 2,
                "Category": "Automation",
                "Patent Name": "Robotic folding arm",
                "Status": "Pending",
                "Year": 2019,
                "High Example": "Folds clothes by itself"
            },
            {
                "Category": "Healthcare"
            }
        ]"#;

        let items = parse_items(json).expect("valid rows");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].category, Category::Automation);
        assert_eq!(items[0].category_order, 2);
        assert_eq!(items[0].status, PatentStatus::Pending);
        assert_eq!(items[0].year, Some(2019));
        assert_eq!(items[0].severity_variants.high, "Folds clothes by itself");
        assert_eq!(items[1].name, "Unnamed Patent 2");
        assert_eq!(items[1].status, PatentStatus::Active);
    }

    #[test]
    fn camel_case_rows_keep_their_ids() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"[{{"id": "{id}", "category": "Healthcare", "name": "Pill timer", "categoryOrder": 1}}]"#
        );
        let items = parse_items(&json).expect("valid rows");
        assert_eq!(items[0].id, ItemId::from_uuid(id));
        assert_eq!(items[0].category_order, 1);
    }

    #[test]
    fn unknown_category_names_the_row() {
        let err = parse_items(r#"[{"Category": "Automation"}, {"Category": "Uncategorized"}]"#)
            .expect_err("unknown category");
        assert!(matches!(err, ImportError::UnknownCategory { row: 2, .. }));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = parse_items(r#"[{"Category": "Automation", "Status": "granted"}]"#)
            .expect_err("unknown status");
        assert!(matches!(err, ImportError::UnknownStatus { row: 1, .. }));
    }
}
