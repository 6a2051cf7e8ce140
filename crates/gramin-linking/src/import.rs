//! Bulk import of explicit links, bypassing scoring.
//!
//! Items arrive as operator-supplied (item_type, item_id) tuples, usually
//! exported from a spreadsheet. Rows are validated and applied one by one,
//! 1-indexed for error reporting; invalid rows are recorded and skipped
//! without aborting the batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use gramin_core::{
    defaults, Error, ItemKind, Result, UpsertLinkRequest, VillageLinkRepository, VillageRepository,
};

/// One externally supplied link row.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    pub item_type: String,
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub promote: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// A rejected row, 1-indexed.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

/// Result of an import call.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub errors: Vec<ImportRowError>,
}

/// Applies operator-supplied link batches with per-row validation.
#[derive(Clone)]
pub struct BulkImporter {
    villages: Arc<dyn VillageRepository>,
    links: Arc<dyn VillageLinkRepository>,
}

impl BulkImporter {
    pub fn new(villages: Arc<dyn VillageRepository>, links: Arc<dyn VillageLinkRepository>) -> Self {
        Self { villages, links }
    }

    /// Validate and apply a batch of explicit links for a village.
    ///
    /// Oversize batches are rejected with `InvalidInput` before any row is
    /// applied. Per-row failures never abort sibling rows.
    #[instrument(skip(self, items), fields(subsystem = "linking", component = "bulk_import", op = "import", village_id = %village_id, rows = items.len()))]
    pub async fn import(
        &self,
        village_id: Uuid,
        items: Vec<ImportItem>,
        actor: Uuid,
    ) -> Result<ImportReport> {
        if items.len() > defaults::BULK_IMPORT_MAX_ROWS {
            return Err(Error::InvalidInput(format!(
                "Import batch of {} rows exceeds the {}-row limit",
                items.len(),
                defaults::BULK_IMPORT_MAX_ROWS
            )));
        }

        self.villages.fetch(village_id).await?;

        let mut success_count = 0;
        let mut errors = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let row = index + 1;

            let kind = match ItemKind::parse(&item.item_type) {
                Some(kind) => kind,
                None => {
                    errors.push(ImportRowError {
                        row,
                        error: format!("Unknown item_type \"{}\"", item.item_type),
                    });
                    continue;
                }
            };

            let item_id = match item.item_id {
                Some(id) => id,
                None => {
                    errors.push(ImportRowError {
                        row,
                        error: "Missing item_id".to_string(),
                    });
                    continue;
                }
            };

            let result = self
                .links
                .upsert_linked(UpsertLinkRequest {
                    village_id,
                    item_kind: kind,
                    item_id,
                    promote: item.promote.unwrap_or(false),
                    priority: item.priority.unwrap_or(0),
                    actor,
                    reason: defaults::BULK_IMPORT_REASON.to_string(),
                })
                .await;

            match result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    warn!(row, error = %e, "Bulk import row failed");
                    errors.push(ImportRowError {
                        row,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            village_id = %village_id,
            success_count,
            error_count = errors.len(),
            "Bulk import completed"
        );
        Ok(ImportReport {
            success_count,
            errors,
        })
    }
}
