//! Startup data: shops and staff registered before the service takes traffic.
//!
//! The file is JSON with the same shape the change feed publishes:
//!
//! ```json
//! { "shops": [ { "id": "...", "name": "Fades", ... } ], "staff": [ ... ] }
//! ```

use chairbook_core::scheduler::SchedulerAction;
use chairbook_core::types::{Shop, StaffMember};
use chairbook_runtime::{Store, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading or applying seed data
#[derive(Error, Debug)]
pub enum SeedError {
    /// File could not be read
    #[error("failed to read seed file {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid seed JSON
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store refused a shop or staff member
    #[error("seed rejected: {0}")]
    Rejected(#[from] StoreError),
}

/// Shops and staff to register at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Shops, registered first
    #[serde(default)]
    pub shops: Vec<Shop>,
    /// Staff, each belonging to one of `shops`
    #[serde(default)]
    pub staff: Vec<StaffMember>,
}

impl Seed {
    /// Read seed data from a JSON file
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] if the file is unreadable or malformed.
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Register every shop, then every staff member, through the store so
    /// dashboards see them on the feed.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::Rejected`] on the first command the store refuses.
    pub async fn apply(self, store: &Store) -> Result<(), SeedError> {
        let (shops, staff) = (self.shops.len(), self.staff.len());

        for shop in self.shops {
            store.send(SchedulerAction::RegisterShop { shop }).await?;
        }
        for member in self.staff {
            store
                .send(SchedulerAction::InviteStaff { staff: member })
                .await?;
        }

        tracing::info!(shops, staff, "Seed data registered");
        Ok(())
    }
}
