//! Persistent store for generated units.
//!
//! One JSON file under the configured data dir, written whole on each
//! mutation — unit counts are small (user-authored), so simplicity and
//! transparency win over an embedded database. Called only by the host
//! after a successful load; the sandbox core never touches storage.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::unit::GeneratedUnit;

/// A persisted unit plus storage-only metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredUnit {
    #[serde(flatten)]
    pub unit: GeneratedUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_opened_at: Option<DateTime<Utc>>,
}

pub struct UnitStore {
    path: PathBuf,
}

impl UnitStore {
    /// Opens (creating if needed) the store under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join("units.json");
        info!("Unit store opened at {}", path.display());
        Ok(Self { path })
    }

    pub fn save(&self, unit: &GeneratedUnit) -> Result<()> {
        let mut units = self.read_all();
        units.retain(|u| u.unit.identity != unit.identity);
        units.push(StoredUnit {
            unit: unit.clone(),
            last_opened_at: None,
        });
        self.write_all(&units)?;
        info!("Unit saved: {} ({})", unit.name, unit.identity);
        Ok(())
    }

    /// All units, most recently created first.
    pub fn list(&self) -> Vec<StoredUnit> {
        let mut units = self.read_all();
        units.sort_by(|a, b| b.unit.created_at.cmp(&a.unit.created_at));
        units
    }

    /// Returns true when a unit was actually removed.
    pub fn delete(&self, identity: Uuid) -> Result<bool> {
        let mut units = self.read_all();
        let before = units.len();
        units.retain(|u| u.unit.identity != identity);
        let removed = units.len() != before;
        if removed {
            self.write_all(&units)?;
            info!("Unit deleted: {identity}");
        }
        Ok(removed)
    }

    pub fn touch_last_opened(&self, identity: Uuid) -> Result<()> {
        let mut units = self.read_all();
        for stored in &mut units {
            if stored.unit.identity == identity {
                stored.last_opened_at = Some(Utc::now());
            }
        }
        self.write_all(&units)
    }

    pub fn clear_all(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("All units cleared");
        }
        Ok(())
    }

    fn read_all(&self) -> Vec<StoredUnit> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(units) => units,
            Err(e) => {
                warn!("Unit store unreadable ({e}), starting empty");
                Vec::new()
            }
        }
    }

    fn write_all(&self, units: &[StoredUnit]) -> Result<()> {
        let json = serde_json::to_string_pretty(units)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
