// SPDX-License-Identifier: GPL-3.0-only

//! Plant registry backed by a JSON file
//!
//! Stand-in for the hosted document store: answers "does this code name a
//! plant owned by this user" from a list of plants loaded at startup.

use crate::backends::{CallerIdentity, ResourceVerifier, VerifyError};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// A registered plant, as much of it as the scanner needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub environment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-memory plant index keyed by id
#[derive(Debug)]
pub struct PlantRegistry {
    plants: HashMap<String, Plant>,
    reachable: AtomicBool,
}

impl PlantRegistry {
    pub fn from_plants(plants: impl IntoIterator<Item = Plant>) -> Self {
        Self {
            plants: plants.into_iter().map(|p| (p.id.clone(), p)).collect(),
            reachable: AtomicBool::new(true),
        }
    }

    /// Load a JSON array of plants
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Registry(format!("failed to read '{}': {}", path.display(), e))
        })?;
        let plants: Vec<Plant> = serde_json::from_str(&text).map_err(|e| {
            AppError::Registry(format!("failed to parse '{}': {}", path.display(), e))
        })?;

        info!(path = %path.display(), count = plants.len(), "Loaded plant registry");
        Ok(Self::from_plants(plants))
    }

    pub fn get(&self, id: &str) -> Option<&Plant> {
        self.plants.get(id.trim())
    }

    pub fn len(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    /// Simulate the store going offline (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }
}

#[async_trait]
impl ResourceVerifier for PlantRegistry {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    async fn exists(&self, identifier: &str, caller: &CallerIdentity) -> Result<bool, VerifyError> {
        if !self.is_reachable() {
            return Err(VerifyError::Backend("plant registry offline".to_string()));
        }

        let owned = self
            .get(identifier)
            .is_some_and(|plant| plant.owner_id == caller.user_id);

        debug!(identifier, user = %caller.user_id, owned, "Plant lookup");
        Ok(owned)
    }
}
