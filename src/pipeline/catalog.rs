//! Resolves the configured market selection against the provider catalog.

use crate::config::UnmatchedPolicy;
use crate::constants::NAME_NOISE_TOKEN;
use crate::error::{PipelineError, Result};
use crate::types::{Entity, MarketDescriptor, ParclId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Selected markets keyed by id, iterated in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCatalog {
    entities: Vec<Entity>,
}

impl EntityCatalog {
    pub fn get(&self, parcl_id: ParclId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.parcl_id == parcl_id)
    }

    pub fn contains(&self, parcl_id: ParclId) -> bool {
        self.get(parcl_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn ids(&self) -> Vec<ParclId> {
        self.entities.iter().map(|e| e.parcl_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Remove every occurrence of the noise token from a provider market name.
/// The match is exact and case-sensitive; surrounding whitespace left behind
/// is trimmed.
pub fn clean_market_name(raw: &str) -> String {
    raw.replace(NAME_NOISE_TOKEN, "").trim().to_string()
}

/// Keep only the selected ids that the catalog knows about.
///
/// A selected id appearing twice is resolved once, at its first position.
/// When the catalog lists an id more than once the last entry wins.
pub fn resolve_entities(
    selection: &[ParclId],
    catalog: &[MarketDescriptor],
    policy: UnmatchedPolicy,
) -> Result<EntityCatalog> {
    let by_id: HashMap<ParclId, &MarketDescriptor> =
        catalog.iter().map(|m| (m.parcl_id, m)).collect();

    let mut entities: Vec<Entity> = Vec::with_capacity(selection.len());
    for &parcl_id in selection {
        if entities.iter().any(|e| e.parcl_id == parcl_id) {
            continue;
        }
        match by_id.get(&parcl_id) {
            Some(market) => {
                let name = clean_market_name(&market.name);
                debug!(parcl_id, name = %name, region = %market.region, "Resolved market");
                entities.push(Entity {
                    parcl_id,
                    name,
                    region: market.region.clone(),
                });
            }
            None => match policy {
                UnmatchedPolicy::Drop => {
                    warn!(parcl_id, "Selected market not in provider catalog; dropping it");
                }
                UnmatchedPolicy::Fail => return Err(PipelineError::UnknownEntity { parcl_id }),
            },
        }
    }

    Ok(EntityCatalog { entities })
}
