// src/model/registry.rs

use std::collections::HashMap;

use crate::error::{AdsError, AdsResult};
use crate::model::placements::{Placement, PlacementType, PlatformPlacement};

/// Logical placement id -> placement definition, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct PlacementRegistry {
    placements: HashMap<String, Placement>,
    /// registration order, one entry per distinct id
    order: Vec<String>,
}

impl PlacementRegistry {
    /// Duplicate ids overwrite earlier definitions but keep the first position.
    pub fn from_placements(placements: impl IntoIterator<Item = Placement>) -> Self {
        let mut registry = Self::default();
        for placement in placements {
            if !registry.placements.contains_key(&placement.id) {
                registry.order.push(placement.id.clone());
            }
            registry.placements.insert(placement.id.clone(), placement);
        }
        registry
    }

    pub fn resolve(&self, placement_id: &str) -> AdsResult<&Placement> {
        self.placements
            .get(placement_id)
            .ok_or_else(|| AdsError::PlacementNotFound(placement_id.to_string()))
    }

    pub fn contains(&self, placement_id: &str) -> bool {
        self.placements.contains_key(placement_id)
    }

    /// Finds the placement a platform knows under `native_id`.
    pub fn resolve_native(&self, platform: &str, native_id: &str) -> AdsResult<&Placement> {
        self.iter()
            .find(|p| p.native_id(platform) == Some(native_id))
            .ok_or_else(|| AdsError::PlacementNotFound(native_id.to_string()))
    }

    /// Placements in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Placement> {
        self.order.iter().filter_map(|id| self.placements.get(id))
    }

    pub fn by_type(&self, kind: PlacementType) -> impl Iterator<Item = &Placement> {
        self.iter().filter(move |p| p.placement_type == kind)
    }

    /// Placements configured for `platform`, keyed both by logical id and native id.
    pub fn platform_placements(&self, platform: &str) -> HashMap<String, PlatformPlacement> {
        let mut result = HashMap::new();
        for placement in self.iter() {
            let Some(native_id) = placement.native_id(platform) else {
                continue;
            };
            let platform_placement = PlatformPlacement {
                id: placement.id.clone(),
                platform: platform.to_string(),
                platform_placement: native_id.to_string(),
                placement_type: placement.placement_type,
            };
            result.insert(native_id.to_string(), platform_placement.clone());
            result.insert(placement.id.clone(), platform_placement);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn placement(id: &str, kind: PlacementType, platforms: &[(&str, &str)]) -> Placement {
        Placement {
            id: id.to_string(),
            description: String::new(),
            placement_type: kind,
            platform_ids: platforms
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = PlacementRegistry::from_placements(vec![placement(
            "reward1",
            PlacementType::Rewarded,
            &[("admob", "ca-app-pub/1")],
        )]);
        assert!(matches!(
            registry.resolve("missing"),
            Err(AdsError::PlacementNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn duplicate_ids_last_wins_first_position() {
        let registry = PlacementRegistry::from_placements(vec![
            placement("a", PlacementType::Rewarded, &[]),
            placement("b", PlacementType::Banner, &[]),
            placement("a", PlacementType::Interstitial, &[]),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("a").unwrap().placement_type, PlacementType::Interstitial);
        let ids: Vec<_> = registry.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn platform_placements_index_logical_and_native_ids() {
        let registry = PlacementRegistry::from_placements(vec![
            placement("reward1", PlacementType::Rewarded, &[("admob", "unit-r1"), ("yandex", "R-M-1")]),
            placement("inter1", PlacementType::Interstitial, &[("yandex", "R-M-2")]),
        ]);
        let admob = registry.platform_placements("admob");
        assert_eq!(admob.len(), 2);
        assert_eq!(admob["reward1"].platform_placement, "unit-r1");
        assert_eq!(admob["unit-r1"].id, "reward1");
        assert_eq!(registry.resolve_native("yandex", "R-M-2").unwrap().id, "inter1");
        assert!(registry.resolve_native("admob", "R-M-2").is_err());
    }

    fn placement_type() -> impl Strategy<Value = PlacementType> {
        prop_oneof![
            Just(PlacementType::Rewarded),
            Just(PlacementType::Interstitial),
            Just(PlacementType::Banner),
        ]
    }

    proptest! {
        #[test]
        fn registry_construction_is_lossless(
            entries in prop::collection::hash_map(
                "[a-z_]{3,12}",
                (placement_type(), prop::collection::hash_map("[a-z]{3,8}", "[A-Za-z0-9-]{4,16}", 0..4)),
                1..20,
            )
        ) {
            let placements: Vec<Placement> = entries
                .iter()
                .map(|(id, (kind, ids))| Placement {
                    id: id.clone(),
                    description: String::new(),
                    placement_type: *kind,
                    platform_ids: ids.clone(),
                })
                .collect();
            let registry = PlacementRegistry::from_placements(placements.clone());

            prop_assert_eq!(registry.len(), placements.len());
            for expected in &placements {
                let resolved = registry.resolve(&expected.id).unwrap();
                prop_assert_eq!(resolved.placement_type, expected.placement_type);
                prop_assert_eq!(&resolved.platform_ids, &expected.platform_ids);
            }
        }
    }
}
