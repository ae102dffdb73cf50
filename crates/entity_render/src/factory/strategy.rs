//! Rendering strategy selection

use std::fmt;

use crate::core::config::FactoryConfig;
use crate::entity::EntityRecord;

/// How a batch of records is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// The family's standard renderer
    Direct,
    /// The family's renderer configured for large batches
    Batched,
    /// One instanced primitive per shared geometry
    Instanced,
}

impl Strategy {
    /// Strategy name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Batched => "batched",
            Self::Instanced => "instanced",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capabilities registered for a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// An instanced implementation exists
    pub instancing: bool,
    /// A batch-capable implementation exists
    pub batching: bool,
}

/// Geometry id shared by every record, if there is one
pub fn shared_geometry(records: &[EntityRecord]) -> Option<String> {
    let (first, rest) = records.split_first()?;
    let geometry = first.geometry_id()?;
    rest.iter()
        .all(|record| record.geometry_id().as_deref() == Some(geometry.as_str()))
        .then_some(geometry)
}

/// Pick a strategy for a batch, in priority order instanced, batched, direct
pub fn select_strategy(records: &[EntityRecord], config: &FactoryConfig, capabilities: Capabilities) -> Strategy {
    let count = records.len();
    if capabilities.instancing && count >= config.instancing_min_entities && shared_geometry(records).is_some() {
        Strategy::Instanced
    } else if capabilities.batching && count >= config.batching_min_entities {
        Strategy::Batched
    } else {
        Strategy::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::StyleOverrides;
    use crate::foundation::math::Anchor;

    fn points(n: usize, geometry: &str) -> Vec<EntityRecord> {
        (0..n)
            .map(|i| {
                EntityRecord::point(format!("p{i}"), Anchor::surface(0.0, 0.0))
                    .with_style(StyleOverrides::default().with_geometry(geometry))
            })
            .collect()
    }

    const ALL: Capabilities = Capabilities {
        instancing: true,
        batching: true,
    };

    #[test]
    fn test_instancing_threshold() {
        let config = FactoryConfig::new();
        assert_eq!(select_strategy(&points(4, "box"), &config, ALL), Strategy::Direct);
        assert_eq!(select_strategy(&points(5, "box"), &config, ALL), Strategy::Instanced);
    }

    #[test]
    fn test_mixed_geometry_falls_back() {
        let config = FactoryConfig::new();
        let mut records = points(12, "box");
        records.push(EntityRecord::point("odd", Anchor::surface(0.0, 0.0)));
        assert!(shared_geometry(&records).is_none());
        assert_eq!(select_strategy(&records, &config, ALL), Strategy::Batched);
        assert_eq!(
            select_strategy(&records, &config, Capabilities::default()),
            Strategy::Direct
        );
    }

    #[test]
    fn test_instancing_needs_registration() {
        let config = FactoryConfig::new();
        let batching_only = Capabilities {
            instancing: false,
            batching: true,
        };
        assert_eq!(select_strategy(&points(5, "box"), &config, batching_only), Strategy::Direct);
        assert_eq!(select_strategy(&points(10, "box"), &config, batching_only), Strategy::Batched);
    }
}
