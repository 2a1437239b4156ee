//! Reconstruction pipeline.
//!
//! Runs the passes a [`TopologyConfig`] asks for on a raw store:
//! 1. whole-network projection, or one island per transformer when
//!    `separate_lv_islands` is set
//! 2. cycle resolution on every produced network when `resolve_cycles` is
//!    set; networks split by it come back as `<name> [component k]`

use crate::cycles::{resolve_cycles, Cycle};
use crate::island::extract_islands;
use crate::project::project_network;
use crate::tracer::TraceContext;
use crate::Network;
use gridtrace_core::{Diagnostics, Element, TopologyConfig, TopologyResult, TopologyStore};
use tracing::info;

/// Result of one reconstruction run
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub networks: Vec<Network>,
    /// Elements removed by cycle resolution
    pub removed: Vec<Element>,
    /// Cycles left open, with the name of their network
    pub unresolved: Vec<(String, Cycle)>,
    pub diagnostics: Diagnostics,
}

/// Reconstruct the networks of a raw store.
///
/// Fails only for an invalid configuration; data problems end up in
/// [`Reconstruction::diagnostics`].
pub fn reconstruct(
    raw: &TopologyStore,
    config: &TopologyConfig,
    name: &str,
) -> TopologyResult<Reconstruction> {
    config.validate()?;
    let mut out = Reconstruction::default();

    let networks = if config.separate_lv_islands {
        extract_islands(raw, config, &mut out.diagnostics)
            .into_iter()
            .map(|island| island.network)
            .collect()
    } else {
        vec![project_network(
            TraceContext::new(raw, config),
            name,
            &mut out.diagnostics,
        )]
    };

    if config.resolve_cycles {
        for network in networks {
            let network_name = network.name.clone();
            let resolution = resolve_cycles(network, &config.cycles, &mut out.diagnostics);
            out.removed.extend(resolution.removed);
            out.unresolved.extend(
                resolution
                    .unresolved
                    .into_iter()
                    .map(|cycle| (network_name.clone(), cycle)),
            );
            out.networks.extend(resolution.networks);
        }
    } else {
        out.networks = networks;
    }

    info!(
        networks = out.networks.len(),
        removed = out.removed.len(),
        issues = %out.diagnostics.summary(),
        "reconstruction complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::NetworkFixture;
    use gridtrace_core::{ElementId, Metres};

    #[test]
    fn test_whole_network_is_one_network() {
        let raw = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .build();
        let result = reconstruct(&raw, &TopologyConfig::default(), "grid").unwrap();
        assert_eq!(result.networks.len(), 1);
        assert_eq!(result.networks[0].name, "grid");
        let line = result.networks[0].store.element(&ElementId::from("1")).unwrap();
        assert_eq!(line.line().unwrap().length, Metres(80.0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let raw = TopologyStore::new();
        let config = TopologyConfig {
            merge_length_threshold: Metres(-1.0),
            ..TopologyConfig::default()
        };
        assert!(reconstruct(&raw, &config, "grid").is_err());
    }

    #[test]
    fn test_islands_with_cycle_resolution() {
        let raw = NetworkFixture::new()
            .transformer("T1", "t1", "MV", 20.0, "L", 0.4)
            .line("1", "S1", "L", "A", 40.0, 0.1)
            .line("2", "S2", "A", "B", 40.0, 0.2)
            .line("3", "fuse", "B", "L", 40.0, 0.3)
            .load("LD", "Load", "A", 1.0)
            .build();
        let config = TopologyConfig {
            separate_lv_islands: true,
            resolve_cycles: true,
            ..TopologyConfig::default()
        };
        let result = reconstruct(&raw, &config, "grid").unwrap();
        assert_eq!(result.networks.len(), 1);
        assert_eq!(result.networks[0].name, "L.t1");
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].id.as_str(), "3");
        assert!(result.unresolved.is_empty());
    }
}
