//! # gridtrace-algo: Topology Reconstruction
//!
//! Turns the raw device/terminal graph of a [`TopologyStore`] into networks
//! fit for analysis.
//!
//! | Pass | Module | Purpose |
//! |------|--------|---------|
//! | Segment Tracer | [`tracer`] | logical endpoints, switch state, stable impedance |
//! | Segment Merger | [`merger`] | chains of identical segments become one line |
//! | Projection | [`project`] | whole network after voltage filtering |
//! | Island Extractor | [`island`] | low-voltage network behind each transformer |
//! | Cycle Resolver | [`cycles`] | open trivial edges until the graph is radial |
//!
//! [`pipeline::reconstruct`] runs them according to a
//! [`TopologyConfig`](gridtrace_core::TopologyConfig).
//!
//! ## Example
//!
//! ```
//! use gridtrace_algo::{reconstruct, test_utils::NetworkFixture};
//! use gridtrace_core::TopologyConfig;
//!
//! let raw = NetworkFixture::new()
//!     .transformer("T1", "trafo_1", "MV", 20.0, "L", 0.4)
//!     .line("1", "S1", "L", "M", 40.0, 0.1)
//!     .load("LD", "Load", "M", 3.0)
//!     .build();
//! let config = TopologyConfig {
//!     separate_lv_islands: true,
//!     ..TopologyConfig::default()
//! };
//! let result = reconstruct(&raw, &config, "grid")?;
//! assert_eq!(result.networks[0].name, "L.trafo_1");
//! # Ok::<(), gridtrace_core::TopologyError>(())
//! ```

use gridtrace_core::TopologyStore;

pub mod cycles;
pub mod island;
pub mod merger;
pub mod pipeline;
pub mod project;
pub mod test_utils;
pub mod tracer;

pub use cycles::{find_cycles, is_trivial, resolve_cycles, Cycle, CycleResolution};
pub use island::{extract_island, extract_islands, island_filter, unique_name, Island};
pub use merger::{LogicalLine, SegmentMerger};
pub use pipeline::{reconstruct, Reconstruction};
pub use project::{project_network, NetworkBuilder};
pub use tracer::{trace_segment, trace_segments, Endpoint, TraceContext, TracedSegment};

/// A named output network
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub store: TopologyStore,
}
