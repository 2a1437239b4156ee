//! Segment Merger.
//!
//! Collapses runs of segments through pass-through buses into one
//! [`LogicalLine`]. A bus is pass-through when exactly two terminals attach
//! to it. The walk folds the next segment in when its series impedance
//! matches the seed's, or while the accumulated length is still within
//! `merge_length_threshold`.
//!
//! The walk is an explicit loop over the current bus; every folded segment
//! goes into the merger's `used` set so it never seeds another line. Seeds
//! are taken in store order, which makes the result deterministic for a
//! given input.
//!
//! # Example
//!
//! ```
//! use gridtrace_algo::{test_utils::NetworkFixture, SegmentMerger, TraceContext};
//! use gridtrace_core::TopologyConfig;
//!
//! let store = NetworkFixture::new()
//!     .line("1", "S1", "X", "Y", 50.0, 0.1)
//!     .line("2", "S2", "Y", "Z", 30.0, 0.1)
//!     .build();
//! let config = TopologyConfig::default();
//! let mut merger = SegmentMerger::new(TraceContext::new(&store, &config));
//! let lines = merger.merge_all();
//! assert_eq!(lines.len(), 1);
//! assert_eq!(lines[0].name, "S1_S2");
//! ```

use crate::tracer::{is_candidate, report_skipped, trace_segment, Endpoint, TraceContext, TracedSegment};
use gridtrace_core::{
    compact_name, BusId, Diagnostics, Element, ElementId, ElementKind, Kilovolts, LineParams, Metres, PhaseSet,
    Terminal, TopologyError,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One or more merged segments presented as a single edge
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    /// Id of the seed segment
    pub id: ElementId,
    pub name: String,
    pub from: Endpoint,
    pub to: Endpoint,
    pub phases: PhaseSet,
    /// Seed parameters with the total length and all member ids
    pub params: LineParams,
    pub enabled: bool,
    pub voltage_kv: Option<Kilovolts>,
}

impl LogicalLine {
    /// A logical line made of a single segment
    pub fn unmerged(segment: &TracedSegment) -> Self {
        Self {
            id: segment.id.clone(),
            name: segment.name.clone(),
            from: segment.from.clone(),
            to: segment.to.clone(),
            phases: segment.phases,
            params: segment.params.clone(),
            enabled: segment.enabled,
            voltage_kv: segment.voltage_kv,
        }
    }

    pub fn length(&self) -> Metres {
        self.params.length
    }

    pub fn members(&self) -> &[ElementId] {
        &self.params.members
    }

    /// Element for the output store, terminal 1 at `from`, terminal 2 at `to`
    pub fn into_element(self) -> Element {
        let code = self.phases.code();
        let mut element = Element::new(self.id, self.name, ElementKind::Line(self.params))
            .with_enabled(self.enabled)
            .with_terminal(Terminal::new(1, self.from.bus, code))
            .with_terminal(Terminal::new(2, self.to.bus, code));
        element.voltage_kv = self.voltage_kv;
        element
    }
}

/// Which terminal of the seed a walk starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    From,
    To,
}

/// End of a walk from the seed in one direction
struct Walk {
    bus: BusId,
    members: Vec<ElementId>,
}

/// Merge state of one run: traced segments and the set of used ones.
pub struct SegmentMerger<'a> {
    ctx: TraceContext<'a>,
    merge: bool,
    traced: HashMap<ElementId, Option<TracedSegment>>,
    used: HashSet<ElementId>,
    failures: Vec<(ElementId, TopologyError)>,
}

impl<'a> SegmentMerger<'a> {
    /// Merger honouring `merge_contiguous_lines` of the context's config
    pub fn new(ctx: TraceContext<'a>) -> Self {
        Self {
            ctx,
            merge: ctx.config.merge_contiguous_lines,
            traced: HashMap::new(),
            used: HashSet::new(),
            failures: Vec::new(),
        }
    }

    pub fn context(&self) -> TraceContext<'a> {
        self.ctx
    }

    pub fn is_used(&self, id: &ElementId) -> bool {
        self.used.contains(id)
    }

    pub fn used(&self) -> &HashSet<ElementId> {
        &self.used
    }

    /// Traced segment for `id`, tracing it on first request.
    ///
    /// `None` for non-candidates and for segments that failed to trace.
    fn segment(&mut self, id: &ElementId) -> Option<TracedSegment> {
        if let Some(cached) = self.traced.get(id) {
            return cached.clone();
        }
        let traced = self
            .ctx
            .store
            .element(id)
            .filter(|element| is_candidate(&self.ctx, element))
            .and_then(|element| match trace_segment(&self.ctx, element) {
                Ok(segment) => Some(segment),
                Err(err) => {
                    self.failures.push((id.clone(), err));
                    None
                }
            });
        self.traced.insert(id.clone(), traced.clone());
        traced
    }

    /// Build the logical line seeded at `seed`.
    ///
    /// Returns `None` when the seed was already used or is not a traceable
    /// segment.
    pub fn merge_from(&mut self, seed: &ElementId) -> Option<LogicalLine> {
        if self.used.contains(seed) {
            return None;
        }
        let segment = self.segment(seed)?;
        self.used.insert(seed.clone());
        if !self.merge {
            return Some(LogicalLine::unmerged(&segment));
        }

        let mut length = segment.params.length;
        // neither walk may close a ring onto the other end of the line
        let back = self.walk(&segment, Side::From, &segment.to_bus, &mut length);
        let ahead = self.walk(&segment, Side::To, &back.bus, &mut length);

        // last-seen breaker state wins: seed, then backwards, then forwards
        let mut switch_state = segment.switch_state;
        let mut members = Vec::with_capacity(1 + back.members.len() + ahead.members.len());
        for id in back.members.iter().rev() {
            members.push(id.clone());
        }
        members.push(segment.id.clone());
        members.extend(ahead.members.iter().cloned());
        for id in back.members.iter().chain(&ahead.members) {
            if let Some(state) = self.traced_state(id) {
                switch_state = Some(state);
            }
        }

        let from_name = compact_name(&self.member_name(back.members.last(), &segment));
        let to_name = compact_name(&self.member_name(ahead.members.last(), &segment));
        let name = if from_name == to_name {
            from_name
        } else {
            format!("{from_name}_{to_name}")
        };

        let from_element = back.members.last().unwrap_or(&segment.id);
        let to_element = ahead.members.last().unwrap_or(&segment.id);
        let from = self.ctx.resolve_bus(&back.bus, from_element);
        let to = self.ctx.resolve_bus(&ahead.bus, to_element);

        if members.len() > 1 {
            debug!(seed = %segment.id, %name, segments = members.len(), %length, "merged segments");
        }

        let mut params = segment.params.clone();
        params.length = length;
        params.switchable = switch_state.is_some();
        params.members = members;
        Some(LogicalLine {
            id: segment.id.clone(),
            name,
            from,
            to,
            phases: segment.phases,
            params,
            enabled: switch_state.unwrap_or(segment.enabled),
            voltage_kv: segment.voltage_kv,
        })
    }

    /// Merge every candidate segment of the store, seeds in store order
    pub fn merge_all(&mut self) -> Vec<LogicalLine> {
        let store = self.ctx.store;
        store
            .elements()
            .filter(|element| element.is_line())
            .filter_map(|element| self.merge_from(&element.id))
            .collect()
    }

    /// Record segments that could not be traced as warnings
    pub fn report(&mut self, diagnostics: &mut Diagnostics) {
        for (id, err) in self.failures.drain(..) {
            report_skipped(diagnostics, &id, &err);
        }
    }

    fn traced_state(&self, id: &ElementId) -> Option<bool> {
        self.traced.get(id)?.as_ref()?.switch_state
    }

    fn member_name(&self, id: Option<&ElementId>, seed: &TracedSegment) -> String {
        id.and_then(|id| self.traced.get(id)?.as_ref())
            .map_or_else(|| seed.name.clone(), |segment| segment.name.clone())
    }

    /// Walk away from the seed through pass-through buses, stopping before
    /// a segment whose far end is `opposite`.
    fn walk(
        &mut self,
        seed: &TracedSegment,
        side: Side,
        opposite: &BusId,
        length: &mut Metres,
    ) -> Walk {
        let threshold = self.ctx.config.merge_length_threshold;
        let mut current = seed.id.clone();
        let mut bus = match side {
            Side::From => seed.from_bus.clone(),
            Side::To => seed.to_bus.clone(),
        };
        let mut members = Vec::new();

        while let Some(next) = self.next_hop(&current, &bus) {
            if !(next.params.impedance.same_series(&seed.params.impedance) || *length <= threshold) {
                break;
            }
            if next.far_bus(&bus) == opposite {
                break;
            }
            self.used.insert(next.id.clone());
            *length += next.params.length;
            bus = next.far_bus(&bus).clone();
            members.push(next.id.clone());
            current = next.id;
        }
        Walk { bus, members }
    }

    /// The single unused segment continuing from `current` through `bus`
    fn next_hop(&mut self, current: &ElementId, bus: &BusId) -> Option<TracedSegment> {
        let store = self.ctx.store;
        if store.degree(bus) != 2 {
            return None;
        }
        let mut others = store.elements_at(bus).into_iter().filter(|e| &e.id != current);
        let other = others.next()?;
        if others.next().is_some() || self.used.contains(&other.id) {
            return None;
        }
        self.segment(&other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::NetworkFixture;
    use gridtrace_core::{TopologyConfig, TopologyStore};

    fn merge(store: &TopologyStore, config: &TopologyConfig) -> Vec<LogicalLine> {
        SegmentMerger::new(TraceContext::new(store, config)).merge_all()
    }

    #[test]
    fn test_matching_chain_merges() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.from.bus.as_str(), "X");
        assert_eq!(line.to.bus.as_str(), "Z");
        assert_eq!(line.length(), Metres(80.0));
        assert_eq!(line.params.impedance.r1, Some(0.1));
        assert_eq!(line.name, "S1_S2");
    }

    #[test]
    fn test_walk_extends_backwards_from_middle_seed() {
        let store = NetworkFixture::new()
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("3", "S3", "Z", "W", 20.0, 0.1)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.id.as_str(), "2");
        assert_eq!((line.from.bus.as_str(), line.to.bus.as_str()), ("X", "W"));
        let members: Vec<&str> = line.members().iter().map(|m| m.as_str()).collect();
        assert_eq!(members, ["1", "2", "3"]);
        assert_eq!(line.name, "S1_S3");
    }

    #[test]
    fn test_different_impedance_stops_merge() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.2)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "S1");
        assert_eq!(lines[1].name, "S2");
    }

    #[test]
    fn test_short_seed_absorbs_different_impedance() {
        let store = NetworkFixture::new()
            .line("1", "J1", "X", "Y", 0.5, 0.3)
            .line("2", "S2", "Y", "Z", 30.0, 0.2)
            .line("3", "S3", "Z", "W", 30.0, 0.1)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].members().len(), 2);
        assert_eq!(lines[0].length(), Metres(30.5));
    }

    #[test]
    fn test_branching_bus_ends_line() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .load("L", "Load", "Y", 3.0)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_ring_never_closes_into_self_loop() {
        let store = NetworkFixture::new()
            .line("1", "S1", "A", "B", 10.0, 0.1)
            .line("2", "S2", "B", "C", 10.0, 0.1)
            .line("3", "S3", "C", "A", 10.0, 0.1)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_ne!(line.from.bus, line.to.bus, "{}", line.name);
        }
        let members: Vec<&str> = lines[0].members().iter().map(|m| m.as_str()).collect();
        assert_eq!(members, ["3", "1"]);
        assert_eq!((lines[0].from.bus.as_str(), lines[0].to.bus.as_str()), ("C", "B"));
        assert_eq!(lines[1].id.as_str(), "2");
        let total: f64 = lines.iter().map(|l| l.length().0).sum();
        assert_eq!(total, 30.0);
    }

    #[test]
    fn test_parallel_pair_stays_two_lines() {
        let store = NetworkFixture::new()
            .line("1", "S1", "A", "B", 10.0, 0.1)
            .line("2", "S2", "A", "B", 10.0, 0.1)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.members().len() == 1));
    }

    #[test]
    fn test_merged_name_drops_spaces() {
        let store = NetworkFixture::new()
            .line("1", "LV Cable 1", "X", "Y", 50.0, 0.1)
            .line("2", "LV Cable 2", "Y", "Z", 30.0, 0.1)
            .line("3", "Feeder A", "Z", "W", 30.0, 0.4)
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines[0].name, "LVCable1_LVCable2");
        assert_eq!(lines[1].name, "FeederA");
    }

    #[test]
    fn test_last_seen_switch_state() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .open_switch("2", "F2")
            .build();
        let lines = merge(&store, &TopologyConfig::default());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].params.switchable);
        assert!(!lines[0].enabled);
    }

    #[test]
    fn test_disabled_merging_keeps_segments() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .build();
        let config = TopologyConfig {
            merge_contiguous_lines: false,
            ..TopologyConfig::default()
        };
        let lines = merge(&store, &config);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].from.bus.as_str(), "Y");
    }

    #[test]
    fn test_failed_segments_are_reported_once() {
        let store = NetworkFixture::new()
            .line("1", "S1", "X", "Y", 50.0, 0.1)
            .line("2", "S2", "Y", "Z", 30.0, 0.1)
            .phase_code("2", 0)
            .build();
        let config = TopologyConfig::default();
        let mut merger = SegmentMerger::new(TraceContext::new(&store, &config));
        let lines = merger.merge_all();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].to.bus.as_str(), "Y");
        let mut diagnostics = Diagnostics::new();
        merger.report(&mut diagnostics);
        assert_eq!(diagnostics.warning_count(), 1);
    }
}
