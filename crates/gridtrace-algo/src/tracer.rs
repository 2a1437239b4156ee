//! Segment Tracer.
//!
//! Resolves the logical endpoints of a raw line segment. An endpoint is
//! normally the bus its terminal sits on. When that bus also carries a
//! transformer that the current filter/policy leaves out of the output, the
//! endpoint is replaced by the synthetic source bus of the transformer's far
//! winding (`sourcebus_<V>`), so the segment still ends somewhere the
//! downstream model can feed from.
//!
//! The tracer also derives the switch state of a segment from breaker
//! records on its terminals and stabilises zero impedances.

use gridtrace_core::{
    BusId, Diagnostics, Element, ElementId, Kilovolts, LineParams, PhaseSet, TopologyConfig,
    TopologyError, TopologyResult, TopologyStore, TransformerParams, VoltageFilter,
};
use tracing::{debug, warn};

/// Read-only view of one reconstruction run.
///
/// Passed by value into every tracing function; it carries no state of its
/// own besides the filter and the optional anchor transformer of an island.
#[derive(Debug, Clone, Copy)]
pub struct TraceContext<'a> {
    pub store: &'a TopologyStore,
    pub config: &'a TopologyConfig,
    filter: VoltageFilter,
    anchor: Option<&'a ElementId>,
}

impl<'a> TraceContext<'a> {
    pub fn new(store: &'a TopologyStore, config: &'a TopologyConfig) -> Self {
        Self {
            store,
            config,
            filter: config.voltage_filter,
            anchor: None,
        }
    }

    pub fn with_filter(mut self, filter: VoltageFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Never substitute around this transformer (the root of an island)
    pub fn with_anchor(mut self, transformer: &'a ElementId) -> Self {
        self.anchor = Some(transformer);
        self
    }

    pub fn filter(&self) -> VoltageFilter {
        self.filter
    }

    /// Whether an element's voltage level passes the filter.
    ///
    /// Elements without a known voltage pass.
    pub fn admits(&self, element: &Element) -> bool {
        let kv = element
            .voltage_kv
            .or_else(|| element.line().and_then(|line| line.rated_kv));
        kv.map_or(true, |kv| self.filter.admits(kv))
    }

    /// Transformer inclusion policy.
    ///
    /// With `include_transformers` a transformer is kept when either winding
    /// passes the filter, otherwise only when both do.
    pub fn keeps_transformer(&self, params: &TransformerParams) -> bool {
        let mut admitted = params.windings.iter().map(|w| self.filter.admits(w.nominal_kv));
        if self.config.include_transformers {
            admitted.any(|ok| ok)
        } else {
            admitted.all(|ok| ok)
        }
    }

    /// Logical endpoint for a terminal of `element` sitting on `bus`
    pub fn resolve_bus(&self, bus: &BusId, element: &ElementId) -> Endpoint {
        for attached in self.store.terminals_of(bus) {
            let other = attached.element;
            if &other.id == element || Some(&other.id) == self.anchor {
                continue;
            }
            let Some(params) = other.transformer() else {
                continue;
            };
            if self.keeps_transformer(params) {
                continue;
            }
            let far = if attached.terminal.number == 1 { 1 } else { 0 };
            let kv = params.windings[far].nominal_kv;
            debug!(%bus, transformer = %other.id, %kv, "endpoint substituted by source bus");
            return Endpoint::source(kv);
        }
        Endpoint::bus(bus.clone())
    }
}

/// Resolved end of a segment or logical line
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub bus: BusId,
    /// Voltage of the synthetic source bus when the endpoint was substituted
    pub source_kv: Option<Kilovolts>,
}

impl Endpoint {
    pub fn bus(bus: BusId) -> Self {
        Self {
            bus,
            source_kv: None,
        }
    }

    pub fn source(kv: Kilovolts) -> Self {
        Self {
            bus: BusId::source_bus(kv),
            source_kv: Some(kv),
        }
    }

    pub fn is_substituted(&self) -> bool {
        self.source_kv.is_some()
    }
}

/// A raw segment with resolved endpoints, switch state and stable impedance
#[derive(Debug, Clone, PartialEq)]
pub struct TracedSegment {
    pub id: ElementId,
    pub name: String,
    /// Bus of terminal 1 as stored
    pub from_bus: BusId,
    /// Bus of terminal 2 as stored
    pub to_bus: BusId,
    pub from: Endpoint,
    pub to: Endpoint,
    pub phases: PhaseSet,
    pub params: LineParams,
    pub enabled: bool,
    /// Breaker state (`true` = closed) when the segment is switchable
    pub switch_state: Option<bool>,
    pub voltage_kv: Option<Kilovolts>,
}

impl TracedSegment {
    /// The stored bus at the other end from `bus`
    pub fn far_bus(&self, bus: &BusId) -> &BusId {
        if &self.from_bus == bus {
            &self.to_bus
        } else {
            &self.from_bus
        }
    }
}

/// Whether an element is a segment the current run traces
pub fn is_candidate(ctx: &TraceContext<'_>, element: &Element) -> bool {
    element.is_line() && ctx.admits(element)
}

/// Trace one raw segment.
///
/// Fails for elements that are not two-terminal lines and for unknown phase
/// codes; callers skip the segment and record a warning.
pub fn trace_segment(ctx: &TraceContext<'_>, element: &Element) -> TopologyResult<TracedSegment> {
    let line = element.line().ok_or_else(|| {
        TopologyError::invalid_value(format!("element {}", element.id), "not a line segment")
    })?;
    let (t1, t2) = element
        .endpoints()
        .ok_or_else(|| TopologyError::missing_record("Terminal", element.id.as_str()))?;
    let phases = t1.phases()?;

    let mut switch_state = None;
    for terminal in [t1, t2] {
        if let Some(breaker) = &terminal.breaker {
            if breaker.variant_active && ctx.store.degree(&terminal.bus) > 1 {
                switch_state = Some(breaker.closed);
            }
        }
    }

    let mut params = line.clone();
    params.impedance = params.impedance.stabilized();
    params.switchable = switch_state.is_some();
    params.members = vec![element.id.clone()];

    Ok(TracedSegment {
        id: element.id.clone(),
        name: element.name.clone(),
        from: ctx.resolve_bus(&t1.bus, &element.id),
        to: ctx.resolve_bus(&t2.bus, &element.id),
        from_bus: t1.bus.clone(),
        to_bus: t2.bus.clone(),
        phases,
        params,
        enabled: switch_state.unwrap_or(element.enabled),
        switch_state,
        voltage_kv: element.voltage_kv,
    })
}

/// Trace every candidate segment of the store in input order.
///
/// Segments that fail to trace are skipped with a warning.
pub fn trace_segments(ctx: &TraceContext<'_>, diagnostics: &mut Diagnostics) -> Vec<TracedSegment> {
    ctx.store
        .elements()
        .filter(|element| is_candidate(ctx, element))
        .filter_map(|element| match trace_segment(ctx, element) {
            Ok(segment) => Some(segment),
            Err(err) => {
                report_skipped(diagnostics, &element.id, &err);
                None
            }
        })
        .collect()
}

pub(crate) fn report_skipped(diagnostics: &mut Diagnostics, id: &ElementId, err: &TopologyError) {
    warn!(element = %id, error = %err, "segment skipped");
    diagnostics.add_warning_with_entity(err.category(), &err.to_string(), id.as_str());
}
