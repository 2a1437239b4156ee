//! Projection of the raw store into an output network.
//!
//! [`NetworkBuilder`] collects logical lines and the elements that survive
//! the voltage filter into a fresh [`TopologyStore`]. Bus attributes are
//! copied from the raw store; every substituted endpoint gets a synthetic
//! source bus and, on [`NetworkBuilder::finish`], a source element feeding
//! it. [`project_network`] is the whole-network pass.

use crate::merger::{LogicalLine, SegmentMerger};
use crate::tracer::{Endpoint, TraceContext};
use crate::Network;
use gridtrace_core::{
    Bus, BusId, Diagnostics, Element, ElementKind, Kilovolts, PhaseSet, SourceParams, Terminal,
    TopologyStore, WindingConnection,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct NetworkBuilder<'a> {
    raw: &'a TopologyStore,
    store: TopologyStore,
    sources: Vec<(BusId, Kilovolts)>,
    source_buses: HashSet<BusId>,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(raw: &'a TopologyStore) -> Self {
        Self {
            raw,
            store: TopologyStore::new(),
            sources: Vec::new(),
            source_buses: HashSet::new(),
        }
    }

    pub fn store(&self) -> &TopologyStore {
        &self.store
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.store.contains_element(&element.id)
    }

    /// Copy the attributes of a real bus from the raw store
    fn add_real_bus(&mut self, id: &BusId) {
        if self.store.contains_bus(id) {
            return;
        }
        let bus = self.raw.bus(id).cloned().unwrap_or_else(|| Bus::new(id.clone()));
        self.store.add_bus(bus);
    }

    /// Declare a synthetic source bus fed by a source element at `finish`
    pub fn add_source_bus(&mut self, kv: Kilovolts) -> BusId {
        let id = BusId::source_bus(kv);
        if self.source_buses.insert(id.clone()) {
            self.store
                .add_bus(Bus::new(id.clone()).with_nominal_kv(kv).with_phases(PhaseSet::ABC));
            self.sources.push((id.clone(), kv));
        }
        id
    }

    fn add_endpoint(&mut self, endpoint: &Endpoint) {
        match endpoint.source_kv {
            Some(kv) => {
                self.add_source_bus(kv);
            }
            None => self.add_real_bus(&endpoint.bus),
        }
    }

    pub fn add_line(&mut self, line: LogicalLine) {
        self.add_endpoint(&line.from);
        self.add_endpoint(&line.to);
        self.store.add_element(line.into_element());
    }

    /// Add a transformer; windings outside the filter end on their source bus
    pub fn add_transformer(&mut self, ctx: &TraceContext<'_>, element: &Element) {
        let Some(params) = element.transformer() else {
            return;
        };
        let mut transformer = element.clone();
        for terminal in &mut transformer.terminals {
            let winding = usize::from(terminal.number.saturating_sub(1)).min(1);
            let kv = params.windings[winding].nominal_kv;
            if ctx.filter().admits(kv) {
                self.add_real_bus(&terminal.bus);
            } else {
                terminal.bus = self.add_source_bus(kv);
            }
        }
        self.store.add_element(transformer);
    }

    /// Add a single-terminal element at its resolved bus.
    ///
    /// Unknown phase codes skip the element with a warning.
    pub fn add_attached(
        &mut self,
        ctx: &TraceContext<'_>,
        element: &Element,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(terminal) = element.primary_terminal() else {
            warn!(element = %element.id, "element without terminal skipped");
            diagnostics.add_warning_with_entity("schema", "element has no terminal", element.id.as_str());
            return;
        };
        if let Err(err) = terminal.phases() {
            warn!(element = %element.id, error = %err, "element skipped");
            diagnostics.add_warning_with_entity(err.category(), &err.to_string(), element.id.as_str());
            return;
        }
        let endpoint = ctx.resolve_bus(&terminal.bus, &element.id);
        self.add_endpoint(&endpoint);
        let mut attached = element.clone();
        attached.terminals = vec![Terminal {
            bus: endpoint.bus,
            ..terminal.clone()
        }];
        self.store.add_element(attached);
    }

    /// Add an element as is, creating its buses from the raw store
    pub fn add_element(&mut self, element: Element) {
        for terminal in &element.terminals {
            if !self.source_buses.contains(&terminal.bus) {
                self.add_real_bus(&terminal.bus);
            }
        }
        self.store.add_element(element);
    }

    /// Add a source element named `name` feeding a synthetic source bus
    pub fn add_source(&mut self, bus: &BusId, kv: Kilovolts, name: &str) {
        let element = Element::new(bus.as_str(), name, source_kind(kv))
            .with_voltage(kv)
            .with_terminal(Terminal::new(1, bus.clone(), 7));
        self.store.add_element(element);
    }

    /// Feed every synthetic source bus that has no source yet and return
    /// the network
    pub fn finish(mut self, name: impl Into<String>) -> Network {
        for (bus, kv) in std::mem::take(&mut self.sources) {
            let fed = self
                .store
                .elements_at(&bus)
                .iter()
                .any(|e| matches!(e.kind, ElementKind::Source(_)));
            if !fed {
                debug!(%bus, "synthetic source added");
                self.add_source(&bus, kv, bus.as_str());
            }
        }
        Network {
            name: name.into(),
            store: self.store,
        }
    }
}

fn source_kind(kv: Kilovolts) -> ElementKind {
    ElementKind::Source(SourceParams {
        nominal_kv: Some(kv),
        connection: WindingConnection::Wye,
        is_sourcebus: true,
        phase_angle: None,
    })
}

/// Whole-network pass: every element of the raw store that survives the
/// voltage filter, with lines merged when configured.
pub fn project_network(
    ctx: TraceContext<'_>,
    name: &str,
    diagnostics: &mut Diagnostics,
) -> Network {
    let mut merger = SegmentMerger::new(ctx);
    let lines = merger.merge_all();
    merger.report(diagnostics);

    let mut builder = NetworkBuilder::new(ctx.store);
    let line_count = lines.len();
    for line in lines {
        builder.add_line(line);
    }
    for element in ctx.store.elements() {
        match &element.kind {
            ElementKind::Line(_) => {}
            ElementKind::Transformer(params) => {
                if ctx.keeps_transformer(params) {
                    builder.add_transformer(&ctx, element);
                }
            }
            _ => {
                if ctx.admits(element) {
                    builder.add_attached(&ctx, element, diagnostics);
                }
            }
        }
    }
    let network = builder.finish(name);
    info!(
        network = %network.name,
        lines = line_count,
        buses = network.store.bus_count(),
        elements = network.store.element_count(),
        "projected network"
    );
    network
}
