//! Materialise the raw topology store from decoded Sincal records.
//!
//! Only active variants (`Flag_Variant == 1`) are loaded. The raw store keeps
//! every active element regardless of voltage; filtering, tracing and merging
//! happen in the reconstruction passes. Units are normalised here: lengths to
//! metres, powers to kW/kvar, capacitances divided by 1000.

use crate::sincal::{ElementRecord, LoadRecord, SincalDatabase, TerminalRecord};
use gridtrace_core::{
    compact_name, Breaker, Bus, Diagnostics, Element, ElementKind, Impedance, KilovoltAmperes, Kilovars,
    Kilovolts, Kilometres, Kilowatts, LineParams, LineType, LoadParams, PhaseLoad, PhaseSet,
    PhotovoltaicParams, Position, ShuntParams, SourceParams, Terminal, TopologyError,
    TopologyResult, TopologyStore, TransformerParams, Winding, WindingConnection,
};
use tracing::{debug, info, warn};

/// Counts of loaded records per category
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoadStats {
    pub buses: usize,
    pub lines: usize,
    pub transformers: usize,
    pub loads: usize,
    pub photovoltaics: usize,
    pub shunts: usize,
    pub sources: usize,
    pub inactive: usize,
    pub skipped: usize,
}

struct Loader<'a> {
    db: &'a SincalDatabase,
    store: TopologyStore,
    stats: LoadStats,
    diagnostics: &'a mut Diagnostics,
}

/// Build the raw store. Records that fail to convert are skipped and
/// reported in `diagnostics`.
pub fn build_store(db: &SincalDatabase, diagnostics: &mut Diagnostics) -> (TopologyStore, LoadStats) {
    let mut loader = Loader {
        db,
        store: TopologyStore::new(),
        stats: LoadStats::default(),
        diagnostics,
    };
    loader.load_nodes();
    loader.load_lines();
    loader.load_transformers();
    loader.load_loads();
    loader.load_photovoltaics();
    loader.load_shunts();
    loader.load_sources();
    info!(
        buses = loader.store.bus_count(),
        elements = loader.store.element_count(),
        skipped = loader.stats.skipped,
        "raw topology loaded"
    );
    (loader.store, loader.stats)
}

impl Loader<'_> {
    fn skip(&mut self, entity: &str, err: TopologyError) {
        warn!(entity, error = %err, "element skipped");
        self.diagnostics
            .add_warning_with_entity(err.category(), &err.to_string(), entity);
        self.stats.skipped += 1;
    }

    fn element_record(&self, id: &str) -> TopologyResult<&ElementRecord> {
        self.db
            .element(id)
            .ok_or_else(|| TopologyError::missing_record("Element", id))
    }

    fn voltage_of(&self, element: &ElementRecord) -> Option<Kilovolts> {
        self.db.element_voltage(element).map(Kilovolts)
    }

    /// Terminals of an element with their breaker records attached
    fn terminals(&self, element: &str) -> TopologyResult<Vec<Terminal>> {
        let records = self.db.terminals_for(element);
        if records.is_empty() {
            return Err(TopologyError::missing_record("Terminal", element));
        }
        Ok(records.into_iter().map(|t| self.terminal(t)).collect())
    }

    fn terminal(&self, record: &TerminalRecord) -> Terminal {
        let mut terminal = Terminal::new(record.number, record.node.as_str(), record.phase_code);
        if let Some(breaker) = self.db.breaker_for(&record.id) {
            terminal = terminal.with_breaker(Breaker {
                name: breaker.name.clone(),
                variant_active: breaker.active,
                closed: breaker.closed,
            });
        }
        terminal
    }

    fn insert(&mut self, element: Element) {
        debug!(id = %element.id, kind = element.kind.name(), "loaded element");
        if self.store.add_element(element).is_some() {
            self.stats.skipped += 1;
        }
    }

    fn load_nodes(&mut self) {
        let db = self.db;
        for node in db.nodes() {
            if !node.active {
                self.stats.inactive += 1;
                continue;
            }
            let mut bus = Bus::new(node.id.as_str());
            if let Some(name) = &node.name {
                bus = bus.with_name(name.clone());
            }
            if let Some(level) = node.voltage_level.as_deref().and_then(|l| db.voltage_level(l)) {
                bus = bus.with_nominal_kv(Kilovolts(level.un_kv));
            }
            match node.phase_code.map(PhaseSet::from_code) {
                Some(Ok(phases)) => bus = bus.with_phases(phases),
                Some(Err(err)) => {
                    let entity = format!("Node {}", node.id);
                    warn!(%entity, error = %err, "bus phases left unset");
                    self.diagnostics
                        .add_warning_with_entity("phase", &err.to_string(), &entity);
                }
                None => {}
            }
            if let (Some(lat), Some(lon)) = (node.lat, node.lon) {
                bus = bus.with_position(Position {
                    lat,
                    lon,
                    ..Position::default()
                });
            }
            self.store.add_bus(bus);
            self.stats.buses += 1;
        }
    }

    fn load_lines(&mut self) {
        let db = self.db;
        for line in db.line_records() {
            if !line.active {
                self.stats.inactive += 1;
                continue;
            }
            match self.line_element(line) {
                Ok(element) => {
                    self.insert(element);
                    self.stats.lines += 1;
                }
                Err(err) => self.skip(&format!("Line {}", line.element), err),
            }
        }
    }

    fn line_element(&self, line: &crate::sincal::LineRecord) -> TopologyResult<Element> {
        let record = self.element_record(&line.element)?;
        let terminals = self.terminals(&line.element)?;
        let impedance = Impedance {
            r0: line.r0,
            r1: line.r1,
            x0: line.x0,
            x1: line.x1,
            c0: line.c0.map(|c| c / 1000.0),
            c1: line.c1.map(|c| c / 1000.0),
        };
        let params = LineParams {
            length: Kilometres(line.length_km).to_metres(),
            impedance,
            line_type: LineType::from_code(line.line_type),
            rated_kv: line.rated_kv.map(Kilovolts),
            ..LineParams::default()
        };
        let mut element = Element::new(record.id.as_str(), record.name.clone(), ElementKind::Line(params))
            .with_enabled(record.in_service);
        element.voltage_kv = self.voltage_of(record);
        element.terminals = terminals;
        Ok(element)
    }

    fn load_transformers(&mut self) {
        let db = self.db;
        for transformer in db.transformer_records() {
            if !transformer.active {
                self.stats.inactive += 1;
                continue;
            }
            match self.transformer_element(transformer) {
                Ok(element) => {
                    self.insert(element);
                    self.stats.transformers += 1;
                }
                Err(err) => self.skip(&format!("TwoWindingTransformer {}", transformer.element), err),
            }
        }
    }

    fn transformer_element(
        &mut self,
        record: &crate::sincal::TransformerRecord,
    ) -> TopologyResult<Element> {
        let element = self.element_record(&record.element)?.clone();
        let mut terminals = self.terminals(&record.element)?;
        let name = format!("{}_{}", compact_name(&element.name).to_lowercase(), element.id);

        let (reactance, load_loss) = if record.sn_mva > 0.0 {
            let sn_va = record.sn_mva * 1e6;
            let z12 = (record.un1_kv * 1e3).powi(2) / sn_va * record.ur_percent.unwrap_or(0.0) / 100.0;
            let loss = record.vfe_kw.unwrap_or(0.0) * 1e3 / sn_va * 100.0;
            (z12, loss)
        } else {
            let entity = format!("Transformer {}", element.id);
            warn!(%entity, "rating Sn is zero, impedance left at zero");
            self.diagnostics
                .add_warning_with_entity("parse", "rating Sn is zero, impedance left at zero", &entity);
            (0.0, 0.0)
        };

        let connection = |winding| {
            record
                .vector_group
                .and_then(|group| WindingConnection::for_vector_group(group, winding))
        };
        let params = TransformerParams {
            windings: [
                Winding {
                    nominal_kv: Kilovolts(record.un1_kv),
                    connection: connection(0),
                    tap: record.tap1,
                },
                Winding {
                    nominal_kv: Kilovolts(record.un2_kv),
                    connection: connection(1),
                    tap: record.tap2,
                },
            ],
            rating: KilovoltAmperes::from_megavoltamperes(record.sn_mva),
            reactance,
            load_loss,
            vector_group: record.vector_group,
        };
        if params.has_delta() {
            // a delta winding needs two conductors
            for terminal in terminals.iter_mut().filter(|t| (1..=3).contains(&t.phase_code)) {
                terminal.phase_code = 4;
            }
        }
        let mut transformer = Element::new(element.id.as_str(), name, ElementKind::Transformer(params))
            .with_enabled(element.in_service);
        transformer.voltage_kv = self.voltage_of(&element);
        transformer.terminals = terminals;
        Ok(transformer)
    }

    fn load_loads(&mut self) {
        let db = self.db;
        for load in db.loads() {
            if !load.active {
                self.stats.inactive += 1;
                continue;
            }
            match self.load_element(load) {
                Ok(element) => {
                    self.insert(element);
                    self.stats.loads += 1;
                }
                Err(err) => self.skip(&format!("Load {}", load.element), err),
            }
        }
    }

    fn load_element(&self, load: &LoadRecord) -> TopologyResult<Element> {
        let record = self.element_record(&load.element)?;
        let terminals = self.terminals(&load.element)?;
        let phases = terminals[0].phases()?;
        let count = phases.len() as f64;

        let phase_loads = phases
            .phases()
            .iter()
            .zip(load.p.iter().zip(load.q.iter()))
            .map(|(&phase, (&p, &q))| {
                let (p, q) = if p != 0.0 || q != 0.0 {
                    (p, q)
                } else if load.input_mode == Some(1) {
                    // totals entered as P/Q with scaling factors
                    (
                        load.p_total.unwrap_or(0.0) / count * load.p_factor,
                        load.q_total.unwrap_or(0.0) / count * load.q_factor,
                    )
                } else {
                    (0.0, 0.0)
                };
                PhaseLoad {
                    phase,
                    p: Kilowatts::from_megawatts(p),
                    q: Kilovars::from_megavars(q),
                }
            })
            .collect();

        let mut element = Element::new(
            record.id.as_str(),
            compact_name(&record.name),
            ElementKind::Load(LoadParams { phase_loads }),
        );
        element.voltage_kv = self.voltage_of(record);
        element.terminals = terminals;
        Ok(element)
    }

    fn load_photovoltaics(&mut self) {
        let db = self.db;
        for pv in db.dc_infeeders() {
            if !pv.active {
                self.stats.inactive += 1;
                continue;
            }
            let result = self.element_record(&pv.element).and_then(|record| {
                let terminals = self.terminals(&pv.element)?;
                let name = format!("{}_{}", pv.element, compact_name(&record.name).to_lowercase());
                let mut element = Element::new(
                    record.id.as_str(),
                    name,
                    ElementKind::Photovoltaic(PhotovoltaicParams {
                        p: Kilowatts::from_megawatts(pv.p_mw * pv.p_factor),
                        q: Kilovars::from_megavars(pv.q_mvar * pv.q_factor),
                    }),
                );
                element.voltage_kv = self.voltage_of(record);
                element.terminals = terminals;
                Ok(element)
            });
            match result {
                Ok(element) => {
                    self.insert(element);
                    self.stats.photovoltaics += 1;
                }
                Err(err) => self.skip(&format!("DCInfeeder {}", pv.element), err),
            }
        }
    }

    fn load_shunts(&mut self) {
        let db = self.db;
        let groups = [
            (db.shunt_condensators(), "ShuntCondensator", true),
            (db.shunt_reactors(), "ShuntReactor", false),
        ];
        for (records, table, capacitor) in groups {
            for shunt in records {
                if !shunt.active {
                    self.stats.inactive += 1;
                    continue;
                }
                let result = self.element_record(&shunt.element).and_then(|record| {
                    let terminals = self.terminals(&shunt.element)?;
                    let params = ShuntParams {
                        q: Kilovars::from_megavars(shunt.q_mvar),
                    };
                    let kind = if capacitor {
                        ElementKind::Capacitor(params)
                    } else {
                        ElementKind::Reactor(params)
                    };
                    let mut element =
                        Element::new(record.id.as_str(), compact_name(&record.name).to_lowercase(), kind);
                    element.voltage_kv = self.voltage_of(record);
                    element.terminals = terminals;
                    Ok(element)
                });
                match result {
                    Ok(element) => {
                        self.insert(element);
                        self.stats.shunts += 1;
                    }
                    Err(err) => self.skip(&format!("{table} {}", shunt.element), err),
                }
            }
        }
    }

    fn load_sources(&mut self) {
        let db = self.db;
        let groups = [
            (db.synchronous_machines(), "SynchronousMachine", true),
            (db.infeeders(), "Infeeder", false),
        ];
        for (records, table, needs_service) in groups {
            for source in records {
                if !source.active {
                    self.stats.inactive += 1;
                    continue;
                }
                let result = self.element_record(&source.element).and_then(|record| {
                    if needs_service && !record.in_service {
                        return Ok(None);
                    }
                    let terminals = self.terminals(&source.element)?;
                    let voltage = self.voltage_of(record);
                    let mut element = Element::new(
                        record.id.as_str(),
                        record.name.clone(),
                        ElementKind::Source(SourceParams {
                            nominal_kv: voltage,
                            connection: WindingConnection::Wye,
                            is_sourcebus: true,
                            phase_angle: source.phase_angle,
                        }),
                    );
                    element.voltage_kv = voltage;
                    element.terminals = terminals;
                    Ok(Some(element))
                });
                match result {
                    Ok(Some(element)) => {
                        self.insert(element);
                        self.stats.sources += 1;
                    }
                    Ok(None) => self.stats.inactive += 1,
                    Err(err) => self.skip(&format!("{table} {}", source.element), err),
                }
            }
        }
    }
}
