//! Typed view of the Sincal tables.
//!
//! [`SincalDatabase::open`] reads every table once, resolves each table's
//! column map once, decodes rows into typed records and builds the lookup
//! indices the loader needs. A row that cannot be decoded is skipped and
//! recorded in the database diagnostics; only a missing `Element` or
//! `Terminal` table (or one of their key columns) fails the whole open.

use crate::source::RecordSource;
use crate::table::{ColumnMap, Row};
use anyhow::{Context, Result};
use gridtrace_core::{Diagnostics, TopologyError, TopologyResult};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub id: String,
    pub name: String,
    pub kind: Option<String>,
    pub voltage_level: Option<String>,
    /// `Flag_State`, defaulting to in service
    pub in_service: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRecord {
    pub id: String,
    pub element: String,
    pub node: String,
    pub number: u8,
    pub phase_code: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub element: String,
    pub active: bool,
    pub length_km: f64,
    pub line_type: i64,
    pub r0: Option<f64>,
    pub r1: Option<f64>,
    pub x0: Option<f64>,
    pub x1: Option<f64>,
    pub c0: Option<f64>,
    pub c1: Option<f64>,
    pub rated_kv: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakerRecord {
    pub id: Option<String>,
    pub terminal: String,
    pub name: String,
    pub active: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoltageLevelRecord {
    pub id: String,
    pub un_kv: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformerRecord {
    pub element: String,
    pub active: bool,
    pub un1_kv: f64,
    pub un2_kv: f64,
    pub sn_mva: f64,
    pub vector_group: Option<i64>,
    pub tap1: Option<f64>,
    pub tap2: Option<f64>,
    pub ur_percent: Option<f64>,
    pub vfe_kw: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub name: Option<String>,
    pub voltage_level: Option<String>,
    pub active: bool,
    pub phase_code: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRecord {
    pub element: String,
    pub active: bool,
    /// Per-phase active power P1..P3 in MW
    pub p: [f64; 3],
    /// Per-phase reactive power Q1..Q3 in Mvar
    pub q: [f64; 3],
    pub p_total: Option<f64>,
    pub q_total: Option<f64>,
    pub p_factor: f64,
    pub q_factor: f64,
    /// `Flag_Lf`, the load input mode
    pub input_mode: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcInfeederRecord {
    pub element: String,
    pub active: bool,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub p_factor: f64,
    pub q_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShuntRecord {
    pub element: String,
    pub active: bool,
    pub q_mvar: f64,
}

/// `Infeeder` and `SynchronousMachine` rows
#[derive(Debug, Clone, PartialEq)]
pub struct InfeederRecord {
    pub element: String,
    pub active: bool,
    pub phase_angle: Option<f64>,
}

/// All Sincal tables the reconstruction reads, decoded and indexed.
#[derive(Debug, Default)]
pub struct SincalDatabase {
    elements: Vec<ElementRecord>,
    element_index: HashMap<String, usize>,
    terminals: Vec<TerminalRecord>,
    terminals_by_element: HashMap<String, Vec<usize>>,
    terminals_by_node: HashMap<String, Vec<usize>>,
    lines: Vec<LineRecord>,
    breakers: HashMap<String, BreakerRecord>,
    voltage_levels: HashMap<String, VoltageLevelRecord>,
    transformers: Vec<TransformerRecord>,
    transformer_index: HashMap<String, usize>,
    nodes: Vec<NodeRecord>,
    loads: Vec<LoadRecord>,
    dc_infeeders: Vec<DcInfeederRecord>,
    shunt_condensators: Vec<ShuntRecord>,
    shunt_reactors: Vec<ShuntRecord>,
    infeeders: Vec<InfeederRecord>,
    synchronous_machines: Vec<InfeederRecord>,
    diagnostics: Diagnostics,
}

struct TableReader<'a> {
    source: &'a dyn RecordSource,
    diagnostics: &'a mut Diagnostics,
}

impl TableReader<'_> {
    /// Decode one table. Missing tables are empty unless `required`.
    fn read<T>(
        &mut self,
        name: &str,
        key_columns: &[&str],
        required: bool,
        decode: impl Fn(&Row) -> TopologyResult<T>,
    ) -> Result<Vec<T>> {
        let table = match self
            .source
            .table(name)
            .with_context(|| format!("reading table {name}"))?
        {
            Some(table) => table,
            None if required => anyhow::bail!("table {name} not found in {}", self.source.describe()),
            None => {
                debug!(table = name, "optional table absent");
                return Ok(Vec::new());
            }
        };
        let map = match ColumnMap::resolve(&table, key_columns) {
            Ok(map) => map,
            Err(err) if required => return Err(err).context("resolving columns"),
            Err(err) => {
                warn!(table = name, error = %err, "table ignored");
                self.diagnostics.add_warning(err.category(), &err.to_string());
                return Ok(Vec::new());
            }
        };
        let mut records = Vec::with_capacity(table.len());
        for (idx, values) in table.rows.iter().enumerate() {
            match decode(&map.row(values)) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let entity = format!("{name} row {}", idx + 1);
                    warn!(%entity, error = %err, "record skipped");
                    self.diagnostics
                        .add_warning_with_entity(err.category(), &err.to_string(), &entity);
                }
            }
        }
        debug!(table = name, records = records.len(), "decoded table");
        Ok(records)
    }
}

fn decode_shunt(row: &Row) -> TopologyResult<ShuntRecord> {
    Ok(ShuntRecord {
        element: row.key("Element_ID")?,
        active: row.flag("Flag_Variant", true),
        q_mvar: row.opt_f64("Sn").or_else(|| row.opt_f64("Q")).unwrap_or(0.0),
    })
}

fn decode_infeeder(row: &Row) -> TopologyResult<InfeederRecord> {
    Ok(InfeederRecord {
        element: row.key("Element_ID")?,
        active: row.flag("Flag_Variant", true),
        phase_angle: row.opt_f64("delta"),
    })
}

impl SincalDatabase {
    pub fn open(source: &dyn RecordSource) -> Result<Self> {
        let mut diagnostics = Diagnostics::new();
        let mut reader = TableReader {
            source,
            diagnostics: &mut diagnostics,
        };

        let elements = reader.read("Element", &["Element_ID"], true, |row| {
            Ok(ElementRecord {
                id: row.key("Element_ID")?,
                name: row.text("Name").unwrap_or_default(),
                kind: row.text("Type"),
                voltage_level: row.opt_key("VoltLevel_ID"),
                in_service: row.flag("Flag_State", true),
            })
        })?;
        let terminals = reader.read(
            "Terminal",
            &["Terminal_ID", "Element_ID", "Node_ID"],
            true,
            |row| {
                let number = row.opt_i64("TerminalNo").unwrap_or(1);
                Ok(TerminalRecord {
                    id: row.key("Terminal_ID")?,
                    element: row.key("Element_ID")?,
                    node: row.key("Node_ID")?,
                    number: u8::try_from(number).map_err(|_| {
                        TopologyError::invalid_value(
                            "Terminal.TerminalNo",
                            number.to_string(),
                        )
                    })?,
                    phase_code: row.opt_i64("Flag_Terminal").unwrap_or(7),
                })
            },
        )?;
        let lines = reader.read("Line", &["Element_ID", "l"], false, |row| {
            Ok(LineRecord {
                element: row.key("Element_ID")?,
                active: row.flag("Flag_Variant", true),
                length_km: row.f64("l")?,
                line_type: row.opt_i64("Flag_LineTyp").unwrap_or(0),
                r0: row.opt_f64("r0"),
                r1: row.opt_f64("r"),
                x0: row.opt_f64("x0"),
                x1: row.opt_f64("x"),
                c0: row.opt_f64("c0"),
                c1: row.opt_f64("c"),
                rated_kv: row.opt_f64("Un"),
            })
        })?;
        let breakers = reader.read("Breaker", &["Terminal_ID"], false, |row| {
            Ok(BreakerRecord {
                id: row.opt_key("Breaker_ID"),
                terminal: row.key("Terminal_ID")?,
                name: row.text("Name").unwrap_or_default(),
                active: row.flag("Flag_Variant", false),
                closed: row.flag("Flag_State", true),
            })
        })?;
        let voltage_levels =
            reader.read("VoltageLevel", &["VoltLevel_ID", "Un"], false, |row| {
                Ok(VoltageLevelRecord {
                    id: row.key("VoltLevel_ID")?,
                    un_kv: row.f64("Un")?,
                })
            })?;
        let transformers = reader.read(
            "TwoWindingTransformer",
            &["Element_ID", "Un1", "Un2"],
            false,
            |row| {
                Ok(TransformerRecord {
                    element: row.key("Element_ID")?,
                    active: row.flag("Flag_Variant", true),
                    un1_kv: row.f64("Un1")?,
                    un2_kv: row.f64("Un2")?,
                    sn_mva: row.opt_f64("Sn").unwrap_or(0.0),
                    vector_group: row.opt_i64("VecGrp"),
                    tap1: row.opt_f64("roh1"),
                    tap2: row.opt_f64("roh2"),
                    ur_percent: row.opt_f64("ur"),
                    vfe_kw: row.opt_f64("Vfe"),
                })
            },
        )?;
        let nodes = reader.read("Node", &["Node_ID"], false, |row| {
            Ok(NodeRecord {
                id: row.key("Node_ID")?,
                name: row.text("Name"),
                voltage_level: row.opt_key("VoltLevel_ID"),
                active: row.flag("Flag_Variant", true),
                phase_code: row.opt_i64("Flag_Phase"),
                lat: row.opt_f64("lat"),
                lon: row.opt_f64("lon"),
            })
        })?;
        let loads = reader.read("Load", &["Element_ID"], false, |row| {
            let f = |c: &str| row.opt_f64(c).unwrap_or(0.0);
            Ok(LoadRecord {
                element: row.key("Element_ID")?,
                active: row.flag("Flag_Variant", true),
                p: [f("P1"), f("P2"), f("P3")],
                q: [f("Q1"), f("Q2"), f("Q3")],
                p_total: row.opt_f64("P"),
                q_total: row.opt_f64("Q"),
                p_factor: row.opt_f64("fP").unwrap_or(1.0),
                q_factor: row.opt_f64("fQ").unwrap_or(1.0),
                input_mode: row.opt_i64("Flag_Lf"),
            })
        })?;
        let dc_infeeders = reader.read("DCInfeeder", &["Element_ID"], false, |row| {
            Ok(DcInfeederRecord {
                element: row.key("Element_ID")?,
                active: row.flag("Flag_Variant", true),
                p_mw: row.opt_f64("P").unwrap_or(0.0),
                q_mvar: row.opt_f64("Q").unwrap_or(0.0),
                p_factor: row.opt_f64("fP").unwrap_or(1.0),
                q_factor: row.opt_f64("fQ").unwrap_or(1.0),
            })
        })?;
        let shunt_condensators = reader.read("ShuntCondensator", &["Element_ID"], false, decode_shunt)?;
        let shunt_reactors = reader.read("ShuntReactor", &["Element_ID"], false, decode_shunt)?;
        let infeeders = reader.read("Infeeder", &["Element_ID"], false, decode_infeeder)?;
        let synchronous_machines =
            reader.read("SynchronousMachine", &["Element_ID"], false, decode_infeeder)?;

        let mut db = SincalDatabase {
            elements,
            terminals,
            lines,
            transformers,
            nodes,
            loads,
            dc_infeeders,
            shunt_condensators,
            shunt_reactors,
            infeeders,
            synchronous_machines,
            ..SincalDatabase::default()
        };
        db.index(breakers, voltage_levels);
        db.diagnostics = diagnostics;
        info!(
            source = %source.describe(),
            elements = db.elements.len(),
            terminals = db.terminals.len(),
            lines = db.lines.len(),
            transformers = db.transformers.len(),
            "opened Sincal tables"
        );
        Ok(db)
    }

    fn index(&mut self, breakers: Vec<BreakerRecord>, voltage_levels: Vec<VoltageLevelRecord>) {
        for (idx, element) in self.elements.iter().enumerate() {
            self.element_index.entry(element.id.clone()).or_insert(idx);
        }
        for (idx, terminal) in self.terminals.iter().enumerate() {
            self.terminals_by_element
                .entry(terminal.element.clone())
                .or_default()
                .push(idx);
            self.terminals_by_node
                .entry(terminal.node.clone())
                .or_default()
                .push(idx);
        }
        for list in self.terminals_by_element.values_mut() {
            let terminals = &self.terminals;
            list.sort_by_key(|&idx| terminals[idx].number);
        }
        for breaker in breakers {
            // first row wins, like a `LIMIT 1` lookup
            self.breakers.entry(breaker.terminal.clone()).or_insert(breaker);
        }
        for level in voltage_levels {
            self.voltage_levels.entry(level.id.clone()).or_insert(level);
        }
        for (idx, transformer) in self.transformers.iter().enumerate() {
            self.transformer_index
                .entry(transformer.element.clone())
                .or_insert(idx);
        }
    }

    // =========================================================================
    // Record access
    // =========================================================================

    pub fn elements(&self) -> &[ElementRecord] {
        &self.elements
    }

    pub fn element(&self, id: &str) -> Option<&ElementRecord> {
        self.element_index.get(id).map(|&idx| &self.elements[idx])
    }

    /// Terminals of an element ordered by terminal number
    pub fn terminals_for(&self, element: &str) -> Vec<&TerminalRecord> {
        self.terminals_by_element
            .get(element)
            .map(|list| list.iter().map(|&idx| &self.terminals[idx]).collect())
            .unwrap_or_default()
    }

    /// Terminals attached to a node, in record order
    pub fn terminals_for_bus(&self, node: &str) -> Vec<&TerminalRecord> {
        self.terminals_by_node
            .get(node)
            .map(|list| list.iter().map(|&idx| &self.terminals[idx]).collect())
            .unwrap_or_default()
    }

    pub fn line_records(&self) -> &[LineRecord] {
        &self.lines
    }

    pub fn breaker_for(&self, terminal: &str) -> Option<&BreakerRecord> {
        self.breakers.get(terminal)
    }

    pub fn voltage_level(&self, id: &str) -> Option<&VoltageLevelRecord> {
        self.voltage_levels.get(id)
    }

    pub fn voltage_levels(&self) -> impl Iterator<Item = &VoltageLevelRecord> {
        self.voltage_levels.values()
    }

    pub fn two_winding_transformer(&self, element: &str) -> Option<&TransformerRecord> {
        self.transformer_index
            .get(element)
            .map(|&idx| &self.transformers[idx])
    }

    pub fn transformer_records(&self) -> &[TransformerRecord] {
        &self.transformers
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn loads(&self) -> &[LoadRecord] {
        &self.loads
    }

    pub fn dc_infeeders(&self) -> &[DcInfeederRecord] {
        &self.dc_infeeders
    }

    pub fn shunt_condensators(&self) -> &[ShuntRecord] {
        &self.shunt_condensators
    }

    pub fn shunt_reactors(&self) -> &[ShuntRecord] {
        &self.shunt_reactors
    }

    pub fn infeeders(&self) -> &[InfeederRecord] {
        &self.infeeders
    }

    pub fn synchronous_machines(&self) -> &[InfeederRecord] {
        &self.synchronous_machines
    }

    /// Nominal voltage of an element's voltage level in kV
    pub fn element_voltage(&self, element: &ElementRecord) -> Option<f64> {
        let level = element.voltage_level.as_deref()?;
        self.voltage_level(level).map(|l| l.un_kv)
    }

    /// Issues found while decoding rows
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::table::{Table, Value};

    fn minimal() -> MemorySource {
        MemorySource::new()
            .with_table(
                Table::new("Element", &["Element_ID", "Name", "VoltLevel_ID"])
                    .with_row(vec![1_i64.into(), "Cable 1".into(), 1_i64.into()])
                    .with_row(vec![2_i64.into(), "Cable 2".into(), 1_i64.into()]),
            )
            .with_table(
                Table::new(
                    "Terminal",
                    &["Terminal_ID", "Element_ID", "Node_ID", "TerminalNo", "Flag_Terminal"],
                )
                .with_row(vec![11_i64.into(), 1_i64.into(), 100_i64.into(), 2_i64.into(), 7_i64.into()])
                .with_row(vec![10_i64.into(), 1_i64.into(), 101_i64.into(), 1_i64.into(), 7_i64.into()])
                .with_row(vec![20_i64.into(), 2_i64.into(), 100_i64.into(), 1_i64.into(), 7_i64.into()]),
            )
            .with_table(
                Table::new("VoltageLevel", &["VoltLevel_ID", "Un"])
                    .with_row(vec![1_i64.into(), 0.4_f64.into()]),
            )
            .with_table(
                Table::new("Breaker", &["Terminal_ID", "Flag_Variant", "Flag_State"])
                    .with_row(vec![20_i64.into(), 1_i64.into(), 0_i64.into()]),
            )
    }

    #[test]
    fn test_open_indexes_terminals() {
        let db = SincalDatabase::open(&minimal()).unwrap();
        let numbers: Vec<u8> = db.terminals_for("1").iter().map(|t| t.number).collect();
        assert_eq!(numbers, [1, 2]);
        let at_node: Vec<&str> = db
            .terminals_for_bus("100")
            .iter()
            .map(|t| t.element.as_str())
            .collect();
        assert_eq!(at_node, ["1", "2"]);
        let breaker = db.breaker_for("20").unwrap();
        assert!(breaker.active);
        assert!(!breaker.closed);
        assert_eq!(db.element_voltage(db.element("2").unwrap()), Some(0.4));
        assert!(db.line_records().is_empty());
    }

    #[test]
    fn test_missing_required_table_fails() {
        let source = MemorySource::new().with_table(Table::new("Element", &["Element_ID"]));
        let err = SincalDatabase::open(&source).unwrap_err();
        assert!(err.to_string().contains("Terminal"));
    }

    #[test]
    fn test_bad_row_is_skipped_with_diagnostic() {
        let source = minimal().with_table(
            Table::new("Line", &["Element_ID", "l", "r"])
                .with_row(vec![1_i64.into(), 0.05_f64.into(), 0.2_f64.into()])
                .with_row(vec![2_i64.into(), Value::Text("n/a".into()), 0.2_f64.into()]),
        );
        let db = SincalDatabase::open(&source).unwrap();
        assert_eq!(db.line_records().len(), 1);
        assert_eq!(db.diagnostics().warning_count(), 1);
        let issue = &db.diagnostics().issues[0];
        assert_eq!(issue.entity.as_deref(), Some("Line row 2"));
    }
}
