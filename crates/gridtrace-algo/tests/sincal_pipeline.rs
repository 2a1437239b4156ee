//! Sincal records loaded through gridtrace-io and reconstructed.

use anyhow::Result;
use gridtrace_algo::reconstruct;
use gridtrace_core::{ElementId, ElementKind, TopologyConfig, VoltageFilter};
use gridtrace_io::{load_source, MemorySource, Table};

/// Secondary substation 200 -> 100 feeding one house over a 120 m cable
fn substation() -> MemorySource {
    MemorySource::new()
        .with_table(
            Table::new("Element", &["Element_ID", "Name", "VoltLevel_ID", "Flag_State"])
                .with_row(vec![1_i64.into(), "Cable 1".into(), 1_i64.into(), 1_i64.into()])
                .with_row(vec![2_i64.into(), "MS Trafo".into(), 2_i64.into(), 1_i64.into()])
                .with_row(vec![3_i64.into(), "House 3".into(), 1_i64.into(), 1_i64.into()]),
        )
        .with_table(
            Table::new(
                "Terminal",
                &["Terminal_ID", "Element_ID", "Node_ID", "TerminalNo", "Flag_Terminal"],
            )
            .with_row(vec![10_i64.into(), 1_i64.into(), 100_i64.into(), 1_i64.into(), 7_i64.into()])
            .with_row(vec![11_i64.into(), 1_i64.into(), 101_i64.into(), 2_i64.into(), 7_i64.into()])
            .with_row(vec![20_i64.into(), 2_i64.into(), 200_i64.into(), 1_i64.into(), 7_i64.into()])
            .with_row(vec![21_i64.into(), 2_i64.into(), 100_i64.into(), 2_i64.into(), 7_i64.into()])
            .with_row(vec![30_i64.into(), 3_i64.into(), 101_i64.into(), 1_i64.into(), 7_i64.into()]),
        )
        .with_table(
            Table::new("VoltageLevel", &["VoltLevel_ID", "Un"])
                .with_row(vec![1_i64.into(), 0.4_f64.into()])
                .with_row(vec![2_i64.into(), 20.0_f64.into()]),
        )
        .with_table(
            Table::new("Node", &["Node_ID", "Name", "VoltLevel_ID", "Flag_Variant"])
                .with_row(vec![100_i64.into(), "LV busbar".into(), 1_i64.into(), 1_i64.into()])
                .with_row(vec![101_i64.into(), "House 3".into(), 1_i64.into(), 1_i64.into()])
                .with_row(vec![200_i64.into(), "MV busbar".into(), 2_i64.into(), 1_i64.into()]),
        )
        .with_table(
            Table::new(
                "Line",
                &["Element_ID", "Flag_Variant", "l", "Flag_LineTyp", "r", "x", "r0", "x0", "c", "c0"],
            )
            .with_row(vec![
                1_i64.into(),
                1_i64.into(),
                0.12_f64.into(),
                1_i64.into(),
                0.206_f64.into(),
                0.08_f64.into(),
                0.824_f64.into(),
                0.32_f64.into(),
                250.0_f64.into(),
                100.0_f64.into(),
            ]),
        )
        .with_table(
            Table::new(
                "TwoWindingTransformer",
                &["Element_ID", "Un1", "Un2", "Sn", "VecGrp", "ur", "Vfe"],
            )
            .with_row(vec![
                2_i64.into(),
                20.0_f64.into(),
                0.4_f64.into(),
                0.4_f64.into(),
                10_i64.into(),
                4.0_f64.into(),
                4.6_f64.into(),
            ]),
        )
        .with_table(
            Table::new("Load", &["Element_ID", "P1", "Q1", "P", "Q", "fP", "fQ", "Flag_Lf"])
                .with_row(vec![
                    3_i64.into(),
                    0.0_f64.into(),
                    0.0_f64.into(),
                    0.006_f64.into(),
                    0.0_f64.into(),
                    1.0_f64.into(),
                    1.0_f64.into(),
                    1_i64.into(),
                ]),
        )
}

#[test]
fn test_substation_island() -> Result<()> {
    let (raw, load_diagnostics) = load_source(&substation())?;
    assert!(!load_diagnostics.has_errors());

    let config = TopologyConfig {
        separate_lv_islands: true,
        resolve_cycles: true,
        ..TopologyConfig::default()
    };
    let result = reconstruct(&raw, &config, "substation")?;
    assert_eq!(result.networks.len(), 1);
    let island = &result.networks[0];
    assert_eq!(island.name, "100.mstrafo_2");

    let cable = island.store.element(&ElementId::from("1")).unwrap();
    assert!((cable.line().unwrap().length.0 - 120.0).abs() < 1e-9);
    let house = island.store.element(&ElementId::from("3")).unwrap();
    let ElementKind::Load(load) = &house.kind else {
        panic!("expected a load");
    };
    assert!((load.total_p().0 - 6.0).abs() < 1e-9);
    assert!(island.store.contains_element(&ElementId::from("2")));
    Ok(())
}

#[test]
fn test_low_voltage_projection_substitutes_transformer() -> Result<()> {
    let (raw, _) = load_source(&substation())?;
    let config = TopologyConfig {
        voltage_filter: VoltageFilter::Lv,
        include_transformers: false,
        ..TopologyConfig::default()
    };
    let result = reconstruct(&raw, &config, "substation")?;
    let store = &result.networks[0].store;

    assert!(!store.contains_element(&ElementId::from("2")));
    let (from, to) = store.from_to(&ElementId::from("1")).unwrap();
    assert!(from.is_source_bus());
    assert_eq!(to.as_str(), "101");
    // the substituted bus is fed by a synthetic source
    let fed = store
        .elements_at(from)
        .iter()
        .any(|e| matches!(e.kind, ElementKind::Source(_)));
    assert!(fed);
    Ok(())
}
