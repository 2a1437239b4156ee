//! Fixture builder for small hand-made networks.
//!
//! ```
//! use gridtrace_algo::test_utils::NetworkFixture;
//!
//! let store = NetworkFixture::new()
//!     .line("1", "S1", "X", "Y", 50.0, 0.1)
//!     .line("2", "S2", "Y", "Z", 30.0, 0.1)
//!     .build();
//! assert_eq!(store.element_count(), 2);
//! ```

use gridtrace_core::{
    Breaker, Element, ElementKind, Impedance, Kilovars, Kilovolts, Kilowatts, LineParams,
    LoadParams, Metres, Phase, PhaseLoad, PhotovoltaicParams, ShuntParams, SourceParams, Terminal,
    TopologyStore, TransformerParams, Winding, WindingConnection,
};

#[derive(Debug, Default)]
pub struct NetworkFixture {
    elements: Vec<Element>,
}

/// Impedance family keyed by positive-sequence resistance
pub fn impedance(r1: f64) -> Impedance {
    Impedance::series(r1 * 4.0, r1, r1 * 3.0, r1 * 0.8).with_capacitance(0.1, 0.25)
}

impl NetworkFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(self, id: &str, name: &str, from: &str, to: &str, length_m: f64, r1: f64) -> Self {
        self.line_with(id, name, from, to, length_m, impedance(r1))
    }

    pub fn line_with(
        mut self,
        id: &str,
        name: &str,
        from: &str,
        to: &str,
        length_m: f64,
        impedance: Impedance,
    ) -> Self {
        let params = LineParams {
            length: Metres(length_m),
            impedance,
            ..LineParams::default()
        };
        self.elements.push(
            Element::new(id, name, ElementKind::Line(params))
                .with_voltage(Kilovolts(0.4))
                .with_terminal(Terminal::new(1, from, 7))
                .with_terminal(Terminal::new(2, to, 7)),
        );
        self
    }

    /// Two-winding transformer, terminal 1 on the high-voltage side
    pub fn transformer(
        mut self,
        id: &str,
        name: &str,
        hv_bus: &str,
        hv_kv: f64,
        lv_bus: &str,
        lv_kv: f64,
    ) -> Self {
        let params = TransformerParams {
            windings: [
                Winding {
                    nominal_kv: Kilovolts(hv_kv),
                    connection: Some(WindingConnection::Delta),
                    tap: None,
                },
                Winding {
                    nominal_kv: Kilovolts(lv_kv),
                    connection: Some(WindingConnection::Wye),
                    tap: None,
                },
            ],
            vector_group: Some(24),
            ..TransformerParams::default()
        };
        self.elements.push(
            Element::new(id, name, ElementKind::Transformer(params))
                .with_terminal(Terminal::new(1, hv_bus, 7))
                .with_terminal(Terminal::new(2, lv_bus, 7)),
        );
        self
    }

    pub fn load(mut self, id: &str, name: &str, bus: &str, p_kw: f64) -> Self {
        let phase_loads = [Phase::A, Phase::B, Phase::C]
            .into_iter()
            .map(|phase| PhaseLoad {
                phase,
                p: Kilowatts(p_kw / 3.0),
                q: Kilovars(0.0),
            })
            .collect();
        self.elements.push(
            Element::new(id, name, ElementKind::Load(LoadParams { phase_loads }))
                .with_voltage(Kilovolts(0.4))
                .with_terminal(Terminal::new(1, bus, 7)),
        );
        self
    }

    pub fn photovoltaic(mut self, id: &str, name: &str, bus: &str, p_kw: f64) -> Self {
        let params = PhotovoltaicParams {
            p: Kilowatts(p_kw),
            q: Kilovars(0.0),
        };
        self.elements.push(
            Element::new(id, name, ElementKind::Photovoltaic(params))
                .with_voltage(Kilovolts(0.4))
                .with_terminal(Terminal::new(1, bus, 7)),
        );
        self
    }

    pub fn capacitor(mut self, id: &str, name: &str, bus: &str, q_kvar: f64) -> Self {
        let params = ShuntParams { q: Kilovars(q_kvar) };
        self.elements.push(
            Element::new(id, name, ElementKind::Capacitor(params))
                .with_voltage(Kilovolts(0.4))
                .with_terminal(Terminal::new(1, bus, 7)),
        );
        self
    }

    pub fn source(mut self, id: &str, name: &str, bus: &str, kv: f64) -> Self {
        let params = SourceParams {
            nominal_kv: Some(Kilovolts(kv)),
            is_sourcebus: true,
            ..SourceParams::default()
        };
        self.elements.push(
            Element::new(id, name, ElementKind::Source(params))
                .with_voltage(Kilovolts(kv))
                .with_terminal(Terminal::new(1, bus, 7)),
        );
        self
    }

    /// Attach a breaker to terminal `number` of element `id`
    pub fn breaker(mut self, id: &str, number: u8, breaker: Breaker) -> Self {
        if let Some(terminal) = self
            .element_mut(id)
            .and_then(|e| e.terminals.iter_mut().find(|t| t.number == number))
        {
            terminal.breaker = Some(breaker);
        }
        self
    }

    /// Active, open breaker named `name` on terminal 1 of element `id`
    pub fn open_switch(self, id: &str, name: &str) -> Self {
        self.breaker(
            id,
            1,
            Breaker {
                name: name.to_string(),
                variant_active: true,
                closed: false,
            },
        )
    }

    pub fn phase_code(mut self, id: &str, code: i64) -> Self {
        if let Some(element) = self.element_mut(id) {
            for terminal in &mut element.terminals {
                terminal.phase_code = code;
            }
        }
        self
    }

    pub fn voltage(mut self, id: &str, kv: f64) -> Self {
        if let Some(element) = self.element_mut(id) {
            element.voltage_kv = Some(Kilovolts(kv));
        }
        self
    }

    fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id.as_str() == id)
    }

    pub fn build(self) -> TopologyStore {
        let mut store = TopologyStore::new();
        for element in self.elements {
            store.add_element(element);
        }
        store
    }
}
