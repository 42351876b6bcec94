//! WASM bindings for narrative-state — powers the interactive web demo.

use wasm_bindgen::prelude::*;

use narrative_state::core::engine::{UpdatePhase, VariableEngine};
use narrative_state::core::store::ValueSnapshot;
use narrative_state::schema::variable::UpdateType;

// ---------------------------------------------------------------------------
// Embedded demo data — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const DATING_SIM_VARIABLES: &str =
        include_str!("../../demo_data/dating_sim/variables.json");
    pub const DATING_SIM_KEYWORDS: &str =
        include_str!("../../demo_data/dating_sim/keywords.json");
}

fn parse_phase(s: &str) -> Result<UpdatePhase, JsError> {
    match s.to_lowercase().as_str() {
        "pre" => Ok(UpdatePhase::Pre),
        "post" => Ok(UpdatePhase::Post),
        "all" | "" => Ok(UpdatePhase::All),
        _ => Err(JsError::new(&format!("Unknown phase: {s} (expected pre, post or all)"))),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// StateDemo — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StateDemo {
    engine: VariableEngine,
}

#[wasm_bindgen]
impl StateDemo {
    /// Create an engine from the bundled dating-sim configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<StateDemo, JsError> {
        Self::from_config(data::DATING_SIM_VARIABLES, data::DATING_SIM_KEYWORDS, seed)
    }

    /// Create an engine from caller-supplied JSON documents.
    pub fn from_config(variables_json: &str, keywords_json: &str, seed: u64) -> Result<StateDemo, JsError> {
        let engine = VariableEngine::builder()
            .seed(seed)
            .variables_json(variables_json)
            .keywords_json(keywords_json)
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;
        Ok(StateDemo { engine })
    }

    /// Run one update cycle. Returns a JSON array of update records.
    ///
    /// `phase` is `"pre"`, `"post"` or `"all"`.
    pub fn update(&mut self, text: &str, phase: &str) -> Result<String, JsError> {
        let phase = parse_phase(phase)?;
        let records = self
            .engine
            .update_phase(text, phase)
            .map_err(|e| JsError::new(&format!("Update error: {e}")))?;
        to_json(&records)
    }

    /// JSON array of `{label, variable, descriptor}` for every staged variable.
    pub fn stages(&self) -> Result<String, JsError> {
        to_json(&self.engine.stage_report())
    }

    /// JSON summary of every variable in configuration order.
    pub fn variables(&self) -> Result<String, JsError> {
        let infos = self
            .engine
            .store()
            .iter()
            .map(|var| self.engine.store().info(&var.name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| JsError::new(&format!("Lookup error: {e}")))?;
        to_json(&infos)
    }

    pub fn snapshot(&self) -> Result<String, JsError> {
        to_json(&self.engine.snapshot())
    }

    pub fn restore(&mut self, snapshot_json: &str) -> Result<(), JsError> {
        let snapshot: ValueSnapshot = serde_json::from_str(snapshot_json)
            .map_err(|e| JsError::new(&format!("Invalid snapshot JSON: {e}")))?;
        self.engine
            .restore(&snapshot)
            .map_err(|e| JsError::new(&format!("Restore error: {e}")))
    }

    pub fn reseed(&mut self, seed: u64) {
        self.engine.reseed(seed);
    }

    /// Returns a JSON array of update type names.
    pub fn update_types() -> String {
        serde_json::to_string(UpdateType::NAMES).unwrap_or_default()
    }
}

