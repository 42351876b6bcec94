/// The update orchestrator: text in, variable changes out.
///
/// Wires together keyword matching, delta sampling, constraint gating and
/// the variable store. Built via `VariableEngine::builder()`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace};

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::constraint::{self, ConstraintError, StageSnapshot};
use crate::core::matcher::{self, MatchMode, ScanText};
use crate::core::sampler;
use crate::core::stage;
use crate::core::store::{StoreError, ValueSnapshot, VariableStore, MAX_PRECISION};
use crate::schema::stage::{StageDescriptor, StageTransition};
use crate::schema::variable::Variable;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("update constraint of '{variable}' could not be evaluated: {source}")]
    Constraint {
        variable: String,
        source: ConstraintError,
    },
}

/// Which variables a batch covers, by their `pre_update` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    /// Variables updated before the narrative beat is generated.
    Pre,
    /// Variables updated after it.
    Post,
    #[default]
    All,
}

impl UpdatePhase {
    pub fn includes(&self, variable: &Variable) -> bool {
        match self {
            Self::Pre => variable.pre_update,
            Self::Post => !variable.pre_update,
            Self::All => true,
        }
    }
}

/// Why a cycle left a variable untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The update constraint evaluated to false.
    ConstraintBlocked,
    /// No keyword group matched the text.
    NoMatch,
    /// The variable is judged by an external model.
    Delegated,
}

/// Terminal state of one `(variable, text)` cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Reset,
    Updated { delta: f64 },
    NoOp(NoOpReason),
}

/// What one cycle did to one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub variable: String,
    pub outcome: Outcome,
    pub previous_value: f64,
    pub value: f64,
    /// True if the store clamped the requested value.
    pub clamped: bool,
    /// Set when the applied change moved the variable to another stage.
    pub transition: Option<StageTransition>,
}

impl UpdateRecord {
    pub fn changed(&self) -> bool {
        !matches!(self.outcome, Outcome::NoOp(_))
    }
}

/// A staged variable's descriptor under its published label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEntry {
    pub label: String,
    pub variable: String,
    pub descriptor: StageDescriptor,
}

/// Change decided for one variable before anything is written.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Plan {
    Reset,
    Add(f64),
    Skip(NoOpReason),
}

/// The top-level variable engine. Built via `VariableEngine::builder()`.
pub struct VariableEngine {
    store: VariableStore,
    rng: StdRng,
    seed: u64,
}

/// Builder for constructing a `VariableEngine`.
pub struct VariableEngineBuilder {
    config: Option<EngineConfig>,
    variables_json: Option<String>,
    keywords_json: Option<String>,
    variables_path: Option<PathBuf>,
    keywords_path: Option<PathBuf>,
    seed: u64,
    precision: Option<u32>,
}

impl VariableEngine {
    pub fn builder() -> VariableEngineBuilder {
        VariableEngineBuilder {
            config: None,
            variables_json: None,
            keywords_json: None,
            variables_path: None,
            keywords_path: None,
            seed: 0,
            precision: Some(1),
        }
    }

    /// Run one update cycle for every variable.
    pub fn update(&mut self, text: &str) -> Result<Vec<UpdateRecord>, EngineError> {
        self.update_phase(text, UpdatePhase::All)
    }

    /// Run one update cycle for the variables in `phase`, in
    /// configuration order.
    ///
    /// Constraints read the stages as they were before the batch, and
    /// every change is planned before any is written. If any constraint
    /// fails to evaluate, nothing is written.
    pub fn update_phase(&mut self, text: &str, phase: UpdatePhase) -> Result<Vec<UpdateRecord>, EngineError> {
        let scan = ScanText::new(text);
        let snapshot = StageSnapshot::capture(self.store.iter());

        let mut plans = Vec::new();
        for var in self.store.iter().filter(|v| phase.includes(v)) {
            let plan = plan_cycle(var, &scan, &snapshot, &mut self.rng)?;
            plans.push((var.name.clone(), plan));
        }

        plans
            .into_iter()
            .map(|(name, plan)| self.apply(&name, plan))
            .collect()
    }

    /// Run one update cycle for a single variable.
    pub fn update_variable(&mut self, name: &str, text: &str) -> Result<UpdateRecord, EngineError> {
        let scan = ScanText::new(text);
        let snapshot = StageSnapshot::capture(self.store.iter());
        let var = self.store.get(name)?;
        let plan = plan_cycle(var, &scan, &snapshot, &mut self.rng)?;
        self.apply(name, plan)
    }

    pub fn value(&self, name: &str) -> Result<f64, EngineError> {
        Ok(self.store.value(name)?)
    }

    /// Current stage of a variable; `Ok(None)` when it has no stages.
    pub fn stage(&self, name: &str) -> Result<Option<StageDescriptor>, EngineError> {
        Ok(self.store.stage(name)?)
    }

    /// Every staged variable's descriptor in configuration order.
    pub fn stage_report(&self) -> Vec<StageEntry> {
        self.store
            .iter()
            .filter_map(|var| {
                stage::resolve_variable(var).map(|descriptor| StageEntry {
                    label: var.stage_label().to_string(),
                    variable: var.name.clone(),
                    descriptor,
                })
            })
            .collect()
    }

    /// Read-only access to the store. Values change only through updates
    /// and `restore`.
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn snapshot(&self) -> ValueSnapshot {
        self.store.snapshot()
    }

    pub fn restore(&mut self, snapshot: &ValueSnapshot) -> Result<(), EngineError> {
        Ok(self.store.restore(snapshot)?)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the delta RNG from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn apply(&mut self, name: &str, plan: Plan) -> Result<UpdateRecord, EngineError> {
        let var = self.store.get(name)?;
        let previous_value = var.current_value();
        let before = stage::resolve_variable(var).map(|d| d.relative_value);

        let (outcome, value, clamped) = match plan {
            Plan::Reset => (Outcome::Reset, self.store.reset(name)?, false),
            Plan::Add(delta) => {
                let write = self.store.set_value(name, previous_value + delta)?;
                (Outcome::Updated { delta }, write.value, write.is_clamped())
            }
            Plan::Skip(reason) => (Outcome::NoOp(reason), previous_value, false),
        };

        let transition = match (&outcome, before) {
            (Outcome::NoOp(_), _) | (_, None) => None,
            (_, Some(from)) => self
                .store
                .stage(name)?
                .map(|d| d.relative_value)
                .filter(|to| *to != from)
                .map(|to| StageTransition { from, to }),
        };

        debug!(variable = name, ?outcome, previous_value, value, clamped, "update cycle");
        Ok(UpdateRecord {
            variable: name.to_string(),
            outcome,
            previous_value,
            value,
            clamped,
            transition,
        })
    }
}

/// Decide what one cycle does to `var`: reset first, then the
/// constraint gate, then keyword deltas.
fn plan_cycle(
    var: &Variable,
    text: &ScanText,
    snapshot: &StageSnapshot,
    rng: &mut StdRng,
) -> Result<Plan, EngineError> {
    if var.has_keyword_reset() && matcher::any_keyword(text, &var.reset_keywords) {
        return Ok(Plan::Reset);
    }

    if let Some(expr) = &var.update_constraint {
        let allowed = constraint::evaluate(expr, snapshot).map_err(|source| EngineError::Constraint {
            variable: var.name.clone(),
            source,
        })?;
        if !allowed {
            return Ok(Plan::Skip(NoOpReason::ConstraintBlocked));
        }
    }

    let Some(mode) = MatchMode::for_update_type(var.update_type) else {
        return Ok(Plan::Skip(NoOpReason::Delegated));
    };

    let mut matched = false;
    let mut total = 0.0;
    for group in &var.keyword_groups {
        let hits = matcher::match_group(text, &group.keywords, mode);
        trace!(variable = %var.name, group = %group.name, hits, "keyword group scanned");
        if hits > 0 {
            matched = true;
            total += sampler::group_delta(group, hits, mode, rng)?;
        }
    }

    Ok(if matched {
        Plan::Add(total)
    } else {
        Plan::Skip(NoOpReason::NoMatch)
    })
}

impl VariableEngineBuilder {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Decimal places kept on every write; `None` keeps full precision.
    /// Capped at `MAX_PRECISION`.
    pub fn value_precision(mut self, precision: Option<u32>) -> Self {
        self.precision = precision.map(|p| p.min(MAX_PRECISION));
        self
    }

    /// Provide an already parsed configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn variables_json(mut self, json: &str) -> Self {
        self.variables_json = Some(json.to_string());
        self
    }

    pub fn keywords_json(mut self, json: &str) -> Self {
        self.keywords_json = Some(json.to_string());
        self
    }

    /// Load the variables document from a JSON or RON file.
    pub fn variables_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.variables_path = Some(path.into());
        self
    }

    /// Load the keyword document from a JSON or RON file.
    pub fn keywords_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keywords_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<VariableEngine, EngineError> {
        let config = if let Some(config) = self.config {
            config
        } else if let Some(ref variables) = self.variables_json {
            EngineConfig::from_json(variables, self.keywords_json.as_deref().unwrap_or("{}"))?
        } else if let (Some(variables), Some(keywords)) = (&self.variables_path, &self.keywords_path) {
            EngineConfig::load(variables, keywords)?
        } else {
            EngineConfig::default()
        };

        let variables = config.validate()?;
        let store = VariableStore::new(variables, self.precision)?;
        debug!(variables = store.len(), seed = self.seed, "variable engine built");

        Ok(VariableEngine {
            store,
            rng: StdRng::seed_from_u64(self.seed),
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::stage::StageValue;

    const VARIABLES: &str = r#"[
        {"name": "stamina", "var_type": "record", "update_type": "keyword_count",
         "initial_value": 10, "min_value": 0, "max_value": 10,
         "reset_type": "keyword", "reset_value": 10},
        {"name": "affection", "var_type": "stage_independent", "update_type": "keyword_appear",
         "initial_value": 0, "min_value": 0, "max_value": 100,
         "relative_name": "relationship",
         "relative_method": "ladder", "relative_stage_config": [20, 50],
         "relative_description": ["stranger", "familiar", "close"]},
        {"name": "secret", "var_type": "record", "update_type": "keyword_appear",
         "pre_update": false, "initial_value": 0, "min_value": 0, "max_value": 5,
         "update_constraint": [[1, "affection"]]},
        {"name": "mood", "var_type": "record", "update_type": "llm_fuzzy"}
    ]"#;

    const KEYWORDS: &str = r#"{
        "stamina_keywords": {"run": {"keywords": ["奔跑", "跑步"], "min_value": -1.0, "max_value": -1.0}},
        "stamina_reset": {"keywords": ["睡觉"]},
        "affection_keywords": {
            "like": {"keywords": ["喜欢"], "min_value": 4.0, "max_value": 6.0},
            "gift": {"keywords": ["礼物"], "min_value": 30.0, "max_value": 30.0}
        },
        "secret_keywords": {"confide": {"keywords": ["秘密"], "min_value": 1.0, "max_value": 1.0}}
    }"#;

    fn engine(seed: u64) -> VariableEngine {
        VariableEngine::builder()
            .seed(seed)
            .variables_json(VARIABLES)
            .keywords_json(KEYWORDS)
            .build()
            .unwrap()
    }

    fn record<'a>(records: &'a [UpdateRecord], name: &str) -> &'a UpdateRecord {
        records.iter().find(|r| r.variable == name).unwrap()
    }

    #[test]
    fn count_mode_sums_per_occurrence() {
        let mut engine = engine(1);
        let records = engine.update("他奔跑了10分钟，然后继续奔跑").unwrap();
        let stamina = record(&records, "stamina");
        assert_eq!(stamina.outcome, Outcome::Updated { delta: -2.0 });
        assert_eq!(engine.value("stamina").unwrap(), 8.0);
    }

    #[test]
    fn appear_mode_samples_once() {
        let mut engine = engine(2);
        let records = engine.update("她很喜欢你，真的很喜欢").unwrap();
        match record(&records, "affection").outcome {
            Outcome::Updated { delta } => assert!((4.0..=6.0).contains(&delta)),
            ref other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn reset_takes_priority_over_update() {
        let mut engine = engine(3);
        engine.update("奔跑 奔跑 奔跑").unwrap();
        assert_eq!(engine.value("stamina").unwrap(), 7.0);
        let records = engine.update("跑步之后去睡觉").unwrap();
        assert_eq!(record(&records, "stamina").outcome, Outcome::Reset);
        assert_eq!(engine.value("stamina").unwrap(), 10.0);
    }

    #[test]
    fn constraint_blocks_until_stage_reached() {
        let mut engine = engine(4);
        let records = engine.update("我告诉你一个秘密").unwrap();
        assert_eq!(record(&records, "secret").outcome, Outcome::NoOp(NoOpReason::ConstraintBlocked));

        // appear mode: one draw however many gifts
        engine.update("礼物和礼物").unwrap();
        assert_eq!(engine.stage("affection").unwrap().unwrap().relative_value, StageValue::Ladder(1));
        engine.update("又一个礼物").unwrap();
        let records = engine.update("我告诉你一个秘密").unwrap();
        assert_eq!(record(&records, "secret").outcome, Outcome::Updated { delta: 1.0 });
    }

    #[test]
    fn constraints_read_the_pre_cycle_stage() {
        let mut engine = engine(5);
        engine.update("礼物").unwrap(); // affection 30, stage 1
        // this text pushes affection to stage 2 and mentions the secret;
        // the gate still sees stage 1
        let records = engine.update("礼物 秘密").unwrap();
        assert_eq!(record(&records, "affection").value, 60.0);
        assert_eq!(record(&records, "secret").outcome, Outcome::NoOp(NoOpReason::ConstraintBlocked));
    }

    #[test]
    fn clamping_is_reported() {
        let mut engine = engine(6);
        let records = engine.update("礼物礼物礼物礼物").unwrap();
        // appear mode: one draw of 30 regardless of repeats
        assert_eq!(record(&records, "affection").value, 30.0);
        engine.update("礼物").unwrap();
        engine.update("礼物").unwrap();
        let records = engine.update("礼物").unwrap();
        let affection = record(&records, "affection");
        assert!(affection.clamped);
        assert_eq!(affection.value, 100.0);
    }

    #[test]
    fn stage_transition_recorded() {
        let mut engine = engine(7);
        let records = engine.update("礼物").unwrap();
        assert_eq!(
            record(&records, "affection").transition,
            Some(StageTransition {
                from: StageValue::Ladder(0),
                to: StageValue::Ladder(1),
            })
        );
        let records = engine.update("没有关键词").unwrap();
        assert_eq!(record(&records, "affection").transition, None);
    }

    #[test]
    fn llm_fuzzy_is_delegated() {
        let mut engine = engine(8);
        let records = engine.update("随便什么").unwrap();
        assert_eq!(record(&records, "mood").outcome, Outcome::NoOp(NoOpReason::Delegated));
    }

    #[test]
    fn blank_text_changes_nothing() {
        let mut engine = engine(9);
        let before = engine.snapshot();
        let records = engine.update("   ").unwrap();
        assert!(records.iter().all(|r| !r.changed()));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn phases_filter_by_pre_update() {
        let mut engine = engine(10);
        let pre = engine.update_phase("秘密", UpdatePhase::Pre).unwrap();
        assert!(pre.iter().all(|r| r.variable != "secret"));
        let post = engine.update_phase("秘密", UpdatePhase::Post).unwrap();
        assert_eq!(post.len(), 1);
        assert_eq!(post[0].variable, "secret");
    }

    #[test]
    fn same_seed_same_results() {
        let text = "喜欢 礼物 奔跑";
        let mut a = engine(42);
        let mut b = engine(42);
        for _ in 0..5 {
            assert_eq!(a.update(text).unwrap(), b.update(text).unwrap());
        }
    }

    #[test]
    fn update_single_variable() {
        let mut engine = engine(11);
        let record = engine.update_variable("stamina", "奔跑").unwrap();
        assert_eq!(record.value, 9.0);
        assert_eq!(engine.value("affection").unwrap(), 0.0);
        assert!(matches!(
            engine.update_variable("ghost", "奔跑"),
            Err(EngineError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn stage_report_uses_relative_name() {
        let engine = engine(12);
        let report = engine.stage_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].label, "relationship");
        assert_eq!(report[0].variable, "affection");
    }

    #[test]
    fn empty_builder_builds_empty_engine() {
        let mut engine = VariableEngine::builder().build().unwrap();
        assert!(engine.store().is_empty());
        assert!(engine.update("text").unwrap().is_empty());
    }

    #[test]
    fn huge_precision_keeps_values_in_bounds() {
        let vars = r#"[{"name": "x", "var_type": "record", "update_type": "keyword_count",
            "min_value": 0, "max_value": 10}]"#;
        let kw = r#"{"x_keywords": {"g": {"keywords": ["x"], "min_value": 1, "max_value": 1}}}"#;
        let mut engine = VariableEngine::builder()
            .value_precision(Some(400))
            .variables_json(vars)
            .keywords_json(kw)
            .build()
            .unwrap();
        let records = engine.update("x").unwrap();
        assert_eq!(records[0].value, 1.0);
        assert_eq!(engine.value("x").unwrap(), 1.0);
    }

    #[test]
    fn overflowing_group_range_fails_build() {
        let vars = r#"[{"name": "x", "var_type": "record", "update_type": "keyword_count"}]"#;
        let kw = r#"{"x_keywords": {"g": {"keywords": ["x"], "min_value": -1e308, "max_value": 1e308}}}"#;
        let result = VariableEngine::builder().variables_json(vars).keywords_json(kw).build();
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::MalformedRange { .. }))
        ));
    }

    #[test]
    fn engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<VariableEngine>();
    }
}
