use std::{
    fs::File,
    io::BufWriter,
    path::Path,
    time::Instant,
};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use log::{debug, error, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    cli::RunArgs,
    config::PipelineConfig,
    context::ExecutionContext,
    convert::{immigration, reference, temperature},
    error::EtlError,
    writer::WriteSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "kebab-case")]
pub enum Step {
    Immigration,
    Temperature,
    Country,
    State,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Immigration, Step::Temperature, Step::Country, Step::State];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Immigration => "immigration",
            Step::Temperature => "temperature",
            Step::Country => "country",
            Step::State => "state",
        }
    }

    fn execute(&self, ctx: &ExecutionContext) -> crate::error::Result<Vec<WriteSummary>> {
        match self {
            Step::Immigration => immigration::run(ctx),
            Step::Temperature => temperature::run(ctx),
            Step::Country => reference::run_country(ctx),
            Step::State => reference::run_state(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Completed { tables: Vec<WriteSummary> },
    Failed { kind: String, cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, StepOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    Running { steps: Vec<Step> },
    Completed,
    Failed { step: Step, cause: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|report| !report.succeeded())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).context("Writing run report JSON")
    }
}

pub struct Pipeline {
    ctx: ExecutionContext,
    state: PipelineState,
    parallel: bool,
}

impl Pipeline {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            state: PipelineState::NotStarted,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs `steps` (all four when empty) in the canonical order. A failing
    /// step is recorded and the remaining steps still run.
    pub fn run(&mut self, steps: &[Step]) -> PipelineReport {
        let mut selected = if steps.is_empty() {
            Step::ALL.to_vec()
        } else {
            steps.to_vec()
        };
        selected.sort();
        selected.dedup();

        let reports = if self.parallel {
            self.transition(PipelineState::Running {
                steps: selected.clone(),
            });
            let ctx = &self.ctx;
            selected
                .par_iter()
                .map(|step| run_step(*step, ctx))
                .collect::<Vec<_>>()
        } else {
            let mut reports = Vec::with_capacity(selected.len());
            for step in &selected {
                self.transition(PipelineState::Running { steps: vec![*step] });
                reports.push(run_step(*step, &self.ctx));
            }
            reports
        };

        let final_state = match reports.iter().find(|report| !report.succeeded()) {
            Some(StepReport {
                step,
                outcome: StepOutcome::Failed { cause, .. },
                ..
            }) => PipelineState::Failed {
                step: *step,
                cause: cause.clone(),
            },
            _ => PipelineState::Completed,
        };
        self.transition(final_state);

        PipelineReport {
            state: self.state.clone(),
            steps: reports,
        }
    }
}

fn run_step(step: Step, ctx: &ExecutionContext) -> StepReport {
    info!("Step '{}' started", step.name());
    let started = Instant::now();
    let outcome = match step.execute(ctx) {
        Ok(tables) => {
            info!(
                "Step '{}' completed: {}",
                step.name(),
                tables
                    .iter()
                    .map(|t| format!("{} ({} rows)", t.table, t.rows))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            StepOutcome::Completed { tables }
        }
        Err(err) => {
            error!("Step '{}' failed: {err}", step.name());
            failed(&err)
        }
    };
    StepReport {
        step,
        elapsed_ms: started.elapsed().as_millis() as u64,
        outcome,
    }
}

fn failed(err: &EtlError) -> StepOutcome {
    StepOutcome::Failed {
        kind: err.kind().to_string(),
        cause: err.to_string(),
    }
}

pub fn resolve_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = &args.input {
        config.input_root = input.clone();
    }
    if let Some(output) = &args.output {
        config.output_root = output.clone();
    }
    if let Some(path) = &args.immigration {
        config.immigration.path = path.clone();
    }
    if let Some(format) = args.immigration_format {
        config.immigration.format = format;
    }
    if let Some(mode) = args.overwrite {
        config.overwrite = mode;
    }
    if let Some(delimiter) = &args.delimiter {
        config.delimiter = Some(delimiter.clone());
    }
    if let Some(encoding) = &args.input_encoding {
        config.input_encoding = Some(encoding.clone());
    }
    Ok(config)
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    info!(
        "Running pipeline: input {:?} -> output {:?} (overwrite {:?})",
        config.input_root, config.output_root, config.overwrite
    );
    let ctx = ExecutionContext::new(config)?;
    if ctx.credentials().is_some() {
        debug!("Storage credentials supplied");
    }

    let mut pipeline = Pipeline::new(ctx).parallel(args.parallel);
    let report = pipeline.run(&args.steps);

    if let Some(path) = &args.report {
        report.save(path)?;
        info!("Run report written to {path:?}");
    }

    let failed = report.failures().map(|r| r.step.name()).collect::<Vec<_>>();
    if failed.is_empty() {
        info!("All {} step(s) completed", report.steps.len());
        Ok(())
    } else {
        bail!("{} step(s) failed: {}", failed.len(), failed.join(", "))
    }
}
