//! The repair loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::config::{OrchestratorConfig, VerifierConfig};
use crate::data::PriceTable;
use crate::generator::Generator;
use crate::id::generate_run_id;
use crate::llm::LlmClient;
use crate::repair::{FailureSignal, Fixer};
use crate::runner::{Runner, StrategyExecutor};
use crate::task::{SpecGuard, TaskRequest, TaskSpec};
use crate::tools::{ToolResolver, ToolSet};
use crate::validation::{ResultVerifier, StaticVerifier};

use super::attempt::{Attempt, AttemptDraft, StageOutcome};
use super::report::{AbortKind, BlockingFailure, Report, RunMode, RunStatus};
use super::state::{RunState, StageEvent, transition};

/// Collaborator failure that ends the run without a repair.
#[derive(Debug)]
struct Abort {
    kind: AbortKind,
    message: String,
}

impl Abort {
    fn new(kind: AbortKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything the attempts of one run share.
struct RunInputs {
    spec: TaskSpec,
    tools: ToolSet,
    dataset: PriceTable,
}

/// Drives one request through guard, resolution and the bounded repair loop.
///
/// Owns the attempt counter and the history. Every state change goes through
/// `transition`; an illegal move aborts the run as an internal error.
pub struct Orchestrator<L, V, E>
where
    L: LlmClient,
    V: StaticVerifier,
    E: StrategyExecutor,
{
    guard: SpecGuard,
    resolver: ToolResolver,
    generator: Generator<L>,
    verifier: Arc<V>,
    runner: Runner<E>,
    result_verifier: ResultVerifier,
    fixer: Fixer,
    mode: RunMode,
    max_attempts: u32,
}

impl<L, V, E> Orchestrator<L, V, E>
where
    L: LlmClient,
    V: StaticVerifier,
    E: StrategyExecutor,
{
    /// Agentic mode with default thresholds and budget.
    pub fn new(
        guard: SpecGuard,
        resolver: ToolResolver,
        generator: Generator<L>,
        verifier: Arc<V>,
        runner: Runner<E>,
    ) -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            guard,
            resolver,
            generator,
            verifier,
            runner,
            result_verifier: ResultVerifier::new(VerifierConfig::default()),
            fixer: Fixer::new(defaults.max_hint_chars),
            mode: RunMode::Agentic,
            max_attempts: defaults.max_attempts,
        }
    }

    pub fn with_result_verifier(mut self, result_verifier: ResultVerifier) -> Self {
        self.result_verifier = result_verifier;
        self
    }

    pub fn with_fixer(mut self, fixer: Fixer) -> Self {
        self.fixer = fixer;
        self
    }

    /// Set the mode; the budget becomes the mode's share of `max_attempts`.
    pub fn with_mode(mut self, mode: RunMode, max_attempts: u32) -> Self {
        self.mode = mode;
        self.max_attempts = mode.budget(max_attempts);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run a request to completion. Always yields a report.
    pub async fn execute(&self, request: &TaskRequest) -> Report {
        let started_at = Utc::now();
        let run_id = generate_run_id();
        let mut state = RunState::Guarding;
        let mut history: Vec<Attempt> = Vec::new();

        info!("Run {} starting ({}, budget {})", run_id, self.mode, self.max_attempts);

        let inputs = match self.prepare(request, &mut state).await {
            Ok(inputs) => inputs,
            Err((task_id, abort)) => {
                return self.abort_report(run_id, task_id, Vec::new(), history, abort, started_at);
            }
        };
        let task_id = inputs.spec.task_id.clone();
        let tool_names = inputs.tools.names();

        let mut hint: Option<String> = None;
        loop {
            let number = history.len() as u32 + 1;
            let attempt = match self.attempt(&inputs, number, hint.clone(), &mut state).await {
                Ok(attempt) => attempt,
                Err(abort) => {
                    return self.abort_report(run_id, Some(task_id), tool_names, history, abort, started_at);
                }
            };

            let failure = attempt.failure.clone();
            let metrics = attempt.metrics;
            history.push(attempt);

            let Some(signal) = failure else {
                info!("Run {} accepted on attempt {}", run_id, number);
                return Report {
                    run_id,
                    mode: self.mode,
                    task_id: Some(task_id),
                    tools: tool_names,
                    status: RunStatus::Accepted,
                    final_metrics: metrics,
                    attempts: history,
                    blocking_failure: None,
                    max_attempts: self.max_attempts,
                    started_at,
                    finished_at: Utc::now(),
                };
            };

            let plan = self
                .fixer
                .plan(&signal, number, self.max_attempts, &task_id, hint.as_deref());
            let event = if plan.attempts_remain {
                StageEvent::Retry
            } else {
                StageEvent::BudgetSpent
            };
            if let Err(abort) = self.advance(&mut state, event, number) {
                return self.abort_report(run_id, Some(task_id), tool_names, history, abort, started_at);
            }

            if state == RunState::Exhausted {
                warn!("Run {} exhausted after {} attempts: {}", run_id, number, signal);
                return Report {
                    run_id,
                    mode: self.mode,
                    task_id: Some(task_id),
                    tools: tool_names,
                    status: RunStatus::Exhausted,
                    final_metrics: metrics,
                    attempts: history,
                    blocking_failure: Some(BlockingFailure::Signal { signal }),
                    max_attempts: self.max_attempts,
                    started_at,
                    finished_at: Utc::now(),
                };
            }

            info!("Run {} retrying as attempt {} after {}", run_id, plan.next_attempt, signal.kind());
            hint = Some(plan.hint);
        }
    }

    /// Guarding and Resolving: validated spec, resolved tools and the dataset.
    async fn prepare(
        &self,
        request: &TaskRequest,
        state: &mut RunState,
    ) -> std::result::Result<RunInputs, (Option<String>, Abort)> {
        let spec = match self.guard.validate(request) {
            Ok(spec) => spec,
            Err(e) => {
                let abort = Abort::new(AbortKind::InvalidSpec, e.to_string());
                return Err((None, self.advance(state, StageEvent::Aborted, 0).err().unwrap_or(abort)));
            }
        };
        let task_id = Some(spec.task_id.clone());
        self.advance(state, StageEvent::Passed, 0).map_err(|a| (task_id.clone(), a))?;

        let resolved = match self.resolver.resolve(&spec.tools) {
            Ok(tools) => tools,
            Err(e) => {
                let abort = Abort::new(AbortKind::UnknownTool, e.to_string());
                return Err((task_id, self.advance(state, StageEvent::Aborted, 0).err().unwrap_or(abort)));
            }
        };

        let dataset = match self.runner.prepare(&spec).await {
            Ok(dataset) => dataset,
            Err(e) => {
                let abort = Abort::new(AbortKind::DataUnavailable, e.to_string());
                return Err((task_id, self.advance(state, StageEvent::Aborted, 0).err().unwrap_or(abort)));
            }
        };
        self.advance(state, StageEvent::Passed, 0).map_err(|a| (task_id.clone(), a))?;

        let tools = if self.mode.offers_tools() {
            resolved
        } else {
            ToolSet::empty()
        };

        Ok(RunInputs { spec, tools, dataset })
    }

    /// One pass from Generating to either Accepted or Repairing.
    ///
    /// Code-quality failures come back as an attempt carrying its signal.
    /// `Err` means a collaborator failed and nothing was recorded.
    async fn attempt(
        &self,
        inputs: &RunInputs,
        number: u32,
        hint: Option<String>,
        state: &mut RunState,
    ) -> std::result::Result<Attempt, Abort> {
        let spec = &inputs.spec;
        let mut draft = AttemptDraft::new(number, spec.seed_for_attempt(number), hint);

        let candidate = match self
            .generator
            .generate(spec, &inputs.tools, number, draft.repair_hint.as_deref())
            .await
        {
            Ok(candidate) => candidate,
            Err(e) => {
                error!("Generation failed on attempt {}: {}", number, e);
                let abort = Abort::new(AbortKind::Generation, e.to_string());
                return Err(self.advance(state, StageEvent::Aborted, number).err().unwrap_or(abort));
            }
        };
        draft.code = candidate.source.clone();
        draft.code_sha256 = candidate.sha256.clone();
        self.advance(state, StageEvent::Passed, number)?;

        let checked = match self.verifier.verify(&candidate.source, &inputs.tools).await {
            Ok(result) if result.passed => Ok(()),
            Ok(result) => Err(result.detail),
            Err(e) => Err(e.to_string()),
        };
        if let Err(message) = checked {
            info!("Attempt {} failed static checks", number);
            draft.static_check = StageOutcome::failed(&message);
            self.advance(state, StageEvent::Failed, number)?;
            return Ok(draft.finish(Some(FailureSignal::Static(message))));
        }
        draft.static_check = StageOutcome::Passed;
        self.advance(state, StageEvent::Passed, number)?;

        let metrics = match self.runner.run(&candidate, &inputs.dataset, spec, draft.seed).await {
            Ok(metrics) => metrics,
            Err(fault) => {
                info!("Attempt {} failed at runtime: {}", number, fault);
                draft.execution = StageOutcome::failed(&fault.message);
                self.advance(state, StageEvent::Failed, number)?;
                return Ok(draft.finish(Some(FailureSignal::Runtime(fault.message))));
            }
        };
        draft.execution = StageOutcome::Passed;
        draft.metrics = Some(metrics);
        self.advance(state, StageEvent::Passed, number)?;

        let verdict = self.result_verifier.evaluate(&metrics);
        if !verdict.passed() {
            let names = verdict.failed_names();
            info!("Attempt {} failed verifier checks: {}", number, names.join(", "));
            draft.result_check = StageOutcome::failed(names.join(", "));
            self.advance(state, StageEvent::Failed, number)?;
            return Ok(draft.finish(Some(FailureSignal::Semantic(names))));
        }
        draft.result_check = StageOutcome::Passed;
        self.advance(state, StageEvent::Passed, number)?;

        Ok(draft.finish(None))
    }

    /// Apply one event. An illegal move leaves the run in Aborted.
    fn advance(&self, state: &mut RunState, event: StageEvent, attempt: u32) -> std::result::Result<(), Abort> {
        match transition(*state, event) {
            Some(next) => {
                debug!("{} -> {} on {:?} (attempt {})", state, next, event, attempt);
                *state = next;
                Ok(())
            }
            None => {
                error!("Illegal transition from {} on {:?} (attempt {})", state, event, attempt);
                let message = format!("illegal transition from {} on {:?}", state, event);
                *state = RunState::Aborted;
                Err(Abort::new(AbortKind::Internal, message))
            }
        }
    }

    fn abort_report(
        &self,
        run_id: String,
        task_id: Option<String>,
        tools: Vec<String>,
        attempts: Vec<Attempt>,
        abort: Abort,
        started_at: DateTime<Utc>,
    ) -> Report {
        warn!("Run {} aborted ({:?}): {}", run_id, abort.kind, abort.message);
        Report {
            run_id,
            mode: self.mode,
            task_id,
            tools,
            status: RunStatus::Aborted,
            final_metrics: None,
            attempts,
            blocking_failure: Some(BlockingFailure::Abort {
                kind: abort.kind,
                message: abort.message,
            }),
            max_attempts: self.max_attempts,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
