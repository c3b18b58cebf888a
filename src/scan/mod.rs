//! Scan orchestrator.
//!
//! Sequences validation, rule matching, chain linking and ranking over one
//! application, and runs whole batches of applications on a worker pool. It
//! owns no domain logic of its own.


use crate::{
    chains::{builtin_templates, link_chains, ChainTemplate},
    error::{ErrorKind, ScanError},
    facts::ApplicationFacts,
    matcher::match_rules,
    results::{rank, Results, SeverityTable},
    rules::RuleRegistry,
};
use log::{debug, info, warn};
use std::{
    collections::VecDeque,
    panic,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
};

/// Immutable configuration shared by every scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    registry: RuleRegistry,
    templates: Vec<ChainTemplate>,
    severity: SeverityTable,
    threads: usize,
    parallel_phases: bool,
}

impl ScanContext {
    /// Creates a new scan context.
    pub fn new(
        registry: RuleRegistry,
        templates: Vec<ChainTemplate>,
        severity: SeverityTable,
    ) -> Self {
        Self {
            registry,
            templates,
            severity,
            threads: num_cpus::get(),
            parallel_phases: false,
        }
    }

    /// Creates a context with the built-in rules, templates and severity table.
    pub fn builtin() -> Result<Self, ErrorKind> {
        Ok(Self::new(
            RuleRegistry::builtin()?,
            builtin_templates()?,
            SeverityTable::default(),
        ))
    }

    /// Sets the number of worker threads of batch scans.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Runs the matcher and the linker of one application concurrently.
    pub fn with_parallel_phases(mut self, parallel_phases: bool) -> Self {
        self.parallel_phases = parallel_phases;
        self
    }

    /// Gets the rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Gets the chain templates.
    pub fn templates(&self) -> &[ChainTemplate] {
        &self.templates
    }

    /// Gets the severity table.
    pub fn severity(&self) -> &SeverityTable {
        &self.severity
    }

    /// Gets the number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Checks if the phases of one scan run concurrently.
    pub fn parallel_phases(&self) -> bool {
        self.parallel_phases
    }
}

/// Cooperative cancellation flag for batch scans.
///
/// It is checked between applications only, so an application is either fully
/// scanned or not scanned at all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, not cancelled, token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the cancellation of the batch.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Checks if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of the scan of one application of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationOutcome {
    /// The scan completed.
    Completed(Results),
    /// The facts of the application were malformed.
    Failed(ScanError),
    /// The batch was cancelled before the application was scanned.
    Cancelled,
}

impl ApplicationOutcome {
    /// Gets the results, if the scan completed.
    pub fn results(&self) -> Option<&Results> {
        match self {
            Self::Completed(results) => Some(results),
            Self::Failed(_) | Self::Cancelled => None,
        }
    }
}

/// Scans one application.
///
/// Fails only when the facts violate a structural invariant. Rules or templates
/// that do not match are not errors.
pub fn scan_application(
    facts: &ApplicationFacts,
    context: &ScanContext,
) -> Result<Results, ScanError> {
    if let Err(e) = facts.validate() {
        warn!("{}", e);
        return Err(e);
    }
    info!("scanning `{}`", facts.package());

    let (atomic, composite) = if context.parallel_phases() {
        thread::scope(|s| {
            let linker = s.spawn(|| link_chains(facts, context.templates()));
            let atomic = match_rules(facts, context.registry());
            let composite = linker
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload));
            (atomic, composite)
        })
    } else {
        (
            match_rules(facts, context.registry()),
            link_chains(facts, context.templates()),
        )
    };
    debug!(
        "`{}`: {} atomic and {} composite finding(s) before ranking",
        facts.package(),
        atomic.len(),
        composite.len()
    );

    let mut findings = atomic;
    findings.extend(composite);
    let results = Results::new(facts, rank(findings, context.severity()));
    info!(
        "`{}` scanned: {} finding(s)",
        facts.package(),
        results.active().count()
    );
    Ok(results)
}

/// Scans a batch of applications on the worker pool.
///
/// Outcomes are returned in input order. A malformed application only fails
/// its own scan.
pub fn scan_batch(
    applications: Vec<ApplicationFacts>,
    context: &ScanContext,
    cancel: &CancellationToken,
) -> Vec<ApplicationOutcome> {
    let total = applications.len();
    let queue = Mutex::new(
        applications
            .into_iter()
            .enumerate()
            .collect::<VecDeque<_>>(),
    );
    let outcomes = Mutex::new(vec![None; total]);
    let threads = context.threads().min(total).max(1);
    debug!(
        "starting the scan of {} application(s) with {} thread(s)",
        total, threads
    );

    thread::scope(|s| {
        for _ in 0..threads {
            let _ = s.spawn(|| loop {
                if cancel.is_cancelled() {
                    break;
                }
                let next = lock(&queue).pop_front();
                let (index, facts) = match next {
                    Some(next) => next,
                    None => break,
                };

                let outcome = match scan_application(&facts, context) {
                    Ok(results) => ApplicationOutcome::Completed(results),
                    Err(e) => ApplicationOutcome::Failed(e),
                };
                lock(&outcomes)[index] = Some(outcome);
            });
        }
    });

    let outcomes = outcomes
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    let cancelled = outcomes.iter().filter(|o| o.is_none()).count();
    if cancelled > 0 {
        info!("batch cancelled, {} application(s) not scanned", cancelled);
    }

    outcomes
        .into_iter()
        .map(|o| o.unwrap_or(ApplicationOutcome::Cancelled))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
