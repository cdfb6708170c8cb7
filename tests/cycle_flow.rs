//! Full cycles against a temp state file and an in-memory journal.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use lobsterforge::agent::CycleRunner;
use lobsterforge::config::Thresholds;
use lobsterforge::executor::{ActionExecutor, LiveExecutor};
use lobsterforge::metrics::MetricsProvider;
use lobsterforge::state::{CycleTally, Journal, StateStore};
use lobsterforge::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

struct StaticProvider(Option<MetricsSnapshot>);

#[async_trait]
impl MetricsProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<MetricsSnapshot> {
        match &self.0 {
            Some(m) => Ok(m.clone()),
            None => bail!("rpc unavailable"),
        }
    }
}

/// Records every executed action; fails actions of the given kind.
#[derive(Default)]
struct RecordingExecutor {
    calls: std::sync::Mutex<Vec<EvolutionAction>>,
    fail_kind: Option<&'static str>,
}

impl RecordingExecutor {
    fn failing_on(kind: &'static str) -> Self {
        Self {
            fail_kind: Some(kind),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<EvolutionAction> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, action: &EvolutionAction, _metrics: &MetricsSnapshot) -> Result<()> {
        self.calls.lock().unwrap().push(action.clone());
        if self.fail_kind == Some(action.kind()) {
            bail!("deployer unavailable");
        }
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: StateStore,
    journal: Arc<Mutex<Journal>>,
    executor: Arc<RecordingExecutor>,
    runner: CycleRunner,
}

fn harness(metrics: Option<MetricsSnapshot>, initial: Option<AgentState>, executor: RecordingExecutor) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    if let Some(state) = initial {
        store.save(&state).unwrap();
    }
    let journal = Arc::new(Mutex::new(Journal::open_memory().unwrap()));
    let executor = Arc::new(executor);
    let runner = CycleRunner::new(
        Thresholds::default(),
        store.clone(),
        journal.clone(),
        Arc::new(StaticProvider(metrics)),
        executor.clone(),
    );
    Harness {
        _dir: dir,
        store,
        journal,
        executor,
        runner,
    }
}

fn metrics(treasury_eth: f64, holder_count: u64) -> MetricsSnapshot {
    MetricsSnapshot {
        treasury_eth,
        holder_count,
        staking_tvl: 10_000.0,
        nfts_minted: 5,
        nfts_max_supply: 1000,
        gas_runway_hours: 5_000.0,
        ..MetricsSnapshot::default()
    }
}

fn stale_post_state() -> AgentState {
    AgentState {
        last_post_time: Utc::now() - Duration::hours(30),
        ..AgentState::default()
    }
}

#[tokio::test]
async fn live_cycle_executes_and_persists() {
    let h = harness(Some(metrics(6.0, 10)), Some(stale_post_state()), RecordingExecutor::default());

    let report = h.runner.run_cycle(false).await.unwrap();
    assert!(report.persisted);
    assert_eq!(
        report.tally,
        CycleTally {
            executed: 2,
            rejected: 0,
            failed: 0
        }
    );
    assert_eq!(
        h.executor.calls(),
        vec![EvolutionAction::DeployAdvancedStaking, EvolutionAction::PostMetrics]
    );

    let saved = h.store.load().unwrap();
    assert!(saved.has_deployed(ADVANCED_STAKING_CONTRACT));
    assert!(saved.last_post_time > Utc::now() - Duration::minutes(5));
    assert_eq!(saved, report.state);

    let journal = h.journal.lock().await;
    let records = journal.cycle_actions(&report.cycle_id).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.outcome == ActionOutcome::Executed));
    assert_eq!(journal.cycle_count().unwrap(), 1);
    assert!(journal.latest_metrics().unwrap().is_some());
}

#[tokio::test]
async fn second_cycle_does_not_repeat_effects() {
    let h = harness(Some(metrics(6.0, 10)), Some(stale_post_state()), RecordingExecutor::default());

    h.runner.run_cycle(false).await.unwrap();
    let second = h.runner.run_cycle(false).await.unwrap();

    let actions: Vec<_> = second.actions().cloned().collect();
    assert_eq!(actions, vec![EvolutionAction::NoAction]);
}

#[tokio::test]
async fn safety_rejection_is_logged_and_skipped() {
    // Not yet conserving, so the molt is proposed; the gate then refuses it.
    let h = harness(Some(metrics(0.4, 600)), Some(stale_post_state()), RecordingExecutor::default());

    let report = h.runner.run_cycle(false).await.unwrap();
    let outcomes: Vec<_> = report.entries.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ActionOutcome::Executed,
            ActionOutcome::Rejected,
            ActionOutcome::Executed
        ]
    );
    assert!(report.entries[1]
        .detail
        .as_deref()
        .unwrap()
        .contains("conservation mode"));

    assert_eq!(
        h.executor.calls(),
        vec![EvolutionAction::ConservationMode, EvolutionAction::PostMetrics]
    );

    let saved = h.store.load().unwrap();
    assert!(saved.conservation_mode);
    assert_eq!(saved.last_molt_holder_count, 0);
}

#[tokio::test]
async fn failed_execution_leaves_state_untouched() {
    let h = harness(
        Some(metrics(6.0, 10)),
        Some(stale_post_state()),
        RecordingExecutor::failing_on("DEPLOY_ADVANCED_STAKING"),
    );

    let report = h.runner.run_cycle(false).await.unwrap();
    assert_eq!(report.tally.failed, 1);
    assert_eq!(report.tally.executed, 1);
    assert_eq!(report.entries[0].outcome, ActionOutcome::Failed);
    assert!(report.entries[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("deployer unavailable"));

    let saved = h.store.load().unwrap();
    assert!(!saved.has_deployed(ADVANCED_STAKING_CONTRACT));
    assert!(saved.last_post_time > Utc::now() - Duration::minutes(5));

    let records = h
        .journal
        .lock()
        .await
        .cycle_actions(&report.cycle_id)
        .unwrap();
    assert_eq!(records[0].outcome, ActionOutcome::Failed);
}

#[tokio::test]
async fn dry_run_executes_and_persists_nothing() {
    let h = harness(Some(metrics(6.0, 10)), None, RecordingExecutor::default());

    let report = h.runner.run_cycle(true).await.unwrap();
    assert!(!report.persisted);
    assert!(report
        .entries
        .iter()
        .all(|e| e.outcome == ActionOutcome::DryRun));
    assert!(h.executor.calls().is_empty());
    assert!(!h.store.path().exists());
    assert_eq!(report.state, AgentState::default());

    let journal = h.journal.lock().await;
    assert_eq!(journal.cycle_count().unwrap(), 1);
    assert!(journal.latest_metrics().unwrap().is_none());
}

#[tokio::test]
async fn metrics_failure_keeps_previous_state() {
    let mut initial = stale_post_state();
    initial.last_molt_holder_count = 500;
    let h = harness(None, Some(initial.clone()), RecordingExecutor::default());

    let err = h.runner.run_cycle(false).await.unwrap_err();
    assert!(format!("{err:#}").contains("rpc unavailable"));
    assert!(h.executor.calls().is_empty());
    assert_eq!(h.store.load().unwrap(), initial);
}

#[tokio::test]
async fn survival_then_recovery() {
    let h = harness(Some(metrics(0.2, 0)), None, RecordingExecutor::default());
    let report = h.runner.run_cycle(false).await.unwrap();
    assert_eq!(
        report.actions().cloned().collect::<Vec<_>>(),
        vec![EvolutionAction::SurvivalMode]
    );
    assert_eq!(h.store.load().unwrap().mode(), OperatingMode::Survival);

    let recovered = CycleRunner::new(
        Thresholds::default(),
        h.store.clone(),
        h.journal.clone(),
        Arc::new(StaticProvider(Some(metrics(0.8, 0)))),
        h.executor.clone(),
    );
    let report = recovered.run_cycle(false).await.unwrap();
    assert_eq!(
        report.entries[0].action,
        EvolutionAction::ExitConservation {
            from: PreviousMode::Survival
        }
    );
    assert_eq!(h.store.load().unwrap().mode(), OperatingMode::Operational);
}

fn funded_proposal(id: &str) -> Proposal {
    Proposal {
        id: id.into(),
        title: "Colony yield vault".into(),
        description: "Lobster stakers earn shell rewards".into(),
        votes: 120,
        feasibility_score: 0.9,
        cost: 0.2,
        proposer: None,
        template: Some("LobsterVault".into()),
    }
}

#[tokio::test]
async fn pending_proposal_queues_one_work_order_across_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let mut initial = AgentState {
        last_post_time: Utc::now(),
        pending_proposals: vec![funded_proposal("p1")],
        ..AgentState::default()
    };
    initial
        .deployed_contracts
        .insert(ADVANCED_STAKING_CONTRACT.to_string());
    store.save(&initial).unwrap();

    let journal = Arc::new(Mutex::new(Journal::open_memory().unwrap()));
    let runner = CycleRunner::new(
        Thresholds::default(),
        store,
        journal.clone(),
        Arc::new(StaticProvider(Some(metrics(6.0, 10)))),
        Arc::new(LiveExecutor::new(None, journal.clone())),
    );

    for _ in 0..3 {
        let report = runner.run_cycle(false).await.unwrap();
        assert_eq!(
            report.actions().cloned().collect::<Vec<_>>(),
            vec![EvolutionAction::ExecuteProposal {
                proposal_id: "p1".into()
            }]
        );
    }

    let orders = journal.lock().await.pending_work_orders().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(
        orders[0].action,
        EvolutionAction::ExecuteProposal {
            proposal_id: "p1".into()
        }
    );
}

#[tokio::test]
async fn journal_write_failure_still_persists_effects() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    store.save(&stale_post_state()).unwrap();

    let journal_path = dir.path().join("journal.db");
    let journal = Journal::open(&journal_path).unwrap();
    rusqlite::Connection::open(&journal_path)
        .unwrap()
        .execute_batch("DROP TABLE action_log;")
        .unwrap();
    let journal = Arc::new(Mutex::new(journal));

    let executor = Arc::new(RecordingExecutor::default());
    let runner = CycleRunner::new(
        Thresholds::default(),
        store.clone(),
        journal,
        Arc::new(StaticProvider(Some(metrics(6.0, 10)))),
        executor.clone(),
    );

    let report = runner.run_cycle(false).await.unwrap();
    assert!(report.persisted);
    assert_eq!(report.tally.executed, 2);
    assert_eq!(executor.calls().len(), 2);

    let saved = store.load().unwrap();
    assert!(saved.has_deployed(ADVANCED_STAKING_CONTRACT));
    assert!(saved.last_post_time > Utc::now() - Duration::minutes(5));
}
