//! Schema synchronization between a source and a target instance.
//!
//! snapshot(source) -> diff(target, snapshot) -> filter(diff, exclusions) -> apply(target)

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::exclusion::ExclusionSet;
use crate::client::Instance;
use crate::error::{Result, SyncError};
use crate::index::SnapshotIndex;
use crate::model::{DiffOutcome, SchemaDiff, SchemaSnapshot};

/// Where a sync session stands.
///
/// A session passes through `Idle`, `SnapshotTaken` and `DiffComputed` while it
/// is prepared, then rests in `NotApplicable` or `ReadyToApply` until applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    SnapshotTaken,
    DiffComputed,
    NotApplicable,
    ReadyToApply,
    Applied,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncState::Idle => "idle",
            SyncState::SnapshotTaken => "snapshot taken",
            SyncState::DiffComputed => "diff computed",
            SyncState::NotApplicable => "not applicable",
            SyncState::ReadyToApply => "ready to apply",
            SyncState::Applied => "applied",
        };
        f.write_str(label)
    }
}

/// Result of one prepare run: the source snapshot, its indexes, and the
/// target's diff against it.
#[derive(Debug, Clone)]
pub struct SchemaSession {
    snapshot: SchemaSnapshot,
    index: SnapshotIndex,
    outcome: DiffOutcome,
    history: Vec<SyncState>,
}

impl SchemaSession {
    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    pub fn outcome(&self) -> &DiffOutcome {
        &self.outcome
    }

    /// The diff returned by the target, when there is one
    pub fn diff(&self) -> Option<&SchemaDiff> {
        self.outcome.diff()
    }

    pub fn can_apply(&self) -> bool {
        self.outcome.can_apply()
    }

    pub fn state(&self) -> SyncState {
        self.history.last().copied().unwrap_or(SyncState::Idle)
    }

    /// Every state the session has been in, oldest first
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    fn advance(&mut self, next: SyncState) {
        debug!("Schema session: {} -> {}", self.state(), next);
        self.history.push(next);
    }
}

/// What was sent to the target on apply
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// The filtered diff that was submitted
    pub submitted: SchemaDiff,
    /// Entries dropped because their collection is protected
    pub excluded: usize,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.submitted.entry_count()
    }
}

/// Orchestrates snapshot, diff and apply between two instances.
#[derive(Clone)]
pub struct SchemaSync {
    source: Arc<dyn Instance>,
    target: Arc<dyn Instance>,
    exclusions: ExclusionSet,
}

impl fmt::Debug for SchemaSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSync")
            .field("source", &self.source.name())
            .field("target", &self.target.name())
            .field("exclusions", &self.exclusions)
            .finish()
    }
}

impl SchemaSync {
    pub fn new(source: Arc<dyn Instance>, target: Arc<dyn Instance>) -> Self {
        Self::with_exclusions(source, target, ExclusionSet::protected())
    }

    pub fn with_exclusions(
        source: Arc<dyn Instance>,
        target: Arc<dyn Instance>,
        exclusions: ExclusionSet,
    ) -> Self {
        Self {
            source,
            target,
            exclusions,
        }
    }

    pub fn source(&self) -> &Arc<dyn Instance> {
        &self.source
    }

    pub fn target(&self) -> &Arc<dyn Instance> {
        &self.target
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Idle -> SnapshotTaken
    pub async fn take_snapshot(&self) -> Result<SchemaSnapshot> {
        debug!("Taking schema snapshot of {}", self.source.name());
        let snapshot = self.source.schema_snapshot().await?;
        info!(
            "Snapshot of {}: {} collection(s), {} field(s), {} relation(s)",
            self.source.name(),
            snapshot.collections.len(),
            snapshot.fields.len(),
            snapshot.relations.len()
        );
        Ok(snapshot)
    }

    /// SnapshotTaken -> DiffComputed
    pub async fn compute_diff(&self, snapshot: &SchemaSnapshot) -> Result<DiffOutcome> {
        debug!("Requesting schema diff from {}", self.target.name());
        let outcome = self.target.schema_diff(snapshot).await?;
        match &outcome {
            DiffOutcome::NoChanges => info!("{} already matches the snapshot", self.target.name()),
            DiffOutcome::Changes(diff) => info!(
                "{} differs from the snapshot: {} change(s) across {} collection(s)",
                self.target.name(),
                diff.entry_count(),
                diff.collections().len()
            ),
        }
        Ok(outcome)
    }

    /// Run snapshot and diff, ending in `NotApplicable` or `ReadyToApply`.
    pub async fn prepare(&self) -> Result<SchemaSession> {
        let mut history = vec![SyncState::Idle];

        let snapshot = self.take_snapshot().await?;
        history.push(SyncState::SnapshotTaken);
        let index = SnapshotIndex::build(&snapshot);

        let outcome = self.compute_diff(&snapshot).await?;
        history.push(SyncState::DiffComputed);

        let mut session = SchemaSession {
            snapshot,
            index,
            outcome,
            history,
        };
        session.advance(if session.can_apply() {
            SyncState::ReadyToApply
        } else {
            SyncState::NotApplicable
        });
        Ok(session)
    }

    /// Filter `diff` through the exclusion set and submit it to the target.
    ///
    /// `diff` is cloned before filtering and left untouched. The filter runs on
    /// every call.
    pub async fn apply_schema(&self, diff: &SchemaDiff) -> Result<ApplyReport> {
        let (filtered, excluded) = self.exclusions.filter(diff);
        if excluded > 0 {
            warn!(
                "Dropped {} change(s) touching protected collections before apply",
                excluded
            );
        }
        debug!(
            "Applying {} change(s) to {}",
            filtered.entry_count(),
            self.target.name()
        );

        self.target.schema_apply(&filtered).await?;
        info!(
            "Applied {} schema change(s) to {}",
            filtered.entry_count(),
            self.target.name()
        );

        Ok(ApplyReport {
            submitted: filtered,
            excluded,
        })
    }

    /// Apply the session's diff, or `diff` when given (e.g. a hand-pruned copy).
    ///
    /// Fails with [`SyncError::NotApplicable`] without contacting the target when
    /// the target reported no changes.
    pub async fn apply(
        &self,
        session: &mut SchemaSession,
        diff: Option<&SchemaDiff>,
    ) -> Result<ApplyReport> {
        let Some(session_diff) = session.outcome.diff() else {
            return Err(SyncError::NotApplicable);
        };
        let report = self.apply_schema(diff.unwrap_or(session_diff)).await?;
        session.advance(SyncState::Applied);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, DiffEntry, Field};
    use crate::schema::BOOKKEEPING_COLLECTION;
    use crate::test_utils::MockInstance;
    use serde_json::json;

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::empty()
            .with_collections(&[Collection::new("A"), Collection::new("B")])
            .with_fields(&[
                Field::new("A", "id").with_type("uuid"),
                Field::new("A", "owner").with_type("uuid"),
                Field::new("B", "id").with_type("integer"),
            ])
    }

    fn drift() -> SchemaDiff {
        let entries = |names: &[&str]| -> Vec<DiffEntry> {
            names
                .iter()
                .map(|n| DiffEntry::new(*n).with("diff", json!([{"kind": "N"}])))
                .collect()
        };
        SchemaDiff::new("h1")
            .with_category("collections", entries(&["A", "protected", "B"]))
            .with_category("fields", entries(&["A", "B", "protected"]))
            .with_category("relations", entries(&["protected"]))
    }

    fn engine(source: &Arc<MockInstance>, target: &Arc<MockInstance>) -> SchemaSync {
        SchemaSync::with_exclusions(
            source.clone(),
            target.clone(),
            ExclusionSet::with_additional(["protected"]),
        )
    }

    #[tokio::test]
    async fn prepare_reports_ready_when_target_drifts() {
        let source = Arc::new(MockInstance::new("source").with_snapshot(snapshot()));
        let target = Arc::new(MockInstance::new("target").with_diff(DiffOutcome::Changes(drift())));

        let session = engine(&source, &target).prepare().await.unwrap();

        assert!(session.can_apply());
        assert_eq!(session.state(), SyncState::ReadyToApply);
        assert_eq!(session.index().collections.len(), 2);
        assert_eq!(session.index().fields_of("A").len(), 2);
        assert_eq!(target.diff_requests().len(), 1);
        assert_eq!(target.diff_requests()[0], snapshot());
    }

    #[tokio::test]
    async fn prepare_reports_not_applicable_on_no_content() {
        let source = Arc::new(MockInstance::new("source").with_snapshot(snapshot()));
        let target = Arc::new(MockInstance::new("target").with_diff(DiffOutcome::NoChanges));
        let sync = engine(&source, &target);

        let mut session = sync.prepare().await.unwrap();
        assert!(!session.can_apply());
        assert_eq!(session.state(), SyncState::NotApplicable);

        let err = sync.apply(&mut session, None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotApplicable));
        assert!(target.applied().is_empty());
        assert_eq!(session.state(), SyncState::NotApplicable);
    }

    #[tokio::test]
    async fn apply_submits_filtered_copy() {
        let source = Arc::new(MockInstance::new("source").with_snapshot(snapshot()));
        let target = Arc::new(MockInstance::new("target").with_diff(DiffOutcome::Changes(drift())));
        let sync = engine(&source, &target);

        let mut session = sync.prepare().await.unwrap();
        let report = sync.apply(&mut session, None).await.unwrap();

        assert_eq!(
            session.history(),
            [
                SyncState::Idle,
                SyncState::SnapshotTaken,
                SyncState::DiffComputed,
                SyncState::ReadyToApply,
                SyncState::Applied,
            ]
        );
        assert_eq!(report.excluded, 3);
        assert_eq!(report.applied(), 4);

        let applied = target.applied();
        assert_eq!(applied.len(), 1);
        for (category, entries) in &applied[0].diff {
            assert!(
                entries.iter().all(|e| e.collection != "protected"),
                "protected entry left in {}",
                category
            );
        }
        assert_eq!(applied[0].diff["relations"].len(), 0);
        // The session's diff is untouched and can be applied again
        assert!(session.diff().unwrap().touches("protected"));
        sync.apply(&mut session, None).await.unwrap();
        assert_eq!(target.applied().len(), 2);
    }

    #[tokio::test]
    async fn apply_schema_leaves_caller_diff_intact() {
        let source = Arc::new(MockInstance::new("source"));
        let target = Arc::new(MockInstance::new("target"));
        let diff = drift();

        engine(&source, &target).apply_schema(&diff).await.unwrap();

        assert_eq!(diff, drift());
        assert!(!target.applied()[0].touches("protected"));
    }

    #[tokio::test]
    async fn default_exclusions_protect_bookkeeping_collection() {
        let source: Arc<dyn Instance> = Arc::new(MockInstance::new("source"));
        let target = Arc::new(MockInstance::new("target"));
        let diff = SchemaDiff::new("h").with_category(
            "collections",
            vec![DiffEntry::new(BOOKKEEPING_COLLECTION), DiffEntry::new("posts")],
        );

        let report = SchemaSync::new(source, target.clone())
            .apply_schema(&diff)
            .await
            .unwrap();

        assert_eq!(report.excluded, 1);
        assert_eq!(target.applied()[0].collections(), vec!["posts"]);
    }

    #[tokio::test]
    async fn explicit_diff_overrides_session_diff() {
        let source = Arc::new(MockInstance::new("source").with_snapshot(snapshot()));
        let target = Arc::new(MockInstance::new("target").with_diff(DiffOutcome::Changes(drift())));
        let sync = engine(&source, &target);
        let mut session = sync.prepare().await.unwrap();

        let pruned = SchemaDiff::new("h1").with_category("fields", vec![DiffEntry::new("B")]);
        let report = sync.apply(&mut session, Some(&pruned)).await.unwrap();

        assert_eq!(report.applied(), 1);
        assert_eq!(target.applied()[0], pruned);
    }

    #[tokio::test]
    async fn apply_failure_propagates() {
        let source = Arc::new(MockInstance::new("source").with_snapshot(snapshot()));
        let target = Arc::new(
            MockInstance::new("target")
                .with_diff(DiffOutcome::Changes(drift()))
                .reject_apply("INVALID_PAYLOAD", "Hash mismatch"),
        );
        let sync = engine(&source, &target);
        let mut session = sync.prepare().await.unwrap();

        let err = sync.apply(&mut session, None).await.unwrap_err();

        assert!(matches!(err, SyncError::ApplyRejected { .. }));
        assert_eq!(err.code(), Some("INVALID_PAYLOAD"));
        assert_eq!(session.state(), SyncState::ReadyToApply);
    }

    #[tokio::test]
    async fn diff_request_carries_unreadable_records() {
        let raw: SchemaSnapshot = serde_json::from_value(json!({
            "version": 1,
            "collections": [
                {"collection": "posts", "meta": {"export_schema": {"export": true}}},
                {"collection": "tags", "meta": {"system": "maybe"}}
            ],
            "fields": [{"collection": "tags", "field": 7}],
            "relations": []
        }))
        .unwrap();
        let source = Arc::new(MockInstance::new("source").with_snapshot(raw.clone()));
        let target = Arc::new(MockInstance::new("target"));

        let session = engine(&source, &target).prepare().await.unwrap();

        let sent = &target.diff_requests()[0];
        assert_eq!(sent, &raw);
        assert_eq!(sent.collections.len(), 2);
        assert_eq!(sent.fields.len(), 1);
        assert_eq!(session.index().collections.len(), 1);
        assert!(session.index().fields_of("tags").is_empty());
    }

    #[tokio::test]
    async fn snapshot_failure_is_fatal() {
        let source = Arc::new(MockInstance::new("source").fail_snapshot(401, "Invalid user credentials."));
        let target = Arc::new(MockInstance::new("target"));

        let err = engine(&source, &target).prepare().await.unwrap_err();

        assert!(matches!(err, SyncError::Api { status: 401, .. }));
        assert!(target.diff_requests().is_empty());
    }
}
