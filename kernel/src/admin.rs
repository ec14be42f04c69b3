// Table Administration
//
// Drives create, update and delete of tables across the meta table and
// the physical store. The two stores are not updated transactionally:
// physical changes land first, the meta table commit second. A failure
// between the two leaves the stores disagreeing until an operator
// reconciles them; `audit_tables` reports such tables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::adapters::{PhysicalStore, StorageError};
use crate::audit::{audit_tables, AuditError, AuditReport};
use crate::layout::diff::LayoutDiff;
use crate::layout::{LayoutDocument, ResolvedLayout};
use crate::meta::{MetaError, MetaTable};
use crate::resolve::{ConcurrencyError, LayoutError, LayoutResolver};
use crate::state::policy_config::ReconcilePolicy;
use crate::state::{StateError, TableState, Transition};
use crate::validate::ValidationError;

/// Errors returned by administrator operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("invalid layout: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("table `{0}` already exists")]
    AlreadyExists(String),

    #[error("storage engine error: {0}")]
    Storage(#[from] StorageError),

    #[error("meta table error: {0}")]
    Meta(MetaError),
}

impl AdminError {
    /// Whether resubmitting against a freshly fetched layout may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AdminError::Concurrency(_))
    }
}

impl From<LayoutError> for AdminError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::Validation(e) => AdminError::Validation(e),
            LayoutError::Concurrency(e) => AdminError::Concurrency(e),
        }
    }
}

impl From<StateError> for AdminError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::TableNotFound(table) => AdminError::TableNotFound(table),
            StateError::AlreadyExists(table) => AdminError::AlreadyExists(table),
        }
    }
}

impl From<MetaError> for AdminError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Conflict(e) => AdminError::Concurrency(e),
            MetaError::TableNotFound(table) => AdminError::TableNotFound(table),
            other => AdminError::Meta(other),
        }
    }
}

/// Creates, evolves and deletes tables.
///
/// Safe to share between threads; concurrent updates of one table are
/// settled by the reference layout check and the meta table's
/// compare-and-swap append. Creates of one table name are serialised.
pub struct TableAdministrator<M, P> {
    meta: M,
    physical: P,
    resolver: LayoutResolver,
    creating: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<M: MetaTable, P: PhysicalStore> TableAdministrator<M, P> {
    pub fn new(meta: M, physical: P) -> Self {
        Self {
            meta,
            physical,
            resolver: LayoutResolver::default(),
            creating: Mutex::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: LayoutResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn meta(&self) -> &M {
        &self.meta
    }

    pub fn physical(&self) -> &P {
        &self.physical
    }

    /// Create `table` from `doc`.
    ///
    /// If the table exists, fails with `AlreadyExists` when
    /// `fail_if_exists` is set and otherwise returns the current layout
    /// untouched. This also holds when another caller creates the table
    /// concurrently.
    pub fn create_table(
        &self,
        table: &str,
        doc: &LayoutDocument,
        fail_if_exists: bool,
    ) -> Result<ResolvedLayout, AdminError> {
        let lock = self.creation_lock(table);
        let result = {
            let _guard = lock.lock();
            self.create_table_locked(table, doc, fail_if_exists)
        };
        self.release_creation_lock(table, lock);
        result
    }

    fn create_table_locked(
        &self,
        table: &str,
        doc: &LayoutDocument,
        fail_if_exists: bool,
    ) -> Result<ResolvedLayout, AdminError> {
        let state = TableState::load(&self.meta, table)?;
        if let (TableState::Present(current), false) = (&state, fail_if_exists) {
            debug!(table, layout_id = %current.layout_id(), "table already exists");
            return Ok(current.clone());
        }
        state.check(table, Transition::Create)?;

        let layout = self.resolver.resolve(table, doc, None)?;

        match self.physical.create_physical_table(table, &layout) {
            Ok(()) => {}
            Err(StorageError::TableExists(_)) => {
                return self.created_elsewhere(table, fail_if_exists)
            }
            Err(err) => return Err(err.into()),
        }
        if let Err(err) = self.meta.append_layout(table, layout.clone()) {
            warn!(
                table,
                error = %err,
                "physical table created but meta table append failed; stores disagree"
            );
            return Err(err.into());
        }

        info!(
            table,
            layout_id = %layout.layout_id(),
            locality_groups = layout.locality_groups().len(),
            "created table"
        );
        Ok(layout)
    }

    /// The storage engine already has `table`: another creator got there
    /// first.
    fn created_elsewhere(
        &self,
        table: &str,
        fail_if_exists: bool,
    ) -> Result<ResolvedLayout, AdminError> {
        match self.meta.get_current_layout(table)? {
            Some(current) if !fail_if_exists => {
                debug!(table, layout_id = %current.layout_id(), "table created concurrently");
                Ok(current)
            }
            Some(_) => Err(AdminError::AlreadyExists(table.to_string())),
            None => {
                warn!(table, "physical table exists without a committed layout");
                Err(AdminError::AlreadyExists(table.to_string()))
            }
        }
    }

    fn creation_lock(&self, table: &str) -> Arc<Mutex<()>> {
        self.creating
            .lock()
            .entry(table.to_string())
            .or_default()
            .clone()
    }

    fn release_creation_lock(&self, table: &str, lock: Arc<Mutex<()>>) {
        let mut creating = self.creating.lock();
        drop(lock);
        // Only the map still holds the lock: no creator is waiting on it.
        if creating.get(table).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            creating.remove(table);
        }
    }

    /// Replace the layout of an existing table.
    ///
    /// `doc.reference_layout_id` must name the table's current layout.
    pub fn set_table_layout(
        &self,
        table: &str,
        doc: &LayoutDocument,
    ) -> Result<ResolvedLayout, AdminError> {
        // Malformed documents are rejected before any store is consulted.
        self.resolver.validator().validate(doc)?;

        let current =
            TableState::load(&self.meta, table)?.into_current(table, Transition::Update)?;
        let layout = self.resolver.resolve(table, doc, Some(&current))?;

        let diff = LayoutDiff::between(Some(&current), &layout);
        if diff.touches_physical() {
            self.physical.alter_physical_families(table, &diff)?;
        } else {
            debug!(table, "layout change does not touch column families");
        }

        if let Err(err) = self.meta.append_layout(table, layout.clone()) {
            if diff.touches_physical() {
                warn!(
                    table,
                    error = %err,
                    "column families altered but meta table append failed; stores disagree"
                );
            }
            return Err(err.into());
        }

        info!(
            table,
            layout_id = %layout.layout_id(),
            reference = %current.layout_id(),
            "updated table layout"
        );
        Ok(layout)
    }

    /// Delete the physical table, then its layout history.
    pub fn delete_table(&self, table: &str) -> Result<(), AdminError> {
        TableState::load(&self.meta, table)?.check(table, Transition::Delete)?;

        self.physical.delete_physical_table(table)?;
        if let Err(err) = self.meta.delete_table_record(table) {
            warn!(
                table,
                error = %err,
                "physical table deleted but meta table record remains; stores disagree"
            );
            return Err(err.into());
        }

        info!(table, "deleted table");
        Ok(())
    }

    pub fn get_table_layout(&self, table: &str) -> Result<ResolvedLayout, AdminError> {
        self.meta
            .get_current_layout(table)?
            .ok_or_else(|| AdminError::TableNotFound(table.to_string()))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, AdminError> {
        Ok(TableState::load(&self.meta, table)?.is_present())
    }

    pub fn list_tables(&self) -> Result<Vec<String>, AdminError> {
        Ok(self.meta.list_tables()?)
    }

    /// Every layout the table has had, oldest first.
    pub fn layout_history(&self, table: &str) -> Result<Vec<ResolvedLayout>, AdminError> {
        Ok(self.meta.layout_history(table)?)
    }

    /// Compare both stores and plan repairs. Nothing is changed.
    pub fn audit(&self, policy: &ReconcilePolicy) -> Result<AuditReport, AuditError> {
        audit_tables(&self.meta, &self.physical, self.resolver.validator(), policy)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::adapters::{InMemoryPhysicalStore, PhysicalTable};
    use crate::layout::{FamilySpec, LayoutId, LocalityGroupSpec, MaxVersions};
    use crate::meta::InMemoryMetaTable;
    use crate::state::drift::DriftType;

    type Admin = TableAdministrator<InMemoryMetaTable, InMemoryPhysicalStore>;

    fn admin() -> Admin {
        TableAdministrator::new(InMemoryMetaTable::new(), InMemoryPhysicalStore::new())
    }

    fn simple() -> LayoutDocument {
        LayoutDocument::new("table").with_locality_group(
            LocalityGroupSpec::new("default")
                .max_versions(MaxVersions::Bounded(3))
                .family(FamilySpec::new("family").columns(["column1", "column2"])),
        )
    }

    fn with_new_locality_group(reference: &LayoutId) -> LayoutDocument {
        LayoutDocument::new("table")
            .with_reference(reference.clone())
            .with_locality_group(
                LocalityGroupSpec::new("new")
                    .max_versions(MaxVersions::Bounded(1))
                    .family(FamilySpec::new("new_family")),
            )
    }

    #[test]
    fn create_table() {
        let admin = admin();
        let created = admin.create_table("table", &simple(), false).unwrap();

        let stored = admin.get_table_layout("table").unwrap();
        assert_eq!(stored.name(), "table");
        assert_eq!(stored.locality_groups().len(), simple().locality_groups.len());
        assert_eq!(stored, created);
        assert!(admin
            .physical()
            .describe_physical_table("table")
            .unwrap()
            .is_some());
    }

    #[test]
    fn create_existing_table() {
        let admin = admin();
        let first = admin.create_table("table", &simple(), true).unwrap();

        let err = admin.create_table("table", &simple(), true).unwrap_err();
        assert_eq!(err, AdminError::AlreadyExists("table".into()));

        let again = admin.create_table("table", &simple(), false).unwrap();
        assert_eq!(again, first);
        assert_eq!(admin.layout_history("table").unwrap().len(), 1);
    }

    #[test]
    fn set_table_layout_add() {
        let admin = admin();
        admin.create_table("table", &simple(), false).unwrap();

        let reference = admin.get_table_layout("table").unwrap().layout_id().clone();
        let updated = admin
            .set_table_layout("table", &with_new_locality_group(&reference))
            .unwrap();

        let stored = admin.get_table_layout("table").unwrap();
        assert_eq!(updated.family_count(), stored.family_count());
        assert_eq!(stored.family_count(), 2);

        let physical = admin.physical().describe_physical_table("table").unwrap().unwrap();
        assert!(physical.column_family("new").is_some());
    }

    #[test]
    fn set_table_layout_modify() {
        let admin = admin();
        admin.create_table("table", &simple(), false).unwrap();
        assert_eq!(
            admin
                .get_table_layout("table")
                .unwrap()
                .locality_group("default")
                .unwrap()
                .max_versions,
            MaxVersions::Bounded(3)
        );

        let mut doc = simple();
        doc.locality_groups[0].max_versions = Some(MaxVersions::Bounded(1));
        let reference = admin.get_table_layout("table").unwrap().layout_id().clone();
        doc.reference_layout_id = Some(reference);

        let updated = admin.set_table_layout("table", &doc).unwrap();
        let stored = admin.get_table_layout("table").unwrap();

        assert_eq!(
            updated.locality_group("default").unwrap().max_versions,
            MaxVersions::Bounded(1)
        );
        assert_eq!(stored.family_max_versions("family"), Some(MaxVersions::Bounded(1)));

        let physical = admin.physical().describe_physical_table("table").unwrap().unwrap();
        assert_eq!(
            physical.column_family("default").unwrap().max_versions,
            MaxVersions::Bounded(1)
        );
    }

    #[test]
    fn set_table_layout_without_families_keeps_them() {
        let admin = admin();
        let created = admin.create_table("table", &simple(), false).unwrap();

        let update = LayoutDocument::new("table")
            .with_reference(created.layout_id().clone())
            .with_locality_group(
                LocalityGroupSpec::new("default").max_versions(MaxVersions::Bounded(1)),
            );
        let updated = admin.set_table_layout("table", &update).unwrap();

        assert_eq!(updated.family_max_versions("family"), Some(MaxVersions::Bounded(1)));
        assert_eq!(updated.family("family"), created.family("family"));
    }

    #[test]
    fn set_table_layout_empty() {
        let admin = admin();
        let err = admin
            .set_table_layout("", &LayoutDocument::default())
            .unwrap_err();
        assert_eq!(err, AdminError::Validation(ValidationError::EmptyTableName));

        admin.create_table("table", &simple(), false).unwrap();
        let err = admin
            .set_table_layout("table", &LayoutDocument::default())
            .unwrap_err();
        assert!(matches!(err, AdminError::Validation(_)));
    }

    #[test]
    fn set_table_layout_on_a_table_that_does_not_exist() {
        let admin = admin();
        let err = admin.set_table_layout("table", &simple()).unwrap_err();
        assert_eq!(err, AdminError::TableNotFound("table".into()));
    }

    #[test]
    fn stale_reference_is_rejected() {
        let admin = admin();
        let created = admin.create_table("table", &simple(), false).unwrap();

        let first = with_new_locality_group(created.layout_id());
        admin.set_table_layout("table", &first).unwrap();

        let mut second = simple();
        second.reference_layout_id = Some(created.layout_id().clone());
        let err = admin.set_table_layout("table", &second).unwrap_err();

        assert!(matches!(err, AdminError::Concurrency(_)));
        assert!(err.is_retriable());
        assert_eq!(admin.get_table_layout("table").unwrap().layout_id().as_str(), "2");
    }

    #[test]
    fn concurrent_updates_against_one_reference() {
        let admin = admin();
        let created = admin.create_table("table", &simple(), false).unwrap();

        const WRITERS: u32 = 8;
        let barrier = Barrier::new(WRITERS as usize);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|i| {
                    let admin = &admin;
                    let barrier = &barrier;
                    let reference = created.layout_id().clone();
                    scope.spawn(move || {
                        let mut doc = simple();
                        doc.locality_groups[0].max_versions = Some(MaxVersions::Bounded(i + 1));
                        doc.reference_layout_id = Some(reference);
                        barrier.wait();
                        admin.set_table_layout("table", &doc)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AdminError::Concurrency(_))));
        assert_eq!(admin.layout_history("table").unwrap().len(), 2);
    }

    #[test]
    fn delete_table() {
        let admin = admin();
        admin.create_table("table", &simple(), false).unwrap();
        assert!(admin.table_exists("table").unwrap());

        admin.delete_table("table").unwrap();

        assert_eq!(
            admin.get_table_layout("table").unwrap_err(),
            AdminError::TableNotFound("table".into())
        );
        assert!(admin.list_tables().unwrap().is_empty());
        assert!(admin.physical().list_physical_tables().unwrap().is_empty());
        assert_eq!(
            admin.delete_table("table").unwrap_err(),
            AdminError::TableNotFound("table".into())
        );
    }

    #[test]
    fn recreated_table_starts_a_new_history() {
        let admin = admin();
        admin.create_table("table", &simple(), false).unwrap();
        let reference = admin.get_table_layout("table").unwrap().layout_id().clone();
        admin
            .set_table_layout("table", &with_new_locality_group(&reference))
            .unwrap();
        admin.delete_table("table").unwrap();

        let layout = admin.create_table("table", &simple(), true).unwrap();
        assert_eq!(layout.layout_id(), &LayoutId::initial());
        assert_eq!(admin.layout_history("table").unwrap().len(), 1);
    }

    #[test]
    fn max_versions_scenario() {
        let admin = admin();
        let created = admin.create_table("table", &simple(), true).unwrap();
        assert_eq!(
            admin.get_table_layout("table").unwrap().family_max_versions("family"),
            Some(MaxVersions::Bounded(3))
        );

        let update = LayoutDocument::new("table")
            .with_reference(created.layout_id().clone())
            .with_locality_group(
                LocalityGroupSpec::new("default")
                    .max_versions(MaxVersions::Bounded(1))
                    .family(FamilySpec::new("family")),
            );
        let updated = admin.set_table_layout("table", &update).unwrap();
        assert_eq!(updated.family_max_versions("family"), Some(MaxVersions::Bounded(1)));
        assert_eq!(
            admin.get_table_layout("table").unwrap().family_max_versions("family"),
            Some(MaxVersions::Bounded(1))
        );

        admin.delete_table("table").unwrap();
        assert!(matches!(
            admin.get_table_layout("table"),
            Err(AdminError::TableNotFound(_))
        ));
    }

    /// Meta table whose writes can be switched off.
    #[derive(Default)]
    struct FaultyMetaTable {
        inner: InMemoryMetaTable,
        appends_fail: AtomicBool,
        deletes_fail: AtomicBool,
    }

    impl FaultyMetaTable {
        fn read_only() -> Self {
            let meta = Self::default();
            meta.appends_fail.store(true, Ordering::SeqCst);
            meta
        }
    }

    impl MetaTable for FaultyMetaTable {
        fn get_current_layout(&self, table: &str) -> Result<Option<ResolvedLayout>, MetaError> {
            self.inner.get_current_layout(table)
        }

        fn append_layout(&self, table: &str, layout: ResolvedLayout) -> Result<(), MetaError> {
            if self.appends_fail.load(Ordering::SeqCst) {
                return Err(MetaError::Unavailable("read-only".into()));
            }
            self.inner.append_layout(table, layout)
        }

        fn delete_table_record(&self, table: &str) -> Result<(), MetaError> {
            if self.deletes_fail.load(Ordering::SeqCst) {
                return Err(MetaError::Unavailable("read-only".into()));
            }
            self.inner.delete_table_record(table)
        }

        fn list_tables(&self) -> Result<Vec<String>, MetaError> {
            self.inner.list_tables()
        }

        fn layout_history(&self, table: &str) -> Result<Vec<ResolvedLayout>, MetaError> {
            self.inner.layout_history(table)
        }
    }

    fn drift_types<M: MetaTable, P: PhysicalStore>(
        admin: &TableAdministrator<M, P>,
    ) -> Vec<DriftType> {
        admin
            .audit(&ReconcilePolicy::default_policy())
            .unwrap()
            .drift_report
            .findings
            .into_iter()
            .map(|finding| finding.drift_type)
            .collect()
    }

    #[test]
    fn failed_meta_append_leaves_orphan_physical_table() {
        let admin =
            TableAdministrator::new(FaultyMetaTable::read_only(), InMemoryPhysicalStore::new());

        let err = admin.create_table("table", &simple(), true).unwrap_err();
        assert_eq!(err, AdminError::Meta(MetaError::Unavailable("read-only".into())));
        assert_eq!(drift_types(&admin), vec![DriftType::OrphanPhysicalTable]);
    }

    #[test]
    fn failed_meta_append_after_alter_leaves_policy_mismatch() {
        let admin =
            TableAdministrator::new(FaultyMetaTable::default(), InMemoryPhysicalStore::new());
        let created = admin.create_table("table", &simple(), true).unwrap();
        admin.meta().appends_fail.store(true, Ordering::SeqCst);

        let update = LayoutDocument::new("table")
            .with_reference(created.layout_id().clone())
            .with_locality_group(
                LocalityGroupSpec::new("default").max_versions(MaxVersions::Bounded(1)),
            );
        let err = admin.set_table_layout("table", &update).unwrap_err();
        assert_eq!(err, AdminError::Meta(MetaError::Unavailable("read-only".into())));

        // The engine was altered, the meta table still serves the old layout.
        assert_eq!(admin.get_table_layout("table").unwrap(), created);
        let physical = admin.physical().describe_physical_table("table").unwrap().unwrap();
        assert_eq!(
            physical.column_family("default").unwrap().max_versions,
            MaxVersions::Bounded(1)
        );
        assert_eq!(drift_types(&admin), vec![DriftType::PolicyMismatch]);
    }

    #[test]
    fn failed_meta_delete_leaves_missing_physical_table() {
        let admin =
            TableAdministrator::new(FaultyMetaTable::default(), InMemoryPhysicalStore::new());
        admin.create_table("table", &simple(), true).unwrap();
        admin.meta().deletes_fail.store(true, Ordering::SeqCst);

        let err = admin.delete_table("table").unwrap_err();
        assert_eq!(err, AdminError::Meta(MetaError::Unavailable("read-only".into())));

        assert!(admin.table_exists("table").unwrap());
        assert!(admin.physical().list_physical_tables().unwrap().is_empty());
        assert_eq!(drift_types(&admin), vec![DriftType::MissingPhysicalTable]);
    }

    /// Storage engine whose creates take a while.
    #[derive(Default)]
    struct SlowPhysicalStore {
        inner: InMemoryPhysicalStore,
    }

    impl PhysicalStore for SlowPhysicalStore {
        fn create_physical_table(
            &self,
            table: &str,
            layout: &ResolvedLayout,
        ) -> Result<(), StorageError> {
            thread::sleep(Duration::from_millis(20));
            self.inner.create_physical_table(table, layout)
        }

        fn alter_physical_families(
            &self,
            table: &str,
            diff: &LayoutDiff,
        ) -> Result<(), StorageError> {
            self.inner.alter_physical_families(table, diff)
        }

        fn delete_physical_table(&self, table: &str) -> Result<(), StorageError> {
            self.inner.delete_physical_table(table)
        }

        fn describe_physical_table(
            &self,
            table: &str,
        ) -> Result<Option<PhysicalTable>, StorageError> {
            self.inner.describe_physical_table(table)
        }

        fn list_physical_tables(&self) -> Result<Vec<String>, StorageError> {
            self.inner.list_physical_tables()
        }
    }

    fn race_creates(fail_if_exists: bool) -> Vec<Result<ResolvedLayout, AdminError>> {
        const CREATORS: usize = 4;
        let admin =
            TableAdministrator::new(InMemoryMetaTable::new(), SlowPhysicalStore::default());
        let barrier = Barrier::new(CREATORS);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..CREATORS)
                .map(|_| {
                    let admin = &admin;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        admin.create_table("table", &simple(), fail_if_exists)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(admin.layout_history("table").unwrap().len(), 1);
        assert!(admin.creating.lock().is_empty());
        results
    }

    #[test]
    fn concurrent_creates_are_idempotent() {
        let results = race_creates(false);
        assert!(results
            .iter()
            .all(|r| r.as_ref().map(|l| l.layout_id().as_str()) == Ok("1")));
    }

    #[test]
    fn concurrent_strict_creates_have_one_winner() {
        let results = race_creates(true);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == AdminError::AlreadyExists("table".into())));
    }

    /// Storage engine where another administrator wins every create: it
    /// creates and commits the table just before this caller's create.
    struct RivalCreator {
        meta: Arc<InMemoryMetaTable>,
        inner: InMemoryPhysicalStore,
    }

    impl PhysicalStore for RivalCreator {
        fn create_physical_table(
            &self,
            table: &str,
            layout: &ResolvedLayout,
        ) -> Result<(), StorageError> {
            self.inner.create_physical_table(table, layout)?;
            self.meta
                .append_layout(table, layout.clone())
                .map_err(|e| StorageError::Engine(e.to_string()))?;
            Err(StorageError::TableExists(table.to_string()))
        }

        fn alter_physical_families(
            &self,
            table: &str,
            diff: &LayoutDiff,
        ) -> Result<(), StorageError> {
            self.inner.alter_physical_families(table, diff)
        }

        fn delete_physical_table(&self, table: &str) -> Result<(), StorageError> {
            self.inner.delete_physical_table(table)
        }

        fn describe_physical_table(
            &self,
            table: &str,
        ) -> Result<Option<PhysicalTable>, StorageError> {
            self.inner.describe_physical_table(table)
        }

        fn list_physical_tables(&self) -> Result<Vec<String>, StorageError> {
            self.inner.list_physical_tables()
        }
    }

    fn rival_admin() -> TableAdministrator<Arc<InMemoryMetaTable>, RivalCreator> {
        let meta = Arc::new(InMemoryMetaTable::new());
        let rival = RivalCreator {
            meta: Arc::clone(&meta),
            inner: InMemoryPhysicalStore::new(),
        };
        TableAdministrator::new(meta, rival)
    }

    #[test]
    fn create_lost_in_the_engine_returns_the_winning_layout() {
        let admin = rival_admin();
        let layout = admin.create_table("table", &simple(), false).unwrap();

        assert_eq!(layout, admin.get_table_layout("table").unwrap());
        assert_eq!(admin.layout_history("table").unwrap().len(), 1);
    }

    #[test]
    fn strict_create_lost_in_the_engine_is_already_exists() {
        let admin = rival_admin();
        let err = admin.create_table("table", &simple(), true).unwrap_err();
        assert_eq!(err, AdminError::AlreadyExists("table".into()));
    }

    #[test]
    fn physical_table_without_layout_is_already_exists() {
        let admin = admin();
        let orphan = crate::resolve::resolve("table", &simple(), None).unwrap();
        admin.physical().create_physical_table("table", &orphan).unwrap();

        let err = admin.create_table("table", &simple(), false).unwrap_err();
        assert_eq!(err, AdminError::AlreadyExists("table".into()));
        assert!(!admin.table_exists("table").unwrap());
    }

    /// Storage engine that refuses every call.
    struct FailingPhysicalStore;

    impl PhysicalStore for FailingPhysicalStore {
        fn create_physical_table(&self, _: &str, _: &ResolvedLayout) -> Result<(), StorageError> {
            Err(StorageError::Engine("unreachable".into()))
        }

        fn alter_physical_families(&self, _: &str, _: &LayoutDiff) -> Result<(), StorageError> {
            Err(StorageError::Engine("unreachable".into()))
        }

        fn delete_physical_table(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Engine("unreachable".into()))
        }

        fn describe_physical_table(
            &self,
            _: &str,
        ) -> Result<Option<PhysicalTable>, StorageError> {
            Err(StorageError::Engine("unreachable".into()))
        }

        fn list_physical_tables(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Engine("unreachable".into()))
        }
    }

    #[test]
    fn storage_failure_is_surfaced_and_meta_untouched() {
        let admin = TableAdministrator::new(InMemoryMetaTable::new(), FailingPhysicalStore);

        let err = admin.create_table("table", &simple(), true).unwrap_err();
        assert_eq!(err, AdminError::Storage(StorageError::Engine("unreachable".into())));
        assert!(!admin.table_exists("table").unwrap());
    }
}
