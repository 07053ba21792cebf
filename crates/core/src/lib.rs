//! # Ledger Core
//!
//! Treatment lifecycle scheduling and the attendance ledger.
//!
//! This crate contains the domain logic and its file-backed storage:
//! - MTPR review due dates computed from admission and discharge dates
//! - Daily attendance records with an irreversible lock
//! - Absence justifications attached to recorded absences
//! - Goal compliance reports and review readiness checks
//! - The lifecycle monitor that cancels patients after discharge
//!
//! **No API concerns**: HTTP servers, request parsing and status codes belong in `api-rest`
//! and `api-shared`.

pub mod collaborators;
pub mod compliance;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod goals;
pub mod lifecycle;
pub mod patient;
pub mod repositories;
pub mod review_schedule;

pub use collaborators::{
    BroadcastNotifier, CancellationEvent, CancellationNotifier, GoalSource, GroupDirectory,
    PatientDirectory, TracingNotifier,
};
pub use compliance::{ComplianceAggregator, ComplianceReport, GoalProgress, ReviewReadiness, Trend};
pub use config::CoreConfig;
pub use context::CallerContext;
pub use error::{LedgerError, LedgerResult};
pub use goals::{GoalAssessment, PatientGoal, ProgressLevel};
pub use lifecycle::{LifecycleMonitor, MonitorState, ScanFailure, ScanSummary};
pub use patient::Patient;
pub use repositories::absence::{AbsenceJustifier, AbsenceReason, JustifyAbsence, ReasonType};
pub use repositories::attendance::{
    AttendanceLedger, AttendanceRecord, AttendanceStats, AttendanceStatus, GroupAttendanceEntry,
    GroupDayAttendance, GroupDaySummary, LedgerState, LockAllSummary, LockFailure, MarkAttendance,
};
pub use repositories::goals::{GoalBook, GoalRepository};
pub use repositories::groups::{GroupMember, GroupRecord, GroupRepository};
pub use repositories::patients::PatientRepository;
pub use review_schedule::{compute_review_dates, schedule_for, ReviewDates, ReviewDue, ScheduledReviewDate};

pub use ledger_ids::{AttendanceId, GoalId, GroupId, PatientId, PeriodId, ReasonId};
pub use ledger_types::{NonEmptyText, Percentage, Units};

use repositories::attendance::open_ledger_store;
use repositories::shared::SnapshotStore;
use std::fs;
use std::sync::Arc;

/// Every ledger service wired against one data directory.
#[derive(Clone)]
pub struct LedgerServices {
    pub config: Arc<CoreConfig>,
    pub ledger: AttendanceLedger,
    pub justifier: AbsenceJustifier,
    pub patients: Arc<dyn PatientDirectory>,
    pub groups: Arc<dyn GroupDirectory>,
    pub compliance: ComplianceAggregator,
    pub monitor: Arc<LifecycleMonitor>,
    pub notifier: Arc<BroadcastNotifier>,
}

impl LedgerServices {
    /// Opens every snapshot under the configured data directory, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StorageDirCreation`] if the directory cannot be created, or a
    /// read error if an existing snapshot cannot be parsed.
    pub fn open(config: Arc<CoreConfig>) -> LedgerResult<Self> {
        fs::create_dir_all(config.data_dir()).map_err(LedgerError::StorageDirCreation)?;

        let ledger_store = open_ledger_store(config.attendance_file())?;
        let patients: Arc<dyn PatientDirectory> =
            Arc::new(PatientRepository::open(config.patients_file())?);
        let groups: Arc<dyn GroupDirectory> = Arc::new(GroupRepository::open(config.groups_file())?);
        let goals: Arc<dyn GoalSource> = Arc::new(GoalRepository::open(config.goals_file())?);
        let monitor_state = lifecycle::open_monitor_state(config.lifecycle_state_file())?;

        tracing::info!(data_dir = %config.data_dir().display(), "ledger storage opened");
        Ok(Self::assemble(config, ledger_store, patients, groups, goals, monitor_state))
    }

    /// Services over in-memory stores seeded with the given collaborator data.
    pub fn in_memory(
        config: Arc<CoreConfig>,
        patients: Vec<Patient>,
        groups: Vec<GroupRecord>,
        goals: GoalBook,
    ) -> Self {
        Self::assemble(
            config,
            Arc::new(SnapshotStore::in_memory(LedgerState::default())),
            Arc::new(PatientRepository::in_memory(patients)),
            Arc::new(GroupRepository::in_memory(groups)),
            Arc::new(GoalRepository::in_memory(goals)),
            SnapshotStore::in_memory(MonitorState::default()),
        )
    }

    fn assemble(
        config: Arc<CoreConfig>,
        ledger_store: Arc<SnapshotStore<LedgerState>>,
        patients: Arc<dyn PatientDirectory>,
        groups: Arc<dyn GroupDirectory>,
        goals: Arc<dyn GoalSource>,
        monitor_state: SnapshotStore<MonitorState>,
    ) -> Self {
        let ledger = AttendanceLedger::new(ledger_store.clone());
        let notifier = Arc::new(BroadcastNotifier::new(64));
        let monitor = Arc::new(LifecycleMonitor::new(
            patients.clone(),
            notifier.clone(),
            monitor_state,
            config.scan_interval(),
        ));

        Self {
            justifier: AbsenceJustifier::new(ledger_store),
            compliance: ComplianceAggregator::new(
                patients.clone(),
                goals,
                ledger.clone(),
                config.recency_window_days(),
            ),
            ledger,
            patients,
            groups,
            monitor,
            notifier,
            config,
        }
    }
}
