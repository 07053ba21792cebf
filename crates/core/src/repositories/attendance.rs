//! Attendance ledger.
//!
//! The ledger is the system of record for daily attendance. It stores exactly one record per
//! `(scheduling period, patient, calendar date)` and enforces a two-state lock machine:
//!
//! ```text
//! Unlocked ──lock──▶ Locked
//! ```
//!
//! Unlocked records may be overwritten (last write wins, no history). Locked records are
//! immutable: any attempt to mark over them fails with [`LedgerError::Locked`] and leaves the
//! stored record untouched. There is no transition back to `Unlocked`, and records are never
//! deleted.
//!
//! All reads and writes go through one [`SnapshotStore`], whose update lock makes "check the
//! lock state, then write" atomic for a given key.

use crate::collaborators::GroupDirectory;
use crate::context::CallerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::repositories::absence::AbsenceReason;
use crate::repositories::shared::{SnapshotFormat, SnapshotStore};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use ledger_ids::{AttendanceId, GroupId, PatientId, PeriodId};
use ledger_types::{NonEmptyText, Units};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Daily attendance outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "P", alias = "Present")]
    Present,
    #[serde(rename = "A", alias = "Absent")]
    Absent,
    #[serde(rename = "D", alias = "Discharge")]
    Discharge,
}

impl AttendanceStatus {
    /// Single-letter code used on the wire and in attendance sheets.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Absent => "A",
            AttendanceStatus::Discharge => "D",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AttendanceStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "present" => Ok(AttendanceStatus::Present),
            "a" | "absent" => Ok(AttendanceStatus::Absent),
            "d" | "discharge" => Ok(AttendanceStatus::Discharge),
            _ => Err(LedgerError::Validation(format!(
                "status must be one of P, A, D; got '{}'",
                s
            ))),
        }
    }
}

/// One patient's attendance on one calendar day of a scheduling period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub period_id: PeriodId,
    pub patient_id: PatientId,
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    pub units_attended: Units,
    pub is_locked: bool,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked_by: Option<NonEmptyText>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    fn has_key(&self, period: &PeriodId, patient: &PatientId, date: NaiveDate) -> bool {
        self.period_id == *period && self.patient_id == *patient && self.attendance_date == date
    }
}

/// Request to create or overwrite the record for a key.
#[derive(Clone, Debug)]
pub struct MarkAttendance {
    pub period_id: PeriodId,
    pub patient_id: PatientId,
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    pub units_attended: Units,
}

/// Persistent state shared by the ledger and the absence justifier.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
    #[serde(default)]
    pub reasons: Vec<AbsenceReason>,
}

pub type LedgerStore = SnapshotStore<LedgerState>;

/// Opens the attendance snapshot at `path`.
pub fn open_ledger_store(path: impl Into<PathBuf>) -> LedgerResult<Arc<LedgerStore>> {
    SnapshotStore::open(path, SnapshotFormat::Json).map(Arc::new)
}

/// Outcome of locking every record of a period.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockAllSummary {
    pub locked: Vec<AttendanceId>,
    pub already_locked: usize,
    pub failed: Vec<LockFailure>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFailure {
    pub attendance_id: AttendanceId,
    pub reason: String,
}

/// Attendance totals for a patient over a date range.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_days: usize,
    pub present: usize,
    pub absent: usize,
    pub discharge: usize,
    pub total_units: f64,
    /// Present days as a percentage of recorded days, two decimals.
    pub attendance_rate: f64,
}

impl AttendanceStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut stats = AttendanceStats::default();
        for record in records {
            stats.total_days += 1;
            match record.status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Discharge => stats.discharge += 1,
            }
            stats.total_units += record.units_attended.value();
        }
        stats.total_units = round_to_hundredths(stats.total_units);
        stats.attendance_rate = percentage_of(stats.present, stats.total_days);
        stats
    }
}

/// One roster line of the group/day view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAttendanceEntry {
    /// `None` when no record is stored yet for this patient and date.
    pub attendance_id: Option<AttendanceId>,
    pub patient_id: PatientId,
    pub status: AttendanceStatus,
    pub units_attended: Units,
    pub is_locked: bool,
    pub absence_reason: Option<AbsenceReason>,
    /// True for entries inferred as absent because nothing was recorded.
    pub synthesized: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDaySummary {
    pub total_patients: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub discharge_count: usize,
    pub attendance_rate: f64,
}

/// Attendance of every active group member on one date.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDayAttendance {
    pub group_id: GroupId,
    pub date: NaiveDate,
    pub day_of_week: &'static str,
    pub entries: Vec<GroupAttendanceEntry>,
    pub summary: GroupDaySummary,
}

/// The attendance ledger service.
#[derive(Clone, Debug)]
pub struct AttendanceLedger {
    store: Arc<LedgerStore>,
}

impl AttendanceLedger {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Creates the record for the key, or overwrites an unlocked one.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Locked`] if the stored record is locked; nothing is modified.
    /// - [`LedgerError::Conflict`] or storage errors from persisting the snapshot.
    pub fn mark_attendance(
        &self,
        ctx: &CallerContext,
        mark: MarkAttendance,
    ) -> LedgerResult<AttendanceRecord> {
        let outcome = self.store.update(|state| {
            let existing = state.records.iter().position(|r| {
                r.has_key(&mark.period_id, &mark.patient_id, mark.attendance_date)
            });

            match existing {
                Some(idx) => {
                    let record = &mut state.records[idx];
                    if record.is_locked {
                        return Err(LedgerError::Locked(record.id));
                    }
                    record.status = mark.status;
                    record.units_attended = mark.units_attended;
                    record.updated_at = ctx.at;
                    Ok((record.clone(), false))
                }
                None => {
                    let record = AttendanceRecord {
                        id: AttendanceId::new(),
                        period_id: mark.period_id,
                        patient_id: mark.patient_id,
                        attendance_date: mark.attendance_date,
                        status: mark.status,
                        units_attended: mark.units_attended,
                        is_locked: false,
                        locked_at: None,
                        locked_by: None,
                        created_at: ctx.at,
                        updated_at: ctx.at,
                    };
                    state.records.push(record.clone());
                    Ok((record, true))
                }
            }
        });

        match outcome {
            Ok((record, created)) => {
                tracing::info!(
                    attendance_id = %record.id,
                    patient_id = %record.patient_id,
                    date = %record.attendance_date,
                    status = %record.status,
                    created,
                    "attendance marked"
                );
                Ok(record)
            }
            Err(LedgerError::Locked(id)) => {
                tracing::warn!(attendance_id = %id, "refused to modify locked attendance record");
                Err(LedgerError::Locked(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Locks a record. Locking an already locked record succeeds without changes.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id, or storage errors.
    pub fn lock(&self, ctx: &CallerContext, id: &AttendanceId) -> LedgerResult<AttendanceRecord> {
        let current = self.get(id)?;
        if current.is_locked {
            return Ok(current);
        }

        let record = self.store.update(|state| {
            let record = state
                .records
                .iter_mut()
                .find(|r| r.id == *id)
                .ok_or_else(|| LedgerError::not_found("attendance record", id))?;
            if !record.is_locked {
                record.is_locked = true;
                record.locked_at = Some(ctx.at);
                record.locked_by = ctx.actor.clone();
                record.updated_at = ctx.at;
            }
            Ok(record.clone())
        })?;

        tracing::info!(
            attendance_id = %record.id,
            locked_by = record.locked_by.as_ref().map(|a| a.as_str()).unwrap_or("system"),
            "attendance locked"
        );
        Ok(record)
    }

    /// Locks every currently unlocked record of `period`.
    ///
    /// Each record is locked independently; a failure for one record is reported in the
    /// summary and does not stop the others. After a write conflict the ledger reloads the
    /// snapshot so the remaining records are locked against the other writer's state.
    pub fn lock_all(&self, ctx: &CallerContext, period: &PeriodId) -> LedgerResult<LockAllSummary> {
        let (pending, already_locked) = self.store.read(|state| {
            let in_period = state.records.iter().filter(|r| r.period_id == *period);
            let mut pending = Vec::new();
            let mut already_locked = 0;
            for record in in_period {
                if record.is_locked {
                    already_locked += 1;
                } else {
                    pending.push(record.id);
                }
            }
            (pending, already_locked)
        })?;

        let mut summary = LockAllSummary {
            already_locked,
            ..Default::default()
        };

        for id in pending {
            match self.lock(ctx, &id) {
                Ok(_) => summary.locked.push(id),
                Err(e) => {
                    tracing::warn!(attendance_id = %id, error = %e, "failed to lock attendance record");
                    let conflicted = matches!(e, LedgerError::Conflict(_));
                    summary.failed.push(LockFailure {
                        attendance_id: id,
                        reason: e.to_string(),
                    });
                    // Resync with the other writer before locking the next record.
                    if conflicted {
                        if let Err(e) = self.store.reload() {
                            tracing::warn!(error = %e, "failed to reload attendance ledger after conflict");
                        }
                    }
                }
            }
        }

        tracing::info!(
            period_id = %period,
            locked = summary.locked.len(),
            already_locked = summary.already_locked,
            failed = summary.failed.len(),
            "period attendance locked"
        );
        Ok(summary)
    }

    pub fn get(&self, id: &AttendanceId) -> LedgerResult<AttendanceRecord> {
        self.store
            .read(|state| state.records.iter().find(|r| r.id == *id).cloned())?
            .ok_or_else(|| LedgerError::not_found("attendance record", id))
    }

    /// All records of a period, ordered by date then patient.
    pub fn by_period(&self, period: &PeriodId) -> LedgerResult<Vec<AttendanceRecord>> {
        self.collect_sorted(|r| r.period_id == *period)
    }

    /// A patient's records within a period, ordered by date.
    pub fn by_period_and_patient(
        &self,
        period: &PeriodId,
        patient: &PatientId,
    ) -> LedgerResult<Vec<AttendanceRecord>> {
        self.collect_sorted(|r| r.period_id == *period && r.patient_id == *patient)
    }

    /// A patient's records between the optional inclusive bounds, ordered by date.
    pub fn by_patient(
        &self,
        patient: &PatientId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<Vec<AttendanceRecord>> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(LedgerError::Validation(format!(
                    "startDate {} is after endDate {}",
                    from, to
                )));
            }
        }
        self.collect_sorted(|r| {
            r.patient_id == *patient
                && from.map_or(true, |f| r.attendance_date >= f)
                && to.map_or(true, |t| r.attendance_date <= t)
        })
    }

    /// Attendance totals and rate for a patient between the optional inclusive bounds.
    pub fn patient_stats(
        &self,
        patient: &PatientId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> LedgerResult<AttendanceStats> {
        let records = self.by_patient(patient, from, to)?;
        Ok(AttendanceStats::from_records(&records))
    }

    /// Attendance of every active member of `group` on `date`.
    ///
    /// Membership is re-read from `groups` first. Members with no stored record for the date
    /// are reported as a synthesized absence (zero units, unlocked, no record id). Nothing is
    /// written for them.
    pub fn by_group_and_date(
        &self,
        groups: &dyn GroupDirectory,
        group: &GroupId,
        date: NaiveDate,
    ) -> LedgerResult<GroupDayAttendance> {
        if let Err(e) = groups.refresh() {
            tracing::warn!(group_id = %group, error = %e, "failed to refresh group membership; using cached copy");
        }
        let members = groups.active_members(group)?;

        let entries = self.store.read(|state| {
            members
                .iter()
                .map(|patient| {
                    let stored = state
                        .records
                        .iter()
                        .filter(|r| r.patient_id == *patient && r.attendance_date == date)
                        .max_by_key(|r| r.updated_at);

                    match stored {
                        Some(record) => GroupAttendanceEntry {
                            attendance_id: Some(record.id),
                            patient_id: *patient,
                            status: record.status,
                            units_attended: record.units_attended,
                            is_locked: record.is_locked,
                            absence_reason: state
                                .reasons
                                .iter()
                                .filter(|reason| reason.attendance_id == record.id)
                                .max_by_key(|reason| reason.start_date)
                                .cloned(),
                            synthesized: false,
                        },
                        None => GroupAttendanceEntry {
                            attendance_id: None,
                            patient_id: *patient,
                            status: AttendanceStatus::Absent,
                            units_attended: Units::zero(),
                            is_locked: false,
                            absence_reason: None,
                            synthesized: true,
                        },
                    }
                })
                .collect::<Vec<_>>()
        })?;

        let count = |status: AttendanceStatus| entries.iter().filter(|e| e.status == status).count();
        let present_count = count(AttendanceStatus::Present);
        let summary = GroupDaySummary {
            total_patients: entries.len(),
            present_count,
            absent_count: count(AttendanceStatus::Absent),
            discharge_count: count(AttendanceStatus::Discharge),
            attendance_rate: percentage_of(present_count, entries.len()),
        };

        Ok(GroupDayAttendance {
            group_id: *group,
            date,
            day_of_week: weekday_name(date.weekday()),
            entries,
            summary,
        })
    }

    fn collect_sorted(
        &self,
        keep: impl Fn(&AttendanceRecord) -> bool,
    ) -> LedgerResult<Vec<AttendanceRecord>> {
        let mut records = self
            .store
            .read(|state| state.records.iter().filter(|r| keep(r)).cloned().collect::<Vec<_>>())?;
        records.sort_by(|a, b| {
            a.attendance_date
                .cmp(&b.attendance_date)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });
        Ok(records)
    }
}

pub(crate) fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn percentage_of(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to_hundredths(part as f64 / whole as f64 * 100.0)
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::groups::{GroupMember, GroupRecord, GroupRepository};
    use chrono::TimeZone;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> CallerContext {
        CallerContext::new(
            Some(NonEmptyText::new("therapist-7").unwrap()),
            Utc.with_ymd_and_hms(2025, 9, 22, 16, 0, 0).unwrap(),
        )
    }

    fn ledger() -> AttendanceLedger {
        AttendanceLedger::new(Arc::new(SnapshotStore::in_memory(LedgerState::default())))
    }

    fn mark(
        period: PeriodId,
        patient: PatientId,
        on: NaiveDate,
        status: AttendanceStatus,
        units: f64,
    ) -> MarkAttendance {
        MarkAttendance {
            period_id: period,
            patient_id: patient,
            attendance_date: on,
            status,
            units_attended: Units::new(units).unwrap(),
        }
    }

    #[test]
    fn test_mark_creates_single_unlocked_record() {
        let ledger = ledger();
        let period = PeriodId::new();
        let patient = PatientId::new();

        let record = ledger
            .mark_attendance(
                &ctx(),
                mark(period, patient, date(2025, 9, 22), AttendanceStatus::Present, 4.0),
            )
            .unwrap();

        assert!(!record.is_locked);
        assert!(record.locked_at.is_none());
        assert_eq!(ledger.by_period(&period).unwrap(), vec![record]);
    }

    #[test]
    fn test_mark_same_key_updates_in_place() {
        let ledger = ledger();
        let period = PeriodId::new();
        let patient = PatientId::new();
        let day = date(2025, 9, 22);

        let first = ledger
            .mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Present, 4.0))
            .unwrap();
        let second = ledger
            .mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Absent, 0.0))
            .unwrap();

        assert_eq!(first.id, second.id);
        let stored = ledger.by_period(&period).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, AttendanceStatus::Absent);
        assert_eq!(stored[0].units_attended, Units::zero());
    }

    #[test]
    fn test_mark_after_lock_fails_and_leaves_record_unchanged() {
        let ledger = ledger();
        let period = PeriodId::new();
        let patient = PatientId::new();
        let day = date(2025, 9, 22);

        let record = ledger
            .mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Present, 4.0))
            .unwrap();
        let locked = ledger.lock(&ctx(), &record.id).unwrap();

        let result =
            ledger.mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Absent, 0.0));

        assert!(matches!(result, Err(LedgerError::Locked(id)) if id == record.id));
        assert_eq!(ledger.get(&record.id).unwrap(), locked);
    }

    #[test]
    fn test_lock_records_actor_and_time() {
        let ledger = ledger();
        let record = ledger
            .mark_attendance(
                &ctx(),
                mark(PeriodId::new(), PatientId::new(), date(2025, 9, 22), AttendanceStatus::Present, 3.0),
            )
            .unwrap();

        let locked = ledger.lock(&ctx(), &record.id).unwrap();

        assert!(locked.is_locked);
        assert_eq!(locked.locked_at, Some(ctx().at));
        assert_eq!(locked.locked_by.unwrap().as_str(), "therapist-7");
    }

    #[test]
    fn test_second_lock_is_noop_success() {
        let ledger = ledger();
        let record = ledger
            .mark_attendance(
                &ctx(),
                mark(PeriodId::new(), PatientId::new(), date(2025, 9, 22), AttendanceStatus::Present, 3.0),
            )
            .unwrap();

        let first = ledger.lock(&ctx(), &record.id).unwrap();
        let later = CallerContext::system(Utc.with_ymd_and_hms(2025, 9, 30, 9, 0, 0).unwrap());
        let second = ledger.lock(&later, &record.id).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_lock_unknown_record_is_not_found() {
        let result = ledger().lock(&ctx(), &AttendanceId::new());
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn test_lock_all_locks_only_the_period() {
        let ledger = ledger();
        let period = PeriodId::new();
        let other_period = PeriodId::new();
        let patient = PatientId::new();

        for day in 22..=24 {
            ledger
                .mark_attendance(
                    &ctx(),
                    mark(period, patient, date(2025, 9, day), AttendanceStatus::Present, 4.0),
                )
                .unwrap();
        }
        let first = ledger.by_period(&period).unwrap()[0].id;
        ledger.lock(&ctx(), &first).unwrap();
        let other = ledger
            .mark_attendance(
                &ctx(),
                mark(other_period, patient, date(2025, 9, 29), AttendanceStatus::Present, 4.0),
            )
            .unwrap();

        let summary = ledger.lock_all(&ctx(), &period).unwrap();

        assert_eq!(summary.locked.len(), 2);
        assert_eq!(summary.already_locked, 1);
        assert!(summary.failed.is_empty());
        assert!(ledger.by_period(&period).unwrap().iter().all(|r| r.is_locked));
        assert!(!ledger.get(&other.id).unwrap().is_locked);
    }

    #[test]
    fn test_lock_all_continues_after_a_failed_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("attendance.json");
        let ledger = AttendanceLedger::new(open_ledger_store(&path).unwrap());
        let period = PeriodId::new();
        let ids: Vec<AttendanceId> = (22..=24)
            .map(|day| {
                ledger
                    .mark_attendance(
                        &ctx(),
                        mark(period, PatientId::new(), date(2025, 9, day), AttendanceStatus::Present, 3.0),
                    )
                    .unwrap()
                    .id
            })
            .collect();

        // Another process writes to the same file, so the first lock hits a stale revision.
        let other = AttendanceLedger::new(open_ledger_store(&path).unwrap());
        let foreign = other
            .mark_attendance(
                &ctx(),
                mark(PeriodId::new(), PatientId::new(), date(2025, 9, 25), AttendanceStatus::Absent, 0.0),
            )
            .unwrap();

        let summary = ledger.lock_all(&ctx(), &period).unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].attendance_id, ids[0]);
        assert!(summary.failed[0].reason.contains("another writer"));
        assert_eq!(summary.locked, ids[1..].to_vec());

        let reopened = AttendanceLedger::new(open_ledger_store(&path).unwrap());
        assert!(!reopened.get(&ids[0]).unwrap().is_locked);
        assert!(reopened.get(&ids[1]).unwrap().is_locked);
        assert!(reopened.get(&ids[2]).unwrap().is_locked);
        assert_eq!(reopened.get(&foreign.id).unwrap(), foreign);

        let retry = ledger.lock_all(&ctx(), &period).unwrap();
        assert_eq!(retry.locked, vec![ids[0]]);
        assert_eq!(retry.already_locked, 2);
        assert!(retry.failed.is_empty());
    }

    #[test]
    fn test_concurrent_mark_and_lock_never_change_a_locked_record() {
        for _ in 0..50 {
            let store = Arc::new(SnapshotStore::in_memory(LedgerState::default()));
            let clerk = AttendanceLedger::new(store.clone());
            let supervisor = AttendanceLedger::new(store);
            let period = PeriodId::new();
            let patient = PatientId::new();
            let day = date(2025, 9, 22);
            let original = clerk
                .mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Present, 4.0))
                .unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let locker = {
                let barrier = barrier.clone();
                let id = original.id;
                thread::spawn(move || {
                    barrier.wait();
                    supervisor.lock(&ctx(), &id)
                })
            };
            let marker = {
                let clerk = clerk.clone();
                thread::spawn(move || {
                    barrier.wait();
                    clerk.mark_attendance(&ctx(), mark(period, patient, day, AttendanceStatus::Absent, 0.0))
                })
            };
            let locked = locker.join().unwrap().unwrap();
            let marked = marker.join().unwrap();

            let stored = clerk.get(&original.id).unwrap();
            assert!(locked.is_locked);
            assert_eq!(stored, locked);
            match marked {
                Ok(updated) => {
                    assert_eq!(updated.id, original.id);
                    assert_eq!(stored.status, AttendanceStatus::Absent);
                    assert_eq!(stored.units_attended, Units::zero());
                }
                Err(LedgerError::Locked(id)) => {
                    assert_eq!(id, original.id);
                    assert_eq!(stored.status, AttendanceStatus::Present);
                    assert_eq!(stored.units_attended, original.units_attended);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
            assert_eq!(clerk.by_period(&period).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_group_date_reads_membership_written_after_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("groups.json");
        let group_id = GroupId::new();
        let first = PatientId::new();
        let joined = PatientId::new();
        let write = |revision: u64, members: &[PatientId]| {
            let record = GroupRecord {
                id: group_id,
                name: "Evening IOP".into(),
                is_active: true,
                members: members
                    .iter()
                    .map(|p| GroupMember { patient_id: *p, is_active: true })
                    .collect(),
            };
            let body = serde_json::json!({ "revision": revision, "data": [record] });
            std::fs::write(&path, body.to_string()).unwrap();
        };

        write(1, &[first]);
        let groups = GroupRepository::open(&path).unwrap();
        let ledger = ledger();
        let day = date(2025, 9, 22);
        assert_eq!(ledger.by_group_and_date(&groups, &group_id, day).unwrap().entries.len(), 1);

        write(2, &[first, joined]);
        let view = ledger.by_group_and_date(&groups, &group_id, day).unwrap();

        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1].patient_id, joined);
        assert!(view.entries[1].synthesized);
    }

    #[test]
    fn test_group_date_synthesizes_missing_members_as_absent() {
        let ledger = ledger();
        let period = PeriodId::new();
        let group_id = GroupId::new();
        let patients = [PatientId::new(), PatientId::new(), PatientId::new()];
        let day = date(2025, 9, 22);

        let groups = GroupRepository::in_memory(vec![GroupRecord {
            id: group_id,
            name: "Morning PHP".into(),
            is_active: true,
            members: patients
                .iter()
                .map(|p| GroupMember {
                    patient_id: *p,
                    is_active: true,
                })
                .collect(),
        }]);

        ledger
            .mark_attendance(&ctx(), mark(period, patients[0], day, AttendanceStatus::Present, 4.0))
            .unwrap();
        ledger
            .mark_attendance(&ctx(), mark(period, patients[1], day, AttendanceStatus::Discharge, 2.0))
            .unwrap();

        let view = ledger.by_group_and_date(&groups, &group_id, day).unwrap();

        assert_eq!(view.entries.len(), 3);
        assert_eq!(view.day_of_week, "Monday");
        let third = &view.entries[2];
        assert_eq!(third.patient_id, patients[2]);
        assert_eq!(third.status, AttendanceStatus::Absent);
        assert_eq!(third.units_attended, Units::zero());
        assert!(!third.is_locked);
        assert!(third.attendance_id.is_none());
        assert!(third.synthesized);
        assert_eq!(view.summary.present_count, 1);
        assert_eq!(view.summary.absent_count, 1);
        assert_eq!(view.summary.discharge_count, 1);
        assert_eq!(view.summary.attendance_rate, 33.33);
        // Nothing was written for the synthesized entry.
        assert_eq!(ledger.by_period(&period).unwrap().len(), 2);
    }

    #[test]
    fn test_patient_stats_within_range() {
        let ledger = ledger();
        let period = PeriodId::new();
        let patient = PatientId::new();
        let statuses = [
            (22, AttendanceStatus::Present, 4.0),
            (23, AttendanceStatus::Present, 3.5),
            (24, AttendanceStatus::Absent, 0.0),
            (25, AttendanceStatus::Present, 4.0),
        ];
        for (day, status, units) in statuses {
            ledger
                .mark_attendance(&ctx(), mark(period, patient, date(2025, 9, day), status, units))
                .unwrap();
        }

        let stats = ledger
            .patient_stats(&patient, Some(date(2025, 9, 22)), Some(date(2025, 9, 24)))
            .unwrap();

        assert_eq!(stats.total_days, 3);
        assert_eq!(stats.present, 2);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.total_units, 7.5);
        assert_eq!(stats.attendance_rate, 66.67);
    }

    #[test]
    fn test_stats_rejects_inverted_range() {
        let result = ledger().patient_stats(
            &PatientId::new(),
            Some(date(2025, 9, 30)),
            Some(date(2025, 9, 1)),
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("attendance.json");
        let period = PeriodId::new();
        let patient = PatientId::new();

        let record = {
            let ledger = AttendanceLedger::new(open_ledger_store(&path).unwrap());
            let record = ledger
                .mark_attendance(
                    &ctx(),
                    mark(period, patient, date(2025, 9, 22), AttendanceStatus::Present, 4.0),
                )
                .unwrap();
            ledger.lock(&ctx(), &record.id).unwrap()
        };

        let reopened = AttendanceLedger::new(open_ledger_store(&path).unwrap());
        assert_eq!(reopened.get(&record.id).unwrap(), record);
        let result = reopened.mark_attendance(
            &ctx(),
            mark(period, patient, date(2025, 9, 22), AttendanceStatus::Absent, 0.0),
        );
        assert!(matches!(result, Err(LedgerError::Locked(_))));
    }

    #[test]
    fn test_status_parsing_accepts_codes_and_names() {
        assert_eq!("P".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Present);
        assert_eq!("absent".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Absent);
        assert!("X".parse::<AttendanceStatus>().is_err());
    }
}
