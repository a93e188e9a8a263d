//! Appointment domain model.
//!
//! # Responsibility
//! - Define the appointment record and its half-open booking slot.
//! - Own the slot overlap predicate and the status transition graph.
//!
//! # Invariants
//! - A slot covers `[start, start + duration)`; equal boundary touching is
//!   not an overlap.
//! - Appointments are never physically deleted; `Canceled` is the terminal
//!   tombstone.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an appointment.
pub type AppointmentId = Uuid;
/// Shared person id of the patient role record.
pub type PatientId = Uuid;
/// Shared person id of the doctor role record.
pub type DoctorId = Uuid;
/// Shared person id of the staff user acting on a record.
pub type UserId = Uuid;

/// Half-open booking window `[start, end)` in clinic-local time.
///
/// Kept as a pure value type so the overlap predicate can be tested and
/// reused without touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Clinic-local start instant.
    pub start: NaiveDateTime,
    /// Slot length in whole minutes. Upstream validation guarantees > 0.
    pub duration_minutes: u32,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, duration_minutes: u32) -> Self {
        Self {
            start,
            duration_minutes,
        }
    }

    /// Exclusive end instant of the slot.
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Half-open interval intersection test.
    ///
    /// A slot ending at 10:00 does not overlap a slot starting at 10:00.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Appointment lifecycle state.
///
/// Legal transitions: `Pending -> {Confirmed, Canceled}`,
/// `Confirmed -> {Completed, Canceled}`. `Completed` and `Canceled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked, awaiting confirmation.
    Pending,
    /// Confirmed by staff or the patient.
    Confirmed,
    /// Visit took place.
    Completed,
    /// Terminal tombstone; cancelled slots do not block the doctor's time.
    Canceled,
}

impl AppointmentStatus {
    /// Returns whether the transition graph permits `self -> target`.
    ///
    /// Terminal states reject everything, including self-transitions.
    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        use AppointmentStatus::{Canceled, Completed, Confirmed, Pending};
        matches!(
            (self, target),
            (Pending, Confirmed | Canceled) | (Confirmed, Completed | Canceled)
        )
    }

    /// Returns whether this appointment still occupies the doctor's time.
    pub fn blocks_slot(self) -> bool {
        self != AppointmentStatus::Canceled
    }
}

/// Canonical appointment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Stable global id.
    pub uuid: AppointmentId,
    pub patient_uuid: PatientId,
    pub doctor_uuid: DoctorId,
    /// Booked time window.
    pub slot: TimeSlot,
    pub status: AppointmentStatus,
    /// Reason for the visit, required, bounded by the booking validator.
    pub reason: String,
    pub created_by: UserId,
    pub created_at: NaiveDateTime,
    /// Staff user of the most recent status change.
    pub updated_by: Option<UserId>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Appointment {
    /// Creates a new `Pending` appointment with a generated stable id.
    pub fn new(
        patient_uuid: PatientId,
        doctor_uuid: DoctorId,
        slot: TimeSlot,
        reason: impl Into<String>,
        created_by: UserId,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            patient_uuid,
            doctor_uuid,
            slot,
            status: AppointmentStatus::Pending,
            reason: reason.into(),
            created_by,
            created_at,
            updated_by: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppointmentStatus, TimeSlot};
    use chrono::NaiveDate;

    fn slot(hour: u32, minute: u32, duration: u32) -> TimeSlot {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        TimeSlot::new(start, duration)
    }

    #[test]
    fn overlap_detects_partial_intersection() {
        assert!(slot(10, 0, 30).overlaps(&slot(10, 15, 30)));
        assert!(slot(10, 15, 30).overlaps(&slot(10, 0, 30)));
    }

    #[test]
    fn overlap_detects_containment() {
        assert!(slot(10, 0, 60).overlaps(&slot(10, 15, 15)));
        assert!(slot(10, 15, 15).overlaps(&slot(10, 0, 60)));
    }

    #[test]
    fn touching_boundaries_do_not_overlap() {
        assert!(!slot(10, 0, 30).overlaps(&slot(10, 30, 30)));
        assert!(!slot(10, 30, 30).overlaps(&slot(10, 0, 30)));
    }

    #[test]
    fn disjoint_slots_do_not_overlap() {
        assert!(!slot(8, 0, 30).overlaps(&slot(11, 0, 30)));
    }

    #[test]
    fn transition_graph_allows_forward_moves() {
        use AppointmentStatus::{Canceled, Completed, Confirmed, Pending};
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Canceled));
    }

    #[test]
    fn transition_graph_rejects_illegal_moves() {
        use AppointmentStatus::{Canceled, Completed, Confirmed, Pending};
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Confirmed));
        assert!(!Canceled.can_transition_to(Confirmed));
        assert!(!Canceled.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn canceled_does_not_block_slot() {
        assert!(AppointmentStatus::Pending.blocks_slot());
        assert!(AppointmentStatus::Confirmed.blocks_slot());
        assert!(AppointmentStatus::Completed.blocks_slot());
        assert!(!AppointmentStatus::Canceled.blocks_slot());
    }
}
