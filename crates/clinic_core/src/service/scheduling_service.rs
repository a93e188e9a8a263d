//! Appointment booking and lifecycle service.
//!
//! # Responsibility
//! - Book appointments without double-booking a doctor's time.
//! - Drive appointment status through the enforced transition graph.
//!
//! # Invariants
//! - Conflict check and insert commit atomically per booking.
//! - For any doctor, no two non-cancelled appointments overlap.

use crate::model::appointment::{
    Appointment, AppointmentId, AppointmentStatus, DoctorId, PatientId, TimeSlot, UserId,
};
use crate::repo::appointment_repo::AppointmentRepository;
use crate::repo::{RepoError, TxScope};
use chrono::{Local, NaiveDateTime, Timelike};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Clinic working hours: bookings may start at 08:00, the last valid
/// start hour is 19:xx.
const OPENING_HOUR: u32 = 8;
const CLOSING_HOUR: u32 = 20;
const REASON_MAX_CHARS: usize = 500;

/// Business outcomes of scheduling operations.
#[derive(Debug)]
pub enum SchedulingError {
    PastDateNotAllowed,
    OutsideWorkingHours,
    ReasonRequired,
    ReasonTooLong,
    /// The candidate slot overlaps a live appointment of the doctor.
    DoctorBusy,
    AppointmentNotFound(AppointmentId),
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    Repo(RepoError),
}

impl Display for SchedulingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PastDateNotAllowed => write!(f, "appointment start must be in the future"),
            Self::OutsideWorkingHours => write!(
                f,
                "appointment start must fall within working hours ({OPENING_HOUR:02}:00-{CLOSING_HOUR:02}:00)"
            ),
            Self::ReasonRequired => write!(f, "reason for visit is required"),
            Self::ReasonTooLong => {
                write!(f, "reason for visit exceeds {REASON_MAX_CHARS} characters")
            }
            Self::DoctorBusy => write!(f, "doctor already has an appointment in this time slot"),
            Self::AppointmentNotFound(id) => write!(f, "appointment not found: {id}"),
            Self::InvalidStatusTransition { from, to } => {
                write!(f, "illegal appointment status transition {from:?} -> {to:?}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchedulingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SchedulingError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Request model for booking a new appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookAppointmentRequest {
    pub patient_uuid: PatientId,
    pub doctor_uuid: DoctorId,
    pub slot: TimeSlot,
    pub reason: String,
    pub created_by: UserId,
}

/// Use-case service for appointment booking and status changes.
pub struct SchedulingService<R: AppointmentRepository + TxScope> {
    repo: R,
}

impl<R: AppointmentRepository + TxScope> SchedulingService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Books a new `Pending` appointment against the wall clock.
    pub fn book(&self, request: &BookAppointmentRequest) -> Result<Appointment, SchedulingError> {
        self.book_at(request, Local::now().naive_local())
    }

    /// Books a new `Pending` appointment with an explicit "now".
    ///
    /// Clock injection point: callers and tests that need a deterministic
    /// notion of the present use this directly.
    ///
    /// # Contract
    /// - Start must be strictly in the future and within working hours.
    /// - The conflict check and the insert commit as one unit: two
    ///   concurrent bookings of overlapping slots cannot both succeed.
    pub fn book_at(
        &self,
        request: &BookAppointmentRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, SchedulingError> {
        validate_booking(request, now)?;

        self.repo.with_tx(|| {
            let conflicts =
                self.repo
                    .find_overlapping(request.doctor_uuid, &request.slot, None)?;
            if !conflicts.is_empty() {
                warn!(
                    "event=appointment_booking module=scheduling status=rejected reason=doctor_busy doctor={} start={}",
                    request.doctor_uuid, request.slot.start
                );
                return Err(SchedulingError::DoctorBusy);
            }

            let appointment = Appointment::new(
                request.patient_uuid,
                request.doctor_uuid,
                request.slot,
                request.reason.clone(),
                request.created_by,
                now,
            );
            self.repo.insert(&appointment)?;
            info!(
                "event=appointment_booked module=scheduling status=ok appointment={} doctor={} start={}",
                appointment.uuid, appointment.doctor_uuid, appointment.slot.start
            );
            Ok(appointment)
        })
    }

    /// Conflict probe: does `slot` overlap any live appointment of the
    /// doctor? `exclude` lets a reschedule ignore the appointment being
    /// moved. Policy stays with the caller.
    pub fn has_conflict(
        &self,
        doctor_uuid: DoctorId,
        slot: &TimeSlot,
        exclude: Option<AppointmentId>,
    ) -> Result<bool, SchedulingError> {
        let conflicts = self.repo.find_overlapping(doctor_uuid, slot, exclude)?;
        Ok(!conflicts.is_empty())
    }

    /// Moves an appointment along the enforced transition graph.
    pub fn set_status(
        &self,
        id: AppointmentId,
        new_status: AppointmentStatus,
        updated_by: UserId,
    ) -> Result<(), SchedulingError> {
        self.repo.with_tx(|| {
            let appointment = self
                .repo
                .get(id)?
                .ok_or(SchedulingError::AppointmentNotFound(id))?;

            if !appointment.status.can_transition_to(new_status) {
                return Err(SchedulingError::InvalidStatusTransition {
                    from: appointment.status,
                    to: new_status,
                });
            }

            self.repo
                .update_status(id, new_status, updated_by, Local::now().naive_local())?;
            info!(
                "event=appointment_status module=scheduling status=ok appointment={id} from={:?} to={new_status:?}",
                appointment.status
            );
            Ok(())
        })
    }

    /// Cancels an appointment, freeing the doctor's slot.
    pub fn cancel(&self, id: AppointmentId, updated_by: UserId) -> Result<(), SchedulingError> {
        self.set_status(id, AppointmentStatus::Canceled, updated_by)
    }

    /// Gets one appointment; absence is a normal outcome.
    pub fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.repo.get(id)?)
    }

    /// Lists a doctor's appointments; an empty list is a normal outcome.
    pub fn list_for_doctor(&self, doctor_uuid: DoctorId) -> Result<Vec<Appointment>, SchedulingError> {
        Ok(self.repo.list_for_doctor(doctor_uuid)?)
    }
}

fn validate_booking(
    request: &BookAppointmentRequest,
    now: NaiveDateTime,
) -> Result<(), SchedulingError> {
    if request.reason.trim().is_empty() {
        return Err(SchedulingError::ReasonRequired);
    }
    if request.reason.chars().count() > REASON_MAX_CHARS {
        return Err(SchedulingError::ReasonTooLong);
    }
    if request.slot.start <= now {
        return Err(SchedulingError::PastDateNotAllowed);
    }
    let start_hour = request.slot.start.hour();
    if start_hour < OPENING_HOUR || start_hour >= CLOSING_HOUR {
        return Err(SchedulingError::OutsideWorkingHours);
    }
    Ok(())
}
