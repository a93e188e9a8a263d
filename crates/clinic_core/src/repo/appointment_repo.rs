//! Appointment repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist appointments and answer the doctor-scoped overlap query.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `find_overlapping` applies the half-open interval test and ignores
//!   cancelled rows; touching boundaries never match.
//! - Appointments are never deleted; status updates are the only mutation.

use crate::model::appointment::{
    Appointment, AppointmentId, AppointmentStatus, DoctorId, TimeSlot, UserId,
};
use crate::repo::{
    from_epoch_ms, immediate_tx, parse_uuid, to_epoch_ms, RepoError, RepoResult, TxScope,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

const APPOINTMENT_SELECT_SQL: &str = "SELECT
    uuid,
    patient_uuid,
    doctor_uuid,
    start_at,
    duration_minutes,
    status,
    reason,
    created_by,
    created_at,
    updated_by,
    updated_at
FROM appointments";

/// Repository interface for appointment persistence.
pub trait AppointmentRepository {
    fn insert(&self, appointment: &Appointment) -> RepoResult<AppointmentId>;
    fn get(&self, id: AppointmentId) -> RepoResult<Option<Appointment>>;
    /// Returns the doctor's non-cancelled appointments whose slots
    /// intersect `slot`, optionally ignoring one appointment (reschedule).
    fn find_overlapping(
        &self,
        doctor_uuid: DoctorId,
        slot: &TimeSlot,
        exclude: Option<AppointmentId>,
    ) -> RepoResult<Vec<Appointment>>;
    fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
        updated_by: UserId,
        updated_at: NaiveDateTime,
    ) -> RepoResult<()>;
    fn list_for_doctor(&self, doctor_uuid: DoctorId) -> RepoResult<Vec<Appointment>>;
}

/// SQLite-backed appointment repository.
pub struct SqliteAppointmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAppointmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AppointmentRepository for SqliteAppointmentRepository<'_> {
    fn insert(&self, appointment: &Appointment) -> RepoResult<AppointmentId> {
        self.conn.execute(
            "INSERT INTO appointments (
                uuid,
                patient_uuid,
                doctor_uuid,
                start_at,
                duration_minutes,
                status,
                reason,
                created_by,
                created_at,
                updated_by,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                appointment.uuid.to_string(),
                appointment.patient_uuid.to_string(),
                appointment.doctor_uuid.to_string(),
                to_epoch_ms(appointment.slot.start),
                appointment.slot.duration_minutes,
                status_to_db(appointment.status),
                appointment.reason.as_str(),
                appointment.created_by.to_string(),
                to_epoch_ms(appointment.created_at),
                appointment.updated_by.map(|id| id.to_string()),
                appointment.updated_at.map(to_epoch_ms),
            ],
        )?;

        Ok(appointment.uuid)
    }

    fn get(&self, id: AppointmentId) -> RepoResult<Option<Appointment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{APPOINTMENT_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_appointment_row(row)?));
        }

        Ok(None)
    }

    fn find_overlapping(
        &self,
        doctor_uuid: DoctorId,
        slot: &TimeSlot,
        exclude: Option<AppointmentId>,
    ) -> RepoResult<Vec<Appointment>> {
        // Half-open overlap on epoch millis:
        // existing.start < candidate.end AND candidate.start < existing.end.
        let mut stmt = self.conn.prepare(&format!(
            "{APPOINTMENT_SELECT_SQL}
             WHERE doctor_uuid = ?1
               AND status != 'canceled'
               AND (?2 IS NULL OR uuid != ?2)
               AND start_at < ?3
               AND ?4 < start_at + duration_minutes * 60000
             ORDER BY start_at ASC;"
        ))?;

        let mut rows = stmt.query(params![
            doctor_uuid.to_string(),
            exclude.map(|id| id.to_string()),
            to_epoch_ms(slot.end()),
            to_epoch_ms(slot.start),
        ])?;

        let mut appointments = Vec::new();
        while let Some(row) = rows.next()? {
            appointments.push(parse_appointment_row(row)?);
        }

        Ok(appointments)
    }

    fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
        updated_by: UserId,
        updated_at: NaiveDateTime,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE appointments
             SET status = ?2, updated_by = ?3, updated_at = ?4
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                status_to_db(status),
                updated_by.to_string(),
                to_epoch_ms(updated_at),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "appointment",
                id,
            });
        }

        Ok(())
    }

    fn list_for_doctor(&self, doctor_uuid: DoctorId) -> RepoResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APPOINTMENT_SELECT_SQL}
             WHERE doctor_uuid = ?1
             ORDER BY start_at ASC;"
        ))?;

        let mut rows = stmt.query([doctor_uuid.to_string()])?;
        let mut appointments = Vec::new();
        while let Some(row) = rows.next()? {
            appointments.push(parse_appointment_row(row)?);
        }

        Ok(appointments)
    }
}

impl TxScope for SqliteAppointmentRepository<'_> {
    fn with_tx<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        immediate_tx(self.conn, f)
    }
}

fn parse_appointment_row(row: &Row<'_>) -> RepoResult<Appointment> {
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid appointment status `{status_text}` in appointments.status"
        ))
    })?;

    let updated_by = match row.get::<_, Option<String>>("updated_by")? {
        Some(value) => Some(parse_uuid("appointments.updated_by", &value)?),
        None => None,
    };
    let updated_at = match row.get::<_, Option<i64>>("updated_at")? {
        Some(value) => Some(from_epoch_ms("appointments.updated_at", value)?),
        None => None,
    };

    Ok(Appointment {
        uuid: parse_uuid("appointments.uuid", &row.get::<_, String>("uuid")?)?,
        patient_uuid: parse_uuid("appointments.patient_uuid", &row.get::<_, String>("patient_uuid")?)?,
        doctor_uuid: parse_uuid("appointments.doctor_uuid", &row.get::<_, String>("doctor_uuid")?)?,
        slot: TimeSlot::new(
            from_epoch_ms("appointments.start_at", row.get("start_at")?)?,
            row.get("duration_minutes")?,
        ),
        status,
        reason: row.get("reason")?,
        created_by: parse_uuid("appointments.created_by", &row.get::<_, String>("created_by")?)?,
        created_at: from_epoch_ms("appointments.created_at", row.get("created_at")?)?,
        updated_by,
        updated_at,
    })
}

fn status_to_db(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Pending => "pending",
        AppointmentStatus::Confirmed => "confirmed",
        AppointmentStatus::Completed => "completed",
        AppointmentStatus::Canceled => "canceled",
    }
}

fn parse_status(value: &str) -> Option<AppointmentStatus> {
    match value {
        "pending" => Some(AppointmentStatus::Pending),
        "confirmed" => Some(AppointmentStatus::Confirmed),
        "completed" => Some(AppointmentStatus::Completed),
        "canceled" => Some(AppointmentStatus::Canceled),
        _ => None,
    }
}
