use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    AppointmentMode, AppointmentStatus, AppointmentType, CancelledBy, HistoryEvent, Priority,
};

/// Minimum hours before the slot during which cancel/reschedule is refused.
pub const MODIFY_LEAD_TIME_HOURS: i64 = 2;

/// A booked slot — the unit of scheduling truth. `patient_id`/`doctor_id`
/// are immutable; reschedule changes date/time only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// 24-hour "HH:MM".
    pub time: String,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub mode: AppointmentMode,
    pub status: AppointmentStatus,
    pub reason: String,
    pub symptoms: Vec<String>,
    pub priority: Priority,
    pub patient_notes: Option<String>,
    pub doctor_notes: Option<String>,
    /// Snapshot of the doctor's in-person fee at booking time; later fee
    /// changes do not touch existing appointments.
    pub consultation_fee: f64,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Combined date+time of the slot. `None` if the stored time string is
    /// malformed (should not happen past booking validation).
    pub fn slot_datetime(&self) -> Option<NaiveDateTime> {
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M").ok()?;
        Some(self.date.and_time(time))
    }

    /// Cancel and reschedule share eligibility exactly: non-terminal status
    /// and at least `MODIFY_LEAD_TIME_HOURS` before the slot.
    pub fn can_modify(&self, now: NaiveDateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.slot_datetime() {
            Some(slot) => slot - now >= chrono::Duration::hours(MODIFY_LEAD_TIME_HOURS),
            None => false,
        }
    }
}

/// One audit-trail row for an appointment (reschedules, completion,
/// cancellation, admin status changes).
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentHistoryEntry {
    pub id: i64,
    pub appointment_id: Uuid,
    pub event: HistoryEvent,
    pub old_date: Option<NaiveDate>,
    pub old_time: Option<String>,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::*;

    fn sample(date: NaiveDate, time: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date,
            time: time.to_string(),
            duration_minutes: 30,
            appointment_type: AppointmentType::Consultation,
            mode: AppointmentMode::InPerson,
            status,
            reason: "checkup".into(),
            symptoms: vec![],
            priority: Priority::Medium,
            patient_notes: None,
            doctor_notes: None,
            consultation_fee: 500.0,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn slot_datetime_combines_date_and_time() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let appt = sample(date, "10:00", AppointmentStatus::Scheduled);
        let dt = appt.slot_datetime().unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-03-10 10:00");
    }

    #[test]
    fn slot_datetime_rejects_malformed_time() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let appt = sample(date, "25:99", AppointmentStatus::Scheduled);
        assert!(appt.slot_datetime().is_none());
    }

    #[test]
    fn can_modify_requires_two_hour_lead() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let appt = sample(date, "10:00", AppointmentStatus::Scheduled);

        let one_hour_before = date.and_hms_opt(9, 0, 0).unwrap();
        assert!(!appt.can_modify(one_hour_before));

        let three_hours_before = date.and_hms_opt(7, 0, 0).unwrap();
        assert!(appt.can_modify(three_hours_before));

        // Exactly 2 hours counts as eligible (>= lead time).
        let exactly_two = date.and_hms_opt(8, 0, 0).unwrap();
        assert!(appt.can_modify(exactly_two));
    }

    #[test]
    fn can_modify_rejects_terminal_status() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let far_before = date.and_hms_opt(0, 0, 0).unwrap();
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            let appt = sample(date, "10:00", status);
            assert!(!appt.can_modify(far_before), "{status:?} must be frozen");
        }
    }

    #[test]
    fn confirmed_is_still_modifiable() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let appt = sample(date, "10:00", AppointmentStatus::Confirmed);
        assert!(appt.can_modify(date.and_hms_opt(7, 0, 0).unwrap()));
    }
}
