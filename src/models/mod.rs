pub mod admin;
pub mod appointment;
pub mod doctor;
pub mod enums;
pub mod health_tip;
pub mod medication_tracking;
pub mod patient;
pub mod prescription;
pub mod profile;
pub mod test_result;
pub mod user;

pub use admin::{Admin, AdminPermissions};
pub use appointment::{Appointment, AppointmentHistoryEntry, MODIFY_LEAD_TIME_HOURS};
pub use doctor::{ConsultationFee, Doctor, ShiftSlot, UnavailableDate};
pub use health_tip::{HealthTip, TipReaction};
pub use medication_tracking::{AdherenceSummary, MedicationEntry};
pub use patient::Patient;
pub use prescription::{PrescribedMedication, Prescription};
pub use profile::Profile;
pub use test_result::{TestResult, TestValue};
pub use user::User;
