use crate::service::Service;
use rollcall_core::FeatureVector;
use serde::Serialize;
use zbus::interface;

pub const BUS_NAME: &str = "org.rollcall.Attendance1";
pub const OBJECT_PATH: &str = "/org/rollcall/Attendance1";

/// D-Bus interface for the attendance daemon.
///
/// Structured results are returned as JSON strings. Business outcomes
/// (window not open, face not recognized) are part of the JSON; D-Bus errors
/// are reserved for invalid arguments and storage faults.
pub struct AttendanceService {
    service: Service,
}

impl AttendanceService {
    pub fn new(service: Service) -> Self {
        Self { service }
    }
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(format!("encode reply: {e}")))
}

fn descriptor(values: &[f64]) -> zbus::fdo::Result<FeatureVector> {
    FeatureVector::from_f64(values).map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))
}

/// D-Bus has no optional arguments; an empty byte array means "no image".
fn optional_image(image: Vec<u8>) -> Option<Vec<u8>> {
    (!image.is_empty()).then_some(image)
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Verify a live check-in and record present/late/absent.
    async fn verify(
        &self,
        person_id: i64,
        session_id: i64,
        descriptor_values: Vec<f64>,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, session_id, "verify requested");
        let query = descriptor(&descriptor_values)?;
        let outcome = self
            .service
            .verify(person_id, session_id, query, optional_image(image))
            .await?;
        tracing::info!(person_id, session_id, status = ?outcome.status(), "verify finished");
        to_json(&outcome)
    }

    /// Identify the closest enrolled person. Records nothing.
    async fn identify(&self, descriptor_values: Vec<f64>) -> zbus::fdo::Result<String> {
        tracing::info!("identify requested");
        let query = descriptor(&descriptor_values)?;
        to_json(&self.service.identify(query).await?)
    }

    /// Backfill absences for elapsed sessions of a subject.
    async fn reconcile(&self, person_id: i64, subject_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, subject_id, "reconcile requested");
        to_json(&self.service.reconcile(person_id, subject_id).await?)
    }

    /// Enroll a face vector for a person. Returns the new vector ID.
    async fn enroll(
        &self,
        person_id: i64,
        descriptor_values: Vec<f64>,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, "enroll requested");
        let vector = descriptor(&descriptor_values)?;
        let enrolled = self
            .service
            .enroll(person_id, vector, optional_image(image))
            .await?;
        Ok(enrolled.id)
    }

    /// List enrolled face vectors for a person.
    async fn list_vectors(&self, person_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, "list_vectors requested");
        to_json(&self.service.enrolled_vectors(person_id).await?)
    }

    /// Remove one enrolled face vector by ID.
    async fn remove_vector(&self, person_id: i64, vector_id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(person_id, vector_id, "remove_vector requested");
        Ok(self.service.remove_vector(person_id, vector_id).await?)
    }

    /// Remove every enrolled face vector of a person. Returns the count.
    async fn remove_all_vectors(&self, person_id: i64) -> zbus::fdo::Result<u32> {
        tracing::info!(person_id, "remove_all_vectors requested");
        let removed = self.service.remove_all_vectors(person_id).await?;
        Ok(u32::try_from(removed).unwrap_or(u32::MAX))
    }

    /// Attendance records of a person for a subject.
    async fn list_records(&self, person_id: i64, subject_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, subject_id, "list_records requested");
        to_json(&self.service.records(person_id, subject_id).await?)
    }

    /// Present/late/absent counts of a person for a subject.
    async fn summary(&self, person_id: i64, subject_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(person_id, subject_id, "summary requested");
        to_json(&self.service.summary(person_id, subject_id).await?)
    }

    /// Session check-in window and its current state.
    async fn get_session_window(&self, session_id: i64) -> zbus::fdo::Result<String> {
        tracing::info!(session_id, "get_session_window requested");
        to_json(&self.service.session_window(session_id).await?)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        to_json(&self.service.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_rejects_non_finite() {
        assert!(matches!(
            descriptor(&[0.1, f64::NAN]),
            Err(zbus::fdo::Error::InvalidArgs(_))
        ));
        assert!(matches!(descriptor(&[]), Err(zbus::fdo::Error::InvalidArgs(_))));
        assert_eq!(descriptor(&[0.5, -0.25]).unwrap().values(), &[0.5, -0.25]);
    }

    #[test]
    fn test_empty_image_means_none() {
        assert_eq!(optional_image(Vec::new()), None);
        assert_eq!(optional_image(vec![1, 2]), Some(vec![1, 2]));
    }
}
