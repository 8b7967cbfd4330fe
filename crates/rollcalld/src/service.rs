//! Request handling shared by the D-Bus interface.
//!
//! Every request is independent: the service holds no per-request state,
//! only handles to the store, image directory and clock. Store calls are
//! bounded by the configured timeout and surface as retryable errors. Reads
//! are abandoned at the timeout; writes carry it as a deadline into the
//! store, which refuses to start them late, so a write reported as timed out
//! has committed nothing.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::ServiceError;
use crate::images::{ImageStore, StoredImage};
use crate::store::{RecordView, Store, StoreError, Summary};
use chrono::NaiveTime;
use rollcall_core::{
    classify, EnrolledVector, EuclideanMatcher, FeatureVector, MatchResult, Matcher, Person,
    PersonId, Session, SessionId, SubjectId, WindowState,
};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Session metadata plus where "now" falls in its window.
#[derive(Debug, Clone, Serialize)]
pub struct SessionWindow {
    pub session: Session,
    pub closes_at: NaiveTime,
    pub state: WindowState,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub version: &'static str,
    pub db_path: PathBuf,
    pub image_dir: PathBuf,
    pub match_threshold: f32,
    pub descriptor_dim: usize,
}

#[derive(Clone)]
pub struct Service {
    pub(crate) store: Store,
    pub(crate) images: ImageStore,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) threshold: f32,
    pub(crate) descriptor_dim: usize,
    persist_timeout: Duration,
    db_path: PathBuf,
}

impl Service {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            store,
            images: ImageStore::new(&config.image_dir),
            clock,
            threshold: config.match_threshold,
            descriptor_dim: config.descriptor_dim,
            persist_timeout: config.persist_timeout(),
            db_path: config.db_path.clone(),
        }
    }

    /// Run a store operation under the persistence timeout.
    pub(crate) async fn persist<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.persist_timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "store operation failed");
                Err(ServiceError::Persistence(err))
            }
            Err(_) => {
                tracing::error!(timeout = ?self.persist_timeout, "store operation timed out");
                Err(ServiceError::Timeout(self.persist_timeout))
            }
        }
    }

    /// Run a store write under the persistence deadline.
    ///
    /// The write is awaited to completion: the store either refuses it at
    /// the deadline or runs it, and the caller learns which.
    pub(crate) async fn persist_write<T, F, Fut>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(Instant) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match op(Instant::now() + self.persist_timeout).await {
            Ok(value) => Ok(value),
            Err(StoreError::Expired) => {
                tracing::error!(timeout = ?self.persist_timeout, "store write missed its deadline");
                Err(ServiceError::Timeout(self.persist_timeout))
            }
            Err(err) => {
                tracing::error!(error = %err, "store write failed");
                Err(ServiceError::Persistence(err))
            }
        }
    }

    /// Store an optional captured image. Empty input means "no image".
    pub(crate) async fn save_image(
        &self,
        image: Option<Vec<u8>>,
    ) -> Result<Option<StoredImage>, ServiceError> {
        match image {
            Some(bytes) if !bytes.is_empty() => {
                let images = self.images.clone();
                let stored = self
                    .persist(async move { images.save(&bytes).await.map_err(StoreError::Io) })
                    .await?;
                Ok(Some(stored))
            }
            _ => Ok(None),
        }
    }

    /// Remove an image this request wrote unless `kept` refers to it.
    pub(crate) async fn discard_image(&self, image: Option<&StoredImage>, kept: Option<&str>) {
        let Some(image) = image.filter(|i| i.created && kept != Some(i.name.as_str())) else {
            return;
        };
        match self.images.remove(&image.name).await {
            Ok(()) => tracing::debug!(file = %image.name, "removed unreferenced image"),
            Err(err) => tracing::warn!(file = %image.name, error = %err, "failed to remove image"),
        }
    }

    pub(crate) async fn require_person(&self, id: PersonId) -> Result<Person, ServiceError> {
        self.persist(self.store.get_person(id))
            .await?
            .ok_or(ServiceError::UnknownPerson(id))
    }

    pub(crate) async fn require_session(&self, id: SessionId) -> Result<Session, ServiceError> {
        self.persist(self.store.get_session(id))
            .await?
            .ok_or(ServiceError::UnknownSession(id))
    }

    pub(crate) async fn require_subject(&self, id: SubjectId) -> Result<(), ServiceError> {
        if self.persist(self.store.subject_exists(id)).await? {
            Ok(())
        } else {
            Err(ServiceError::UnknownSubject(id))
        }
    }

    /// Reject descriptors the embedding model could not have produced.
    pub(crate) fn check_dimension(&self, vector: &FeatureVector) -> Result<(), ServiceError> {
        if vector.len() != self.descriptor_dim {
            return Err(ServiceError::InvalidInput(format!(
                "expected {}-dim descriptor, got {}",
                self.descriptor_dim,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Add an enrollment sample for a person.
    pub async fn enroll(
        &self,
        person_id: PersonId,
        vector: FeatureVector,
        image: Option<Vec<u8>>,
    ) -> Result<EnrolledVector, ServiceError> {
        self.check_dimension(&vector)?;
        self.require_person(person_id).await?;
        let image = self.save_image(image).await?;
        let image_ref = image.as_ref().map(|i| i.name.clone());
        let now = self.clock.now();
        let enrolled = match self
            .persist_write(|deadline| self.store.add_vector(person_id, &vector, image_ref, now, deadline))
            .await
        {
            Ok(enrolled) => enrolled,
            Err(err) => {
                self.discard_image(image.as_ref(), None).await;
                return Err(err);
            }
        };
        tracing::info!(person_id, vector_id = %enrolled.id, "face vector enrolled");
        Ok(enrolled)
    }

    pub async fn enrolled_vectors(&self, person_id: PersonId) -> Result<Vec<EnrolledVector>, ServiceError> {
        self.require_person(person_id).await?;
        self.persist(self.store.vectors_for(person_id)).await
    }

    pub async fn remove_vector(&self, person_id: PersonId, vector_id: &str) -> Result<bool, ServiceError> {
        self.require_person(person_id).await?;
        let removed = self
            .persist_write(|deadline| self.store.remove_vector(person_id, vector_id, deadline))
            .await?;
        tracing::info!(person_id, vector_id, removed, "remove vector");
        Ok(removed)
    }

    pub async fn remove_all_vectors(&self, person_id: PersonId) -> Result<usize, ServiceError> {
        self.require_person(person_id).await?;
        let removed = self
            .persist_write(|deadline| self.store.remove_all_vectors(person_id, deadline))
            .await?;
        tracing::info!(person_id, removed, "removed all vectors");
        Ok(removed)
    }

    /// Open-set identification over every enrolled person. Read-only.
    pub async fn identify(&self, query: FeatureVector) -> Result<MatchResult, ServiceError> {
        self.check_dimension(&query)?;
        let candidates = self.persist(self.store.all_candidates()).await?;
        let result = EuclideanMatcher.compare(&query, &candidates, self.threshold);
        tracing::info!(
            candidates = candidates.len(),
            matched = result.is_match(),
            distance = ?result.distance(),
            "identify"
        );
        Ok(result)
    }

    pub async fn session_window(&self, session_id: SessionId) -> Result<SessionWindow, ServiceError> {
        let session = self.require_session(session_id).await?;
        let state = classify(&session, self.clock.now());
        Ok(SessionWindow {
            closes_at: session.closes_at(),
            session,
            state,
        })
    }

    pub async fn records(&self, person_id: PersonId, subject_id: SubjectId) -> Result<Vec<RecordView>, ServiceError> {
        self.require_person(person_id).await?;
        self.require_subject(subject_id).await?;
        self.persist(self.store.records_for(person_id, subject_id)).await
    }

    pub async fn summary(&self, person_id: PersonId, subject_id: SubjectId) -> Result<Summary, ServiceError> {
        self.require_person(person_id).await?;
        self.require_subject(subject_id).await?;
        self.persist(self.store.summary(person_id, subject_id)).await
    }

    pub fn status(&self) -> DaemonStatus {
        DaemonStatus {
            version: env!("CARGO_PKG_VERSION"),
            db_path: self.db_path.clone(),
            image_dir: self.images.dir().to_path_buf(),
            match_threshold: self.threshold,
            descriptor_dim: self.descriptor_dim,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::store::NewRecord;
    use rollcall_core::AttendanceStatus;

    #[tokio::test]
    async fn test_enroll_validates_dimension_and_person() {
        let h = harness(at(15, 8, 0)).await;
        let short = FeatureVector::new(vec![1.0, 0.0]).unwrap();
        assert!(matches!(
            h.service.enroll(ALICE, short, None).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.enroll(99, enrolled(), None).await,
            Err(ServiceError::UnknownPerson(99))
        ));
    }

    #[tokio::test]
    async fn test_enroll_stores_image_and_lists_vectors() {
        let h = harness(at(15, 8, 0)).await;
        let added = h
            .service
            .enroll(BOB, probe(0.2), Some(b"jpeg".to_vec()))
            .await
            .unwrap();
        assert!(added.image_ref.is_some());
        assert!(h.service.images.dir().join(added.image_ref.unwrap()).exists());

        let vectors = h.service.enrolled_vectors(BOB).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].vector, probe(0.2));
    }

    #[tokio::test]
    async fn test_remove_vectors() {
        let h = harness(at(15, 8, 0)).await;
        let extra = h.service.enroll(ALICE, probe(0.1), None).await.unwrap();
        assert!(h.service.remove_vector(ALICE, &extra.id).await.unwrap());
        assert_eq!(h.service.remove_all_vectors(ALICE).await.unwrap(), 1);
        assert!(h.service.enrolled_vectors(ALICE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_vectors_requires_known_person() {
        let h = harness(at(15, 8, 0)).await;
        assert!(matches!(
            h.service.remove_vector(99, "missing").await,
            Err(ServiceError::UnknownPerson(99))
        ));
        assert!(matches!(
            h.service.remove_all_vectors(99).await,
            Err(ServiceError::UnknownPerson(99))
        ));
    }

    #[tokio::test]
    async fn test_write_timeout_is_reported_and_commits_nothing() {
        let mut h = harness(at(15, 9, 10)).await;
        h.service.persist_timeout = Duration::from_millis(50);
        let store = h.service.store.clone();
        let stall = tokio::spawn(async move { store.stall(Duration::from_millis(300)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let record = NewRecord {
            person_id: ALICE,
            session_id: TODAY_SESSION,
            status: AttendanceStatus::Present,
            recorded_at: at(15, 9, 10),
            image_ref: None,
        };
        let result = h
            .service
            .persist_write(|deadline| h.service.store.upsert_attendance(record, deadline))
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout(_))));

        stall.await.unwrap().unwrap();
        assert_eq!(h.service.store.count_records(ALICE).await.unwrap(), 0);

        // Nothing was settled, so the retry records normally.
        h.service.persist_timeout = Duration::from_secs(5);
        let retry = h
            .service
            .verify(ALICE, TODAY_SESSION, probe(0.1), None)
            .await
            .unwrap();
        assert_eq!(retry.status(), Some(AttendanceStatus::Present));
    }

    #[tokio::test]
    async fn test_verify_times_out_while_store_is_stalled() {
        let mut h = harness(at(15, 9, 10)).await;
        h.service.persist_timeout = Duration::from_millis(50);
        let store = h.service.store.clone();
        let stall = tokio::spawn(async move { store.stall(Duration::from_millis(300)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = h
            .service
            .verify(ALICE, TODAY_SESSION, probe(0.1), None)
            .await;
        match result {
            Err(err @ ServiceError::Timeout(_)) => assert!(err.is_retryable()),
            other => panic!("expected timeout, got {other:?}"),
        }

        stall.await.unwrap().unwrap();
        assert_eq!(h.service.store.count_records(ALICE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_identify_across_people() {
        let h = harness(at(15, 8, 0)).await;
        h.service
            .enroll(BOB, FeatureVector::new(vec![0.0, 1.0, 0.0, 0.0]).unwrap(), None)
            .await
            .unwrap();

        match h.service.identify(probe(0.3)).await.unwrap() {
            MatchResult::Match { person, .. } => assert_eq!(person.id, ALICE),
            other => panic!("expected match, got {other:?}"),
        }
        let stranger = FeatureVector::new(vec![0.0, 0.0, 1.0, 0.0]).unwrap();
        assert!(!h.service.identify(stranger).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_session_window_reports_state() {
        let h = harness(at(15, 9, 10)).await;
        let window = h.service.session_window(TODAY_SESSION).await.unwrap();
        assert_eq!(window.state, WindowState::Open);
        assert_eq!(window.closes_at, t(10, 30));

        h.clock.set(at(16, 9, 10));
        let window = h.service.session_window(TODAY_SESSION).await.unwrap();
        assert_eq!(window.state, WindowState::Elapsed);

        assert!(matches!(
            h.service.session_window(555).await,
            Err(ServiceError::UnknownSession(555))
        ));
    }

    #[tokio::test]
    async fn test_records_require_known_subject() {
        let h = harness(at(15, 8, 0)).await;
        assert!(matches!(
            h.service.records(ALICE, 77).await,
            Err(ServiceError::UnknownSubject(77))
        ));
        assert!(h.service.records(ALICE, SUBJECT).await.unwrap().is_empty());
        assert_eq!(h.service.summary(ALICE, SUBJECT).await.unwrap(), Summary::default());
    }

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let h = harness(at(15, 8, 0)).await;
        let json = serde_json::to_value(h.service.status()).unwrap();
        assert_eq!(json["descriptor_dim"], DIM);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
