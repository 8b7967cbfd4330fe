//! Absence backfill for sessions whose window closed without a check-in.

use crate::error::ServiceError;
use crate::service::Service;
use crate::store::NewRecord;
use rollcall_core::{classify, AttendanceStatus, PersonId, SessionId, SubjectId, WindowState};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Sessions marked absent by this sweep.
    pub backfilled: Vec<SessionId>,
    /// Elapsed sessions another request recorded while this sweep ran.
    pub raced: usize,
}

impl Service {
    /// Mark every elapsed, unrecorded session of `subject_id` absent for
    /// `person_id`.
    ///
    /// Safe to repeat and to run alongside verifications for the same pair:
    /// each write is the same insert-if-absent used for live check-ins.
    pub async fn reconcile(
        &self,
        person_id: PersonId,
        subject_id: SubjectId,
    ) -> Result<ReconcileReport, ServiceError> {
        self.require_person(person_id).await?;
        self.require_subject(subject_id).await?;

        let now = self.clock.now();
        let pending = self
            .persist(self.store.sessions_without_record(person_id, subject_id))
            .await?;

        let mut report = ReconcileReport::default();
        for session in pending
            .iter()
            .filter(|s| classify(s, now) == WindowState::Elapsed)
        {
            let absent = NewRecord {
                person_id,
                session_id: session.id,
                status: AttendanceStatus::Absent,
                recorded_at: now,
                image_ref: None,
            };
            let upserted = self
                .persist_write(|deadline| self.store.upsert_attendance(absent, deadline))
                .await?;
            if upserted.inserted {
                report.backfilled.push(session.id);
            } else {
                report.raced += 1;
            }
        }

        tracing::info!(
            person_id,
            subject_id,
            pending = pending.len(),
            backfilled = report.backfilled.len(),
            raced = report.raced,
            "reconciled past sessions"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::VerifyOutcome;
    use crate::service::fixtures::*;

    #[tokio::test]
    async fn test_marks_only_elapsed_sessions() {
        let h = harness(at(15, 9, 10)).await;
        let report = h.service.reconcile(ALICE, SUBJECT).await.unwrap();
        assert_eq!(report.backfilled, vec![PAST_SESSION]);

        let records = h.service.records(ALICE, SUBJECT).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session.id, PAST_SESSION);
        assert_eq!(records[0].record.status, AttendanceStatus::Absent);
    }

    #[tokio::test]
    async fn test_repeat_is_idempotent() {
        let h = harness(at(17, 12, 0)).await;
        let first = h.service.reconcile(ALICE, SUBJECT).await.unwrap();
        assert_eq!(first.backfilled, vec![PAST_SESSION, TODAY_SESSION, FUTURE_SESSION]);
        let after_first = h.service.records(ALICE, SUBJECT).await.unwrap();

        let second = h.service.reconcile(ALICE, SUBJECT).await.unwrap();
        assert_eq!(second, ReconcileReport::default());
        assert_eq!(h.service.records(ALICE, SUBJECT).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_existing_records_are_left_alone() {
        let h = harness(at(15, 9, 10)).await;
        let outcome = h
            .service
            .verify(ALICE, TODAY_SESSION, probe(0.1), None)
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Recorded { .. }));

        h.clock.set(at(20, 8, 0));
        let report = h.service.reconcile(ALICE, SUBJECT).await.unwrap();
        assert_eq!(report.backfilled, vec![PAST_SESSION, FUTURE_SESSION]);
        assert_eq!(
            h.service.summary(ALICE, SUBJECT).await.unwrap(),
            crate::store::Summary { present: 1, late: 0, absent: 2 }
        );
    }

    #[tokio::test]
    async fn test_rejected_live_attempt_then_sweep() {
        let h = harness(at(16, 9, 10)).await;
        // Bob never enrolled; his live attempt on the closed session is
        // settled as absent and the sweep leaves it alone.
        let outcome = h
            .service
            .verify(BOB, TODAY_SESSION, probe(0.0), None)
            .await
            .unwrap();
        assert_eq!(outcome.status(), Some(AttendanceStatus::Absent));

        let report = h.service.reconcile(BOB, SUBJECT).await.unwrap();
        assert_eq!(report.backfilled, vec![PAST_SESSION]);
        assert_eq!(h.service.store.count_records(BOB).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_and_verify_keep_one_record_per_session() {
        let h = harness(at(15, 9, 10)).await;
        let mut tasks = Vec::new();
        for i in 0..4 {
            let service = h.service.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    service.reconcile(ALICE, SUBJECT).await.map(|_| ())
                } else {
                    service
                        .verify(ALICE, TODAY_SESSION, probe(0.1), None)
                        .await
                        .map(|_| ())
                }
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let records = h.service.records(ALICE, SUBJECT).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.session.id).collect();
        assert_eq!(ids, vec![PAST_SESSION, TODAY_SESSION]);
        assert_eq!(records[1].record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_invalid() {
        let h = harness(at(15, 9, 10)).await;
        assert!(matches!(
            h.service.reconcile(ALICE, 999).await,
            Err(ServiceError::UnknownSubject(999))
        ));
        assert!(matches!(
            h.service.reconcile(999, SUBJECT).await,
            Err(ServiceError::UnknownPerson(999))
        ));
    }
}
