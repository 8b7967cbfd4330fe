//! Attendance window evaluation for live check-ins.
//!
//! Per (person, session) pair the record moves from unrecorded to exactly one
//! of present, late or absent, and then never changes. The window state
//! decides whether a live attempt is considered at all; the match decides
//! whether it counts; the check-in end time decides present versus late.

use crate::error::ServiceError;
use crate::service::Service;
use crate::store::NewRecord;
use rollcall_core::{
    arrival_status, classify, AttendanceRecord, AttendanceStatus, Candidate, EuclideanMatcher,
    FeatureVector, MatchResult, Matcher, PersonId, SessionId, WindowState,
};
use serde::Serialize;

/// Why a live check-in did not produce a present/late record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    NotYetOpen,
    /// The window had closed; the pair is settled as `record` (absent unless
    /// something was recorded earlier).
    WindowClosed { record: AttendanceRecord },
    FaceNotRecognized {
        closest: Option<f32>,
        mean: Option<f32>,
    },
    NoEnrolledFace,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NotYetOpen => "check-in has not opened yet",
            Rejection::WindowClosed { .. } => "check-in window has closed",
            Rejection::FaceNotRecognized { .. } => "face not recognized",
            Rejection::NoEnrolledFace => "no enrolled face; enroll a face first",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// A present or late record exists for the pair. `already_recorded` is
    /// set when an earlier request wrote it and this one changed nothing.
    /// A stored absence is reported as [`Rejection::WindowClosed`] instead.
    Recorded {
        record: AttendanceRecord,
        name: String,
        distance: f32,
        already_recorded: bool,
    },
    Rejected {
        #[serde(flatten)]
        rejection: Rejection,
        message: &'static str,
    },
}

impl VerifyOutcome {
    fn rejected(rejection: Rejection) -> Self {
        let message = rejection.message();
        VerifyOutcome::Rejected { rejection, message }
    }

    /// The status stored for the pair after this attempt, if any.
    pub fn status(&self) -> Option<AttendanceStatus> {
        match self {
            VerifyOutcome::Recorded { record, .. } => Some(record.status),
            VerifyOutcome::Rejected {
                rejection: Rejection::WindowClosed { record },
                ..
            } => Some(record.status),
            VerifyOutcome::Rejected { .. } => None,
        }
    }
}

impl Service {
    /// Verify a live check-in for `person_id` at `session_id`.
    ///
    /// Nothing is written until the window and the match have both been
    /// decided, so dropping the future before then has no effect.
    pub async fn verify(
        &self,
        person_id: PersonId,
        session_id: SessionId,
        query: FeatureVector,
        image: Option<Vec<u8>>,
    ) -> Result<VerifyOutcome, ServiceError> {
        self.check_dimension(&query)?;
        let person = self.require_person(person_id).await?;
        let session = self.require_session(session_id).await?;
        let now = self.clock.now();

        match classify(&session, now) {
            WindowState::NotYetOpen => {
                tracing::info!(person_id, session_id, %now, "check-in not open yet");
                return Ok(VerifyOutcome::rejected(Rejection::NotYetOpen));
            }
            WindowState::Elapsed => {
                let absent = NewRecord {
                    person_id,
                    session_id,
                    status: AttendanceStatus::Absent,
                    recorded_at: now,
                    image_ref: None,
                };
                let upserted = self
                    .persist_write(|deadline| self.store.upsert_attendance(absent, deadline))
                    .await?;
                tracing::info!(
                    person_id,
                    session_id,
                    status = %upserted.record.status,
                    inserted = upserted.inserted,
                    "check-in after window closed"
                );
                return Ok(VerifyOutcome::rejected(Rejection::WindowClosed {
                    record: upserted.record,
                }));
            }
            WindowState::Open => {}
        }

        let enrolled = self.persist(self.store.vectors_for(person_id)).await?;
        if enrolled.is_empty() {
            tracing::info!(person_id, "verify without enrolled vectors");
            return Ok(VerifyOutcome::rejected(Rejection::NoEnrolledFace));
        }

        let candidates: Vec<Candidate> = enrolled
            .into_iter()
            .map(|v| Candidate {
                person: person.clone(),
                vector: v.vector,
            })
            .collect();

        let distance = match EuclideanMatcher.compare(&query, &candidates, self.threshold) {
            MatchResult::Match { distance, .. } => distance,
            MatchResult::NoMatch { closest, mean } => {
                tracing::info!(person_id, session_id, ?closest, ?mean, "face not recognized");
                return Ok(VerifyOutcome::rejected(Rejection::FaceNotRecognized { closest, mean }));
            }
        };

        let status = arrival_status(&session, now.time());
        let image = self.save_image(image).await?;
        let record = NewRecord {
            person_id,
            session_id,
            status,
            recorded_at: now,
            image_ref: image.as_ref().map(|i| i.name.clone()),
        };
        let upserted = match self
            .persist_write(|deadline| self.store.upsert_attendance(record, deadline))
            .await
        {
            Ok(upserted) => upserted,
            Err(err) => {
                self.discard_image(image.as_ref(), None).await;
                return Err(err);
            }
        };
        if !upserted.inserted {
            self.discard_image(image.as_ref(), upserted.record.image_ref.as_deref())
                .await;
        }

        // Only reachable when a sweep ran under a clock ahead of this one.
        if upserted.record.status == AttendanceStatus::Absent {
            tracing::info!(person_id, session_id, "pair already settled absent");
            return Ok(VerifyOutcome::rejected(Rejection::WindowClosed {
                record: upserted.record,
            }));
        }

        if upserted.inserted {
            tracing::info!(person_id, session_id, %status, distance, "attendance recorded");
        } else {
            tracing::info!(
                person_id,
                session_id,
                existing = %upserted.record.status,
                "attendance already recorded"
            );
        }

        Ok(VerifyOutcome::Recorded {
            record: upserted.record,
            name: person.name,
            distance,
            already_recorded: !upserted.inserted,
        })
    }
}
