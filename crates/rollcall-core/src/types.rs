use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type PersonId = i64;
pub type SessionId = i64;
pub type SubjectId = i64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error("feature vector is empty")]
    Empty,
    #[error("feature vector has a non-finite value at index {0}")]
    NonFinite(usize),
}

/// Face descriptor produced by the external embedding model
/// (128-dimensional for the reference model).
///
/// Always non-empty with finite components, so every distance computed
/// from it is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Result<Self, VectorError> {
        if values.is_empty() {
            return Err(VectorError::Empty);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFinite(i));
        }
        Ok(Self(values))
    }

    /// Build from D-Bus doubles.
    pub fn from_f64(values: &[f64]) -> Result<Self, VectorError> {
        Self::new(values.iter().map(|v| *v as f32).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance, or `None` when the lengths differ.
    pub fn euclidean_distance(&self, other: &FeatureVector) -> Option<f32> {
        if self.0.len() != other.0.len() {
            return None;
        }
        Some(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f32>()
                .sqrt(),
        )
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = VectorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(v: FeatureVector) -> Self {
        v.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

/// A scheduled check-in opportunity for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub subject_id: SubjectId,
    pub title: String,
    pub date: NaiveDate,
    pub checkin_start: NaiveTime,
    /// Arrivals after this are late.
    pub checkin_end: NaiveTime,
    pub class_start: NaiveTime,
    pub class_end: NaiveTime,
}

impl Session {
    /// Last moment a check-in is still accepted (as late, past `checkin_end`).
    pub fn closes_at(&self) -> NaiveTime {
        self.checkin_end.max(self.class_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "late" => Ok(Self::Late),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// The single outcome recorded for a (person, session) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub person_id: PersonId,
    pub session_id: SessionId,
    pub status: AttendanceStatus,
    pub recorded_at: NaiveDateTime,
    /// File name of the captured image, if one was submitted.
    pub image_ref: Option<String>,
}

/// One enrollment sample for a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledVector {
    pub id: String,
    pub person_id: PersonId,
    pub vector: FeatureVector,
    pub image_ref: Option<String>,
    pub created_at: NaiveDateTime,
}
