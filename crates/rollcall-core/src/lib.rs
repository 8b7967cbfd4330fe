//! rollcall-core — Face descriptor matching and attendance windows.
//!
//! Decides identity from enrolled feature vectors under a Euclidean
//! distance threshold, and classifies a point in time against a
//! scheduled session's check-in window. Pure code, no I/O.

pub mod matcher;
pub mod types;
pub mod window;

pub use matcher::{Candidate, EuclideanMatcher, MatchResult, Matcher};
pub use types::{
    AttendanceRecord, AttendanceStatus, EnrolledVector, FeatureVector, Person, PersonId, Session,
    SessionId, SubjectId, VectorError,
};
pub use window::{arrival_status, classify, WindowState};
