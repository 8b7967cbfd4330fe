//! Session window classification.
//!
//! A session accepts check-ins on its calendar date from `checkin_start`
//! through [`Session::closes_at`], both ends inclusive. Arrivals up to
//! `checkin_end` are on time; later ones inside the window are late.

use crate::types::{AttendanceStatus, Session};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    NotYetOpen,
    Open,
    Elapsed,
}

/// Classify `now` against the session's acceptance window.
///
/// Dates are compared first; the time of day only matters on the session date.
pub fn classify(session: &Session, now: NaiveDateTime) -> WindowState {
    let today = now.date();
    if today < session.date {
        return WindowState::NotYetOpen;
    }
    if today > session.date {
        return WindowState::Elapsed;
    }

    let time = now.time();
    if time < session.checkin_start {
        WindowState::NotYetOpen
    } else if time > session.closes_at() {
        WindowState::Elapsed
    } else {
        WindowState::Open
    }
}

/// Status for a verified arrival at `at` inside an open window.
pub fn arrival_status(session: &Session, at: NaiveTime) -> AttendanceStatus {
    if at <= session.checkin_end {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}
