//! Note schedule
//!
//! The ordered list of target times the ball has to meet. Times are in
//! milliseconds of simulated time; payloads are carried through untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One scheduled note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteTarget {
    /// Position in the schedule
    #[serde(default)]
    pub index: usize,
    /// Scheduled time (milliseconds)
    pub time: f64,
    /// Opaque to the generator
    #[serde(default)]
    pub payload: Value,
}

/// Read-only, time-ordered note targets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<NoteTarget>", into = "Vec<NoteTarget>")]
pub struct NoteSchedule {
    notes: Vec<NoteTarget>,
}

impl From<Vec<NoteTarget>> for NoteSchedule {
    fn from(notes: Vec<NoteTarget>) -> Self {
        Self::new(notes)
    }
}

impl From<NoteSchedule> for Vec<NoteTarget> {
    fn from(schedule: NoteSchedule) -> Self {
        schedule.notes
    }
}

impl NoteSchedule {
    /// Build a schedule, renumbering notes by position
    ///
    /// Times are expected to be non-decreasing; this is checked in debug
    /// builds only.
    pub fn new(mut notes: Vec<NoteTarget>) -> Self {
        for (i, note) in notes.iter_mut().enumerate() {
            note.index = i;
        }
        debug_assert!(
            notes.windows(2).all(|w| w[0].time <= w[1].time),
            "note schedule times must be non-decreasing"
        );
        Self { notes }
    }

    /// Schedule from bare times (milliseconds), with null payloads
    pub fn from_times(times: &[f64]) -> Self {
        Self::new(
            times
                .iter()
                .map(|&time| NoteTarget {
                    index: 0,
                    time,
                    payload: Value::Null,
                })
                .collect(),
        )
    }

    /// Parse a JSON array of `{ "time": ms, "payload": ... }` records
    pub fn from_json(json: &str) -> Result<Self> {
        let notes: Vec<NoteTarget> = serde_json::from_str(json)?;
        if let Some(bad) = notes.iter().position(|n| !n.time.is_finite() || n.time < 0.0) {
            return Err(Error::InvalidSchedule(format!(
                "note {} has invalid time {}",
                bad, notes[bad].time
            )));
        }
        if let Some(i) = notes.windows(2).position(|w| w[0].time > w[1].time) {
            return Err(Error::InvalidSchedule(format!(
                "note {} at {}ms comes after note {} at {}ms",
                i + 1,
                notes[i + 1].time,
                i,
                notes[i].time
            )));
        }
        Ok(Self::new(notes))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let schedule = Self::from_json(&json)?;
        log::info!("Loaded {} notes from {}", schedule.len(), path.display());
        Ok(schedule)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NoteTarget> {
        self.notes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteTarget> {
        self.notes.iter()
    }

    /// Time of the last note (0 for an empty schedule)
    pub fn end_time(&self) -> f64 {
        self.notes.last().map(|n| n.time).unwrap_or(0.0)
    }
}
