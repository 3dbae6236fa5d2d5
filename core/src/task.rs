//! Task numbering for the four study tasks.
//!
//! Task 1 is the unassisted baseline. Tasks 2–4 are AI-assisted and each
//! carries a category and a severity level from the participant's assignment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StudyError};

/// A task number in {1, 2, 3, 4}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TaskNumber(u8);

impl TaskNumber {
    pub const BASELINE: TaskNumber = TaskNumber(1);
    pub const ALL: [TaskNumber; 4] = [TaskNumber(1), TaskNumber(2), TaskNumber(3), TaskNumber(4)];
    pub const ASSISTED: [TaskNumber; 3] = [TaskNumber(2), TaskNumber(3), TaskNumber(4)];

    pub fn new(task: i64) -> Result<Self> {
        match task {
            1..=4 => Ok(Self(task as u8)),
            _ => Err(StudyError::InvalidTask { task }),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_baseline(self) -> bool {
        self.0 == 1
    }

    /// Index into the three assisted-task slots (task 2 → 0), `None` for task 1.
    pub fn slot_index(self) -> Option<usize> {
        (self.0 >= 2).then(|| usize::from(self.0 - 2))
    }
}

impl TryFrom<i64> for TaskNumber {
    type Error = StudyError;

    fn try_from(task: i64) -> Result<Self> {
        Self::new(task)
    }
}

impl From<TaskNumber> for i64 {
    fn from(task: TaskNumber) -> Self {
        i64::from(task.0)
    }
}

impl fmt::Display for TaskNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_numbers_outside_range() {
        for bad in [-1, 0, 5, 42] {
            let err = TaskNumber::new(bad).expect_err("out of range");
            assert!(matches!(err, StudyError::InvalidTask { task } if task == bad));
        }
    }

    #[test]
    fn slot_indices_cover_assisted_tasks() {
        assert_eq!(TaskNumber::BASELINE.slot_index(), None);
        let indices: Vec<usize> = TaskNumber::ASSISTED
            .iter()
            .filter_map(|t| t.slot_index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn deserializes_from_json_number() {
        let task: TaskNumber = serde_json::from_str("3").expect("valid");
        assert_eq!(task.get(), 3);
        assert!(serde_json::from_str::<TaskNumber>("9").is_err());
    }
}
