//! Sprint and ticket records from the Jira export.

use super::percentage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub status: TicketStatus,
    pub story_points: u32,
    pub assigned_to: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_completed(&self) -> bool {
        self.status == TicketStatus::Done && self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub sprint_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub planned_points: u32,
    pub completed_points: u32,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
}

impl Sprint {
    /// Completed over planned points, as a percentage.
    pub fn completion_rate(&self) -> f64 {
        percentage(self.completed_points as f64, self.planned_points as f64)
    }

    pub fn count_status(&self, status: TicketStatus) -> usize {
        self.tickets.iter().filter(|t| t.status == status).count()
    }

    pub fn tickets_with_status(&self, status: TicketStatus) -> impl Iterator<Item = &Ticket> {
        self.tickets.iter().filter(move |t| t.status == status)
    }

    pub fn date_range(&self) -> String {
        format!("{} to {}", self.start_date, self.end_date)
    }
}
