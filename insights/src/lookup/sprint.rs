use crate::fixtures::{round2, FixtureSet, Sprint, TicketStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintSummary {
    pub sprint_name: String,
    pub date_range: String,
    pub planned_points: u32,
    pub completed_points: u32,
    pub completion_rate: f64,
    pub total_tickets: usize,
    pub completed_tickets: usize,
    pub in_progress_tickets: usize,
    pub blocked_tickets: usize,
    pub todo_tickets: usize,
    pub blocked_ticket_ids: Vec<String>,
}

impl SprintSummary {
    /// True for the default summary returned when no sprint matched.
    pub fn is_empty(&self) -> bool {
        self.sprint_name.is_empty()
    }

    fn from_sprint(sprint: &Sprint) -> Self {
        Self {
            sprint_name: sprint.sprint_name.clone(),
            date_range: sprint.date_range(),
            planned_points: sprint.planned_points,
            completed_points: sprint.completed_points,
            completion_rate: sprint.completion_rate(),
            total_tickets: sprint.tickets.len(),
            completed_tickets: sprint.count_status(TicketStatus::Done),
            in_progress_tickets: sprint.count_status(TicketStatus::InProgress),
            blocked_tickets: sprint.count_status(TicketStatus::Blocked),
            todo_tickets: sprint.count_status(TicketStatus::Todo),
            blocked_ticket_ids: sprint
                .tickets_with_status(TicketStatus::Blocked)
                .map(|t| t.id.clone())
                .collect(),
        }
    }
}

/// Metrics for the named sprint, or the most recent one when no name is given.
pub fn sprint_metrics(fixtures: &FixtureSet, sprint_name: Option<&str>) -> SprintSummary {
    let sprint = match sprint_name {
        Some(name) => fixtures.sprint(name),
        None => fixtures.latest_sprint(),
    };
    sprint.map(SprintSummary::from_sprint).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    #[default]
    InsufficientData,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient data",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintVelocity {
    pub sprint_name: String,
    pub planned_points: u32,
    pub completed_points: u32,
    pub completion_rate: f64,
}

/// A fall in completion rate between two consecutive sprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityDrop {
    pub from_sprint: String,
    pub to_sprint: String,
    pub points: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityTrend {
    pub sprints: Vec<SprintVelocity>,
    pub average_completion_rate: f64,
    /// Relative change from the first to the last sprint, in percent.
    pub change_percent: f64,
    pub trend: Trend,
    pub lowest_sprint: Option<SprintVelocity>,
    pub highest_sprint: Option<SprintVelocity>,
    pub analysis_period: String,
}

impl VelocityTrend {
    /// Largest drop in completion rate between consecutive sprints, if any sprint fell.
    pub fn largest_drop(&self) -> Option<VelocityDrop> {
        self.sprints
            .windows(2)
            .map(|pair| VelocityDrop {
                from_sprint: pair[0].sprint_name.clone(),
                to_sprint: pair[1].sprint_name.clone(),
                points: round2(pair[0].completion_rate - pair[1].completion_rate),
            })
            .filter(|drop| drop.points > 0.0)
            .max_by(|a, b| a.points.total_cmp(&b.points))
    }
}

const TREND_BAND: f64 = 5.0;

/// Completion trend over the most recent `num_sprints` sprints.
pub fn velocity_trend(fixtures: &FixtureSet, num_sprints: usize) -> VelocityTrend {
    let ordered = fixtures.sprints_chronological();
    let recent = &ordered[ordered.len().saturating_sub(num_sprints)..];
    if recent.is_empty() {
        return VelocityTrend::default();
    }

    let sprints: Vec<SprintVelocity> = recent
        .iter()
        .map(|s| SprintVelocity {
            sprint_name: s.sprint_name.clone(),
            planned_points: s.planned_points,
            completed_points: s.completed_points,
            completion_rate: s.completion_rate(),
        })
        .collect();

    let rates: Vec<f64> = sprints.iter().map(|s| s.completion_rate).collect();
    let average = rates.iter().sum::<f64>() / rates.len() as f64;

    let (change, trend) = match (rates.first(), rates.last()) {
        (Some(&first), Some(&last)) if rates.len() >= 2 => {
            let change = if first > 0.0 {
                (last - first) / first * 100.0
            } else {
                0.0
            };
            let trend = if change > TREND_BAND {
                Trend::Improving
            } else if change < -TREND_BAND {
                Trend::Declining
            } else {
                Trend::Stable
            };
            (change, trend)
        }
        _ => (0.0, Trend::InsufficientData),
    };

    let lowest = sprints
        .iter()
        .min_by(|a, b| a.completion_rate.total_cmp(&b.completion_rate))
        .cloned();
    let highest = sprints
        .iter()
        .max_by(|a, b| a.completion_rate.total_cmp(&b.completion_rate))
        .cloned();

    VelocityTrend {
        analysis_period: format!("Last {} sprints", sprints.len()),
        sprints,
        average_completion_rate: round2(average),
        change_percent: round2(change),
        trend,
        lowest_sprint: lowest,
        highest_sprint: highest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::sample_fixtures;

    #[test]
    fn test_named_sprint_metrics() {
        let summary = sprint_metrics(&sample_fixtures(), Some("Sprint 2024-11-1"));
        assert_eq!(summary.completion_rate, 72.92);
        assert_eq!(summary.planned_points, 48);
        assert_eq!(summary.completed_points, 35);
        assert_eq!(summary.blocked_tickets, 2);
        assert_eq!(summary.blocked_ticket_ids, vec!["QUAL-124", "QUAL-125"]);
        assert_eq!(summary.date_range, "2024-10-28 to 2024-11-08");
    }

    #[test]
    fn test_latest_sprint_is_default_selector() {
        let summary = sprint_metrics(&sample_fixtures(), None);
        assert_eq!(summary.sprint_name, "Sprint 2024-12-2");
        assert_eq!(summary.completion_rate, 75.0);
    }

    #[test]
    fn test_unknown_sprint_returns_default() {
        let summary = sprint_metrics(&sample_fixtures(), Some("Sprint 1999-1-1"));
        assert!(summary.is_empty());
        assert_eq!(summary, SprintSummary::default());
    }

    #[test]
    fn test_velocity_trend_declining() {
        let trend = velocity_trend(&sample_fixtures(), 6);
        assert_eq!(trend.sprints.len(), 6);
        assert_eq!(trend.average_completion_rate, 83.43);
        assert_eq!(trend.change_percent, -21.74);
        assert_eq!(trend.trend, Trend::Declining);
        assert_eq!(trend.lowest_sprint.unwrap().sprint_name, "Sprint 2024-11-1");
        assert_eq!(trend.highest_sprint.unwrap().sprint_name, "Sprint 2024-10-2");
    }

    #[test]
    fn test_largest_drop() {
        let drop = velocity_trend(&sample_fixtures(), 6).largest_drop().unwrap();
        assert_eq!(drop.from_sprint, "Sprint 2024-10-2");
        assert_eq!(drop.to_sprint, "Sprint 2024-11-1");
        assert_eq!(drop.points, 23.08);
    }

    #[test]
    fn test_velocity_trend_window_edges() {
        let fixtures = sample_fixtures();
        let single = velocity_trend(&fixtures, 1);
        assert_eq!(single.trend, Trend::InsufficientData);
        assert_eq!(single.sprints[0].sprint_name, "Sprint 2024-12-2");

        assert_eq!(velocity_trend(&fixtures, 0), VelocityTrend::default());
        assert_eq!(velocity_trend(&fixtures, 50).sprints.len(), 6);
    }
}
