use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub type CampaignId = i64;

/// A recurring campaign send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub status: String,
    /// Interval tag such as `DAILY` or `WEEKLY`.
    pub interval: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Offset to the next run. Unknown tags run daily.
    pub fn reschedule_offset(&self) -> Duration {
        match self.interval.as_deref() {
            Some("WEEKLY") => Duration::days(7),
            _ => Duration::hours(24),
        }
    }
}

/// A recorded (simulated) campaign send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRun {
    pub campaign_id: CampaignId,
    pub sent_count: i32,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(interval: Option<&str>) -> Campaign {
        Campaign {
            id: 1,
            name: "Weekly digest".into(),
            status: "ACTIVE".into(),
            interval: interval.map(str::to_string),
            next_run_at: None,
        }
    }

    #[test]
    fn test_reschedule_offsets() {
        assert_eq!(campaign(Some("DAILY")).reschedule_offset(), Duration::hours(24));
        assert_eq!(campaign(Some("WEEKLY")).reschedule_offset(), Duration::days(7));
        assert_eq!(campaign(Some("MONTHLY")).reschedule_offset(), Duration::hours(24));
        assert_eq!(campaign(None).reschedule_offset(), Duration::hours(24));
    }
}
