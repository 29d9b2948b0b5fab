//! Phishing campaign lifecycle and recipient tracking rules.
//!
//! A campaign moves `draft → published → completed`. While published, each
//! recipient's token can record an open, a click, and a fall. The three
//! timestamps double as flags and are write-once.

use crate::score::percentage;
use crate::{CampaignStatus, CampaignTotals, ServiceError};

/// 1×1 transparent GIF served by the open-tracking endpoint.
pub const TRACKING_PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Only drafts may be edited.
pub fn ensure_editable(status: CampaignStatus) -> Result<(), ServiceError> {
    match status {
        CampaignStatus::Draft => Ok(()),
        other => Err(ServiceError::Conflict(format!(
            "campaign is {other}; only drafts can be edited"
        ))),
    }
}

/// `draft → published`.
pub fn publish(status: CampaignStatus) -> Result<CampaignStatus, ServiceError> {
    match status {
        CampaignStatus::Draft => Ok(CampaignStatus::Published),
        other => Err(ServiceError::Conflict(format!(
            "campaign is {other}; only drafts can be published"
        ))),
    }
}

/// `published → completed`.
pub fn complete(status: CampaignStatus) -> Result<CampaignStatus, ServiceError> {
    match status {
        CampaignStatus::Published => Ok(CampaignStatus::Completed),
        other => Err(ServiceError::Conflict(format!(
            "campaign is {other}; only published campaigns can be completed"
        ))),
    }
}

/// Tracking events are recorded only while the campaign is live.
pub fn accepts_tracking(status: CampaignStatus) -> bool {
    status == CampaignStatus::Published
}

/// Interaction observed through a tracking endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEvent {
    Open,
    Click,
    Fall,
}

impl TrackingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Click => "click",
            Self::Fall => "fall",
        }
    }
}

/// Write-once interaction timestamps of one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientFlags {
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub fallen_at: Option<String>,
}

impl RecipientFlags {
    pub fn opened(&self) -> bool {
        self.opened_at.is_some()
    }

    pub fn clicked(&self) -> bool {
        self.clicked_at.is_some()
    }

    pub fn fallen(&self) -> bool {
        self.fallen_at.is_some()
    }

    /// Apply an event at `now`. A deeper interaction implies the shallower
    /// ones (a click implies an open, a fall implies both). Existing
    /// timestamps are never overwritten. Returns whether anything changed.
    pub fn apply(&mut self, event: TrackingEvent, now: &str) -> bool {
        let mut changed = false;
        let mut stamp = |slot: &mut Option<String>| {
            if slot.is_none() {
                *slot = Some(now.to_string());
                changed = true;
            }
        };
        stamp(&mut self.opened_at);
        if matches!(event, TrackingEvent::Click | TrackingEvent::Fall) {
            stamp(&mut self.clicked_at);
        }
        if event == TrackingEvent::Fall {
            stamp(&mut self.fallen_at);
        }
        changed
    }

    /// A recipient passes the phishing test unless they fell for it.
    pub fn passed_test(&self) -> bool {
        !self.fallen()
    }
}

/// Aggregate recipient rows into report totals. Rates are relative to the
/// number of emails actually sent.
pub fn tally<'a, I>(rows: I) -> CampaignTotals
where
    I: IntoIterator<Item = (bool, &'a RecipientFlags)>,
{
    let mut totals = CampaignTotals::default();
    for (sent, flags) in rows {
        totals.recipients += 1;
        totals.sent += i64::from(sent);
        totals.opened += i64::from(flags.opened());
        totals.clicked += i64::from(flags.clicked());
        totals.fallen += i64::from(flags.fallen());
    }
    totals.open_rate = percentage(totals.opened, totals.sent);
    totals.click_rate = percentage(totals.clicked, totals.sent);
    totals.fall_rate = percentage(totals.fallen, totals.sent);
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_only_forward() {
        assert_eq!(publish(CampaignStatus::Draft).unwrap(), CampaignStatus::Published);
        assert!(publish(CampaignStatus::Published).is_err());
        assert!(publish(CampaignStatus::Completed).is_err());
        assert_eq!(
            complete(CampaignStatus::Published).unwrap(),
            CampaignStatus::Completed
        );
        assert!(complete(CampaignStatus::Draft).is_err());
        assert!(ensure_editable(CampaignStatus::Published).is_err());
        assert!(accepts_tracking(CampaignStatus::Published));
        assert!(!accepts_tracking(CampaignStatus::Completed));
    }

    #[test]
    fn fall_implies_click_and_open() {
        let mut flags = RecipientFlags::default();
        assert!(flags.apply(TrackingEvent::Fall, "2025-01-01 10:00:00"));
        assert!(flags.opened() && flags.clicked() && flags.fallen());
        assert!(!flags.passed_test());
    }

    #[test]
    fn timestamps_are_write_once() {
        let mut flags = RecipientFlags::default();
        flags.apply(TrackingEvent::Open, "2025-01-01 10:00:00");
        flags.apply(TrackingEvent::Fall, "2025-01-01 11:00:00");
        assert!(!flags.apply(TrackingEvent::Fall, "2025-01-02 09:00:00"));
        assert_eq!(flags.opened_at.as_deref(), Some("2025-01-01 10:00:00"));
        assert_eq!(flags.fallen_at.as_deref(), Some("2025-01-01 11:00:00"));
        assert!(!flags.apply(TrackingEvent::Open, "2025-01-03 09:00:00"));
        assert!(flags.fallen());
    }

    #[test]
    fn tally_reports_rates_against_sent() {
        let opened = RecipientFlags {
            opened_at: Some("t".into()),
            ..Default::default()
        };
        let mut fell = RecipientFlags::default();
        fell.apply(TrackingEvent::Fall, "t");
        let idle = RecipientFlags::default();

        let totals = tally([(true, &opened), (true, &fell), (true, &idle), (false, &idle)]);
        assert_eq!(totals.recipients, 4);
        assert_eq!(totals.sent, 3);
        assert_eq!(totals.opened, 2);
        assert_eq!(totals.clicked, 1);
        assert_eq!(totals.fallen, 1);
        assert_eq!(totals.open_rate, 66.7);
        assert_eq!(totals.fall_rate, 33.3);
    }
}
