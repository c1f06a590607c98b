//! Actionable customer lists for marketing follow-up

use std::cmp::Ordering;

use crate::model::CustomerProfile;
use crate::segment::{MonetaryThresholds, HIGH_FREQUENCY, RECENT_DAYS};

/// Independently derived lists; a customer may appear in more than one
#[derive(Debug, Clone, Default)]
pub struct PriorityLists {
    /// Top-quartile spenders who have not bought recently
    pub high_risk_high_value: Vec<CustomerProfile>,
    /// Top-quartile spenders who bought recently
    pub vip_recent: Vec<CustomerProfile>,
    /// Frequent buyers who have gone quiet
    pub loyal_inactive: Vec<CustomerProfile>,
}

pub fn select_priority_lists(
    profiles: &[CustomerProfile],
    thresholds: &MonetaryThresholds,
) -> PriorityLists {
    let high_value = |p: &CustomerProfile| thresholds.is_high_value(p.monetary());

    PriorityLists {
        high_risk_high_value: select(profiles, |p| high_value(p) && p.recency() > RECENT_DAYS),
        vip_recent: select(profiles, |p| high_value(p) && p.recency() <= RECENT_DAYS),
        loyal_inactive: select(profiles, |p| {
            p.frequency() >= HIGH_FREQUENCY && p.recency() > RECENT_DAYS
        }),
    }
}

/// Filter and sort by monetary descending, then customer id
fn select<F>(profiles: &[CustomerProfile], predicate: F) -> Vec<CustomerProfile>
where
    F: Fn(&CustomerProfile) -> bool,
{
    let mut selected: Vec<CustomerProfile> = profiles.iter().filter(|p| predicate(p)).cloned().collect();
    selected.sort_by(|a, b| {
        b.monetary()
            .partial_cmp(&a.monetary())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.customer_id().cmp(b.customer_id()))
    });
    selected
}
