//! Misfire reconciliation.
//!
//! When the process was down (or a dispatch loop fell far behind), a job may
//! have one or more occurrences in the past. `collect_missed` enumerates
//! them from the last known next-fire time; `reconcile` collapses them into
//! the fires that should actually run now, per the job's misfire policy.

use chrono::{DateTime, Utc};

use tickd_core::{MisfirePolicy, TriggerSpec, TriggerSpecError};

/// Safety cap on enumerated occurrences; a sub-second interval job that was
/// down for a week would otherwise enumerate millions of instants that
/// reconciliation collapses anyway.
const MAX_MISSED: usize = 1_000;

/// Enumerate occurrences from `from` (inclusive) up to `now` (inclusive).
pub fn collect_missed(
    spec: &TriggerSpec,
    from: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, TriggerSpecError> {
    let mut missed = Vec::new();
    if from > now {
        return Ok(missed);
    }
    missed.push(from);
    let mut cursor = from;
    while missed.len() < MAX_MISSED {
        match spec.next_fire_time(cursor)? {
            Some(next) if next <= now => {
                missed.push(next);
                cursor = next;
            }
            _ => break,
        }
    }
    Ok(missed)
}

/// Decide which catch-up fires to run for a set of missed occurrences.
///
/// - `Discard`: none;
/// - `FireImmediately`: the most recent missed occurrence, exactly once;
/// - `FireOnce`: a single fire at `now`, regardless of how many were missed.
pub fn reconcile(
    missed: &[DateTime<Utc>],
    now: DateTime<Utc>,
    policy: MisfirePolicy,
) -> Vec<DateTime<Utc>> {
    if missed.is_empty() {
        return Vec::new();
    }
    match policy {
        MisfirePolicy::Discard => Vec::new(),
        MisfirePolicy::FireImmediately => missed.last().map(|t| vec![*t]).unwrap_or_default(),
        MisfirePolicy::FireOnce => vec![now],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instants(now: DateTime<Utc>, offsets_secs: &[i64]) -> Vec<DateTime<Utc>> {
        offsets_secs
            .iter()
            .map(|s| now - Duration::seconds(*s))
            .collect()
    }

    #[test]
    fn discard_drops_everything() {
        let now = Utc::now();
        let missed = instants(now, &[30, 20, 10]);
        assert!(reconcile(&missed, now, MisfirePolicy::Discard).is_empty());
    }

    #[test]
    fn fire_immediately_runs_most_recent_once() {
        let now = Utc::now();
        let missed = instants(now, &[30, 20, 10]);
        let fires = reconcile(&missed, now, MisfirePolicy::FireImmediately);
        assert_eq!(fires, vec![now - Duration::seconds(10)]);
    }

    #[test]
    fn fire_once_collapses_to_single_catch_up() {
        let now = Utc::now();
        for count in [1usize, 3, 50] {
            let missed: Vec<_> = (1..=count as i64)
                .map(|i| now - Duration::seconds(i))
                .collect();
            let fires = reconcile(&missed, now, MisfirePolicy::FireOnce);
            assert_eq!(fires, vec![now], "missed={count}");
        }
    }

    #[test]
    fn no_missed_means_no_fires() {
        let now = Utc::now();
        for policy in [
            MisfirePolicy::Discard,
            MisfirePolicy::FireImmediately,
            MisfirePolicy::FireOnce,
        ] {
            assert!(reconcile(&[], now, policy).is_empty());
        }
    }

    #[test]
    fn collect_missed_enumerates_interval_occurrences() {
        let spec = TriggerSpec::interval_secs(10);
        let now = Utc::now();
        let from = now - Duration::seconds(35);

        let missed = collect_missed(&spec, from, now).unwrap();
        // from, +10s, +20s, +30s are all in the past; +40s is not.
        assert_eq!(missed.len(), 4);
        assert_eq!(missed[0], from);
        assert!(missed.iter().all(|t| *t <= now));
    }

    #[test]
    fn collect_missed_empty_when_not_due() {
        let spec = TriggerSpec::interval_secs(10);
        let now = Utc::now();
        let missed = collect_missed(&spec, now + Duration::seconds(5), now).unwrap();
        assert!(missed.is_empty());
    }

    #[test]
    fn collect_missed_is_capped() {
        let spec = TriggerSpec::interval_ms(10);
        let now = Utc::now();
        let missed = collect_missed(&spec, now - Duration::days(1), now).unwrap();
        assert_eq!(missed.len(), 1_000);
    }
}
