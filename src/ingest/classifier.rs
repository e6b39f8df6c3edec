//! Past/future sample classification
//!
//! Splits a fetched sample list into the two tiers under one `now` snapshot
//! captured once per call. Re-evaluating the clock per sample could split a
//! batch inconsistently around the boundary; the single snapshot keeps the
//! {past, future} partition total and disjoint.

use crate::types::{EpochSeconds, FutureItem, PastRecord, Sample, FUTURE_TTL_SECONDS};

/// Samples partitioned into their target tiers
#[derive(Debug, Default)]
pub struct Classified {
    /// Records bound for the append-only time-partitioned tier
    pub past: Vec<PastRecord>,
    /// Items bound for the ephemeral key-value tier
    pub future: Vec<FutureItem>,
}

/// Partition samples against one `now` snapshot.
///
/// `sample.time < now` routes to the past tier, everything else to the
/// future tier. Future items are stamped with an expiry seven days after
/// the same snapshot so the ephemeral store cleans them up itself.
pub fn classify(samples: &[Sample], now: EpochSeconds) -> Classified {
    let expiry = now + FUTURE_TTL_SECONDS;
    let mut classified = Classified::default();

    for sample in samples {
        if sample.time < now {
            classified.past.push(PastRecord::from_sample(sample));
        } else {
            classified.future.push(FutureItem {
                identifier: sample.identifier.clone(),
                time: sample.time,
                value: sample.value.clone(),
                metadata: sample.metadata.clone(),
                // Plain string/integer struct; serialization cannot fail
                document: serde_json::to_string(sample).unwrap_or_default(),
                expiry,
            });
        }
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    fn sample(time: i64) -> Sample {
        Sample::new("11111", time, "42", "meta")
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let now = 1_700_000_000;
        let samples: Vec<_> = [-3600, -1, 0, 1, 3600]
            .iter()
            .map(|d| sample(now + d))
            .collect();

        let classified = classify(&samples, now);
        assert_eq!(classified.past.len() + classified.future.len(), samples.len());
        assert!(classified.past.iter().all(|r| r.time < now));
        assert!(classified.future.iter().all(|i| i.time >= now));
        // The boundary sample (time == now) is future
        assert!(classified.future.iter().any(|i| i.time == now));
    }

    #[test]
    fn test_empty_input() {
        let classified = classify(&[], 1_700_000_000);
        assert!(classified.past.is_empty());
        assert!(classified.future.is_empty());
    }

    #[test]
    fn test_future_items_carry_document_and_expiry() {
        let now = 1_700_000_000;
        let input = sample(now + 60);
        let classified = classify(std::slice::from_ref(&input), now);

        let item = &classified.future[0];
        assert_eq!(item.expiry, now + FUTURE_TTL_SECONDS);
        let embedded: Sample = serde_json::from_str(&item.document).unwrap();
        assert_eq!(embedded, input);
    }

    #[test]
    fn test_past_records_keep_sample_time_and_value() {
        let now = 1_700_000_000;
        let classified = classify(&[sample(now - 60)], now);
        let record = &classified.past[0];
        assert_eq!(record.time, now - 60);
        assert_eq!(record.measure_value, "42");
    }
}
