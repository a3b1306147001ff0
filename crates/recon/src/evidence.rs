use std::collections::BTreeMap;

use crate::model::{Disposition, Observation, ReconSummary, ReconciledRow};

/// Compute summary statistics from reconciled rows.
pub fn compute_summary(rows: &[ReconciledRow]) -> ReconSummary {
    let mut observation_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut both = 0;
    let mut left_only = 0;
    let mut right_only = 0;
    let mut clean = 0;
    let mut explained = 0;

    for r in rows {
        for o in &r.observations {
            *observation_counts.entry(o.code().to_string()).or_insert(0) += 1;
        }
        match r.disposition {
            Disposition::Both => {
                both += 1;
                if r.observations.is_empty() {
                    clean += 1;
                }
            }
            Disposition::LeftOnly => left_only += 1,
            Disposition::RightOnly => right_only += 1,
        }
        if r.has(Observation::ExplainedByDisability) {
            explained += 1;
        }
    }

    ReconSummary {
        total: rows.len(),
        both,
        left_only,
        right_only,
        clean,
        explained,
        observation_counts,
    }
}
