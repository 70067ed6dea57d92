use std::collections::HashMap;

/// Global exclusion decision for low-reporting devices.
///
/// Built only after every device's reading count is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierDecision {
    pub modal_count: Option<usize>,
    pub threshold: f64,
}

impl OutlierDecision {
    pub fn from_counts<I>(counts: I, factor: f64) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let modal_count = modal_count(counts);
        let threshold = modal_count.map_or(0.0, |m| m as f64 * factor);
        Self {
            modal_count,
            threshold,
        }
    }

    /// Whole-history exclusion: the device contributes nothing downstream.
    pub fn excludes(&self, reading_count: usize) -> bool {
        (reading_count as f64) < self.threshold
    }
}

/// Most frequent value; ties resolve to the smallest.
pub fn modal_count<I>(counts: I) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for c in counts {
        *freq.entry(c).or_insert(0) += 1;
    }
    freq.into_iter()
        .max_by(|(va, fa), (vb, fb)| fa.cmp(fb).then(vb.cmp(va)))
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_count() {
        assert_eq!(modal_count(vec![42, 42, 42, 7, 41]), Some(42));
        assert_eq!(modal_count(Vec::<usize>::new()), None);
    }

    #[test]
    fn test_modal_count_ties_pick_smallest() {
        assert_eq!(modal_count(vec![10, 20, 20, 10, 30]), Some(10));
    }

    #[test]
    fn test_decision_excludes_below_ten_percent_of_mode() {
        let counts = vec![100, 100, 100, 9, 10, 55];
        let decision = OutlierDecision::from_counts(counts, 0.1);

        assert_eq!(decision.modal_count, Some(100));
        assert!((decision.threshold - 10.0).abs() < 1e-9);
        assert!(decision.excludes(9));
        assert!(!decision.excludes(11));
        assert!(!decision.excludes(55));
    }

    #[test]
    fn test_empty_run_excludes_nothing() {
        let decision = OutlierDecision::from_counts(Vec::new(), 0.1);
        assert!(!decision.excludes(0));
    }
}
