//! Annotations and the discrete events derived from them.
//!
//! GDF recordings carry their stimulus markers as annotations (onset in
//! seconds, duration, description such as `"769"` for a left-hand cue).
//! [`events_from_annotations`] turns them into `(sample, code)` pairs the
//! way MNE does: unique descriptions are sorted as strings and numbered
//! from 1.  For IV-2a training sessions this yields
//!
//! ```text
//! 1023→1  1072→2  276→3  277→4  32766→5  768→6  769→7  770→8  771→9  772→10
//! ```
use std::collections::{BTreeMap, BTreeSet};

/// One annotation interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Onset in seconds from the first sample.
    pub onset: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self { onset, duration, description: description.into() }
    }

    /// `BAD…` annotations mark segments to reject (case-insensitive prefix).
    pub fn is_bad(&self) -> bool {
        has_prefix_ignore_case(&self.description, "bad")
    }

    /// `EDGE…` annotations mark boundaries between concatenated segments.
    pub fn is_edge(&self) -> bool {
        has_prefix_ignore_case(&self.description, "edge")
    }

    /// Whether `[start, end]` (seconds) intersects this annotation.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.onset <= end && self.onset + self.duration >= start
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len()).is_some_and(|p| p.eq_ignore_ascii_case(prefix))
}

/// A discrete event: absolute sample index and integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Event {
    pub sample: i64,
    pub code: i32,
}

/// Event label → code.
pub type EventId = BTreeMap<String, i32>;

/// Derive events and the label → code mapping from `annotations`.
///
/// `BAD` and `EDGE` annotations are not events.  Samples are
/// `first_samp + round(onset · sfreq)`; the returned events are sorted by
/// sample (ties by code).
pub fn events_from_annotations(
    annotations: &[Annotation],
    sfreq: f64,
    first_samp: i64,
) -> (Vec<Event>, EventId) {
    let kept: Vec<&Annotation> = annotations
        .iter()
        .filter(|a| !a.is_bad() && !a.is_edge())
        .collect();

    let labels: BTreeSet<&str> = kept.iter().map(|a| a.description.as_str()).collect();
    let event_id: EventId = labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| (label.to_string(), i as i32 + 1))
        .collect();

    let mut events: Vec<Event> = kept
        .iter()
        .map(|a| Event {
            sample: first_samp + (a.onset * sfreq).round() as i64,
            code: event_id[&a.description],
        })
        .collect();
    events.sort();
    (events, event_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_string_order() {
        let annots: Vec<Annotation> = ["769", "1023", "770", "276", "32766", "768", "772", "771"]
            .iter()
            .enumerate()
            .map(|(i, d)| Annotation::new(i as f64, 0.0, *d))
            .collect();
        let (events, id) = events_from_annotations(&annots, 250.0, 0);
        assert_eq!(id["1023"], 1);
        assert_eq!(id["276"], 2);
        assert_eq!(id["769"], 5);
        assert_eq!(id["772"], 8);
        assert_eq!(events.len(), 8);
        assert_eq!(events[0], Event { sample: 0, code: 5 });
        assert_eq!(events[1], Event { sample: 250, code: 1 });
    }

    #[test]
    fn bad_and_edge_are_skipped() {
        let annots = vec![
            Annotation::new(0.0, 1.0, "BAD_blink"),
            Annotation::new(1.0, 0.0, "edge"),
            Annotation::new(2.0, 0.0, "769"),
        ];
        let (events, id) = events_from_annotations(&annots, 100.0, 10);
        assert_eq!(id.len(), 1);
        assert_eq!(events, vec![Event { sample: 210, code: 1 }]);
    }

    #[test]
    fn empty_annotations() {
        let (events, id) = events_from_annotations(&[], 250.0, 0);
        assert!(events.is_empty());
        assert!(id.is_empty());
    }

    #[test]
    fn overlap_is_inclusive() {
        let a = Annotation::new(1.0, 0.5, "BAD");
        assert!(a.overlaps(0.0, 1.0));
        assert!(a.overlaps(1.5, 2.0));
        assert!(!a.overlaps(1.6, 2.0));
    }
}
