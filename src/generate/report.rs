//! Generator counters and their terminal formatting.

use serde::Serialize;
use std::fmt;

/// Running counts for one generation session.
///
/// Every record read ends up in exactly one of: emitted in a batch, filtered
/// too wide, skipped invalid, skipped degenerate, or discarded on
/// exhaustion. The one exception is a record that aborts the stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GeneratorStats {
    /// Records pulled from the source.
    pub records_read: usize,
    /// Records the augmentation pipeline rewrote successfully.
    pub augmented: usize,
    /// Records dropped by the width filter.
    pub filtered_too_wide: usize,
    /// Records skipped under the skip policy (charmap miss, too long, ...).
    pub skipped_invalid: usize,
    /// Records whose image had zero area.
    pub skipped_degenerate: usize,
    /// Batches yielded.
    pub batches_emitted: usize,
    /// Examples inside yielded batches.
    pub examples_emitted: usize,
    /// Examples left in partially filled buckets when the stream ended.
    pub discarded_on_exhaustion: usize,
    /// Batches emitted per bucket index.
    pub batches_per_bucket: Vec<usize>,
}

impl GeneratorStats {
    pub(crate) fn with_buckets(count: usize) -> Self {
        Self {
            batches_per_bucket: vec![0; count],
            ..Default::default()
        }
    }

    /// Records dropped for any reason other than the end of the stream.
    pub fn dropped(&self) -> usize {
        self.filtered_too_wide + self.skipped_invalid + self.skipped_degenerate
    }
}

impl fmt::Display for GeneratorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} records read, {} augmented",
            self.records_read, self.augmented
        )?;
        writeln!(
            f,
            "  {} batches emitted ({} examples)",
            self.batches_emitted, self.examples_emitted
        )?;

        if self.batches_emitted > 0 {
            let per_bucket: Vec<String> = self
                .batches_per_bucket
                .iter()
                .enumerate()
                .map(|(i, n)| format!("#{i}: {n}"))
                .collect();
            writeln!(f, "  per bucket: {}", per_bucket.join(", "))?;
        }

        if self.dropped() > 0 {
            writeln!(f)?;
            writeln!(f, "Dropped ({}):", self.dropped())?;
            if self.filtered_too_wide > 0 {
                writeln!(f, "  - {} wider than max width", self.filtered_too_wide)?;
            }
            if self.skipped_invalid > 0 {
                writeln!(f, "  - {} invalid", self.skipped_invalid)?;
            }
            if self.skipped_degenerate > 0 {
                writeln!(f, "  - {} zero-area images", self.skipped_degenerate)?;
            }
        }

        if self.discarded_on_exhaustion > 0 {
            writeln!(f)?;
            writeln!(
                f,
                "Note: {} example(s) in partially filled buckets were discarded at end of stream",
                self.discarded_on_exhaustion
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_report_has_no_sections() {
        let stats = GeneratorStats::with_buckets(2);
        let text = stats.to_string();
        assert!(text.contains("0 records read"));
        assert!(!text.contains("Dropped"));
        assert!(!text.contains("discarded"));
    }

    #[test]
    fn drops_and_discards_are_listed() {
        let stats = GeneratorStats {
            records_read: 10,
            filtered_too_wide: 2,
            skipped_degenerate: 1,
            discarded_on_exhaustion: 3,
            ..GeneratorStats::with_buckets(1)
        };
        let text = stats.to_string();
        assert!(text.contains("Dropped (3):"));
        assert!(text.contains("2 wider than max width"));
        assert!(text.contains("3 example(s)"));
    }

    #[test]
    fn serializes_to_json() {
        let stats = GeneratorStats::with_buckets(2);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"discarded_on_exhaustion\":0"));
        assert!(json.contains("\"batches_per_bucket\":[0,0]"));
    }
}
