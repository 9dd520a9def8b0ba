//! Builds TFRecord files from tab-separated annotation lists.
//!
//! Each line of the annotation file is `path<TAB>label`, optionally followed
//! by `<TAB>comment`. Relative image paths are resolved against the
//! annotation file's directory. When no comment is given, the image path is
//! stored as the comment so errors can point back to the source file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::tfrecord::TfRecordWriter;
use super::RawRecord;
use crate::error::ScanbatchError;

/// One parsed annotation line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub image_path: PathBuf,
    pub label: String,
    pub comment: Option<String>,
}

/// Summary of a dataset build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub written: usize,
    pub skipped_empty_labels: usize,
    pub longest_label: usize,
}

/// Parses annotation lines from a string. Relative paths resolve against `base`.
pub fn from_annotations_str(
    text: &str,
    base: &Path,
    source: &Path,
) -> Result<Vec<AnnotationEntry>, ScanbatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|source_err| ScanbatchError::AnnotationParse {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let Some(path) = row.get(0).map(str::trim).filter(|p| !p.is_empty()) else {
            continue;
        };
        let image_path = base.join(path);
        let label = row.get(1).unwrap_or("").to_string();
        let comment = row.get(2).map(str::to_string);

        entries.push(AnnotationEntry {
            image_path,
            label,
            comment,
        });
    }

    Ok(entries)
}

/// Reads an annotation file.
pub fn read_annotations(path: &Path) -> Result<Vec<AnnotationEntry>, ScanbatchError> {
    let text = fs::read_to_string(path).map_err(ScanbatchError::Io)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    from_annotations_str(&text, base, path)
}

/// Reads every annotated image and writes the records to `output`.
///
/// Entries with an empty label are skipped. `max_label_len`, when set,
/// rejects longer labels with [`ScanbatchError::LabelTooLong`].
pub fn build_dataset(
    annotations: &Path,
    output: &Path,
    max_label_len: Option<usize>,
) -> Result<DatasetSummary, ScanbatchError> {
    let entries = read_annotations(annotations)?;
    let mut writer = TfRecordWriter::create(output)?;
    let mut summary = DatasetSummary::default();

    for entry in entries {
        let comment = entry
            .comment
            .clone()
            .unwrap_or_else(|| entry.image_path.display().to_string());

        if entry.label.is_empty() {
            tracing::warn!(image = %entry.image_path.display(), "skipping entry with empty label");
            summary.skipped_empty_labels += 1;
            continue;
        }

        let label_len = entry.label.chars().count();
        if let Some(max) = max_label_len {
            if label_len > max {
                return Err(ScanbatchError::LabelTooLong {
                    len: label_len,
                    max,
                    comment,
                });
            }
        }

        let image = fs::read(&entry.image_path).map_err(ScanbatchError::Io)?;
        writer.write_record(&RawRecord::new(image, entry.label, comment))?;
        summary.longest_label = summary.longest_label.max(label_len);

        if writer.written() % 10_000 == 0 {
            tracing::info!(written = writer.written(), "writing records");
        }
    }

    summary.written = writer.written();
    writer.finish()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tfrecord::TfRecordReader;

    #[test]
    fn parses_paths_labels_and_comments() {
        let text = "a.png\tHELLO\n\nsub/b.png\tA B\tfrom scanner 2\n";
        let entries = from_annotations_str(text, Path::new("/data"), Path::new("ann.tsv"))
            .expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image_path, PathBuf::from("/data/a.png"));
        assert_eq!(entries[0].label, "HELLO");
        assert_eq!(entries[0].comment, None);
        assert_eq!(entries[1].label, "A B");
        assert_eq!(entries[1].comment.as_deref(), Some("from scanner 2"));
    }

    #[test]
    fn quotes_are_literal_label_text() {
        let entries = from_annotations_str("x.png\t\"QUOTED\"\n", Path::new("."), Path::new("a"))
            .expect("parse");
        assert_eq!(entries[0].label, "\"QUOTED\"");
    }

    #[test]
    fn builds_tfrecord_with_path_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("one.bin"), [1u8, 2, 3]).expect("write image");
        fs::write(dir.path().join("two.bin"), [4u8]).expect("write image");
        let ann = dir.path().join("ann.tsv");
        fs::write(&ann, "one.bin\tAB\ntwo.bin\t\nthree.bin\n").expect("write ann");

        // three.bin has no label and is skipped before its file is opened.
        let out = dir.path().join("out.tfrecord");
        let summary = build_dataset(&ann, &out, None).expect("build");
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped_empty_labels, 2);

        let records: Vec<_> = TfRecordReader::open(&out)
            .expect("open")
            .collect::<Result<_, _>>()
            .expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image, vec![1, 2, 3]);
        assert!(records[0].comment.ends_with("one.bin"));
    }

    #[test]
    fn overlong_label_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("one.bin"), [1u8]).expect("write image");
        let ann = dir.path().join("ann.tsv");
        fs::write(&ann, "one.bin\tABCDEF\n").expect("write ann");
        let err = build_dataset(&ann, &dir.path().join("o.tfrecord"), Some(3)).unwrap_err();
        assert!(matches!(err, ScanbatchError::LabelTooLong { len: 6, max: 3, .. }));
    }
}
