//! LibSVM format sample sets
//!
//! Supports loading and writing samples in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Indices are 1-based and strictly increasing on disk, 0-based in memory.

use crate::core::{Dataset, Result, SVMError, Sample, SparseVector};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::Utf8Error;

/// Labelled samples held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
    shape: usize,
}

impl SampleSet {
    /// Create an empty sample set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sample set from samples, deriving the shape
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let shape = samples
            .iter()
            .map(|s| s.features.dimension())
            .max()
            .unwrap_or(0);
        Self { samples, shape }
    }

    /// Build a sample set from dense rows and their labels
    pub fn from_dense(labels: &[f64], rows: &[Vec<f64>]) -> Result<Self> {
        if labels.len() != rows.len() {
            return Err(SVMError::DimensionMismatch {
                expected: rows.len(),
                actual: labels.len(),
            });
        }
        let samples = labels
            .iter()
            .zip(rows)
            .map(|(&label, row)| Sample::new(SparseVector::from_dense(row), label))
            .collect();
        let mut set = Self::from_samples(samples);
        set.shape = set.shape.max(rows.iter().map(Vec::len).max().unwrap_or(0));
        Ok(set)
    }

    /// Append a sample, widening the shape if needed
    pub fn push(&mut self, sample: Sample) {
        self.shape = self.shape.max(sample.features.dimension());
        self.samples.push(sample);
    }

    /// Load a sample set from a libsvm format file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a whole sample set from a reader
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut set = Self::new();
        let mut buffer = Vec::new();
        let mut line_num = 0;

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_num += 1;

            let line = match record_text(&buffer) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(_) => {
                    return Err(SVMError::ParseError(format!(
                        "Error parsing line {}: invalid UTF-8",
                        line_num
                    )))
                }
            };

            let (label, features) = parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("Error parsing line {}: {}", line_num, e))
            })?;
            set.push(Sample::new(features, label));
        }

        Ok(set)
    }

    /// Write the samples in libsvm format
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for sample in &self.samples {
            write_line(writer, sample.label, &sample.features)?;
        }
        Ok(())
    }

    /// Save the samples to a libsvm format file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// One past the largest 0-based feature index
    pub fn shape(&self) -> usize {
        self.shape
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Dense rows of width `shape()`
    pub fn dense_features(&self) -> Vec<Vec<f64>> {
        self.samples
            .iter()
            .map(|s| s.features.to_dense(self.shape))
            .collect()
    }
}

impl Dataset for SampleSet {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.shape
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.labels()
    }
}

/// Text of a raw record line, or `None` for blank and `#` comment lines
///
/// Comments are recognised before decoding, so they may hold any bytes.
pub(crate) fn record_text(raw: &[u8]) -> std::result::Result<Option<&str>, Utf8Error> {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    let trimmed = &raw[start..end];

    if trimmed.is_empty() || trimmed[0] == b'#' {
        return Ok(None);
    }
    std::str::from_utf8(trimmed).map(Some)
}

/// Parse a single line in libsvm format
pub(crate) fn parse_line(line: &str) -> Result<(f64, SparseVector)> {
    let mut parts = line.split_whitespace();

    let label_str = parts
        .next()
        .ok_or_else(|| SVMError::ParseError("Empty line".to_string()))?;
    let label = label_str
        .parse::<f64>()
        .map_err(|_| SVMError::ParseError(format!("Invalid label: {}", label_str)))?;

    let mut indices = Vec::new();
    let mut values = Vec::new();

    for feature_str in parts {
        let (index_str, value_str) = feature_str.split_once(':').ok_or_else(|| {
            SVMError::ParseError(format!("Invalid feature format: {}", feature_str))
        })?;

        let index = index_str.parse::<usize>().map_err(|_| {
            SVMError::ParseError(format!("Invalid feature index: {}", index_str))
        })?;
        let value = value_str.parse::<f64>().map_err(|_| {
            SVMError::ParseError(format!("Invalid feature value: {}", value_str))
        })?;

        if index == 0 {
            return Err(SVMError::ParseError(
                "Feature index must be positive: 0".to_string(),
            ));
        }
        let zero_based = index - 1;
        if indices.last().is_some_and(|&last| zero_based <= last) {
            return Err(SVMError::ParseError(format!(
                "Feature indices must be strictly increasing: {}",
                index
            )));
        }

        indices.push(zero_based);
        values.push(value);
    }

    Ok((label, SparseVector { indices, values }))
}

/// Write one record; zero values are omitted
pub(crate) fn write_line<W: Write>(writer: &mut W, label: f64, features: &SparseVector) -> Result<()> {
    write!(writer, "{}", label)?;
    for (&i, &v) in features.indices.iter().zip(&features.values) {
        if v != 0.0 {
            write!(writer, " {}:{}", i + 1, v)?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line_basic() {
        let (label, features) = parse_line("+1 1:0.5 3:1.2").unwrap();

        assert_eq!(label, 1.0);
        assert_eq!(features.indices, vec![0, 2]); // 1-based to 0-based
        assert_eq!(features.values, vec![0.5, 1.2]);
    }

    #[test]
    fn test_parse_line_keeps_labels() {
        let (label, _) = parse_line("3 1:1.0").unwrap();
        assert_eq!(label, 3.0);

        let (label, features) = parse_line("-0.25").unwrap();
        assert_eq!(label, -0.25);
        assert!(features.is_empty());
    }

    #[test]
    fn test_parse_line_invalid_format() {
        assert!(parse_line("+1 1").is_err());
        assert!(parse_line("+1 abc:1.0").is_err());
        assert!(parse_line("+1 1:abc").is_err());
        assert!(parse_line("one 1:1.0").is_err());
        // Zero index (libsvm is 1-based)
        assert!(parse_line("+1 0:1.0").is_err());
        // Indices must increase
        assert!(parse_line("+1 3:1.0 2:1.0").is_err());
        assert!(parse_line("+1 2:1.0 2:1.0").is_err());
    }

    #[test]
    fn test_from_reader_basic() {
        let data = "+1 1:0.5 3:1.2\n-1 2:0.3 5:2.1\n";
        let set = SampleSet::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.shape(), 5);
        assert_eq!(set.labels(), vec![1.0, -1.0]);
        assert_eq!(set.samples()[1].features.indices, vec![1, 4]);
    }

    #[test]
    fn test_from_reader_empty_lines_and_comments() {
        let data = "# Comment line\n+1 1:0.5\n\n# Another comment\n-1 2:0.3\n";
        let set = SampleSet::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_labels(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_from_reader_reports_line_number() {
        let data = "+1 1:0.5\n\n-1 2:x\n";
        match SampleSet::from_reader(Cursor::new(data)) {
            Err(SVMError::ParseError(msg)) => assert!(msg.contains("line 3"), "{}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dataset_trait_implementation() {
        let set = SampleSet::from_reader(Cursor::new("+1 1:0.5 3:1.2\n-1 2:0.3\n")).unwrap();

        assert_eq!(Dataset::len(&set), 2);
        assert_eq!(set.dim(), 3);
        assert!(!Dataset::is_empty(&set));

        let batch = set.get_batch(&[1, 0]);
        assert_eq!(batch[0].label, -1.0);
        assert_eq!(batch[1].label, 1.0);
    }

    #[test]
    fn test_write_omits_zeros() {
        let set = SampleSet::from_dense(&[2.0, -1.5], &[vec![0.5, 0.0, 3.0], vec![0.0, 0.0, 0.0]])
            .unwrap();
        assert_eq!(set.shape(), 3);

        let mut out = Vec::new();
        set.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2 1:0.5 3:3\n-1.5\n");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.txt");

        let set = SampleSet::from_reader(Cursor::new("1 1:0.1 4:-7e-5\n2 2:1e300\n")).unwrap();
        set.save(&path).unwrap();

        let reloaded = SampleSet::load(&path).unwrap();
        assert_eq!(reloaded, set);
        assert_eq!(reloaded.dense_features()[0], vec![0.1, 0.0, 0.0, -7e-5]);
    }

    #[test]
    fn test_load_io_error() {
        let result = SampleSet::load("/non/existent/file.libsvm");
        assert!(matches!(result, Err(SVMError::IoError(_))));
    }

    #[test]
    fn test_from_dense_length_mismatch() {
        assert!(matches!(
            SampleSet::from_dense(&[1.0], &[]),
            Err(SVMError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_record_text() {
        assert_eq!(record_text(b"  +1 1:0.5\r\n").unwrap(), Some("+1 1:0.5"));
        assert_eq!(record_text(b" \t\n").unwrap(), None);
        assert_eq!(record_text(b"# \xe9t\xe9\n").unwrap(), None);
        assert!(record_text(b"1 1:\xff").is_err());
    }

    #[test]
    fn test_from_reader_non_utf8() {
        let set = SampleSet::from_reader(Cursor::new(&b"# r\xe9sum\xe9\n1 1:2\n"[..])).unwrap();
        assert_eq!(set.len(), 1);

        let err = SampleSet::from_reader(Cursor::new(&b"1 1:2\n2 1:\xff\n"[..])).unwrap_err();
        assert!(matches!(err, SVMError::ParseError(ref m) if m.contains("line 2")));
    }
}
