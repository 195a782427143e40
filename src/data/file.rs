//! Streaming reader over libsvm format data files
//!
//! A [`DataFile`] scans its file once on open to learn the number of
//! records and the widest feature index, then hands out records one at a
//! time. It keeps `good`/`fail`/`eof` flags in the manner of a stream: once
//! `fail` is set every read returns `Ok(None)` until [`DataFile::reset`].

use super::libsvm::{parse_line, record_text};
use crate::core::{Result, SVMError, SparseVector};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Cursor over the records of a data file
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    reader: BufReader<File>,
    shape: usize,
    samples: usize,
    line_number: usize,
    fail: bool,
    eof: bool,
}

impl DataFile {
    /// Open a data file, taking the shape from the widest record
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = Self::open_raw(path.as_ref())?;
        let (samples, shape) = file.prescan()?;
        file.samples = samples;
        file.shape = shape;
        debug!(
            "opened {}: {} samples, shape {}",
            file.path.display(),
            samples,
            shape
        );
        Ok(file)
    }

    /// Open a data file with a caller-chosen shape
    pub fn open_with_shape<P: AsRef<Path>>(path: P, shape: usize) -> Result<Self> {
        let mut file = Self::open_raw(path.as_ref())?;
        let (samples, _) = file.prescan()?;
        file.samples = samples;
        file.shape = shape;
        Ok(file)
    }

    fn open_raw(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            shape: 0,
            samples: 0,
            line_number: 0,
            fail: false,
            eof: false,
        })
    }

    /// Count records and find the largest index without validating lines
    fn prescan(&mut self) -> Result<(usize, usize)> {
        let mut samples = 0;
        let mut shape = 0;
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if self.reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buffer);
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            samples += 1;
            for token in trimmed.split_whitespace().skip(1) {
                if let Some(index) = token
                    .split_once(':')
                    .and_then(|(index, _)| index.parse::<usize>().ok())
                {
                    shape = shape.max(index);
                }
            }
        }

        self.reader.seek(SeekFrom::Start(0))?;
        Ok((samples, shape))
    }

    /// Number of features per dense record
    pub fn shape(&self) -> usize {
        self.shape
    }

    /// Number of records found when the file was opened
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn filename(&self) -> &Path {
        &self.path
    }

    /// True while neither `fail` nor `eof` is set
    pub fn good(&self) -> bool {
        !self.fail && !self.eof
    }

    pub fn fail(&self) -> bool {
        self.fail
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Rewind to the first record and clear the flags
    pub fn reset(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.line_number = 0;
        self.fail = false;
        self.eof = false;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<(f64, SparseVector)>> {
        if self.fail {
            return Ok(None);
        }

        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let read = match self.reader.read_until(b'\n', &mut buffer) {
                Ok(read) => read,
                Err(e) => {
                    self.fail = true;
                    return Err(e.into());
                }
            };
            if read == 0 {
                self.eof = true;
                self.fail = true;
                return Ok(None);
            }
            self.line_number += 1;

            let parsed = match record_text(&buffer) {
                Ok(Some(line)) => parse_line(line),
                Ok(None) => continue,
                Err(_) => Err(SVMError::ParseError("invalid UTF-8".to_string())),
            };

            return match parsed {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    self.fail = true;
                    Err(SVMError::ParseError(format!(
                        "{}:{}: {}",
                        self.path.display(),
                        self.line_number,
                        e
                    )))
                }
            };
        }
    }

    fn check_width(&mut self, features: &SparseVector, width: usize) -> Result<()> {
        if features.dimension() > width {
            self.fail = true;
            return Err(SVMError::DimensionMismatch {
                expected: width,
                actual: features.dimension(),
            });
        }
        Ok(())
    }

    /// Read the next record as a dense vector of length `shape()`
    pub fn read_one(&mut self) -> Result<Option<(f64, Vec<f64>)>> {
        match self.next_record()? {
            Some((label, features)) => {
                self.check_width(&features, self.shape)?;
                Ok(Some((label, features.to_dense(self.shape))))
            }
            None => Ok(None),
        }
    }

    /// Read the next record into `values`, returning its label
    ///
    /// The buffer is zero-filled first.
    pub fn read_into(&mut self, values: &mut [f64]) -> Result<Option<f64>> {
        values.iter_mut().for_each(|v| *v = 0.0);
        match self.next_record()? {
            Some((label, features)) => {
                self.check_width(&features, values.len())?;
                for (&i, &v) in features.indices.iter().zip(&features.values) {
                    values[i] = v;
                }
                Ok(Some(label))
            }
            None => Ok(None),
        }
    }

    /// Read the next record in sparse form, without a width limit
    pub fn read_sparse(&mut self) -> Result<Option<(f64, SparseVector)>> {
        self.next_record()
    }

    /// Read every remaining record as dense rows
    pub fn read_all(&mut self) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
        let mut labels = Vec::new();
        let mut rows = Vec::new();
        while let Some((label, row)) = self.read_one()? {
            labels.push(label);
            rows.push(row);
        }
        Ok((labels, rows))
    }
}
