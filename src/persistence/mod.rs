//! Model serialization and persistence
//!
//! Two on-disk formats are supported: the libsvm text format, readable by
//! the reference command-line tools, and a structured JSON container that
//! also records the input normalization.

pub mod container;
pub mod text;

use crate::core::Result;
use crate::model::Model;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

/// On-disk model format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// libsvm text format
    Text,
    /// JSON container
    Container,
}

impl ModelFormat {
    /// Format implied by a file name (`.json` selects the container)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ModelFormat::Container,
            _ => ModelFormat::Text,
        }
    }

    /// Format of an in-memory document, sniffed from its first non-blank byte
    pub fn detect(content: &[u8]) -> Self {
        match content.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => ModelFormat::Container,
            _ => ModelFormat::Text,
        }
    }
}

/// Load a model, detecting its format from the content
pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    let path = path.as_ref();
    let mut content = Vec::new();
    File::open(path)?.read_to_end(&mut content)?;

    let format = ModelFormat::detect(&content);
    debug!("loading {:?} model from {}", format, path.display());
    match format {
        ModelFormat::Container => container::read(content.as_slice()),
        ModelFormat::Text => text::read(content.as_slice()),
    }
}

/// Save a model, choosing the format from the file extension
pub fn save<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    let path = path.as_ref();
    save_as(model, path, ModelFormat::from_path(path))
}

/// Save a model in an explicit format
pub fn save_as<P: AsRef<Path>>(model: &Model, path: P, format: ModelFormat) -> Result<()> {
    let path = path.as_ref();
    // Reject unrepresentable models before touching the file
    if format == ModelFormat::Text && !model.has_identity_normalization() {
        return text::write(model, std::io::sink());
    }

    let writer = BufWriter::new(File::create(path)?);
    debug!("saving {:?} model to {}", format, path.display());
    match format {
        ModelFormat::Container => container::write(model, writer),
        ModelFormat::Text => text::write(model, writer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SVMError;
    use crate::model::tests::three_class_model;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ModelFormat::from_path("m.json"), ModelFormat::Container);
        assert_eq!(ModelFormat::from_path("m.JSON"), ModelFormat::Container);
        assert_eq!(ModelFormat::from_path("m.model"), ModelFormat::Text);
        assert_eq!(ModelFormat::from_path("model"), ModelFormat::Text);
    }

    #[test]
    fn test_detect() {
        assert_eq!(ModelFormat::detect(b"  \n{\"version\": 1}"), ModelFormat::Container);
        assert_eq!(ModelFormat::detect(b"svm_type c_svc\n"), ModelFormat::Text);
        assert_eq!(ModelFormat::detect(b""), ModelFormat::Text);
    }

    #[test]
    fn test_save_and_load_both_formats() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let model = three_class_model();

        let text_path = dir.path().join("model.svm");
        save(&model, &text_path)?;
        assert_eq!(load(&text_path)?, model);

        let json_path = dir.path().join("model.json");
        save(&model, &json_path)?;
        assert_eq!(load(&json_path)?, model);

        // Content sniffing ignores the extension when loading
        let renamed = dir.path().join("container.model");
        std::fs::rename(&json_path, &renamed)?;
        assert_eq!(load(&renamed)?, model);
        Ok(())
    }

    #[test]
    fn test_text_save_with_normalization_leaves_no_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("model.svm");
        let mut model = three_class_model();
        model.set_input_subtract(vec![1.0, 1.0]).unwrap();

        assert!(matches!(
            save(&model, &path),
            Err(SVMError::UnsupportedOperation(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load("/nonexistent/model.svm"),
            Err(SVMError::IoError(_))
        ));
    }
}
