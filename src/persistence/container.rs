//! Structured model container
//!
//! A JSON document with named, typed fields. Unlike the libsvm text format
//! it records the input normalization, so a model round-trips completely.
//! Floats are written with enough digits to reload bit for bit.

use crate::core::{Result, SVMError, SparseVector, SvmType};
use crate::kernel::Kernel;
use crate::model::{Model, ModelParts, SupportVector};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Container layout version written by this library
pub const CONTAINER_VERSION: u32 = 1;

/// Serializable representation of a trained SVM model
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializableModel {
    /// Layout version
    pub version: u32,
    /// Model metadata
    pub metadata: ModelMetadata,
    pub svm_type: SvmType,
    pub kernel: Kernel,
    pub input_size: usize,
    #[serde(default)]
    pub classes: Vec<i32>,
    #[serde(default)]
    pub sv_counts: Vec<usize>,
    pub rho: Vec<f64>,
    #[serde(default)]
    pub prob_a: Option<Vec<f64>>,
    #[serde(default)]
    pub prob_b: Option<Vec<f64>>,
    pub input_subtract: Vec<f64>,
    pub input_divide: Vec<f64>,
    /// Support vectors, grouped by class in `classes` order
    pub support_vectors: Vec<SerializableSupportVector>,
}

/// Model metadata for tracking
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to write the container
    pub library_version: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

/// Serializable support vector representation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SerializableSupportVector {
    /// Feature indices (0-based, strictly increasing)
    pub indices: Vec<usize>,
    /// Feature values
    pub values: Vec<f64>,
    /// Dual coefficients
    pub coefficients: Vec<f64>,
}

impl From<&SupportVector> for SerializableSupportVector {
    fn from(sv: &SupportVector) -> Self {
        Self {
            indices: sv.features.indices.clone(),
            values: sv.features.values.clone(),
            coefficients: sv.coefficients.clone(),
        }
    }
}

impl TryFrom<SerializableSupportVector> for SupportVector {
    type Error = SVMError;

    fn try_from(sv: SerializableSupportVector) -> Result<Self> {
        if sv.indices.len() != sv.values.len() {
            return Err(SVMError::FormatError(format!(
                "support vector has {} indices but {} values",
                sv.indices.len(),
                sv.values.len()
            )));
        }
        if sv.indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SVMError::FormatError(
                "support vector indices must be strictly increasing".to_string(),
            ));
        }
        Ok(SupportVector::new(
            SparseVector {
                indices: sv.indices,
                values: sv.values,
            },
            sv.coefficients,
        ))
    }
}

impl SerializableModel {
    /// Create a serializable model from a trained model
    pub fn from_model(model: &Model) -> Self {
        Self {
            version: CONTAINER_VERSION,
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
            svm_type: model.svm_type(),
            kernel: *model.kernel(),
            input_size: model.input_size(),
            classes: model.classes().to_vec(),
            sv_counts: model.sv_counts().to_vec(),
            rho: model.rho().to_vec(),
            prob_a: model.prob_a().map(<[f64]>::to_vec),
            prob_b: model.prob_b().map(<[f64]>::to_vec),
            input_subtract: model.input_subtract().to_vec(),
            input_divide: model.input_divide().to_vec(),
            support_vectors: model
                .support_vectors()
                .iter()
                .map(SerializableSupportVector::from)
                .collect(),
        }
    }

    /// Convert back to a validated model
    pub fn into_model(self) -> Result<Model> {
        if self.version != CONTAINER_VERSION {
            return Err(SVMError::FormatError(format!(
                "unsupported container version {}",
                self.version
            )));
        }

        let support_vectors = self
            .support_vectors
            .into_iter()
            .map(SupportVector::try_from)
            .collect::<Result<Vec<_>>>()?;

        Model::new(ModelParts {
            svm_type: self.svm_type,
            kernel: self.kernel,
            input_size: self.input_size,
            classes: self.classes,
            sv_counts: self.sv_counts,
            support_vectors,
            rho: self.rho,
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            input_subtract: Some(self.input_subtract),
            input_divide: Some(self.input_divide),
        })
    }
}

/// Read a container document
pub fn read<R: Read>(reader: R) -> Result<Model> {
    let stored: SerializableModel = serde_json::from_reader(reader)
        .map_err(|e| SVMError::SerializationError(e.to_string()))?;
    stored.into_model()
}

/// Write a model as a container document
pub fn write<W: Write>(model: &Model, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &SerializableModel::from_model(model))
        .map_err(|e| SVMError::SerializationError(e.to_string()))
}
