//! libsvm text model format
//!
//! ```text
//! svm_type c_svc
//! kernel_type rbf
//! gamma 0.0769231
//! nr_class 2
//! total_sv 3
//! rho 0.42
//! label 1 -1
//! nr_sv 2 1
//! SV
//! 1 1:0.5 3:-1
//! ...
//! ```
//!
//! Header keys may come in any order. Each support vector line holds
//! `nr_class - 1` coefficients followed by 1-based `index:value` pairs.

use crate::core::{Result, SVMError, SparseVector, SvmType};
use crate::kernel::Kernel;
use crate::model::{Model, ModelParts, SupportVector};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, BufRead, ErrorKind, Write};

fn format_error(message: impl Into<String>) -> SVMError {
    SVMError::FormatError(message.into())
}

/// Undecodable bytes make the model malformed rather than unreadable
fn line_error(line_no: usize, err: io::Error) -> SVMError {
    if err.kind() == ErrorKind::InvalidData {
        format_error(format!("line {}: invalid UTF-8", line_no + 1))
    } else {
        SVMError::IoError(err)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, token: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| format_error(format!("invalid value '{}' for {}", token, key)))
}

fn parse_list<T: std::str::FromStr>(key: &str, tokens: &[String], expected: usize) -> Result<Vec<T>> {
    if tokens.len() != expected {
        return Err(format_error(format!(
            "{} has {} values, expected {}",
            key,
            tokens.len(),
            expected
        )));
    }
    tokens.iter().map(|t| parse_value(key, t)).collect()
}

/// Header section keyed by name, values kept as raw tokens
struct Header {
    entries: HashMap<String, Vec<String>>,
}

impl Header {
    fn single<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(tokens) => {
                let values: Vec<T> = parse_list(key, tokens, 1)?;
                Ok(values.into_iter().next())
            }
        }
    }

    fn require<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        self.single(key)?
            .ok_or_else(|| format_error(format!("missing '{}' in model header", key)))
    }

    fn list<T: std::str::FromStr>(&self, key: &str, expected: usize) -> Result<Option<Vec<T>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(tokens) => parse_list(key, tokens, expected).map(Some),
        }
    }

    fn require_list<T: std::str::FromStr>(&self, key: &str, expected: usize) -> Result<Vec<T>> {
        self.list(key, expected)?
            .ok_or_else(|| format_error(format!("missing '{}' in model header", key)))
    }
}

const HEADER_KEYS: &[&str] = &[
    "svm_type",
    "kernel_type",
    "degree",
    "gamma",
    "coef0",
    "nr_class",
    "total_sv",
    "rho",
    "label",
    "probA",
    "probB",
    "nr_sv",
];

fn read_kernel(header: &Header) -> Result<Kernel> {
    let name: String = header.require("kernel_type")?;
    match name.as_str() {
        "linear" => Ok(Kernel::Linear),
        "polynomial" => Kernel::from_parts(
            &name,
            header.require("degree")?,
            header.require("gamma")?,
            header.require("coef0")?,
        ),
        "rbf" => Kernel::from_parts(&name, 0, header.require("gamma")?, 0.0),
        "sigmoid" => Kernel::from_parts(&name, 0, header.require("gamma")?, header.require("coef0")?),
        other => Kernel::from_parts(other, 0, 0.0, 0.0),
    }
}

/// Parse one support vector line
fn read_support_vector(line: &str, n_coefficients: usize, line_no: usize) -> Result<SupportVector> {
    let mut tokens = line.split_whitespace();
    let mut coefficients = Vec::with_capacity(n_coefficients);
    for _ in 0..n_coefficients {
        let token = tokens
            .next()
            .ok_or_else(|| format_error(format!("line {}: missing coefficients", line_no)))?;
        coefficients.push(parse_value("coefficient", token)?);
    }

    let mut indices = Vec::new();
    let mut values = Vec::new();
    for token in tokens {
        let (index, value) = token
            .split_once(':')
            .ok_or_else(|| format_error(format!("line {}: malformed feature '{}'", line_no, token)))?;
        let index: usize = parse_value("feature index", index)?;
        let value: f64 = parse_value("feature value", value)?;
        if index == 0 {
            return Err(format_error(format!("line {}: feature indices start at 1", line_no)));
        }
        if indices.last().is_some_and(|&last| index - 1 <= last) {
            return Err(format_error(format!(
                "line {}: feature indices must be strictly increasing",
                line_no
            )));
        }
        indices.push(index - 1);
        values.push(value);
    }

    Ok(SupportVector::new(SparseVector { indices, values }, coefficients))
}

/// Read a model in libsvm text format
pub fn read<R: BufRead>(reader: R) -> Result<Model> {
    let mut lines = reader.lines().enumerate();
    let mut entries: HashMap<String, Vec<String>> = HashMap::new();
    let mut saw_sv = false;

    for (line_no, line) in lines.by_ref() {
        let line = line.map_err(|e| line_error(line_no, e))?;
        let mut tokens = line.split_whitespace();
        let key = match tokens.next() {
            Some(key) => key,
            None => continue,
        };
        if key == "SV" {
            saw_sv = true;
            break;
        }
        if !HEADER_KEYS.contains(&key) {
            return Err(format_error(format!(
                "line {}: unknown model header key '{}'",
                line_no + 1,
                key
            )));
        }
        if entries
            .insert(key.to_string(), tokens.map(str::to_string).collect())
            .is_some()
        {
            return Err(format_error(format!("duplicate model header key '{}'", key)));
        }
    }
    if !saw_sv {
        return Err(format_error("missing 'SV' section"));
    }

    let header = Header { entries };
    let svm_type: SvmType = header.require::<String>("svm_type")?.parse()?;
    let kernel = read_kernel(&header)?;
    let nr_class: usize = header.require("nr_class")?;
    let total_sv: usize = header.require("total_sv")?;

    if nr_class < 2 || (!svm_type.is_classification() && nr_class != 2) {
        return Err(format_error(format!("invalid nr_class {} for {}", nr_class, svm_type)));
    }
    let n_pairs = nr_class * (nr_class - 1) / 2;
    let rho: Vec<f64> = header.require_list("rho", n_pairs)?;

    let (classes, sv_counts, prob_a, prob_b) = if svm_type.is_classification() {
        let classes: Vec<i32> = header.require_list("label", nr_class)?;
        let sv_counts: Vec<usize> = header.require_list("nr_sv", nr_class)?;
        let sum: usize = sv_counts.iter().sum();
        if sum != total_sv {
            return Err(format_error(format!(
                "nr_sv adds up to {} but total_sv is {}",
                sum, total_sv
            )));
        }
        (
            classes,
            sv_counts,
            header.list("probA", n_pairs)?,
            header.list("probB", n_pairs)?,
        )
    } else {
        for key in ["label", "nr_sv", "probB"] {
            if header.entries.contains_key(key) {
                return Err(format_error(format!("'{}' is not valid for {}", key, svm_type)));
            }
        }
        let prob_a = if svm_type.is_regression() {
            header.list("probA", 1)?
        } else if header.entries.contains_key("probA") {
            return Err(format_error(format!("'probA' is not valid for {}", svm_type)));
        } else {
            None
        };
        (Vec::new(), Vec::new(), prob_a, None)
    };

    let n_coefficients = nr_class - 1;
    let mut support_vectors = Vec::with_capacity(total_sv);
    for (line_no, line) in lines {
        let line = line.map_err(|e| line_error(line_no, e))?;
        if line.trim().is_empty() {
            continue;
        }
        support_vectors.push(read_support_vector(&line, n_coefficients, line_no + 1)?);
    }
    if support_vectors.len() != total_sv {
        return Err(format_error(format!(
            "expected {} support vectors, found {}",
            total_sv,
            support_vectors.len()
        )));
    }

    let input_size = support_vectors
        .iter()
        .map(|sv| sv.features.dimension())
        .max()
        .unwrap_or(0)
        .max(1);

    Model::new(ModelParts {
        svm_type,
        kernel,
        input_size,
        classes,
        sv_counts,
        support_vectors,
        rho,
        prob_a,
        prob_b,
        input_subtract: None,
        input_divide: None,
    })
}

fn write_list<W: Write, T: Display>(writer: &mut W, key: &str, values: &[T]) -> Result<()> {
    write!(writer, "{}", key)?;
    for value in values {
        write!(writer, " {}", value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write a model in libsvm text format
///
/// The format has no room for input normalization; models carrying a
/// non-identity normalization are rejected.
pub fn write<W: Write>(model: &Model, mut writer: W) -> Result<()> {
    if !model.has_identity_normalization() {
        return Err(SVMError::UnsupportedOperation(
            "the libsvm text format cannot store input normalization".to_string(),
        ));
    }

    let kernel = model.kernel();
    writeln!(writer, "svm_type {}", model.svm_type())?;
    writeln!(writer, "kernel_type {}", kernel.name())?;
    if let Some(degree) = kernel.degree() {
        writeln!(writer, "degree {}", degree)?;
    }
    if let Some(gamma) = kernel.gamma() {
        writeln!(writer, "gamma {}", gamma)?;
    }
    if let Some(coef0) = kernel.coef0() {
        writeln!(writer, "coef0 {}", coef0)?;
    }
    writeln!(writer, "nr_class {}", model.nr_class())?;
    writeln!(writer, "total_sv {}", model.support_vectors().len())?;
    write_list(&mut writer, "rho", model.rho())?;

    if model.svm_type().is_classification() {
        write_list(&mut writer, "label", model.classes())?;
    }
    if let Some(prob_a) = model.prob_a() {
        write_list(&mut writer, "probA", prob_a)?;
    }
    if let Some(prob_b) = model.prob_b() {
        write_list(&mut writer, "probB", prob_b)?;
    }
    if model.svm_type().is_classification() {
        write_list(&mut writer, "nr_sv", model.sv_counts())?;
    }

    writeln!(writer, "SV")?;
    for sv in model.support_vectors() {
        let mut first = true;
        for coefficient in &sv.coefficients {
            if !first {
                write!(writer, " ")?;
            }
            write!(writer, "{}", coefficient)?;
            first = false;
        }
        for (&index, &value) in sv.features.indices.iter().zip(&sv.features.values) {
            write!(writer, " {}:{}", index + 1, value)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::three_class_model;

    const BINARY_MODEL: &str = "\
svm_type c_svc
kernel_type rbf
gamma 0.5
nr_class 2
total_sv 3
rho 0.25
label 1 -1
probA -2.5
probB 0.125
nr_sv 2 1
SV
1 1:0.5 3:-1
0.5 2:1
-1.5 1:-0.5 4:0.25
";

    #[test]
    fn test_read_binary_model() {
        let model = read(BINARY_MODEL.as_bytes()).unwrap();

        assert_eq!(model.svm_type(), SvmType::CSvc);
        assert_eq!(*model.kernel(), Kernel::Rbf { gamma: 0.5 });
        assert_eq!(model.classes(), &[1, -1]);
        assert_eq!(model.sv_counts(), &[2, 1]);
        assert_eq!(model.rho(), &[0.25]);
        assert_eq!(model.prob_a(), Some(&[-2.5][..]));
        assert_eq!(model.input_size(), 4);
        assert_eq!(model.support_vectors()[2].features.indices, vec![0, 3]);
        assert_eq!(model.support_vectors()[2].coefficients, vec![-1.5]);
    }

    #[test]
    fn test_text_round_trip() {
        let model = read(BINARY_MODEL.as_bytes()).unwrap();
        let mut buffer = Vec::new();
        write(&model, &mut buffer).unwrap();

        assert_eq!(String::from_utf8(buffer.clone()).unwrap(), BINARY_MODEL);
        assert_eq!(read(buffer.as_slice()).unwrap(), model);
    }

    #[test]
    fn test_multiclass_round_trip() {
        let model = three_class_model();
        let mut buffer = Vec::new();
        write(&model, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();

        assert!(text.contains("nr_class 3\n"));
        assert!(text.contains("rho 0 0 0\n"));
        assert!(text.contains("\n1 1 1:1\n"));
        assert_eq!(read(buffer.as_slice()).unwrap(), model);
    }

    #[test]
    fn test_header_order_is_free() {
        let reordered = "\
nr_class 2
label 1 -1
kernel_type linear
total_sv 2
nr_sv 1 1
rho 0
svm_type c_svc
SV
1 1:1
-1 1:-1
";
        let model = read(reordered.as_bytes()).unwrap();
        assert_eq!(*model.kernel(), Kernel::Linear);
        assert_eq!(model.input_size(), 1);
    }

    #[test]
    fn test_format_errors() {
        let cases = [
            BINARY_MODEL.replace("c_svc", "c_svm"),
            BINARY_MODEL.replace("kernel_type rbf", "kernel_type precomputed"),
            BINARY_MODEL.replace("gamma 0.5\n", ""),
            BINARY_MODEL.replace("total_sv 3", "total_sv 4"),
            BINARY_MODEL.replace("nr_sv 2 1", "nr_sv 2 2"),
            BINARY_MODEL.replace("rho 0.25", "rho 0.25 0.5"),
            BINARY_MODEL.replace("label 1 -1", "label 1"),
            BINARY_MODEL.replace("1 1:0.5 3:-1", "1 3:0.5 1:-1"),
            BINARY_MODEL.replace("0.5 2:1", "0.5 2-1"),
            BINARY_MODEL.replace("SV\n", ""),
            BINARY_MODEL.replace("gamma 0.5", "gamma 0.5\nweight 3"),
            BINARY_MODEL.replace("probB 0.125\n", ""),
        ];
        for case in &cases {
            assert!(
                matches!(read(case.as_bytes()), Err(SVMError::FormatError(_))),
                "accepted:\n{}",
                case
            );
        }
    }

    #[test]
    fn test_regression_header() {
        let text = "\
svm_type epsilon_svr
kernel_type polynomial
degree 3
gamma 0.25
coef0 1
nr_class 2
total_sv 1
rho -0.5
probA 0.75
SV
2 1:1 2:3
";
        let model = read(text.as_bytes()).unwrap();
        assert_eq!(
            *model.kernel(),
            Kernel::Polynomial {
                degree: 3,
                gamma: 0.25,
                coef0: 1.0
            }
        );
        assert_eq!(model.prob_a(), Some(&[0.75][..]));
        assert!(model.classes().is_empty());

        let mut buffer = Vec::new();
        write(&model, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), text);
    }

    #[test]
    fn test_write_rejects_normalization() {
        let mut model = three_class_model();
        model.set_input_divide(vec![2.0, 1.0]).unwrap();
        assert!(matches!(
            write(&model, Vec::new()),
            Err(SVMError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_a_format_error() {
        let mut header = b"svm_type c_svc\nkernel_type linear\n".to_vec();
        header.extend_from_slice(b"nr_class 2\xff\n");
        assert!(matches!(
            read(header.as_slice()),
            Err(SVMError::FormatError(ref m)) if m.contains("line 3")
        ));

        let mut body = BINARY_MODEL.as_bytes().to_vec();
        body.extend_from_slice(b"0.5 1:\xfe\n");
        assert!(matches!(read(body.as_slice()), Err(SVMError::FormatError(_))));
    }
}
