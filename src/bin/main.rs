//! svmlearn Command Line Interface
//!
//! Trains models from libsvm data files, predicts with text or container
//! models, prints model summaries and converts between model formats.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use svmlearn::core::{Result, SVMError};
use svmlearn::persistence::{self, ModelFormat};
use svmlearn::{DataFile, EvaluationMetrics, Kernel, Machine, SampleSet, SvmType, Trainer};

#[derive(Parser)]
#[command(name = "svmlearn")]
#[command(about = "Support Vector Machine training and prediction with libsvm compatible files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new SVM model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
    /// Convert a model between the text and container formats
    Convert(ConvertArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

impl From<CliSvmType> for SvmType {
    fn from(cli_type: CliSvmType) -> Self {
        match cli_type {
            CliSvmType::CSvc => SvmType::CSvc,
            CliSvmType::NuSvc => SvmType::NuSvc,
            CliSvmType::OneClass => SvmType::OneClass,
            CliSvmType::EpsilonSvr => SvmType::EpsilonSvr,
            CliSvmType::NuSvr => SvmType::NuSvr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliModelFormat {
    /// libsvm text model
    Text,
    /// JSON container
    Json,
}

impl From<CliModelFormat> for ModelFormat {
    fn from(cli_format: CliModelFormat) -> Self {
        match cli_format {
            CliModelFormat::Text => ModelFormat::Text,
            CliModelFormat::Json => ModelFormat::Container,
        }
    }
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file (`.json` selects the container format)
    #[arg(short, long)]
    output: PathBuf,

    /// SVM formulation
    #[arg(short = 's', long, default_value = "c-svc")]
    svm_type: CliSvmType,

    /// Kernel function
    #[arg(short = 't', long, default_value = "rbf")]
    kernel: CliKernelType,

    /// Degree of the polynomial kernel
    #[arg(long, default_value = "3")]
    degree: i32,

    /// Kernel gamma (0 means 1/number of features)
    #[arg(short, long, default_value = "0")]
    gamma: f64,

    /// Kernel coef0
    #[arg(long, default_value = "0")]
    coef0: f64,

    /// Regularization parameter C
    #[arg(short = 'C', long, default_value = "1.0")]
    c: f64,

    /// nu of nu-SVC, one-class SVM and nu-SVR
    #[arg(short, long, default_value = "0.5")]
    nu: f64,

    /// Epsilon in the loss function of epsilon-SVR
    #[arg(short = 'p', long, default_value = "0.1")]
    epsilon_loss: f64,

    /// Kernel cache size in MB
    #[arg(long, default_value = "100")]
    cache_size: f64,

    /// Tolerance of the termination criterion
    #[arg(short = 'e', long, default_value = "0.001")]
    tolerance: f64,

    /// Disable the shrinking heuristic
    #[arg(long)]
    no_shrinking: bool,

    /// Fit probability estimates
    #[arg(short = 'b', long)]
    probability: bool,

    /// Class weight as LABEL:WEIGHT (multiplies C for that class)
    #[arg(short, long = "weight", value_parser = parse_weight, allow_hyphen_values = true)]
    weights: Vec<(i32, f64)>,

    /// Maximum solver iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Seed of the probability cross-validation shuffle
    #[arg(long, default_value = "1")]
    seed: u64,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output probability estimates
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input model file
    input: PathBuf,

    /// Output model file
    output: PathBuf,

    /// Output format (defaults to the output file extension)
    #[arg(short, long)]
    format: Option<CliModelFormat>,
}

fn parse_weight(value: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = value
        .split_once(':')
        .ok_or_else(|| format!("expected LABEL:WEIGHT, got {value}"))?;
    let label = label
        .parse::<i32>()
        .map_err(|_| format!("invalid class label: {label}"))?;
    let weight = weight
        .parse::<f64>()
        .map_err(|_| format!("invalid weight: {weight}"))?;
    Ok((label, weight))
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
        Commands::Convert(args) => convert_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn build_trainer(args: &TrainArgs) -> Trainer {
    let kernel = match args.kernel {
        CliKernelType::Linear => Kernel::Linear,
        CliKernelType::Polynomial => Kernel::Polynomial {
            degree: args.degree,
            gamma: args.gamma,
            coef0: args.coef0,
        },
        CliKernelType::Rbf => Kernel::Rbf { gamma: args.gamma },
        CliKernelType::Sigmoid => Kernel::Sigmoid {
            gamma: args.gamma,
            coef0: args.coef0,
        },
    };

    let mut trainer = Trainer::new()
        .with_svm_type(args.svm_type.into())
        .with_kernel(kernel)
        .with_c(args.c)
        .with_nu(args.nu)
        .with_epsilon_loss(args.epsilon_loss)
        .with_cache_size(args.cache_size)
        .with_tolerance(args.tolerance)
        .with_shrinking(!args.no_shrinking)
        .with_probability(args.probability)
        .with_seed(args.seed);

    for &(label, weight) in &args.weights {
        trainer = trainer.with_class_weight(label, weight);
    }
    if let Some(max_iterations) = args.max_iterations {
        trainer = trainer.with_max_iterations(max_iterations);
    }
    trainer
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let samples = SampleSet::load(&args.data)?;
    info!(
        "Loaded {} samples with {} dimensions",
        samples.len(),
        samples.shape()
    );

    let trainer = build_trainer(&args);
    let machine = Machine::new(trainer.train_samples(&samples)?);
    info!("Training completed successfully");

    machine.save(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    // Quick evaluation on training data
    let metrics = machine.evaluate(&samples)?;
    info!("Training set: {metrics}");

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let machine = Machine::load(&args.model)?;
    let (width, _) = machine.shape();

    if args.probability && !machine.supports_probability() {
        return Err(SVMError::UnsupportedOperation(
            "model does not support probability estimates".to_string(),
        ));
    }

    let mut data = DataFile::open(&args.data)?;
    info!(
        "Predicting {} samples from {:?}",
        data.samples(),
        data.filename()
    );

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    if args.probability {
        write!(writer, "labels")?;
        for label in machine.classes() {
            write!(writer, " {label}")?;
        }
        writeln!(writer)?;
    }

    let mut predicted = Vec::with_capacity(data.samples());
    let mut expected = Vec::with_capacity(data.samples());
    while let Some((target, features)) = data.read_sparse()? {
        let row = features.to_dense(width);
        let label = if args.probability {
            let prediction = machine.predict_class_and_probabilities(&row)?;
            write!(writer, "{}", prediction.label)?;
            for p in &prediction.probabilities {
                write!(writer, " {p}")?;
            }
            writeln!(writer)?;
            prediction.label
        } else {
            let label = machine.predict_class(&row)?;
            writeln!(writer, "{label}")?;
            label
        };
        predicted.push(label);
        expected.push(target);
    }
    writer.flush()?;

    let metrics = if machine.svm_type().is_regression() {
        EvaluationMetrics::regression(&predicted, &expected)
    } else {
        EvaluationMetrics::classification(&predicted, &expected)
    };
    if args.output.is_some() {
        println!("{metrics}");
    } else {
        eprintln!("{metrics}");
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let machine = Machine::load(&args.model)?;
    let model = machine.model();
    let (input_size, output_size) = machine.shape();

    println!("=== Model Summary ===");
    println!("  SVM type:          {}", machine.svm_type());
    println!("  Kernel:            {}", machine.kernel().name());
    if let Some(degree) = machine.degree() {
        println!("  Degree:            {degree}");
    }
    if let Some(gamma) = machine.gamma() {
        println!("  Gamma:             {gamma}");
    }
    if let Some(coef0) = machine.coef0() {
        println!("  Coef0:             {coef0}");
    }
    println!("  Input size:        {input_size}");
    println!("  Decision values:   {output_size}");
    if !machine.classes().is_empty() {
        println!("  Classes:           {:?}", machine.classes());
        println!("  SVs per class:     {:?}", model.sv_counts());
    }
    println!("  Support vectors:   {}", model.support_vectors().len());
    println!("  Probability:       {}", machine.supports_probability());
    println!(
        "  Normalization:     {}",
        if model.has_identity_normalization() {
            "none"
        } else {
            "custom"
        }
    );

    Ok(())
}

fn convert_command(args: ConvertArgs) -> Result<()> {
    let model = persistence::load(&args.input)?;
    let format = args
        .format
        .map(ModelFormat::from)
        .unwrap_or_else(|| ModelFormat::from_path(&args.output));
    persistence::save_as(&model, &args.output, format)?;
    info!("Converted {:?} to {:?} ({:?})", args.input, args.output, format);
    Ok(())
}
