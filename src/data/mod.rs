//! Data loading for libsvm format files
//!
//! [`SampleSet`] parses a whole file into memory; [`DataFile`] streams
//! records from disk one at a time.

pub mod file;
pub mod libsvm;

pub use self::file::DataFile;
pub use self::libsvm::SampleSet;
