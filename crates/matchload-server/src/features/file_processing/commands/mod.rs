pub mod process_file;

pub use process_file::ProcessFileCommand;
