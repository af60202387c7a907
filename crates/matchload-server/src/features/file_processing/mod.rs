pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::ProcessFileCommand;
pub use queries::{GetTimestampsQuery, GetTimestampsResponse};
pub use routes::file_processing_routes;
