pub mod get_timestamps;

pub use get_timestamps::{GetTimestampsQuery, GetTimestampsResponse};
