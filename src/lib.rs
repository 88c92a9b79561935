pub mod error;
pub mod feed;
pub mod server;
pub mod timing;

pub const ISO_FORMAT_DATE: &str = "%Y-%m-%d";
