mod http;
mod records;

pub use http::ArchivedResponse;
pub use records::{ParsedWarc, WarcRecord};
