mod transport;
mod worker;

pub use transport::{HttpTransport, TransportResponse, UploadTransport};
pub use worker::{parse_egg_count, upload_sample, upload_with_retry, UploadOutcome, UploadPolicy};
