mod generator;
mod handlers;
mod server;
#[cfg(test)]
mod tests;

pub use generator::{frame_part, frame_stream, next_frame, StreamSettings, MJPEG_CONTENT_TYPE};
pub use handlers::{CaptureRequest, CaptureResponse};
pub use server::{build_router, AppState, HttpServer};
