mod batch;
mod generation;

pub use batch::{render_report, AttemptResult, BatchGenerator, Step, BATCH_SIZE};
pub use generation::{extract_payload, ImageClient, ImageFetch, ImagePayload, ImageSource};
