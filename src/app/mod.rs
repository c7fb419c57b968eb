pub mod batch;
pub mod ports;
pub mod response;
pub mod submission;

pub use batch::BatchProcessor;
pub use response::TrackId;
pub use submission::SubmissionClient;
