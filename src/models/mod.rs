pub mod feedback;
pub mod session;

pub use feedback::{FeedbackAck, FeedbackSample, TelemetrySnapshot};
pub use session::{IamSession, Role, SessionProgress, Stage, User};
