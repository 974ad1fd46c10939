pub mod feedbacks;

pub use feedbacks::{FeedbackRepository, RECENT_FEEDBACK_LIMIT};
