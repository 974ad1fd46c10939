pub mod feedback_record;

pub use feedback_record::FeedbackRecord;
