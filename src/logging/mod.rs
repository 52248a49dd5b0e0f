pub mod action_log;
pub mod runtime_logger;

pub use action_log::ActionRecord;
pub use runtime_logger::ActionJournal;
