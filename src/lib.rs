pub mod google;
pub mod session;
pub mod storage;

pub use google::api::CalendarEntry;
pub use session::{SessionError, SessionManager};
pub use storage::config::Config;
