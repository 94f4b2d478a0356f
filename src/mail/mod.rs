pub mod driver;
pub mod gmail;
pub mod search;
pub mod types;

pub use driver::MailDriver;
pub use gmail::GmailDriver;
pub use search::{SearchOptions, search_threads};
pub use types::{Folder, OutgoingMessage, ThreadFlags, ThreadSummary, address_of};
