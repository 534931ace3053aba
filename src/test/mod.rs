mod chat;
mod progress;
mod sessions;
mod utils;
mod workflow;

pub use utils::{test_db, test_utils};
