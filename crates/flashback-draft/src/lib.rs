// Draft client: turn scheduling, autopick, and session orchestration.

pub mod autopick;
pub mod scheduler;
pub mod session;
