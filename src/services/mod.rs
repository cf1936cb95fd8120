pub mod cache;
pub mod export;
pub mod history;
pub mod llm;
pub mod persistence;
pub mod remote;
pub mod scheduler;
pub mod session;
