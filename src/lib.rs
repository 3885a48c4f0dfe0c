pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod format_columnar;
pub mod format_detect;
pub mod history;
pub mod output;
pub mod query;
pub mod result;
pub mod session;
pub mod transfer;
pub mod verbose;
pub mod view;
