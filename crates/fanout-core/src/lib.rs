pub mod config;
pub mod logging;

pub mod batch;
pub mod observe;
pub mod paginate;
pub mod retry;
pub mod runner;
