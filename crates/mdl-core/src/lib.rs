pub mod config;
pub mod logging;

pub mod downloader;
pub mod fetch_head;
pub mod http;
pub mod job;
pub mod limiter;
pub mod resolver;
pub mod scheduler;
pub mod url_model;
