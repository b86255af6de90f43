pub mod error;
pub mod http;
pub mod openai;
pub mod pagespeed;
pub mod redis;
pub mod retry;
pub mod serp;
