#![deny(unreachable_pub)]

//! Job Dispatcher & Worker Pool (§4.9): decodes newline-delimited jobs from
//! stdin onto a bounded queue, fans them out across a fixed worker pool, and
//! dispatches each job to the per-service adapter, the data-driven HTTP
//! pipeline, or the thumbnail codec depending on its action tag.

mod config;
mod dispatch;
mod error;
mod pool;
mod services;
mod stdin;
mod upload;

pub use config::EngineConfig;
pub use error::EngineError;
pub use pool::run;
pub use services::Services;
pub use stdin::run_stdin_decoder;
