//! Background stream gobbling
//!
//! A gobbler is the single producer for one stream: a background task
//! that continuously drains the source (a running process's output) into
//! the disk cache and wakes pending reads after every append. It
//! terminates on end of stream or on the first I/O failure, recording the
//! failure as the reader's sticky fault.

pub mod core;

pub use core::StreamGobbler;
