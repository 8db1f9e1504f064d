//! Domain types shared by the medassist server and client crates.
//!
//! Nothing in here performs I/O. The job lifecycle rules live in
//! [`status`], the persisted shapes in [`analysis`], and the push wire
//! format in [`job_events`].

pub mod analysis;
pub mod error;
pub mod job_events;
pub mod status;
pub mod types;
