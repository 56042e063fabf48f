//! Domain types and pure logic for the video intelligence backend.
//!
//! Nothing in this crate performs I/O. Persistence lives in `vidintel-db`,
//! orchestration in `vidintel-pipeline`.

pub mod analysis;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod retry;
pub mod types;
