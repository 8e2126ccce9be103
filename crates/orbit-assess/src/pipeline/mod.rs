//! Assessment pipeline, leaves first: records and quality, interpretation,
//! catalog and fitter adapters, the per-designation engine and the batch runner.

pub mod batch;
pub mod catalog;
pub mod engine;
pub mod fitter;
pub mod interpret;
pub mod quality;
pub mod record;
