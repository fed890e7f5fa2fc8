//! OCR scan pipeline
//!
//! Launches bulk OCR jobs over the images in a bucket, tracks each job in a
//! status table, turns finished OCR output into plain text and, once no job of
//! the batch is still running, submits a single sensitive-data classification
//! scan covering everything that finished since the previous scan.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
