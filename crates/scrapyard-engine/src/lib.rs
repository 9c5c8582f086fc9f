//! Wires the proxy pool, container manager, and driver manager behind a
//! per-target plan executor: the scrape coordinator itself.

pub mod cli;
pub mod config;
pub mod connection;
pub mod controller;
pub mod extraction;
pub mod interaction;
pub mod logging;
pub mod ocr;
pub mod target;

pub use cli::{Cli, ConfigFormat};
pub use config::{load_config, run_preflight_checks, LoggingConfig, RunConfig};
pub use connection::Connection;
pub use controller::WebController;
pub use extraction::{Extraction, ExtractionManager, OutputConfig};
pub use interaction::{Interaction, InteractionManager};
pub use ocr::{CropBox, NullOcrEngine, OcrConfig, OcrEngine, OCR_FAILURE};
pub use target::{TargetEngine, TargetPlan};
