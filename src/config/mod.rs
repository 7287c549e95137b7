//! Configuration module for Daesa.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexStoreSettings, IngestSettings, RetrievalSettings,
    SegmentingSettings, ServerSettings, Settings, TaskSettings,
};
