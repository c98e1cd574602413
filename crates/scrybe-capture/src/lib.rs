//! Capture daemons and the ingestion pipeline for the scrybe personal
//! knowledge engine: screen (C5), clipboard (C6), and filesystem (C7)
//! observation producers, and the single consumer (C8) that privacy-filters,
//! persists, and mirrors what they see into `scrybe-core`'s storage layer.

pub mod active_window;
pub mod clipboard;
pub mod events;
pub mod filesystem;
pub mod ingestion;
pub mod observation;
pub mod screen;

pub use clipboard::ClipboardDaemon;
pub use events::{ContentCapturedEvent, EventBus};
pub use filesystem::FilesystemDaemon;
pub use ingestion::IngestionPipeline;
pub use observation::{
    observation_channel, LossySender, Observation, ObservationReceiver, ObservationSender,
};
pub use screen::{list_monitors, MonitorInfo, ScreenDaemon};
