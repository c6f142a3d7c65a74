pub mod export;
pub mod heatmap;
pub mod profiles;
pub mod reconcile;
pub mod sms;
pub mod stats;
pub mod stops;
pub mod templates;
pub mod trips;
