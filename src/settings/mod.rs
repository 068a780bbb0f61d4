//! Device settings records exchanged as fixed-layout byte buffers
//!
//! Records carry no version or header byte: the field order and width of
//! each record is the contract between the two endpoints.

pub mod color;
pub mod data;

pub use color::{ColorSettings, PowerlineFrequency};
pub use data::DataSettings;
