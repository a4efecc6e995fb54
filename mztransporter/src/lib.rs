mod args;
mod driver;
mod proc;
mod write;

pub use driver::{MZTransporter, MZTransporterError};
pub use write::{ReferenceScore, TransportSummary};
