//! Geteilte Typen für layer-übergreifende Verträge.

pub mod options;

pub use options::DEFAULT_LAG;
pub use options::StrokerOptions;
