//! Error conversions into [`thermowatch_domain::ThermowatchError`]

pub mod conversions;

pub use conversions::InfraError;
