pub mod emitter;

pub use emitter::{Emitter, Mode};

/// Mapping-construction template passed through verbatim into the emitted
/// output, ahead of the generated factory function. Overridable from the
/// driver with `-t`.
pub const MAPPING_TEMPLATE: &str = include_str!("../../templates/mapping.cpp");
