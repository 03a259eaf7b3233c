// ── Domain model ──
//
// Typed entities materialized from PI Web API payloads. All of them are
// read-only once built; a point's current value is the one slot that is
// replaced (never mutated) by stream reads.

pub mod datatype;
pub mod point;
pub mod value;
pub mod webapi;

pub use datatype::{DataType, DataTypeFamily};
pub use point::{POINT_ATTRIBUTES, Point};
pub use value::{Payload, VALUE_ATTRIBUTES, Value};
pub use webapi::{SearchResults, WebApi};
