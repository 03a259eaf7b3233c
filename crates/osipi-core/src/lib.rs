// osipi-core: typed entities, materialization and change subscriptions
// on top of the osipi-api session wrapper.

pub mod config;
pub mod error;
pub mod materialize;
pub mod model;
pub mod session;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AuthCredentials, ConnectionConfig, TlsVerification};
pub use error::CoreError;
pub use materialize::{
    Attributes, Generic, Materialized, Resource, Shape, ShapeEntry, ShapeRegistry,
};
pub use session::{Session, connect, connect_with};
pub use stream::{
    BoundaryType, InterpolatedQuery, PlotQuery, RecordedQuery, StreamArgs, StreamKind,
    UpdateOption,
};
pub use subscription::{Callback, SubscriptionId, SubscriptionManager, Subscriptions};

pub use model::{
    DataType, DataTypeFamily, POINT_ATTRIBUTES, Payload, Point, SearchResults, VALUE_ATTRIBUTES,
    Value, WebApi,
};

// Transport-level types callers need alongside the core API.
pub use osipi_api::{Links, Params};
