pub mod batch;
pub mod collapse;
pub mod diagram;
pub mod dispatch;
pub mod distance;
pub mod engine;
mod error;
pub mod metric;
pub mod normalize;
pub mod pipeline;
pub mod sampling;

pub use batch::compute_persistence_batch;
pub use diagram::{PersistenceDiagram, RipsResult};
pub use distance::{PointSet, SparseInput};
pub use error::{Result, RipsError};
pub use metric::Metric;
pub use pipeline::{compute_persistence, Rips, RipsBuilder, RipsParams};
