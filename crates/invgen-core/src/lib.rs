//! Core types for program invariant generation.
//!
//! Invariant generators drive an external analysis (a reachability engine or
//! a k-induction engine) and expose what they learned as an
//! [`InvariantSnapshot`]: one boolean-formula view and one expression-tree
//! view over all program locations. This crate holds everything the concrete
//! generators share: locations, the two invariant representations, the
//! generator contract, cooperative shutdown, and the task primitives used to
//! run generation synchronously or on a background thread.

pub mod cfa;
pub mod error;
pub mod expr;
pub mod formula;
pub mod generator;
pub mod location;
pub mod shutdown;
pub mod snapshot;
pub mod stats;
pub mod task;

pub use cfa::{Assumption, CfaEdge, ControlFlow, EdgeKind, EdgeListCfa};
pub use error::{EngineError, EngineResult, GenerationError, GenerationResult};
pub use expr::ExprTree;
pub use formula::Formula;
pub use generator::{Adjustable, GeneratorState, InvariantGenerator, Lifecycle};
pub use location::Location;
pub use shutdown::{ListenerId, ShutdownManager, ShutdownNotifier};
pub use snapshot::{
    ExpressionTreeSupplier, InvariantSnapshot, InvariantSupplier, LocationInvariants,
    TrivialSupplier,
};
pub use stats::{Statistics, StatisticsProvider, Timer};
pub use task::{snapshot_channel, GenerationTask, LatestSnapshot, SnapshotPublisher};
