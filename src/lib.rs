//! Bounded, incrementally expandable tree views over arbitrarily large
//! JSON documents.
//!
//! The engine takes a parsed [`serde_json::Value`] plus expansion/search
//! intent and produces a renderable node sequence and structural
//! statistics. It never paints anything and has no I/O of its own; a host
//! layer forwards clicks and keystrokes in and draws the nodes that come
//! out.
//!
//! The pipeline: [`analyze`](analyze::analyze) computes per-document stats
//! once, [`FlattenPolicy`](types::FlattenPolicy) derives caps from them,
//! [`flatten`](flatten::flatten) materializes the visible nodes lazily (a
//! collapsed subtree is never walked), [`search`] finds matches either in
//! the visible sequence or across the whole document, and [`window`] maps a
//! scroll viewport onto the index range the host actually has to realize.
//! Documents that exceed a cap are represented with synthetic
//! truncation/load-more nodes, never with an error: "too big" is a normal,
//! recoverable display state here.

pub mod analyze;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod pointer;
pub mod search;
pub mod session;
pub mod types;
pub mod window;

pub use analyze::analyze;
pub use error::EngineError;
pub use expand::ExpansionState;
pub use flatten::{flatten, FlattenResult};
pub use search::{
    filter_visible, search_full, CancelToken, MatchKind, SearchMatch, SearchOutcome, SearchQuery,
};
pub use session::{DocumentSession, ViewerState};
pub use types::{
    Complexity, FlattenPolicy, LargeContainer, Node, NodeKind, StructureAnalysis,
};
pub use window::{plan, HeightIndex, Viewport, WindowPlan};
