//! `recall-memory` – The Memory Stores.
//!
//! The three stores an agent reasons with, plus the file layer that keeps the
//! durable one alive across restarts.
//!
//! # Modules
//!
//! - [`scratch`] – [`ScratchCache`][scratch::ScratchCache]: a bounded FIFO of
//!   short notes; oldest entries are evicted first and nothing is persisted.
//! - [`graph`] – [`MemoryGraph`][graph::MemoryGraph]: an id-keyed arena of
//!   text memories linked by plain id associations.  Writes are validated
//!   all-or-nothing, deletes cascade through every association list, and
//!   recall walks associations breadth-first up to
//!   [`MAX_TRAVERSAL_DEPTH`][graph::MAX_TRAVERSAL_DEPTH] hops.
//! - [`thought`] – [`ThoughtTracker`][thought::ThoughtTracker]: reasoning
//!   chains, branches and per-thought confidence, with the session-wide
//!   cognitive mode carried in an explicit
//!   [`ThinkingSession`][thought::ThinkingSession].
//! - [`persistence`] – [`PersistenceManager`][persistence::PersistenceManager]:
//!   JSON snapshots of the graph with a single-generation backup, an advisory
//!   lock file and a recurring auto-save timer.

pub mod graph;
pub mod persistence;
pub mod scratch;
pub mod thought;
