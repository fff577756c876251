//! Persistence for Tickward.
//!
//! The simulation thread never waits on storage. Instead it hands a
//! [`Query`] to the [`QueryGateway`], which runs it on a worker pool and
//! queues the result. Once per tick the engine calls
//! [`QueryGateway::drain`], and every finished query's continuation runs
//! right there, on the tick thread, with mutable access to the world.
//!
//! ```text
//! tick thread ──submit──► dispatcher ──► workers (Backend::execute)
//!      ▲                                      │
//!      └──────────── drain (per tick) ◄───────┘
//! ```
//!
//! A continuation issued on behalf of a client slot carries a
//! [`SlotTicket`](tickward_protocol::SlotTicket). If the slot was
//! disconnected or reused in the meantime, the continuation is dropped
//! instead of touching whoever owns the slot now.

mod backend;
mod error;
mod gateway;
mod query;
mod result;

pub use backend::{Backend, MemoryBackend};
pub use error::PersistError;
pub use gateway::{
    Completion, CompletionContext, GatewayConfig, Issuer, QueryGateway, QueryQueue, QueryResult,
};
pub use query::{Predicate, Query, QueryKind, Row, Value};
pub use result::ResultSet;
