//! Realm Sync
//!
//! Client-side decoding of the 1.12 game-server protocol plus a concurrent
//! mirror of the world state it describes.
//!
//! ## Architecture
//!
//! ```text
//! ConnectionAgent  (connection.rs)  ← frames in, commands out
//!   └── MirrorService  (service.rs) ← decode, enqueue, tick
//!         ├── OpcodeTable  (dispatch.rs) → decode/*  (pure decoders)
//!         ├── EntityStore  (store.rs)    ← UpdateQueue (queue.rs)
//!         └── EventNotifier (notifier.rs)
//! Workflow  (workflow.rs)               ← cancellable send/wait steps
//! ```
//!
//! Decoders describe changes as [`MutationBatch`]es; only the store applies
//! them.  Readers take `Arc<Entity>` snapshots and never block the applier
//! for longer than a single batch.

// Protocol, decoding and the mirror are always available.
pub mod decode;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod events;
pub mod guid;
pub mod movement;
pub mod mutation;
pub mod notifier;
pub mod opcodes;
pub mod protocol;
pub mod queue;
pub mod service;
pub mod store;
pub mod types;
pub mod wire;

// Runtime pieces require the `client` feature.
#[cfg(feature = "client")]
pub mod connection;
#[cfg(feature = "client")]
pub mod workflow;

#[cfg(feature = "client")]
pub use connection::{
    CancelToken, ConnectionAgent, ConnectionConfig, Frame, FrameReader, OutboundSender, SendError,
};
#[cfg(feature = "client")]
pub use workflow::{Step, Workflow, WorkflowError};

pub use decode::{DecodeContext, Decoded};
pub use dispatch::{Dispatch, OpcodeTable};
pub use entity::{Entity, EntityKind, ObjectType};
pub use error::{DecodeError, Diagnostic, DiagnosticKind, MessageError};
pub use events::GameEvent;
pub use guid::{decode_packed, encode_packed, write_packed, Guid, HighGuid, PackedGuid};
pub use mutation::{FieldChange, MutationBatch, MutationOp, PendingMutation};
pub use notifier::{EventNotifier, Notification, SubscriptionId};
pub use protocol::{Command, FrameError};
pub use service::{FrameOutcome, MirrorService, TickReport};
pub use store::{ApplyReport, EntityStore, LocalProfile};
pub use types::{ApplyMode, MirrorConfig, MirrorStats, Position};
