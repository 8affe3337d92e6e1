//! Validation Rules
//!
//! Each file in this module contains one concern:
//!
//! - `envelope_shape.rs` - Version and message list must be present
//! - `message_role.rs` - Every message needs a role
//! - `termination.rs` - Termination markers belong to assistant messages
//! - `content_type.rs` - Declared content types and the content they carry
//! - `assistant_channel.rs` - Assistant messages need a channel

mod assistant_channel;
mod content_type;
mod envelope_shape;
mod message_role;
mod termination;

pub use assistant_channel::AssistantChannelRule;
pub use content_type::ContentTypeRule;
pub use envelope_shape::EnvelopeShapeRule;
pub use message_role::MessageRoleRule;
pub use termination::{SingleTerminationRule, TerminationRoleRule};
