//! Language-agnostic object model shared by all emitters.
//!
//! A [`Device`] owns its packets, constant groups and examples. Every emitter
//! traverses the same validated model, so names, function IDs and constant
//! values cannot drift between languages.

pub mod common_packets;
pub mod constant;
pub mod device;
pub mod element;
pub mod example;
pub mod name;
pub mod packet;

pub use constant::{Constant, ConstantGroup, ConstantValue};
pub use device::{Category, Device};
pub use element::{Cardinality, Direction, Element, ElementType};
pub use example::{Example, ExampleArg, ExampleFunction, ExampleValue, Threshold};
pub use name::Name;
pub use packet::{Doc, DocKind, Packet, PacketType, Stream, StreamDirection, StreamRoles};
