//! # Runtime Module
//!
//! The object model shared by the dispatcher and its collaborators: the opaque [`Object`]
//! trait, the standard [`List`] and [`Status`] kinds, the [`Codec`] contract with its JSON
//! implementation, and the [`SelfLinker`] identity accessor.

mod accessor;
mod codec;
mod object;

pub use accessor::{MetaSelfLinker, SelfLinker};
pub use codec::{Codec, JsonCodec};
pub use object::{
    List, ListMeta, Object, ObjectMeta, Resource, Status, StatusDetails, StatusPhase,
    StatusReason,
};
