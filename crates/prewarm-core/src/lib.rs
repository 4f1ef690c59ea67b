#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data model for prewarm.
//!
//! Three layers:
//! - **Tokens**: 32-bit metadata references (`Token`, `TokenKind`).
//! - **Module description**: the serde model of an input module: type and
//!   method rows, member references, the user-string heap, and portable
//!   method bodies (`Module`, `Op`).
//! - **Boundary**: the `ModuleView` trait the compiler consumes, so the
//!   back end never depends on how a module was produced.
//!
//! The compiler treats methods, types, and strings as opaque identities;
//! everything it needs from them goes through `ModuleView`.

mod frontend;
mod module;
mod target;
mod token;

#[cfg(test)]
mod token_tests;

pub use frontend::ModuleView;
pub use module::{
    Entity, EhKind, EhRegion, MemberRefId, MemberRefRow, MethodId, MethodRow, Module, ModuleError,
    Op, TypeId, TypeRefId, TypeRefRow, TypeRow, TypeSpecId, TypeSpecRow,
};
pub use target::{Arch, Target};
pub use token::{Token, TokenKind};
