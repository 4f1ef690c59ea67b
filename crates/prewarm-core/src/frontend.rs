//! The boundary the compiler consumes a module through.

use crate::module::{Entity, MethodId, MethodRow, Module};
use crate::token::Token;

/// Read access to one module's metadata and method bodies.
///
/// The back end is written entirely against this trait: identities stay
/// opaque, and only the operations below are available to it. `Module`
/// implements it directly; tests may substitute hand-built modules.
pub trait ModuleView {
    fn module_name(&self) -> &str;

    fn method_count(&self) -> u32;

    fn method_name(&self, id: MethodId) -> &str;

    /// Body, locals, and exception regions of a defined method.
    fn method_row(&self, id: MethodId) -> &MethodRow;

    /// Defining token of a method in this module.
    fn method_token(&self, id: MethodId) -> Token;

    /// True for methods carrying an instantiation context.
    fn method_is_instance(&self, id: MethodId) -> bool;

    fn find_method(&self, name: &str) -> Option<MethodId>;

    fn resolve_token(&self, token: Token) -> Option<Entity>;

    /// True when a type token denotes a shape only the runtime can settle.
    fn is_runtime_determined_type(&self, token: Token) -> bool;

    /// Owning type token of a member reference row.
    fn member_ref_parent(&self, token: Token) -> Option<Token>;

    /// RIDs of all type definitions, ascending.
    fn defined_type_rids(&self) -> Vec<u32>;

    /// User string by 1-based heap id.
    fn user_string(&self, id: u32) -> Option<&str>;
}

impl ModuleView for Module {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn method_count(&self) -> u32 {
        self.methods.len() as u32
    }

    fn method_name(&self, id: MethodId) -> &str {
        &self.method(id).name
    }

    fn method_row(&self, id: MethodId) -> &MethodRow {
        self.method(id)
    }

    fn method_token(&self, id: MethodId) -> Token {
        Module::method_token(self, id)
    }

    fn method_is_instance(&self, id: MethodId) -> bool {
        !self.method(id).instantiation.is_empty()
    }

    fn find_method(&self, name: &str) -> Option<MethodId> {
        self.methods
            .iter()
            .position(|m| m.name == name)
            .map(MethodId::from_index)
    }

    fn resolve_token(&self, token: Token) -> Option<Entity> {
        Module::resolve_token(self, token)
    }

    fn is_runtime_determined_type(&self, token: Token) -> bool {
        matches!(self.resolve_token(token), Some(Entity::TypeSpec(_)))
    }

    fn member_ref_parent(&self, token: Token) -> Option<Token> {
        match self.resolve_token(token)? {
            Entity::MemberRef(id) => Some(self.member_ref(id).parent),
            _ => None,
        }
    }

    fn defined_type_rids(&self) -> Vec<u32> {
        (1..=self.types.len() as u32).collect()
    }

    fn user_string(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.strings.get((id - 1) as usize).map(String::as_str)
    }
}
