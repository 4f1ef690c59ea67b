//! Pluggable compilation policies.
//!
//! Each seam answers one question the scanner asks about a method or call
//! site. The defaults describe a single self-contained module: every
//! defined body is compiled here, virtual calls on `MethodDef` tokens are
//! exact, v-table slots stay unassigned, and no method needs a generic
//! dictionary.

use std::rc::Rc;

use prewarm_core::{Entity, MethodId, ModuleView, Token};

/// Is a method's body compiled into this image, or imported?
pub trait MethodPlacement {
    fn places_locally(&self, module: &dyn ModuleView, method: MethodId) -> bool;
}

/// Compiles every method the module defines.
pub struct SingleModulePlacement;

impl MethodPlacement for SingleModulePlacement {
    fn places_locally(&self, _module: &dyn ModuleView, _method: MethodId) -> bool {
        true
    }
}

/// May rewrite a virtual call into a direct one.
pub trait Devirtualizer {
    fn devirtualize(&self, module: &dyn ModuleView, target: Token) -> Option<MethodId>;
}

/// A virtual call on a defined method has exactly one implementation in a
/// single-module world; references stay virtual.
pub struct DefaultDevirtualizer;

impl Devirtualizer for DefaultDevirtualizer {
    fn devirtualize(&self, module: &dyn ModuleView, target: Token) -> Option<MethodId> {
        match module.resolve_token(target)? {
            Entity::MethodDef(method) => Some(method),
            _ => None,
        }
    }
}

/// May pin a virtual method to a stable v-table slot number.
pub trait VtableSlotProvider {
    fn slot_of(&self, module: &dyn ModuleView, target: Token) -> Option<u32>;
}

/// Leaves slot assignment to the loader.
pub struct LazyVtableSlots;

impl VtableSlotProvider for LazyVtableSlots {
    fn slot_of(&self, _module: &dyn ModuleView, _target: Token) -> Option<u32> {
        None
    }
}

/// Reserved seam for generic-dictionary layout.
pub trait DictionaryLayoutProvider {
    /// Number of dictionary entries the method would need at run time.
    fn entry_count(&self, module: &dyn ModuleView, method: MethodId) -> u32;
}

/// No method needs a dictionary.
pub struct EmptyDictionaryLayout;

impl DictionaryLayoutProvider for EmptyDictionaryLayout {
    fn entry_count(&self, _module: &dyn ModuleView, _method: MethodId) -> u32 {
        0
    }
}

/// The full policy bundle a factory is constructed with. Cloning shares the
/// policy objects; caches stay per-session.
#[derive(Clone)]
pub struct Policies {
    pub placement: Rc<dyn MethodPlacement>,
    pub devirtualizer: Rc<dyn Devirtualizer>,
    pub vtable_slots: Rc<dyn VtableSlotProvider>,
    pub dictionary_layout: Rc<dyn DictionaryLayoutProvider>,
}

impl Default for Policies {
    fn default() -> Policies {
        Policies {
            placement: Rc::new(SingleModulePlacement),
            devirtualizer: Rc::new(DefaultDevirtualizer),
            vtable_slots: Rc::new(LazyVtableSlots),
            dictionary_layout: Rc::new(EmptyDictionaryLayout),
        }
    }
}
