//! Instruction classification.
//!
//! The scanner turns each instruction of a method body into at most one
//! resolution obligation: a direct call into code this image places, or
//! an import cell in one of the standard sections. Classification is
//! pure and deterministic; the factory runs it once while marking a
//! method and again while encoding its code, and both passes must agree.

use indexmap::IndexSet;
use prewarm_core::{Entity, MethodId, ModuleView, Op, Token};
use prewarm_image::fixups::FixupKind;

use crate::ScanFailure;
use crate::nodes::imports::StandardSection;
use crate::nodes::signature::SignatureDesc;
use crate::policy::Policies;

/// One resolution obligation of a single instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Need {
    /// Direct call into a body compiled in this image.
    LocalCall(MethodId),
    /// A loader-patched cell in the named section.
    Import {
        section: StandardSection,
        desc: SignatureDesc,
    },
}

/// Classifies instructions against one module and one placement state.
pub struct Scanner<'a> {
    pub module: &'a dyn ModuleView,
    pub policies: &'a Policies,
    /// Methods the current session refuses to place locally; calls to them
    /// degrade to entry-point imports.
    pub excluded: &'a IndexSet<MethodId>,
}

impl Scanner<'_> {
    /// Every obligation of `method`, in instruction order. Fails on the
    /// first one this compiler cannot express ahead of time.
    pub fn method_needs(&self, method: MethodId) -> Result<Vec<Need>, ScanFailure> {
        let row = self.module.method_row(method);
        if !row.instantiation.is_empty() {
            let entries = self
                .policies
                .dictionary_layout
                .entry_count(self.module, method);
            if entries > 0 {
                return Err(ScanFailure::DictionaryRequired { entries });
            }
        }
        let mut needs = Vec::new();
        for op in &row.body {
            if let Some(need) = self.op_need(op)? {
                needs.push(need);
            }
        }
        Ok(needs)
    }

    /// The obligation of one instruction, if it has one.
    pub fn op_need(&self, op: &Op) -> Result<Option<Need>, ScanFailure> {
        match *op {
            Op::Call { target } => self.direct_call(target).map(Some),
            Op::CallVirtual { target } => self.virtual_call(target).map(Some),
            Op::NewObject { ty } => self.type_import(FixupKind::NewObject, ty).map(Some),
            Op::NewArray { element } => self.type_import(FixupKind::NewArray, element).map(Some),
            Op::IsInstance { ty } => self.type_import(FixupKind::IsInstanceOf, ty).map(Some),
            Op::CastClass { ty } => self.type_import(FixupKind::ChkCast, ty).map(Some),
            Op::StaticBase { ty, gc } => {
                let kind = if gc {
                    FixupKind::StaticBaseGc
                } else {
                    FixupKind::StaticBaseNonGc
                };
                self.type_import(kind, ty).map(Some)
            }
            Op::ThreadStaticBase { ty, gc } => {
                let kind = if gc {
                    FixupKind::ThreadStaticBaseGc
                } else {
                    FixupKind::ThreadStaticBaseNonGc
                };
                self.type_import(kind, ty).map(Some)
            }
            Op::LoadTypeHandle { ty } => self.type_import(FixupKind::TypeHandle, ty).map(Some),
            Op::LoadString { id } => self.string_load(id).map(Some),
            Op::LoadConst { .. } | Op::Ret => Ok(None),
        }
    }

    fn direct_call(&self, target: Token) -> Result<Need, ScanFailure> {
        match self.module.resolve_token(target) {
            Some(Entity::MethodDef(method)) => Ok(self.entry_of(method, target)),
            Some(Entity::MemberRef(_)) => Ok(method_import(FixupKind::MethodEntryRefToken, target)),
            _ => Err(ScanFailure::UnresolvedToken(target)),
        }
    }

    fn virtual_call(&self, target: Token) -> Result<Need, ScanFailure> {
        if let Some(exact) = self.policies.devirtualizer.devirtualize(self.module, target) {
            let token = self.module.method_token(exact);
            return Ok(self.entry_of(exact, token));
        }
        match self.module.resolve_token(target) {
            Some(Entity::MemberRef(_)) => {
                if let Some(slot) = self.policies.vtable_slots.slot_of(self.module, target) {
                    let Some(owner) = self.module.member_ref_parent(target) else {
                        return Err(ScanFailure::UnresolvedToken(target));
                    };
                    return Ok(Need::Import {
                        section: StandardSection::Method,
                        desc: SignatureDesc::VirtualSlot { owner, slot },
                    });
                }
                Ok(method_import(FixupKind::VirtualEntryRefToken, target))
            }
            // The devirtualizer declined a defined target; the entry-point
            // cell still dispatches correctly once patched.
            Some(Entity::MethodDef(method)) => {
                let token = self.module.method_token(method);
                Ok(self.entry_of(method, token))
            }
            _ => Err(ScanFailure::UnresolvedToken(target)),
        }
    }

    /// Direct entry to a defined method: local when this session places its
    /// body, an entry-point import otherwise.
    fn entry_of(&self, method: MethodId, token: Token) -> Need {
        let placed = self.policies.placement.places_locally(self.module, method)
            && !self.excluded.contains(&method);
        if placed {
            Need::LocalCall(method)
        } else {
            method_import(FixupKind::MethodEntryDefToken, token)
        }
    }

    fn type_import(&self, kind: FixupKind, ty: Token) -> Result<Need, ScanFailure> {
        if self.module.resolve_token(ty).is_none() {
            return Err(ScanFailure::UnresolvedToken(ty));
        }
        if self.module.is_runtime_determined_type(ty) {
            return Err(ScanFailure::RuntimeDeterminedShape(ty));
        }
        Ok(Need::Import {
            section: StandardSection::Helper,
            desc: SignatureDesc::Type { kind, token: ty },
        })
    }

    fn string_load(&self, id: u32) -> Result<Need, ScanFailure> {
        if self.module.user_string(id).is_none() {
            return Err(ScanFailure::MissingString(id));
        }
        Ok(Need::Import {
            section: StandardSection::String,
            desc: SignatureDesc::StringHandle { rid: id },
        })
    }
}

fn method_import(kind: FixupKind, token: Token) -> Need {
    Need::Import {
        section: StandardSection::Method,
        desc: SignatureDesc::Method { kind, token },
    }
}
