//! Input module description.
//!
//! A module is the unit of compilation: named type and method rows, external
//! references (type refs, member refs, type specs), a user-string heap, and
//! one portable body per method. The description is authored as JSON; row
//! order defines RIDs (row `i` has RID `i + 1`).

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("module is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("module has no name")]
    UnnamedModule,
    #[error("duplicate method name `{0}`")]
    DuplicateMethod(String),
    #[error("method `{method}`: exception region {index} is out of bounds")]
    InvalidExceptionRegion { method: String, index: usize },
}

macro_rules! row_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn from_index(index: usize) -> $name {
                $name(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// 1-based row id of this entry.
            pub fn rid(self) -> u32 {
                self.0 + 1
            }
        }
    };
}

row_id!(
    /// Index of a method definition row.
    MethodId
);
row_id!(
    /// Index of a type definition row.
    TypeId
);
row_id!(
    /// Index of a type reference row.
    TypeRefId
);
row_id!(
    /// Index of a member reference row.
    MemberRefId
);
row_id!(
    /// Index of a type specification row.
    TypeSpecId
);

/// What a resolved token denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    MethodDef(MethodId),
    TypeDef(TypeId),
    TypeRef(TypeRefId),
    MemberRef(MemberRefId),
    TypeSpec(TypeSpecId),
    /// 1-based id into the user-string heap.
    UserString(u32),
}

/// One portable instruction. The set is deliberately small: each variant maps
/// onto one resolution obligation the produced image must express.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Call { target: Token },
    CallVirtual { target: Token },
    NewObject { ty: Token },
    NewArray { element: Token },
    LoadString { id: u32 },
    StaticBase { ty: Token, gc: bool },
    ThreadStaticBase { ty: Token, gc: bool },
    IsInstance { ty: Token },
    CastClass { ty: Token },
    LoadTypeHandle { ty: Token },
    LoadConst { value: i32 },
    Ret,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EhKind {
    Catch,
    Finally,
}

/// Protected region of a method body, measured in instruction indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EhRegion {
    pub start: u32,
    pub len: u32,
    pub handler: u32,
    pub kind: EhKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeRow {
    pub name: String,
    #[serde(default)]
    pub base: Option<Token>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeRefRow {
    pub name: String,
}

/// Constructed type shape, e.g. an array of a generic parameter. Always
/// treated as runtime-determined by the back end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeSpecRow {
    pub shape: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberRefRow {
    pub name: String,
    pub parent: Token,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodRow {
    pub name: String,
    #[serde(default)]
    pub locals: u32,
    /// Nominal type arguments; non-empty marks an instantiated method.
    #[serde(default)]
    pub instantiation: Vec<String>,
    #[serde(default)]
    pub body: Vec<Op>,
    #[serde(default)]
    pub exception_regions: Vec<EhRegion>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeRow>,
    #[serde(default)]
    pub methods: Vec<MethodRow>,
    #[serde(default)]
    pub type_refs: Vec<TypeRefRow>,
    #[serde(default)]
    pub member_refs: Vec<MemberRefRow>,
    #[serde(default)]
    pub type_specs: Vec<TypeSpecRow>,
    #[serde(default)]
    pub strings: Vec<String>,
}

impl Module {
    /// Parse and validate a module from JSON text.
    pub fn from_json(json: &str) -> Result<Module, ModuleError> {
        let module: Module = serde_json::from_str(json)?;
        module.validate()?;
        Ok(module)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Module, ModuleError> {
        let module: Module = serde_json::from_slice(bytes)?;
        module.validate()?;
        Ok(module)
    }

    /// Load a module description from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Module, ModuleError> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and dropped before return.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    fn validate(&self) -> Result<(), ModuleError> {
        if self.name.is_empty() {
            return Err(ModuleError::UnnamedModule);
        }
        let mut seen = std::collections::HashSet::new();
        for method in &self.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(ModuleError::DuplicateMethod(method.name.clone()));
            }
            let len = method.body.len() as u32;
            for (index, region) in method.exception_regions.iter().enumerate() {
                let end = region.start.saturating_add(region.len);
                if end > len || region.handler >= len.max(1) {
                    return Err(ModuleError::InvalidExceptionRegion {
                        method: method.name.clone(),
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn method(&self, id: MethodId) -> &MethodRow {
        &self.methods[id.index()]
    }

    pub fn type_row(&self, id: TypeId) -> &TypeRow {
        &self.types[id.index()]
    }

    pub fn member_ref(&self, id: MemberRefId) -> &MemberRefRow {
        &self.member_refs[id.index()]
    }

    pub fn type_spec(&self, id: TypeSpecId) -> &TypeSpecRow {
        &self.type_specs[id.index()]
    }

    /// Token of a defined method (its defining token in this module).
    pub fn method_token(&self, id: MethodId) -> Token {
        Token::new(TokenKind::MethodDef, id.rid())
    }

    pub fn resolve_token(&self, token: Token) -> Option<Entity> {
        let rid = token.rid();
        if rid == 0 {
            return None;
        }
        let index = (rid - 1) as usize;
        match token.kind()? {
            TokenKind::MethodDef if index < self.methods.len() => {
                Some(Entity::MethodDef(MethodId::from_index(index)))
            }
            TokenKind::TypeDef if index < self.types.len() => {
                Some(Entity::TypeDef(TypeId::from_index(index)))
            }
            TokenKind::TypeRef if index < self.type_refs.len() => {
                Some(Entity::TypeRef(TypeRefId::from_index(index)))
            }
            TokenKind::MemberRef if index < self.member_refs.len() => {
                Some(Entity::MemberRef(MemberRefId::from_index(index)))
            }
            TokenKind::TypeSpec if index < self.type_specs.len() => {
                Some(Entity::TypeSpec(TypeSpecId::from_index(index)))
            }
            TokenKind::UserString if index < self.strings.len() => {
                Some(Entity::UserString(rid))
            }
            _ => None,
        }
    }
}
