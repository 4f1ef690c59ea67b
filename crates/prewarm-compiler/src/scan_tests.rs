use std::rc::Rc;

use indexmap::IndexSet;
use prewarm_core::{MethodId, ModuleView, Token, TokenKind};
use prewarm_image::fixups::FixupKind;

use crate::ScanFailure;
use crate::nodes::imports::StandardSection;
use crate::nodes::signature::SignatureDesc;
use crate::policy::{DictionaryLayoutProvider, Devirtualizer, Policies, VtableSlotProvider};
use crate::scan::{Need, Scanner};
use crate::test_utils::{call_module, leaf_module, rich_module};

fn needs_of(
    module: &dyn ModuleView,
    policies: &Policies,
    excluded: &IndexSet<MethodId>,
    name: &str,
) -> Result<Vec<Need>, ScanFailure> {
    let scanner = Scanner {
        module,
        policies,
        excluded,
    };
    let method = module.find_method(name).unwrap();
    scanner.method_needs(method)
}

fn method_import(kind: FixupKind, token: Token) -> Need {
    Need::Import {
        section: StandardSection::Method,
        desc: SignatureDesc::Method { kind, token },
    }
}

#[test]
fn leaf_body_has_no_needs() {
    let module = leaf_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Main").unwrap();
    assert!(needs.is_empty());
}

#[test]
fn defined_call_is_local() {
    let module = call_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Main").unwrap();
    let helper = module.find_method("Helper").unwrap();
    assert_eq!(needs[0], Need::LocalCall(helper));
}

#[test]
fn member_ref_call_imports_by_ref_token() {
    let module = call_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Main").unwrap();
    assert_eq!(
        needs[1],
        method_import(
            FixupKind::MethodEntryRefToken,
            Token::new(TokenKind::MemberRef, 1)
        )
    );
}

#[test]
fn excluded_callee_degrades_to_entry_import() {
    let module = call_module();
    let helper = module.find_method("Helper").unwrap();
    let excluded: IndexSet<MethodId> = [helper].into_iter().collect();
    let needs = needs_of(&module, &Policies::default(), &excluded, "Main").unwrap();
    assert_eq!(
        needs[0],
        method_import(
            FixupKind::MethodEntryDefToken,
            Token::new(TokenKind::MethodDef, 2)
        )
    );
}

#[test]
fn virtual_call_on_member_ref_stays_virtual() {
    let module = rich_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Main").unwrap();
    assert_eq!(
        needs[2],
        method_import(
            FixupKind::VirtualEntryRefToken,
            Token::new(TokenKind::MemberRef, 1)
        )
    );
}

#[test]
fn devirtualized_call_becomes_local() {
    struct ToRender;
    impl Devirtualizer for ToRender {
        fn devirtualize(&self, module: &dyn ModuleView, _target: Token) -> Option<MethodId> {
            module.find_method("Render")
        }
    }

    let module = rich_module();
    let policies = Policies {
        devirtualizer: Rc::new(ToRender),
        ..Policies::default()
    };
    let needs = needs_of(&module, &policies, &IndexSet::new(), "Main").unwrap();
    let render = module.find_method("Render").unwrap();
    assert_eq!(needs[2], Need::LocalCall(render));
}

#[test]
fn pinned_slot_imports_by_owner_and_slot() {
    struct SlotThree;
    impl VtableSlotProvider for SlotThree {
        fn slot_of(&self, _module: &dyn ModuleView, _target: Token) -> Option<u32> {
            Some(3)
        }
    }

    let module = rich_module();
    let policies = Policies {
        vtable_slots: Rc::new(SlotThree),
        ..Policies::default()
    };
    let needs = needs_of(&module, &policies, &IndexSet::new(), "Main").unwrap();
    assert_eq!(
        needs[2],
        Need::Import {
            section: StandardSection::Method,
            desc: SignatureDesc::VirtualSlot {
                owner: Token::new(TokenKind::TypeRef, 1),
                slot: 3,
            },
        }
    );
}

#[test]
fn type_ops_import_helpers() {
    let module = rich_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Render").unwrap();
    assert_eq!(
        needs,
        vec![
            Need::Import {
                section: StandardSection::Helper,
                desc: SignatureDesc::Type {
                    kind: FixupKind::StaticBaseGc,
                    token: Token::new(TokenKind::TypeDef, 2),
                },
            },
            Need::Import {
                section: StandardSection::Helper,
                desc: SignatureDesc::Type {
                    kind: FixupKind::IsInstanceOf,
                    token: Token::new(TokenKind::TypeDef, 1),
                },
            },
            Need::Import {
                section: StandardSection::Helper,
                desc: SignatureDesc::Type {
                    kind: FixupKind::TypeHandle,
                    token: Token::new(TokenKind::TypeDef, 2),
                },
            },
        ]
    );
}

#[test]
fn string_load_imports_a_handle() {
    let module = rich_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Main").unwrap();
    assert_eq!(
        needs[3],
        Need::Import {
            section: StandardSection::String,
            desc: SignatureDesc::StringHandle { rid: 1 },
        }
    );
}

#[test]
fn missing_string_fails() {
    let module = call_module();
    let scanner = Scanner {
        module: &module,
        policies: &Policies::default(),
        excluded: &IndexSet::new(),
    };
    let err = scanner
        .op_need(&prewarm_core::Op::LoadString { id: 9 })
        .unwrap_err();
    assert_eq!(err, ScanFailure::MissingString(9));
}

#[test]
fn runtime_determined_shape_fails() {
    let module = rich_module();
    let err = needs_of(&module, &Policies::default(), &IndexSet::new(), "Broken").unwrap_err();
    assert_eq!(
        err,
        ScanFailure::RuntimeDeterminedShape(Token::new(TokenKind::TypeSpec, 1))
    );
}

#[test]
fn unresolved_token_fails() {
    let module = call_module();
    let scanner = Scanner {
        module: &module,
        policies: &Policies::default(),
        excluded: &IndexSet::new(),
    };
    let err = scanner
        .op_need(&prewarm_core::Op::Call {
            target: Token::new(TokenKind::MethodDef, 40),
        })
        .unwrap_err();
    assert_eq!(
        err,
        ScanFailure::UnresolvedToken(Token::new(TokenKind::MethodDef, 40))
    );
}

#[test]
fn instantiated_method_without_dictionary_compiles() {
    let module = rich_module();
    let needs = needs_of(&module, &Policies::default(), &IndexSet::new(), "Spill").unwrap();
    assert_eq!(needs.len(), 1);
}

#[test]
fn dictionary_demand_fails_instantiated_methods() {
    struct TwoEntries;
    impl DictionaryLayoutProvider for TwoEntries {
        fn entry_count(&self, _module: &dyn ModuleView, _method: MethodId) -> u32 {
            2
        }
    }

    let module = rich_module();
    let policies = Policies {
        dictionary_layout: Rc::new(TwoEntries),
        ..Policies::default()
    };
    let err = needs_of(&module, &policies, &IndexSet::new(), "Spill").unwrap_err();
    assert_eq!(err, ScanFailure::DictionaryRequired { entries: 2 });

    // Uninstantiated bodies never consult the layout.
    let needs = needs_of(&module, &policies, &IndexSet::new(), "Render").unwrap();
    assert_eq!(needs.len(), 3);
}
