//! End-to-end emission tests: compile a fixture module, then read the
//! image back through the format crate's parser.

use std::io::Write;

use prewarm_core::{Arch, Module, ModuleView, Token, TokenKind};
use prewarm_image::fixups::{IMPORT_FLAG_EAGER, IMPORT_FLAG_PCODE, ImportSectionKind};
use prewarm_image::header::SectionType;
use prewarm_image::image::{FixupCell, Image};

use crate::ScanFailure;
use crate::compilation::{Compilation, CompilationBuilder};
use crate::test_utils::{call_module, leaf_module, rich_module, shared_string_module};
use crate::writer::write_guarded;

fn compile(module: Module, roots: &[&str]) -> Compilation {
    CompilationBuilder::new(module, Arch::X64)
        .with_roots(roots.iter().copied())
        .compile()
        .unwrap()
}

fn image_of(compilation: &Compilation) -> Image {
    Image::from_bytes(compilation.image_bytes.clone()).unwrap()
}

#[test]
fn leaf_image_parses_with_one_method() {
    let compilation = compile(leaf_module(), &["Main"]);
    let image = image_of(&compilation);

    assert!(!compilation.is_partial);
    assert!(!image.is_partial());
    assert_eq!(
        image.compiler_identifier().unwrap(),
        format!("prewarm {}", env!("CARGO_PKG_VERSION"))
    );

    let entries = image.method_entry_points().unwrap();
    assert_eq!(entries.len(), 1);
    let main = entries.entry(1).unwrap();
    assert_eq!(main.fixups_offset, None);

    let functions = image.runtime_functions().unwrap();
    assert_eq!(functions.len(), 1);
    let row = functions.get(main.runtime_function as usize).unwrap();
    // mov eax, imm32 + ret.
    assert_eq!(row.end - row.begin, 6);
    assert_eq!(row.begin % 16, 0);

    assert!(image.available_types().unwrap().is_empty());
    assert!(image.instance_entry_points().unwrap().is_empty());
}

#[test]
fn directory_records_ascend_in_standard_order() {
    let compilation = compile(leaf_module(), &["Main"]);
    let image = image_of(&compilation);

    let records = &image.directory().sections;
    let types: Vec<SectionType> = records.iter().map(|r| r.section).collect();
    assert_eq!(
        types,
        vec![
            SectionType::CompilerIdentifier,
            SectionType::ImportSections,
            SectionType::RuntimeFunctions,
            SectionType::MethodDefEntryPoints,
            SectionType::AvailableTypes,
            SectionType::InstanceMethodEntryPoints,
        ]
    );
    assert!(records.windows(2).all(|w| w[0].rva < w[1].rva));
    assert!(records.iter().all(|r| r.size > 0));
}

#[test]
fn import_sections_describe_the_four_standard_tables() {
    let compilation = compile(call_module(), &["Main"]);
    let image = image_of(&compilation);

    let sections = image.import_sections().unwrap();
    assert_eq!(sections.len(), 4);

    // Eager: the module handle plus the delay-load method resolver.
    let eager = sections.get(0).unwrap();
    assert_ne!(eager.flags & IMPORT_FLAG_EAGER, 0);
    assert_eq!(eager.kind, Some(ImportSectionKind::Unknown));
    assert_eq!(eager.cell_count(), 2);

    // Method: one cell for the external `WriteLine`.
    let method = sections.get(1).unwrap();
    assert_eq!(method.flags & IMPORT_FLAG_EAGER, 0);
    assert_ne!(method.flags & IMPORT_FLAG_PCODE, 0);
    assert_eq!(method.kind, Some(ImportSectionKind::StubDispatch));
    assert_eq!(method.cell_count(), 1);

    let helper = sections.get(2).unwrap();
    assert_eq!(helper.cell_count(), 0);
    let string = sections.get(3).unwrap();
    assert_eq!(string.kind, Some(ImportSectionKind::StringHandle));
    assert_eq!(string.cell_count(), 0);

    assert!(sections.iter().all(|record| record.entry_size == 8));
    assert!(sections.iter().all(|record| record.signatures_rva != 0));
}

#[test]
fn method_fixups_name_their_delayed_cells() {
    let compilation = compile(call_module(), &["Main"]);
    let image = image_of(&compilation);
    let entries = image.method_entry_points().unwrap();

    // Main calls one external method through the method import section.
    let main = entries.entry(1).unwrap();
    let offset = main.fixups_offset.unwrap();
    assert_eq!(
        entries.fixups(offset).unwrap(),
        vec![FixupCell { section: 1, cell: 0 }]
    );

    // Helper's body touches no cell at all.
    let helper = entries.entry(2).unwrap();
    assert_eq!(helper.fixups_offset, None);
}

#[test]
fn shared_string_cell_is_patched_once_for_both_methods() {
    let compilation = compile(shared_string_module(), &["First", "Second"]);
    let image = image_of(&compilation);

    let sections = image.import_sections().unwrap();
    assert_eq!(sections.get(3).unwrap().cell_count(), 1);
    // No thunked section is populated, so eager holds only the module cell.
    assert_eq!(sections.get(0).unwrap().cell_count(), 1);

    let entries = image.method_entry_points().unwrap();
    for rid in [1, 2] {
        let entry = entries.entry(rid).unwrap();
        let offset = entry.fixups_offset.unwrap();
        assert_eq!(
            entries.fixups(offset).unwrap(),
            vec![FixupCell { section: 3, cell: 0 }]
        );
    }
}

#[test]
fn partial_image_records_dropped_methods() {
    let module = rich_module();
    let broken = module.find_method("Broken").unwrap();
    let compilation = CompilationBuilder::new(module, Arch::X64)
        .with_all_roots()
        .compile()
        .unwrap();
    let image = image_of(&compilation);

    assert!(compilation.is_partial);
    assert!(image.is_partial());
    assert_eq!(
        compilation.scan_results.excluded,
        vec![(
            broken,
            ScanFailure::RuntimeDeterminedShape(Token::new(TokenKind::TypeSpec, 1))
        )]
    );
    assert_eq!(compilation.scan_results.compiled.len(), 3);

    // Main and Render publish as definitions, Spill as an instantiation.
    let methods = image.method_entry_points().unwrap();
    assert_eq!(methods.len(), 2);
    assert!(methods.entry(1).is_some());
    assert!(methods.entry(2).is_some());
    let instances = image.instance_entry_points().unwrap();
    assert_eq!(instances.len(), 3);
    assert!(instances.entry(1).is_none());
    assert!(instances.entry(3).is_some());

    assert_eq!(image.available_types().unwrap(), vec![1, 2]);
}

#[test]
fn fixup_cells_span_sections_in_ascending_order() {
    let compilation = CompilationBuilder::new(rich_module(), Arch::X64)
        .with_all_roots()
        .compile()
        .unwrap();
    let image = image_of(&compilation);
    let methods = image.method_entry_points().unwrap();

    // Main: the virtual call, the new-object helper, and the string.
    let main = methods.entry(1).unwrap();
    assert_eq!(
        methods.fixups(main.fixups_offset.unwrap()).unwrap(),
        vec![
            FixupCell { section: 1, cell: 0 },
            FixupCell { section: 2, cell: 0 },
            FixupCell { section: 3, cell: 0 },
        ]
    );

    // Render: three helper cells, created after Main's.
    let render = methods.entry(2).unwrap();
    assert_eq!(
        methods.fixups(render.fixups_offset.unwrap()).unwrap(),
        vec![
            FixupCell { section: 2, cell: 1 },
            FixupCell { section: 2, cell: 2 },
            FixupCell { section: 2, cell: 3 },
        ]
    );

    let instances = image.instance_entry_points().unwrap();
    let spill = instances.entry(3).unwrap();
    assert_eq!(
        instances.fixups(spill.fixups_offset.unwrap()).unwrap(),
        vec![FixupCell { section: 2, cell: 4 }]
    );
}

#[test]
fn identical_gc_info_is_interned_across_methods() {
    let compilation = CompilationBuilder::new(rich_module(), Arch::X64)
        .with_all_roots()
        .compile()
        .unwrap();
    let image = image_of(&compilation);

    let methods = image.method_entry_points().unwrap();
    let instances = image.instance_entry_points().unwrap();
    let functions = image.runtime_functions().unwrap();
    let main = functions
        .get(methods.entry(1).unwrap().runtime_function as usize)
        .unwrap();
    let render = functions
        .get(methods.entry(2).unwrap().runtime_function as usize)
        .unwrap();
    let spill = functions
        .get(instances.entry(3).unwrap().runtime_function as usize)
        .unwrap();

    // Main and Spill have no locals and no handlers; Render has both.
    assert_eq!(main.gc_info, spill.gc_info);
    assert_ne!(main.gc_info, render.gc_info);
    assert_eq!(render.end - render.begin, 20);
}

#[test]
fn images_round_trip_through_files() {
    let compilation = compile(call_module(), &["Main"]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calls.pwi");
    compilation.write_image(&path).unwrap();

    let from_disk = Image::from_path(&path).unwrap();
    let in_memory = image_of(&compilation);
    assert_eq!(from_disk.describe(), in_memory.describe());
}

#[test]
fn failed_writes_remove_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.pwi");
    let result = write_guarded(&path, |file| {
        file.write_all(b"half an image")?;
        Err(std::io::Error::other("disk full"))
    });
    assert!(result.is_err());
    assert!(!path.exists());

    let kept = dir.path().join("whole.pwi");
    write_guarded(&kept, |file| file.write_all(b"fine")).unwrap();
    assert!(kept.exists());
}

#[test]
fn empty_roots_still_emit_a_wellformed_image() {
    let compilation = compile(leaf_module(), &[]);
    let image = image_of(&compilation);

    assert!(!compilation.is_partial);
    assert!(compilation.scan_results.compiled.is_empty());
    assert!(image.method_entry_points().unwrap().is_empty());
    assert!(image.runtime_functions().unwrap().is_empty());
    assert_eq!(image.import_sections().unwrap().get(0).unwrap().cell_count(), 1);
    assert!(!image.compiler_identifier().unwrap().is_empty());
}
