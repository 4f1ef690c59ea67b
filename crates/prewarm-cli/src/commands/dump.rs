use std::path::PathBuf;

use prewarm_image::fixups::IMPORT_FLAG_EAGER;
use prewarm_image::image::{EntryPointsView, Image, ImportSectionsView};

pub struct DumpArgs {
    pub image: Option<PathBuf>,
}

pub fn run(args: DumpArgs) {
    let Some(path) = args.image else {
        eprintln!("error: an image path is required");
        std::process::exit(1);
    };

    let image = match Image::from_path(&path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    };

    print!("{}", image.describe());
    println!("produced by {}", require(image.compiler_identifier(), "compiler identifier"));
    if image.is_partial() {
        println!("partial image: some reachable methods are left to the loader");
    }

    print_import_sections(&require(image.import_sections(), "import sections"));
    print_entry_points(
        "method entry points",
        &require(image.method_entry_points(), "method entry points"),
    );
    print_entry_points(
        "instance entry points",
        &require(image.instance_entry_points(), "instance entry points"),
    );
}

fn require<T>(result: prewarm_image::Result<T>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: cannot read {}: {}", what, e);
        std::process::exit(1);
    })
}

fn print_import_sections(sections: &ImportSectionsView<'_>) {
    println!();
    println!("import sections ({}):", sections.len());
    for (index, record) in sections.iter().enumerate() {
        let kind = match record.kind {
            Some(kind) => format!("{:?}", kind),
            None => "?".to_string(),
        };
        let resolve = if record.flags & IMPORT_FLAG_EAGER != 0 {
            "eager"
        } else {
            "delay"
        };
        println!(
            "  {}: {:<12} {}  cells {:>4}  flags {:#06x}",
            index,
            kind,
            resolve,
            record.cell_count(),
            record.flags
        );
    }
}

fn print_entry_points(label: &str, view: &EntryPointsView<'_>) {
    println!();
    println!("{} ({} slots):", label, view.len());
    for (rid, entry) in view.iter() {
        match entry.fixups_offset {
            Some(offset) => println!(
                "  rid {:<4} rf {:<4} fixups {}",
                rid,
                entry.runtime_function,
                render_fixups(view, offset)
            ),
            None => println!("  rid {:<4} rf {}", rid, entry.runtime_function),
        }
    }
}

fn render_fixups(view: &EntryPointsView<'_>, offset: u32) -> String {
    match view.fixups(offset) {
        Ok(cells) => cells
            .iter()
            .map(|c| format!("{}:{}", c.section, c.cell))
            .collect::<Vec<_>>()
            .join(", "),
        Err(e) => format!("<{}>", e),
    }
}
