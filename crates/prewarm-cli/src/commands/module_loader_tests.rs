use std::path::{Path, PathBuf};

use prewarm_core::Module;

use super::module_loader::{default_output, load_module};

fn module_named(name: &str) -> Module {
    Module::from_json(&format!(r#"{{ "name": "{}" }}"#, name)).unwrap()
}

#[test]
fn missing_module_argument_is_reported() {
    let err = load_module(None).unwrap_err();
    assert!(err.contains("module is required"), "got: {}", err);
}

#[test]
fn unreadable_module_names_the_path() {
    let err = load_module(Some(Path::new("no/such/module.json"))).unwrap_err();
    assert!(err.contains("no/such/module.json"), "got: {}", err);
}

#[test]
fn default_output_swaps_the_extension() {
    let module = module_named("app");
    let path = PathBuf::from("dir/app.json");
    assert_eq!(default_output(Some(&path), &module), PathBuf::from("dir/app.pwi"));
}

#[test]
fn default_output_for_stdin_uses_the_module_name() {
    let module = module_named("app");
    assert_eq!(default_output(Some(Path::new("-")), &module), PathBuf::from("app.pwi"));
    assert_eq!(default_output(None, &module), PathBuf::from("app.pwi"));
}
