use std::io::{self, Read};
use std::path::{Path, PathBuf};

use prewarm_core::Module;

pub fn load_module(path: Option<&Path>) -> Result<Module, String> {
    if let Some(path) = path {
        if path.as_os_str() == "-" {
            return load_stdin();
        }
        return load_file(path);
    }

    Err("module is required: pass a module path, or - for stdin".to_string())
}

fn load_stdin() -> Result<Module, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {}", e))?;
    Module::from_json(&buf).map_err(|e| format!("invalid module on stdin: {}", e))
}

fn load_file(path: &Path) -> Result<Module, String> {
    Module::from_path(path).map_err(|e| format!("failed to load '{}': {}", path.display(), e))
}

/// Output path when -o is absent: module path with a `.pwi` extension, or
/// `<module name>.pwi` in the working directory for stdin input.
pub fn default_output(module_path: Option<&Path>, module: &Module) -> PathBuf {
    match module_path {
        Some(path) if path.as_os_str() != "-" => path.with_extension("pwi"),
        _ => PathBuf::from(format!("{}.pwi", module.name)),
    }
}
