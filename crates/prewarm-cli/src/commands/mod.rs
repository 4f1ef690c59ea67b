pub mod compile;
pub mod dump;
pub mod module_loader;
pub mod run_common;
pub mod scan;

#[cfg(test)]
mod module_loader_tests;
