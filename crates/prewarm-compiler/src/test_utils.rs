//! Shared module fixtures for compiler tests.

use prewarm_core::Module;

pub fn module_from(json: &str) -> Module {
    Module::from_json(json).unwrap()
}

/// One self-contained entry point, nothing external.
pub fn leaf_module() -> Module {
    module_from(indoc::indoc! {r#"
        {
          "name": "leaf",
          "methods": [
            {
              "name": "Main",
              "body": [
                { "op": "load_const", "value": 7 },
                { "op": "ret" }
              ]
            }
          ]
        }
    "#})
}

/// `Main` calls a local helper and one external method.
pub fn call_module() -> Module {
    module_from(indoc::indoc! {r#"
        {
          "name": "calls",
          "methods": [
            {
              "name": "Main",
              "body": [
                { "op": "call", "target": "method_def:2" },
                { "op": "call", "target": "member_ref:1" },
                { "op": "ret" }
              ]
            },
            {
              "name": "Helper",
              "body": [ { "op": "ret" } ]
            }
          ],
          "type_refs": [ { "name": "External.Console" } ],
          "member_refs": [ { "name": "WriteLine", "parent": "type_ref:1" } ]
        }
    "#})
}

/// Two methods load the same string token.
pub fn shared_string_module() -> Module {
    module_from(indoc::indoc! {r#"
        {
          "name": "strings",
          "methods": [
            {
              "name": "First",
              "body": [
                { "op": "load_string", "id": 1 },
                { "op": "ret" }
              ]
            },
            {
              "name": "Second",
              "body": [
                { "op": "load_string", "id": 1 },
                { "op": "ret" }
              ]
            }
          ],
          "strings": [ "hello" ]
        }
    "#})
}

/// Wider fixture: local types, helpers of several kinds, a virtual call on
/// an external member, an instantiated method, and a runtime-determined
/// shape that the scanner must reject.
pub fn rich_module() -> Module {
    module_from(indoc::indoc! {r#"
        {
          "name": "app",
          "types": [
            { "name": "App.Widget" },
            { "name": "App.Screen", "base": "type_def:1" }
          ],
          "methods": [
            {
              "name": "Main",
              "body": [
                { "op": "new_object", "ty": "type_def:1" },
                { "op": "call", "target": "method_def:2" },
                { "op": "call_virtual", "target": "member_ref:1" },
                { "op": "load_string", "id": 1 },
                { "op": "ret" }
              ]
            },
            {
              "name": "Render",
              "locals": 2,
              "body": [
                { "op": "static_base", "ty": "type_def:2", "gc": true },
                { "op": "is_instance", "ty": "type_def:1" },
                { "op": "load_type_handle", "ty": "type_def:2" },
                { "op": "ret" }
              ],
              "exception_regions": [
                { "start": 0, "len": 2, "handler": 3, "kind": "catch" }
              ]
            },
            {
              "name": "Spill",
              "instantiation": [ "T" ],
              "body": [
                { "op": "new_array", "element": "type_def:1" },
                { "op": "ret" }
              ]
            },
            {
              "name": "Broken",
              "body": [
                { "op": "new_object", "ty": "type_spec:1" },
                { "op": "ret" }
              ]
            }
          ],
          "type_refs": [ { "name": "External.View" } ],
          "member_refs": [ { "name": "Draw", "parent": "type_ref:1" } ],
          "type_specs": [ { "shape": "T[]" } ],
          "strings": [ "ready" ]
        }
    "#})
}
