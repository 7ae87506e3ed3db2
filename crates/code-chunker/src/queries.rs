//! Tag-query sources, one per grammar.
//!
//! Capture names follow the tree-sitter tags convention: `definition.*`
//! marks the full definition node, `name.*` its identifier. The capture
//! processor keys on those two prefixes and ignores everything else.

use crate::language::Language;

const RUST: &str = r#"
(function_item name: (identifier) @name.definition.function) @definition.function
(struct_item name: (type_identifier) @name.definition.class) @definition.class
(enum_item name: (type_identifier) @name.definition.class) @definition.class
(trait_item name: (type_identifier) @name.definition.interface) @definition.interface
(impl_item) @definition.class
(mod_item name: (identifier) @name.definition.module) @definition.module
(macro_definition name: (identifier) @name.definition.macro) @definition.macro
"#;

const PYTHON: &str = r#"
(function_definition name: (identifier) @name.definition.function) @definition.function
(class_definition name: (identifier) @name.definition.class) @definition.class
"#;

const JAVASCRIPT: &str = r#"
(function_declaration name: (identifier) @name.definition.function) @definition.function
(generator_function_declaration name: (identifier) @name.definition.function) @definition.function
(class_declaration name: (identifier) @name.definition.class) @definition.class
(method_definition name: (property_identifier) @name.definition.method) @definition.method
(variable_declarator
  name: (identifier) @name.definition.function
  value: (arrow_function)) @definition.function
(variable_declarator
  name: (identifier) @name.definition.function
  value: (function_expression)) @definition.function
"#;

const TYPESCRIPT: &str = r#"
(function_declaration name: (identifier) @name.definition.function) @definition.function
(generator_function_declaration name: (identifier) @name.definition.function) @definition.function
(class_declaration name: (type_identifier) @name.definition.class) @definition.class
(abstract_class_declaration name: (type_identifier) @name.definition.class) @definition.class
(method_definition name: (property_identifier) @name.definition.method) @definition.method
(interface_declaration name: (type_identifier) @name.definition.interface) @definition.interface
(enum_declaration name: (identifier) @name.definition.enum) @definition.enum
(type_alias_declaration name: (type_identifier) @name.definition.type) @definition.type
(variable_declarator
  name: (identifier) @name.definition.function
  value: (arrow_function)) @definition.function
(variable_declarator
  name: (identifier) @name.definition.function
  value: (function_expression)) @definition.function
"#;

const GO: &str = r#"
(function_declaration name: (identifier) @name.definition.function) @definition.function
(method_declaration name: (field_identifier) @name.definition.method) @definition.method
(type_spec name: (type_identifier) @name.definition.type) @definition.type
"#;

const C: &str = r#"
(function_definition) @definition.function
(struct_specifier name: (type_identifier) @name.definition.class) @definition.class
(enum_specifier name: (type_identifier) @name.definition.class) @definition.class
"#;

const CPP: &str = r#"
(function_definition) @definition.function
(class_specifier name: (type_identifier) @name.definition.class) @definition.class
(struct_specifier name: (type_identifier) @name.definition.class) @definition.class
(enum_specifier name: (type_identifier) @name.definition.class) @definition.class
(namespace_definition) @definition.module
"#;

const C_SHARP: &str = r#"
(method_declaration name: (identifier) @name.definition.method) @definition.method
(constructor_declaration name: (identifier) @name.definition.method) @definition.method
(class_declaration name: (identifier) @name.definition.class) @definition.class
(struct_declaration name: (identifier) @name.definition.class) @definition.class
(interface_declaration name: (identifier) @name.definition.interface) @definition.interface
(enum_declaration name: (identifier) @name.definition.enum) @definition.enum
"#;

const RUBY: &str = r#"
(method name: (identifier) @name.definition.method) @definition.method
(singleton_method name: (identifier) @name.definition.method) @definition.method
(class name: (constant) @name.definition.class) @definition.class
(module name: (constant) @name.definition.module) @definition.module
"#;

const JAVA: &str = r#"
(method_declaration name: (identifier) @name.definition.method) @definition.method
(constructor_declaration name: (identifier) @name.definition.method) @definition.method
(class_declaration name: (identifier) @name.definition.class) @definition.class
(interface_declaration name: (identifier) @name.definition.interface) @definition.interface
(enum_declaration name: (identifier) @name.definition.enum) @definition.enum
"#;

const PHP: &str = r#"
(function_definition name: (name) @name.definition.function) @definition.function
(method_declaration name: (name) @name.definition.method) @definition.method
(class_declaration name: (name) @name.definition.class) @definition.class
(interface_declaration name: (name) @name.definition.interface) @definition.interface
"#;

const HTML: &str = r#"
(element) @definition.element
"#;

const CSS: &str = r#"
(rule_set) @definition.rule_set
"#;

const JSON: &str = r#"
(pair key: (string) @name.definition.property) @definition.property
"#;

const SCALA: &str = r#"
(function_definition name: (identifier) @name.definition.function) @definition.function
(class_definition name: (identifier) @name.definition.class) @definition.class
(object_definition name: (identifier) @name.definition.class) @definition.class
(trait_definition name: (identifier) @name.definition.interface) @definition.interface
"#;

const OCAML: &str = r#"
(value_definition) @definition.function
(type_definition) @definition.type
(module_definition) @definition.module
"#;

const OCAML_INTERFACE: &str = r#"
(value_specification) @definition.function
(type_definition) @definition.type
"#;

/// Tag-query source for a language, `None` when the language has no
/// tree-sitter grammar here (markdown, unknown extensions).
pub fn tags_query_source(language: Language) -> Option<&'static str> {
    match language {
        Language::Rust => Some(RUST),
        Language::Python => Some(PYTHON),
        Language::JavaScript | Language::Jsx => Some(JAVASCRIPT),
        Language::TypeScript | Language::Tsx => Some(TYPESCRIPT),
        Language::Go => Some(GO),
        Language::C => Some(C),
        Language::Cpp => Some(CPP),
        Language::CSharp => Some(C_SHARP),
        Language::Ruby => Some(RUBY),
        Language::Java => Some(JAVA),
        Language::Php => Some(PHP),
        Language::Html => Some(HTML),
        Language::Css => Some(CSS),
        Language::Json => Some(JSON),
        Language::Scala => Some(SCALA),
        Language::OCaml => Some(OCAML),
        Language::OCamlInterface => Some(OCAML_INTERFACE),
        Language::Markdown | Language::Unknown => None,
    }
}
