use crate::error::{ChunkerError, Result};
use std::path::Path;

/// Language family a source file belongs to, keyed by extension.
///
/// JSX and TSX are tracked separately from their base grammars because the
/// capture processor applies an HTML-element filter to those two only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Go,
    C,
    Cpp,
    CSharp,
    Ruby,
    Java,
    Php,
    Html,
    Css,
    Json,
    Scala,
    OCaml,
    OCamlInterface,
    Markdown,
    Unknown,
}

impl Language {
    /// Detect language from a lowercased file extension (no leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" => Self::Python,
            "js" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "ts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "go" => Self::Go,
            "c" | "h" => Self::C,
            "cpp" | "hpp" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "java" => Self::Java,
            "php" => Self::Php,
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "json" => Self::Json,
            "scala" => Self::Scala,
            "ml" => Self::OCaml,
            "mli" => Self::OCamlInterface,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect language from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Get language name as string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Java => "java",
            Self::Php => "php",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
            Self::Scala => "scala",
            Self::OCaml => "ocaml",
            Self::OCamlInterface => "ocaml_interface",
            Self::Markdown => "markdown",
            Self::Unknown => "unknown",
        }
    }

    /// Markdown goes through the dedicated heading parser, not tree-sitter.
    pub const fn is_markdown(self) -> bool {
        matches!(self, Self::Markdown)
    }

    /// Whether the JSX/TSX HTML-element filter applies to this language.
    pub const fn filters_html_elements(self) -> bool {
        matches!(self, Self::Jsx | Self::Tsx)
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript | Self::Jsx => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Self::Go => Ok(tree_sitter_go::LANGUAGE.into()),
            Self::C => Ok(tree_sitter_c::LANGUAGE.into()),
            Self::Cpp => Ok(tree_sitter_cpp::LANGUAGE.into()),
            Self::CSharp => Ok(tree_sitter_c_sharp::LANGUAGE.into()),
            Self::Ruby => Ok(tree_sitter_ruby::LANGUAGE.into()),
            Self::Java => Ok(tree_sitter_java::LANGUAGE.into()),
            Self::Php => Ok(tree_sitter_php::LANGUAGE_PHP.into()),
            Self::Html => Ok(tree_sitter_html::LANGUAGE.into()),
            Self::Css => Ok(tree_sitter_css::LANGUAGE.into()),
            Self::Json => Ok(tree_sitter_json::LANGUAGE.into()),
            Self::Scala => Ok(tree_sitter_scala::LANGUAGE.into()),
            Self::OCaml => Ok(tree_sitter_ocaml::LANGUAGE_OCAML.into()),
            Self::OCamlInterface => Ok(tree_sitter_ocaml::LANGUAGE_OCAML_INTERFACE.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Language;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("jsx"), Language::Jsx);
        assert_eq!(Language::from_extension("markdown"), Language::Markdown);
        assert_eq!(Language::from_extension("sol"), Language::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/main.rs"), Language::Rust);
        assert_eq!(Language::from_path("docs/README.md"), Language::Markdown);
        assert_eq!(Language::from_path("no_extension"), Language::Unknown);
    }

    #[test]
    fn test_html_filter_scope() {
        assert!(Language::Tsx.filters_html_elements());
        assert!(Language::Jsx.filters_html_elements());
        assert!(!Language::TypeScript.filters_html_elements());
        assert!(!Language::Html.filters_html_elements());
    }

    #[test]
    fn test_tree_sitter_language() {
        assert!(Language::Rust.tree_sitter_language().is_ok());
        assert!(Language::Tsx.tree_sitter_language().is_ok());
        assert!(Language::Markdown.tree_sitter_language().is_err());
        assert!(Language::Unknown.tree_sitter_language().is_err());
    }
}
