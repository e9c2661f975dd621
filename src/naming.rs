//! Name normalisation shared by the registry and the CLI parser.

use heck::ToKebabCase;

/// Convert a type name to its variant key: `QuickTest` -> `quick-test`.
///
/// Idempotent, so keys that are already kebab-case map to themselves.
pub fn camel_to_kebab(name: &str) -> String {
    name.to_kebab_case()
}

/// Convert a CLI flag segment to a field name: `hidden-dim` -> `hidden_dim`.
pub fn kebab_to_snake(name: &str) -> String {
    name.replace('-', "_")
}

/// Whether a file or directory name marks it as private to the config tree.
pub fn is_private(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_camel_case() {
        assert_eq!(camel_to_kebab("QuickTest"), "quick-test");
        assert_eq!(camel_to_kebab("DevConfig"), "dev-config");
    }

    #[test]
    fn test_consecutive_capitals() {
        assert_eq!(camel_to_kebab("MLTrainingConfig"), "ml-training-config");
        assert_eq!(camel_to_kebab("HTTPServer"), "http-server");
    }

    #[test]
    fn test_single_word_and_idempotence() {
        assert_eq!(camel_to_kebab("Config"), "config");
        assert_eq!(camel_to_kebab("config"), "config");
        assert_eq!(camel_to_kebab("quick-test"), "quick-test");
    }

    #[test]
    fn test_kebab_to_snake() {
        assert_eq!(kebab_to_snake("hidden-dim"), "hidden_dim");
        assert_eq!(kebab_to_snake("pool-size"), "pool_size");
        assert_eq!(kebab_to_snake("config"), "config");
    }

    #[test]
    fn test_private_names() {
        assert!(is_private("_helpers.yaml"));
        assert!(is_private(".hidden"));
        assert!(!is_private("small.yaml"));
    }
}
