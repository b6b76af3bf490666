//! Name checks for values passed to the runtime on a command line.
//!
//! Arguments are never interpreted by a shell, but a name starting with `-`
//! would still be read as a flag, so only a conservative alphabet is allowed.

/// Maximum accepted length of a container name or image reference.
const MAX_NAME_LEN: usize = 255;

/// Container names: alphanumeric first character, then alphanumeric,
/// hyphen, underscore or dot.
pub fn is_safe_container_name(name: &str) -> bool {
    is_safe(name, |c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Image references additionally allow registry/tag separators (`/`, `:`)
/// and digests (`@`).
pub fn is_safe_image_reference(reference: &str) -> bool {
    is_safe(reference, |c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@')
    })
}

fn is_safe(value: &str, allowed: impl Fn(char) -> bool) -> bool {
    !value.is_empty()
        && value.len() <= MAX_NAME_LEN
        && value.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && value.chars().all(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_container_names() {
        assert!(is_safe_container_name("model-6f479fd1-d7eb-4ca0-b15e-e61743e561fd"));
        assert!(is_safe_container_name("detector_1.prod"));
        assert!(is_safe_container_name("abc123def"));
    }

    #[test]
    fn unsafe_container_names() {
        assert!(!is_safe_container_name(""));
        assert!(!is_safe_container_name("--privileged"));
        assert!(!is_safe_container_name("foo; rm -rf /"));
        assert!(!is_safe_container_name("model:latest"));
        assert!(!is_safe_container_name(&"a".repeat(300)));
    }

    #[test]
    fn image_references() {
        assert!(is_safe_image_reference("model-abc:latest"));
        assert!(is_safe_image_reference("registry.local:5000/team/model:v1"));
        assert!(!is_safe_image_reference("-q"));
        assert!(!is_safe_image_reference("model abc"));
        assert!(!is_safe_image_reference("$(evil)"));
    }
}
