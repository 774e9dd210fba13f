//! Staleness detection for a running deployment.

/// Decide whether an upcoming deploy must pass `--reconfigure`.
///
/// A lab with no persisted topology document has never been deployed, so
/// a plain deploy suffices. Otherwise any byte difference between the
/// persisted and freshly rendered documents, or any expected node
/// missing from the running set, forces reconfiguration.
pub fn needs_reconfigure(
    persisted: Option<&str>,
    rendered: &str,
    expected: &[String],
    running: &[String],
) -> bool {
    let Some(persisted) = persisted else {
        return false;
    };
    if persisted != rendered {
        return true;
    }
    expected.iter().any(|node| !running.contains(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn fresh_lab_never_reconfigures() {
        assert!(!needs_reconfigure(None, "{}", &names(&["a"]), &[]));
    }

    #[test]
    fn byte_identical_doc_with_all_nodes_up_is_current() {
        let expected = names(&["a", "b"]);
        let running = names(&["b", "a", "extra"]);
        assert!(!needs_reconfigure(Some("{}"), "{}", &expected, &running));
    }

    #[test]
    fn any_byte_difference_forces_reconfigure() {
        assert!(needs_reconfigure(Some("{} "), "{}", &[], &[]));
    }

    #[test]
    fn missing_running_node_forces_reconfigure() {
        let expected = names(&["a", "b"]);
        let running = names(&["a"]);
        assert!(needs_reconfigure(Some("{}"), "{}", &expected, &running));
    }
}
