//! Corpus walker.
//!
//! Merge conflicts depend on the order contributions arrive in, so the walk
//! imposes its own total order on the registry: files sorted by path, then
//! top-level messages in declaration order, each message's nested messages
//! depth-first before the message itself.

use crate::registry::SchemaRegistry;
use prost_reflect::MessageDescriptor;
use tracing::trace;

/// A message definition together with the file declaring it
#[derive(Debug, Clone)]
pub struct MessageSite {
    /// Path of the declaring file
    pub file: String,
    /// The message definition
    pub message: MessageDescriptor,
}

/// Every message definition in the corpus, in aggregation order
pub fn corpus_order(registry: &dyn SchemaRegistry) -> Vec<MessageSite> {
    let mut files = registry.files();
    files.sort_by(|a, b| a.name().cmp(b.name()));

    let mut sites = Vec::new();
    for file in files {
        trace!("Walking file {}", file.name());
        for message in file.messages() {
            push_nested_first(file.name(), message, &mut sites);
        }
    }
    sites
}

fn push_nested_first(file: &str, message: MessageDescriptor, sites: &mut Vec<MessageSite>) {
    for nested in message.child_messages() {
        push_nested_first(file, nested, sites);
    }
    sites.push(MessageSite {
        file: file.to_string(),
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, Msg, SchemaFile};
    use pretty_assertions::assert_eq;

    fn names(registry: &dyn SchemaRegistry) -> Vec<String> {
        corpus_order(registry)
            .into_iter()
            .filter(|site| site.message.package_name() == "corpus")
            .map(|site| format!("{}:{}", site.file, site.message.full_name()))
            .collect()
    }

    #[test]
    fn test_files_sorted_nested_first() {
        let registry = fixtures::corpus(vec![
            SchemaFile::new("z.proto", vec![Msg::new("Z")]),
            SchemaFile::new(
                "a.proto",
                vec![
                    Msg::new("A")
                        .nested(Msg::new("Inner").nested(Msg::new("Deep")))
                        .nested(Msg::new("Second")),
                    Msg::new("B"),
                ],
            ),
        ]);

        assert_eq!(
            names(&registry),
            [
                "a.proto:corpus.A.Inner.Deep",
                "a.proto:corpus.A.Inner",
                "a.proto:corpus.A.Second",
                "a.proto:corpus.A",
                "a.proto:corpus.B",
                "z.proto:corpus.Z",
            ]
        );
    }

    #[test]
    fn test_order_is_repeatable() {
        let registry = fixtures::corpus(vec![
            SchemaFile::new("b.proto", vec![Msg::new("B")]),
            SchemaFile::new("a.proto", vec![Msg::new("A")]),
        ]);
        assert_eq!(names(&registry), names(&registry));
    }

    #[test]
    fn test_includes_option_definitions() {
        let registry = fixtures::corpus(vec![]);
        let sites = corpus_order(&registry);
        assert!(sites.iter().any(|s| s.message.full_name() == "tpl.Data.EntriesEntry"));
        assert_eq!(sites[0].file, "google/protobuf/descriptor.proto");
    }
}
