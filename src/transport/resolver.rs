//! Stream discovery and name filtering

use std::sync::Arc;
use std::time::Duration;

use super::Transport;
use crate::types::StreamDescriptor;

/// Keep streams whose lowercased name equals or contains a lowercased pattern.
///
/// Blank patterns are ignored; with no remaining patterns every stream
/// matches. Input order is preserved.
pub fn filter_streams<S: AsRef<str>>(
    streams: Vec<StreamDescriptor>,
    patterns: &[S],
) -> Vec<StreamDescriptor> {
    let lowered: Vec<String> = patterns
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if lowered.is_empty() {
        return streams;
    }

    streams
        .into_iter()
        .filter(|stream| {
            let name = stream.name.to_lowercase();
            lowered.iter().any(|p| name == *p || name.contains(p.as_str()))
        })
        .collect()
}

/// Discovers announced streams on a transport
#[derive(Clone)]
pub struct StreamResolver {
    transport: Arc<dyn Transport>,
}

impl StreamResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// All announced streams, waiting up to `wait_budget` for the first one.
    ///
    /// Streams with the same `(name, source_id)` are reported once.
    pub fn resolve(&self, wait_budget: Duration) -> Vec<StreamDescriptor> {
        let mut unique: Vec<StreamDescriptor> = Vec::new();
        for stream in self.transport.resolve(wait_budget) {
            if !unique.iter().any(|s| s.same_identity(&stream)) {
                unique.push(stream);
            }
        }
        tracing::debug!("Resolved {} stream(s)", unique.len());
        unique
    }

    /// Resolve, then keep only streams matching `patterns`
    pub fn resolve_filtered<S: AsRef<str>>(
        &self,
        patterns: &[S],
        wait_budget: Duration,
    ) -> Vec<StreamDescriptor> {
        filter_streams(self.resolve(wait_budget), patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalTransport;

    fn streams(names: &[&str]) -> Vec<StreamDescriptor> {
        names
            .iter()
            .map(|n| StreamDescriptor::event(*n, "src"))
            .collect()
    }

    fn names(streams: &[StreamDescriptor]) -> Vec<&str> {
        streams.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_filter_substring_case_insensitive() {
        let input = streams(&["MadsPipeline_BridgeEvents", "EmotiBit_BrainFlow"]);
        let kept = filter_streams(input, &["bridge"]);
        assert_eq!(names(&kept), vec!["MadsPipeline_BridgeEvents"]);
    }

    #[test]
    fn test_filter_exact_match() {
        let input = streams(&["Mouse", "MouseTracking", "Keys"]);
        let kept = filter_streams(input, &["MOUSE"]);
        assert_eq!(names(&kept), vec!["Mouse", "MouseTracking"]);
    }

    #[test]
    fn test_empty_patterns_keep_everything() {
        let input = streams(&["A", "B"]);
        let none: [&str; 0] = [];
        assert_eq!(filter_streams(input.clone(), &none).len(), 2);
        assert_eq!(filter_streams(input, &["", "  "]).len(), 2);
    }

    #[test]
    fn test_filter_no_match() {
        let kept = filter_streams(streams(&["A"]), &["zzz"]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_resolver_dedupes_and_filters() {
        let transport = Arc::new(LocalTransport::new());
        let _a = transport
            .create_outlet(StreamDescriptor::event("BridgeEvents", "s1"), None)
            .unwrap();
        let _b = transport
            .create_outlet(StreamDescriptor::event("BridgeEvents", "s2"), None)
            .unwrap();
        let _c = transport
            .create_outlet(StreamDescriptor::event("Other", "s1"), None)
            .unwrap();

        let resolver = StreamResolver::new(transport);
        assert_eq!(resolver.resolve(Duration::ZERO).len(), 3);
        let kept = resolver.resolve_filtered(&["bridge"], Duration::ZERO);
        assert_eq!(kept.len(), 2);
    }
}
