//! Runtime configuration

/// Options for creating a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Use the per-type method cache for interned names
    pub method_cache: bool,

    /// Maximum cached entries per type (None = unbounded)
    ///
    /// When a type's cache is full it is flushed before the next insert.
    pub cache_capacity_per_type: Option<usize>,

    /// Initial number of slots in the global type table
    pub initial_type_capacity: usize,

    /// Emit a trace event for every MRO step of a method lookup
    pub trace_method_lookup: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            method_cache: true,
            cache_capacity_per_type: None,
            initial_type_capacity: 64,
            trace_method_lookup: false,
        }
    }
}

impl RuntimeOptions {
    /// Options with the method cache disabled
    pub fn without_cache() -> Self {
        Self {
            method_cache: false,
            ..Default::default()
        }
    }

    /// Options with a bounded per-type method cache
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            cache_capacity_per_type: Some(capacity),
            ..Default::default()
        }
    }

    /// Options with method lookup tracing enabled
    pub fn with_lookup_tracing() -> Self {
        Self {
            trace_method_lookup: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RuntimeOptions::default();
        assert!(options.method_cache);
        assert_eq!(options.cache_capacity_per_type, None);
        assert!(options.initial_type_capacity > 0);
        assert!(!options.trace_method_lookup);
    }

    #[test]
    fn test_constructors_keep_other_defaults() {
        let options = RuntimeOptions::with_cache_capacity(8);
        assert_eq!(options.cache_capacity_per_type, Some(8));
        assert!(options.method_cache);

        assert!(!RuntimeOptions::without_cache().method_cache);
        assert!(RuntimeOptions::with_lookup_tracing().trace_method_lookup);
    }
}
