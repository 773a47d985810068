use serde::Deserialize;

/// Knobs for a loading run.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoaderOptions {
    /// Lines per commit. `0` commits once per file.
    #[serde(default)]
    pub batch_size: usize,
    /// Log each file as it is loaded, and the elapsed time of the run.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub handler: HandlerOptions,
}

impl LoaderOptions {
    pub fn per_file() -> Self {
        Self::default()
    }

    pub fn batched(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    /// Whether `lines` processed lines in the current file close a batch.
    pub fn closes_batch(&self, lines: u64) -> bool {
        self.batch_size > 0 && lines % self.batch_size as u64 == 0
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct HandlerOptions {
    /// Reject events whose `type` is missing or unknown.
    #[serde(default)]
    pub strict_event_types: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_batch_size_never_closes_a_batch() {
        let options = LoaderOptions::per_file();
        assert!(!options.closes_batch(1));
        assert!(!options.closes_batch(1000));
    }

    #[test]
    fn batches_close_on_multiples() {
        let options = LoaderOptions::batched(100);
        assert!(!options.closes_batch(99));
        assert!(options.closes_batch(100));
        assert!(options.closes_batch(300));
    }

    #[test]
    fn deserializes_with_defaults() {
        let options: LoaderOptions =
            serde_json::from_str(r#"{"batch_size":50,"handler":{"strict_event_types":true}}"#)
                .unwrap();
        assert_eq!(options.batch_size, 50);
        assert!(!options.verbose);
        assert!(options.handler.strict_event_types);
    }
}
