pub const DEFAULT_NGRAMS: usize = 3;

pub const BOS_FEATURE: &str = "BOS";
pub const EOS_FEATURE: &str = "EOS";

/// Turns a sequence of segments into per-segment feature strings.
///
/// Each segment yields `bias`, `shape=<segment>`, `prefix{i}=` and
/// `suffix{i}=` for `i` in `1..=ngrams`, then either `prev_shape=` or `BOS`
/// and either `next_shape=` or `EOS`. Affixes are counted in chars; a
/// segment shorter than `i` contributes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFeaturizer {
    ngrams: usize,
}

impl Default for SegmentFeaturizer {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAMS)
    }
}

impl SegmentFeaturizer {
    pub fn new(ngrams: usize) -> Self {
        Self { ngrams }
    }

    pub fn ngrams(&self) -> usize {
        self.ngrams
    }

    pub fn convert<S: AsRef<str>>(&self, sequence: &[S]) -> Vec<Vec<String>> {
        (0..sequence.len())
            .map(|index| self.convert_segment(sequence, index))
            .collect()
    }

    pub fn convert_many<S: AsRef<str>>(&self, sequences: &[Vec<S>]) -> Vec<Vec<Vec<String>>> {
        sequences.iter().map(|seq| self.convert(seq)).collect()
    }

    fn convert_segment<S: AsRef<str>>(&self, sequence: &[S], index: usize) -> Vec<String> {
        let segment = sequence[index].as_ref();
        let chars: Vec<char> = segment.chars().collect();

        let mut features = Vec::with_capacity(4 + 2 * self.ngrams);
        features.push("bias".to_string());
        features.push(format!("shape={segment}"));
        for i in 1..=self.ngrams {
            let n = i.min(chars.len());
            let prefix: String = chars[..n].iter().collect();
            let suffix: String = chars[chars.len() - n..].iter().collect();
            features.push(format!("prefix{i}={prefix}"));
            features.push(format!("suffix{i}={suffix}"));
        }

        match index.checked_sub(1) {
            Some(prev) => features.push(format!("prev_shape={}", sequence[prev].as_ref())),
            None => features.push(BOS_FEATURE.to_string()),
        }
        match sequence.get(index + 1) {
            Some(next) => features.push(format!("next_shape={}", next.as_ref())),
            None => features.push(EOS_FEATURE.to_string()),
        }
        features
    }
}
