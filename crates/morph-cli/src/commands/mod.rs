macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod align_ops;
pub mod config_ops;
pub mod model_ops;
pub mod pipeline_ops;

use morph_core::segmentation::Segment;

/// `seg/label` pairs joined with `-`.
pub fn format_analysis(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("{}/{}", s.text, s.label))
        .collect::<Vec<_>>()
        .join("-")
}
