pub mod data;
pub mod labelling;
pub mod levenshtein;
pub mod segmentation;
pub mod settings;
