use std::fs;

pub fn settings_export() {
    print!("{}", morph_core::settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(
        morph_core::settings::parse_settings_toml(&content),
        "Error: {}"
    );
    println!(
        "OK: featurizer.mode={}, search.max_candidates={}, labeller.c1={}, labeller.c2={}, \
         labeller.search.iterations={}",
        s.featurizer.mode,
        s.search.max_candidates,
        s.labeller.c1,
        s.labeller.c2,
        s.labeller.search.iterations
    );
}

/// Install a custom settings file before anything reads the settings.
pub fn init_settings(file: Option<&str>) {
    let Some(file) = file else {
        return;
    };
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    die!(
        morph_core::settings::init_custom(content),
        "Error in {file}: {}"
    );
}
