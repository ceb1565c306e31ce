//! Free-form compose flags given as `--flags a,no-deps,...`.

/// Turn a comma separated flag list into compose arguments: a one-letter
/// flag becomes a short option, anything longer a long option.
/// Duplicates are dropped.
pub fn translate_flags(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for flag in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let flag = flag.trim_start_matches('-');
        if flag.is_empty() {
            continue;
        }
        let arg = if flag.chars().count() == 1 {
            format!("-{flag}")
        } else {
            format!("--{flag}")
        };
        if !out.contains(&arg) {
            out.push(arg);
        }
    }
    out
}

fn has_any(flags: &[String], names: &[&str]) -> bool {
    flags.iter().any(|f| names.contains(&f.as_str()))
}

/// Arguments for `compose up`: `-d` when detached, plus the operator flags.
pub fn up_flags(detached: bool, raw: Option<&str>) -> Vec<String> {
    let extra = raw.map(translate_flags).unwrap_or_default();
    let mut flags = Vec::new();
    if detached && !has_any(&extra, &["-d", "--detach"]) {
        flags.push("-d".to_owned());
    }
    flags.extend(extra);
    flags
}

/// Arguments for `compose down`: `--volumes` when cleaning, unless the
/// operator already asked for volume removal.
pub fn down_flags(clean: bool, raw: Option<&str>) -> Vec<String> {
    let extra = raw.map(translate_flags).unwrap_or_default();
    let mut flags = Vec::new();
    if clean && !has_any(&extra, &["-v", "--volumes"]) {
        flags.push("--volumes".to_owned());
    }
    flags.extend(extra);
    flags
}

/// Arguments for the create step of `reup`. `--no-start` is implied and
/// detaching is meaningless there, so both are dropped. Unless `recreate`
/// is set, dependent services are left alone with `--no-deps`.
pub fn recreate_flags(recreate: bool, raw: Option<&str>) -> Vec<String> {
    let mut flags: Vec<String> = raw
        .map(translate_flags)
        .unwrap_or_default()
        .into_iter()
        .filter(|f| !matches!(f.as_str(), "--no-start" | "-d" | "--detach"))
        .collect();
    if !recreate && !has_any(&flags, &["--no-deps"]) {
        flags.insert(0, "--no-deps".to_owned());
    }
    flags
}
