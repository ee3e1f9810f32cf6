//! Exposes the crate version in PEP 440 form as `PIPEBRIDGE_PEP440_VERSION`.

fn main() {
    let version = env!("CARGO_PKG_VERSION");
    println!("cargo:rustc-env=PIPEBRIDGE_PEP440_VERSION={}", pep440(version));
}

/// `1.2.0-alpha.3` → `1.2.0a3`, `1.2.0-rc` → `1.2.0rc0`, `1.2.0-dev.1` →
/// `1.2.0.dev1`. Unrecognized pre-release tags pass through unchanged.
fn pep440(version: &str) -> String {
    let Some((base, pre)) = version.split_once('-') else {
        return version.to_string();
    };

    const TAGS: [(&str, &str); 4] = [("alpha", "a"), ("beta", "b"), ("rc", "rc"), ("dev", ".dev")];
    for (tag, short) in TAGS {
        if let Some(rest) = pre.strip_prefix(tag) {
            let n = rest.strip_prefix('.').unwrap_or(rest);
            let n = if n.is_empty() { "0" } else { n };
            return format!("{base}{short}{n}");
        }
    }
    version.to_string()
}
