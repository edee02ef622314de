use std::env;
use std::fs;
use std::path::Path;

fn git_output(args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    // Monotonic build number kept alongside the sources
    let build_number_file = Path::new("build_number.txt");
    let build_number = if build_number_file.exists() {
        fs::read_to_string(build_number_file)
            .unwrap_or_else(|_| "1".to_string())
            .trim()
            .parse::<u32>()
            .unwrap_or(1)
    } else {
        1
    };
    let new_build_number = build_number + 1;
    fs::write(build_number_file, new_build_number.to_string())
        .expect("Failed to write build number");

    let git_hash = git_output(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let git_branch =
        git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let build_time = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    println!("cargo:rustc-env=BUILD_NUMBER={}", new_build_number);
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    let package_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
    let full_version = format!("{}.{}", package_version, new_build_number);

    println!("cargo:rustc-env=FULL_VERSION={}", full_version);
    println!("cargo:rustc-env=VERSION_WITH_GIT={}+{}", full_version, git_hash);
}
