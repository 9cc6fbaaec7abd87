use std::process::Command;

fn main() {
    let git_hash = command_stdout("git", &["rev-parse", "--short", "HEAD"]);
    println!("cargo:rustc-env=TALLYBOT_GIT_HASH={}", git_hash);

    let build_date = command_stdout("date", &["+%Y-%m-%d"]);
    println!("cargo:rustc-env=TALLYBOT_BUILD_DATE={}", build_date);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}

/// Trimmed stdout of a helper command, or `unknown` when it is unavailable.
fn command_stdout(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
