//! Version command implementation

use crate::error::Result;
use crate::platform::Platform;

/// Run version command
pub fn run() -> Result<()> {
    let platform = Platform::detect();

    println!("appdeploy {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Build info:");
    println!("  Rust version: {}", rustc_version());
    println!("  Profile: {}", build_profile());
    println!("  Platform: {}", platform.os.label());
    println!(
        "  Default runtime home: {}",
        platform.default_runtime_home.display()
    );

    Ok(())
}

fn rustc_version() -> &'static str {
    env!("CARGO_PKG_RUST_VERSION")
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
