fn main() {
    // Release builds stamp the version through WINEPORT_VERSION; local builds use Cargo.toml
    let version = std::env::var("WINEPORT_VERSION")
        .unwrap_or_else(|_| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo:rustc-env=WINEPORT_BUILD_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=WINEPORT_VERSION");
}
