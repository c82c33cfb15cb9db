//! Build script for crosslite.
//!
//! On non-WASM targets this links the SQLite library the deployment target
//! already ships (the same dynamic `sqlite3` every platform shim of this
//! family binds against). `SQLITE3_LIB_DIR` adds a search path for
//! non-standard installs, and `SQLITE3_STATIC=1` switches to static linking.
//!
//! On WASM targets linking is skipped because `sqlite-wasm-rs` provides the
//! pre-compiled engine.

fn main() {
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    if target_arch == "wasm32" {
        return;
    }

    if let Ok(dir) = std::env::var("SQLITE3_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
    }

    let kind = match std::env::var("SQLITE3_STATIC") {
        Ok(v) if v == "1" => "static",
        _ => "dylib",
    };
    println!("cargo:rustc-link-lib={kind}=sqlite3");

    println!("cargo:rerun-if-env-changed=SQLITE3_LIB_DIR");
    println!("cargo:rerun-if-env-changed=SQLITE3_STATIC");
}
