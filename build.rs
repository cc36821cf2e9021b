use chrono::Utc;

fn main() {
    // Exposed as `carvecraft::BUILD_DATE`
    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=BUILD_DATE={}", stamp);
    println!("cargo:rerun-if-changed=build.rs");
}
