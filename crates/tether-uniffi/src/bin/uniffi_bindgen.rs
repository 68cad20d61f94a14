/// Custom uniffi-bindgen binary for generating language bindings.
///
/// Generates Python/Kotlin/Swift bindings from the compiled tether-uniffi
/// cdylib.
///
/// Usage:
///   cargo run -p tether-uniffi --bin tether-uniffi-bindgen --features cli -- \
///     generate --library -l python -o bindings/python \
///     target/release/libtether_uniffi.so
fn main() {
    uniffi::uniffi_bindgen_main();
}
