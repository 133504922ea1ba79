fn main() {
    // The ESP-IDF environment is only exported when cross-compiling for an
    // espidf target (xtensa-esp32-espidf, riscv32imc-esp-espidf, ...).
    // Host builds and `cargo test` skip it.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.ends_with("-espidf") {
        embuild::espidf::sysenv::output();
    }
}
