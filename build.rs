fn main() {
    println!("cargo:rerun-if-changed=config/motion.json");

    // ESP-IDF link arguments are only needed for the device build.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
