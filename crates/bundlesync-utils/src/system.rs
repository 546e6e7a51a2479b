/// Retrieves the platform string in the format `ARCH-Os`.
///
/// Package indexes declare the platform they were built for using the same
/// format, e.g. `x86_64-Linux`.
pub fn platform() -> String {
    format!(
        "{}-{}{}",
        std::env::consts::ARCH,
        &std::env::consts::OS[..1].to_uppercase(),
        &std::env::consts::OS[1..]
    )
}

/// Returns true if `declared` names the running platform.
///
/// The comparison ignores ASCII case so `x86_64-linux` and `x86_64-Linux`
/// are treated the same.
pub fn is_current_platform(declared: &str) -> bool {
    declared.trim().eq_ignore_ascii_case(&platform())
}
