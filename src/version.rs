//! Service version; patch and build hash are stamped by CI.

pub const MAJOR: u32 = 1;
pub const MINOR: u32 = 18;
pub const PATCH: u32 = 3;

pub fn build_hash() -> &'static str {
    option_env!("BUILD_HASH").unwrap_or("dev")
}

pub fn version() -> String {
    format!("{}.{}.{}-{}", MAJOR, MINOR, PATCH, build_hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_carries_every_component() {
        let version = version();
        assert!(version.starts_with(&format!("{}.{}.{}-", MAJOR, MINOR, PATCH)));
        assert!(version.ends_with(build_hash()));
    }
}
