use once_cell::sync::Lazy;

/// Facts about this binary captured by the build script.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_status: &'static str,
    pub built_at: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

pub static BUILD_INFO: Lazy<BuildInfo> = Lazy::new(|| BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    git_hash: env!("BCM_LEDGER_BUILD_HASH"),
    git_status: env!("BCM_LEDGER_BUILD_STATUS"),
    built_at: env!("BCM_LEDGER_BUILD_TIMESTAMP"),
    target: env!("BCM_LEDGER_BUILD_TARGET"),
    profile: env!("BCM_LEDGER_BUILD_PROFILE"),
    rustc: env!("BCM_LEDGER_BUILD_RUSTC"),
});

impl BuildInfo {
    pub fn summary(&self) -> String {
        format!(
            "bcm_ledger {} ({} {}, {} {}, built {})",
            self.version, self.git_hash, self.git_status, self.target, self.profile, self.built_at
        )
    }
}
