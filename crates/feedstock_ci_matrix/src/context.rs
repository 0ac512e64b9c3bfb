//! The explicit per-invocation context of the matrix engine.

use rattler_conda_types::Platform;

/// The default image for linux jobs whose spec has no `docker_image`.
pub const DEFAULT_FALLBACK_DOCKER_IMAGE: &str = "quay.io/condaforge/linux-anvil-comp7";

/// Everything the engine needs to know about the platform it expands for.
///
/// A fresh context is created for every platform; nothing is shared between
/// invocations and the engine never consults the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixContext {
    /// The platform the packages are built for
    pub target_platform: Platform,
    /// The platform the CI job runs on
    pub build_platform: Platform,
    /// Whether jobs run on self-hosted runners
    pub self_hosted: bool,
    /// The image used for linux jobs that do not pin `docker_image`
    pub fallback_docker_image: String,
    /// Whether the built packages should be uploaded
    pub upload: bool,
    /// Whether noarch outputs are kept for this platform
    pub keep_noarch: bool,
}

impl MatrixContext {
    /// A context building natively for `target_platform`.
    pub fn new(target_platform: Platform) -> Self {
        Self {
            target_platform,
            build_platform: target_platform,
            self_hosted: false,
            fallback_docker_image: DEFAULT_FALLBACK_DOCKER_IMAGE.to_string(),
            upload: true,
            keep_noarch: true,
        }
    }

    /// The `(platform, arch)` pair, e.g. `("linux", "64")` for `linux-64`.
    pub fn platform_and_arch(&self) -> (String, String) {
        let platform = self.target_platform.to_string();
        match platform.split_once('-') {
            Some((platform, arch)) => (platform.to_string(), arch.to_string()),
            None => (platform, String::new()),
        }
    }

    /// The prefix of every config name of this platform, e.g. `linux_64`.
    pub fn config_prefix(&self) -> String {
        let (platform, arch) = self.platform_and_arch();
        format!("{platform}_{arch}")
    }
}
