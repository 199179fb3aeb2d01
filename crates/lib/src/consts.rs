pub const APP_NAME: &str = "sdkgen";

/// Length of the truncated SHA-256 used for cache keys.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Marker written into a cache entry once its producer succeeded.
pub const CACHE_COMPLETE_MARKER: &str = ".sdkgen-complete";

/// Maximum number of redirect hops followed by the HTTP fetcher.
pub const MAX_REDIRECTS: usize = 5;

/// Hosts known to answer 400 instead of 404 for missing artifacts.
pub const DEFAULT_QUIRK_HOSTS: &[&str] = &["download.swift.org"];

pub const DEFAULT_SWIFT_VERSION: &str = "5.9";
pub const DEFAULT_LLD_VERSION: &str = "16.0.5";

pub const DEFAULT_SWIFT_DOWNLOAD_BASE: &str = "https://download.swift.org";
pub const DEFAULT_LLVM_DOWNLOAD_BASE: &str = "https://github.com/llvm/llvm-project/releases/download";

pub const UBUNTU_AMD64_MIRROR: &str = "http://gb.archive.ubuntu.com/ubuntu";
pub const UBUNTU_PORTS_MIRROR: &str = "http://ports.ubuntu.com/ubuntu-ports";

pub const ENGINE_CACHE_ENV: &str = "SDKGEN_ENGINE_CACHE";
pub const DOCKER_PROGRAM_ENV: &str = "SDKGEN_DOCKER";
