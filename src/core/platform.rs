//! Host platform, architecture, and build mode resolution.

/// The platform slipway configures for by default.
pub fn host_plat() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macosx",
        "windows" => "windows",
        "freebsd" => "freebsd",
        _ => "linux",
    }
}

/// The host CPU architecture.
pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

/// Whether a platform name selects the mingw cross environment.
pub fn is_mingw(plat: &str) -> bool {
    plat == "mingw"
}

/// Whether a platform name selects macOS.
pub fn is_macosx(plat: &str) -> bool {
    plat == "macosx"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_plat_is_stable() {
        assert_eq!(host_plat(), host_plat());
        assert!(!host_plat().is_empty());
    }

    #[test]
    fn test_mingw_predicate() {
        assert!(is_mingw("mingw"));
        assert!(!is_mingw("linux"));
        assert!(!is_mingw("macosx"));
    }
}
