// Version and build information

/// Build information structure
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub build_date: String,
    pub build_hash: String,
    pub build_clean: String,
    pub target_triple: String,
    pub optimized: bool,
    pub journal_backends: String,
}

/// Get the crate version baked in at compile time
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get current build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: version(),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown").to_string(),
        build_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_clean: option_env!("GIT_CLEAN").unwrap_or("unknown").to_string(),
        target_triple: option_env!("BUILD_TARGET").unwrap_or("unknown").to_string(),
        optimized: cfg!(not(debug_assertions)),
        journal_backends: option_env!("JOURNAL_BACKENDS")
            .unwrap_or("journalctl")
            .to_string(),
    }
}

/// Version display format
impl BuildInfo {
    pub fn format_display(&self) -> String {
        format!("tunnelkeeper v{}", self.version)
    }

    pub fn format_detailed(&self) -> String {
        let mut result = self.format_display();

        if !self.build_hash.is_empty() && self.build_hash != "unknown" {
            result.push_str(&format!(" (commit {})", self.build_hash));
        }

        if self.build_clean == "false" {
            result.push_str(" [dirty]");
        }

        result
    }

    pub fn format_build_info(&self) -> String {
        format!(
            "Build: {}\nTarget: {}\nProfile: {}\nGit: {}\nClean: {}\nJournal backends: {}",
            self.build_date,
            self.target_triple,
            if self.optimized { "release" } else { "debug" },
            self.build_hash,
            self.build_clean,
            self.journal_backends
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_tool() {
        let info = build_info();
        assert_eq!(
            info.format_display(),
            format!("tunnelkeeper v{}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_detailed_marks_dirty_tree() {
        let info = BuildInfo {
            build_hash: "abc1234".to_string(),
            build_clean: "false".to_string(),
            ..build_info()
        };
        assert!(info.format_detailed().ends_with("(commit abc1234) [dirty]"));
    }

    #[test]
    fn test_journalctl_backend_always_listed() {
        let backends = build_info().journal_backends;
        assert!(backends.contains("journalctl"), "{}", backends);
        assert_eq!(
            backends.contains("sd-journal"),
            cfg!(feature = "sd-journal"),
            "{}",
            backends
        );
    }

    #[test]
    fn test_build_info_lists_backends() {
        assert!(build_info()
            .format_build_info()
            .contains("Journal backends: "));
    }
}
