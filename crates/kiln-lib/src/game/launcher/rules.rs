//! Platform applicability of libraries and version layout detection.

use crate::game::installer::types::{Arch, OsType};
use crate::game::launcher::version_parser::{Library, Rule, RuleAction};
use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("static version regex")
});

/// Whether `library` applies to the target platform.
///
/// No rules means always allowed. Otherwise the library starts out excluded
/// and the last matching rule decides.
pub fn is_allowed(library: &Library, os: OsType, arch: Arch) -> bool {
    let Some(rules) = &library.rules else {
        return true;
    };

    let mut include = false;
    for rule in rules {
        if rule_matches(rule, os, arch) {
            include = matches!(rule.action, RuleAction::Allow);
        }
    }
    include
}

fn rule_matches(rule: &Rule, os: OsType, arch: Arch) -> bool {
    // No optional features are ever enabled.
    if rule.features.as_ref().is_some_and(|f| !f.is_empty()) {
        return false;
    }

    let Some(os_rule) = &rule.os else {
        return true;
    };

    if os_rule.name.is_none() && os_rule.arch.is_none() {
        return false;
    }

    if let Some(name) = &os_rule.name {
        if name != os.as_str() {
            return false;
        }
    }

    if let Some(rule_arch) = &os_rule.arch {
        if parse_arch(rule_arch) != Some(arch) {
            return false;
        }
    }

    true
}

fn parse_arch(value: &str) -> Option<Arch> {
    match value {
        "x64" | "amd64" | "x86_64" => Some(Arch::X64),
        "x86" | "i386" | "i686" => Some(Arch::X86),
        "arm64" | "aarch64" => Some(Arch::Arm64),
        _ => None,
    }
}

/// Versions from 1.19 on ship natives as plain artifacts (`natives-<os>`)
/// instead of legacy classifier maps.
pub fn is_modern_layout(version_id: &str) -> bool {
    let Some(caps) = VERSION_NUMBER.captures(version_id) else {
        return false;
    };
    let number = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (major, minor) = (number(1), number(2));
    major > 1 || (major == 1 && minor >= 19)
}

/// Classifier suffix for native artifacts on non-default architectures.
pub fn arch_suffix(os: OsType, arch: Arch) -> &'static str {
    match (arch, os) {
        (Arch::Arm64, OsType::Linux) => "-aarch_64",
        (Arch::Arm64, OsType::MacOS | OsType::Windows) => "-arm64",
        _ => "",
    }
}
