//! Version compatibility for APIs whose shape moved between Kubernetes releases.
//!
//! Each adapter picks a concrete API generation from the kubelet version and exposes one
//! version independent surface to the components. An empty version means "latest".

pub mod priority_class;
pub mod webhook;

pub use priority_class::{SchedulingVersion, VersionedPriorityClass};
pub use webhook::{AdmissionVersion, Webhook, WebhookConfiguration, WebhookKind};

/// Returns true when `kubelet_version` is at or above `v<major>.<minor>`.
///
/// Versions look like `v1.27.3-eks-a5565ad`; only major and minor take part. A version
/// that cannot be parsed falls back to plain string ordering against the threshold.
pub fn version_at_least(kubelet_version: &str, major: u32, minor: u32) -> bool {
    if kubelet_version.is_empty() {
        return true;
    }

    match parse_major_minor(kubelet_version) {
        Some(version) => version >= (major, minor),
        None => kubelet_version >= format!("v{major}.{minor}").as_str(),
    }
}

fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.strip_prefix('v').unwrap_or(version).split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some((major, minor.parse().ok()?))
}
