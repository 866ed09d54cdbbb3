//! Content-addressed names for child objects
//!
//! Child names carry a readable prefix of the parent or claim name plus a hash
//! of the full parent identity. Two requests that share a name prefix (or are
//! recreated with the same name) never collide because the hash covers the
//! namespace and uid.

/// Longest readable prefix kept from the source name
const MAX_PREFIX_LEN: usize = 40;

/// Prefix for VolumeGroupSnapshotContent names
pub const CONTENT_PREFIX: &str = "vgsc";

/// Prefix for VolumeSnapshot names
pub const SNAPSHOT_PREFIX: &str = "vs";

/// SHA-256 of `input`, first 8 bytes as lowercase hex
pub fn deterministic_hash(input: &str) -> String {
    use aws_lc_rs::digest;
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

/// Name of the content created for a VolumeGroupSnapshot
pub fn content_name(namespace: &str, request_name: &str, request_uid: &str) -> String {
    let digest = deterministic_hash(&format!("{namespace}/{request_name}/{request_uid}"));
    format!(
        "{CONTENT_PREFIX}-{}-{digest}",
        readable_prefix(request_name)
    )
}

/// Name of the VolumeSnapshot a content creates for one claim
pub fn snapshot_name(
    namespace: &str,
    content_name: &str,
    content_uid: &str,
    claim: &str,
) -> String {
    let digest = deterministic_hash(&format!(
        "{namespace}/{content_name}/{content_uid}\0{claim}"
    ));
    format!("{SNAPSHOT_PREFIX}-{}-{digest}", readable_prefix(claim))
}

fn readable_prefix(name: &str) -> String {
    let truncated: String = name.chars().take(MAX_PREFIX_LEN).collect();
    truncated
        .trim_end_matches(|c| c == '-' || c == '.')
        .to_string()
}
