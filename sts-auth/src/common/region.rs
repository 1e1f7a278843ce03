use regex::Regex;
use std::sync::OnceLock;

fn region_regex() -> &'static Regex {
    static REGION: OnceLock<Regex> = OnceLock::new();
    REGION.get_or_init(|| Regex::new(r"^[a-z]{2}-[a-z]+-[0-9]$").expect("region pattern compiles"))
}

/// Check that a region looks like `us-east-1`
pub fn is_valid_region(region: &str) -> bool {
    region_regex().is_match(region)
}

/// Extract the region from the credential scope of a SigV4 `Authorization` header.
///
/// The header must read
/// `<algorithm> Credential=<key>/<date>/<region>/<service>/<terminator>, SignedHeaders=..., Signature=...`.
/// Any deviation yields `None`; callers turn that into an invalid-parameter error.
pub fn extract_region(authorization: &str) -> Option<&str> {
    let components: Vec<&str> = authorization.split(' ').collect();
    if components.len() != 4 {
        return None;
    }

    let credential = components[1].strip_prefix("Credential=")?;
    let scope: Vec<&str> = credential.trim_end_matches(',').split('/').collect();
    if scope.len() != 5 {
        return None;
    }

    let region = scope[2];
    is_valid_region(region).then_some(region)
}
