use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::error::ConfigError;

fn arn_regex() -> &'static Regex {
    static ARN: OnceLock<Regex> = OnceLock::new();
    ARN.get_or_init(|| {
        Regex::new(r"^arn:aws:iam::[0-9]+:(user|role)/[a-zA-Z0-9_.\-]+$")
            .expect("ARN pattern compiles")
    })
}

/// Check that an ARN names an IAM user or role: `arn:aws:iam::<account>:(user|role)/<name>`
pub fn is_valid_arn(arn: &str) -> bool {
    arn_regex().is_match(arn)
}

/// Fixed set of IAM principals allowed past the middleware
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    arns: HashSet<String>,
}

impl AllowList {
    /// Build the allow-list, failing on the first malformed ARN.
    ///
    /// A malformed entry can never match a verified identity, so it is treated as a
    /// configuration bug rather than skipped.
    pub fn new<I, S>(arns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for arn in arns {
            let arn = arn.into();
            if !is_valid_arn(&arn) {
                return Err(ConfigError::invalid_arn(arn));
            }
            set.insert(arn);
        }
        Ok(Self { arns: set })
    }

    pub fn is_authorized(&self, arn: &str) -> bool {
        self.arns.contains(arn)
    }

    pub fn len(&self) -> usize {
        self.arns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arns.is_empty()
    }
}
