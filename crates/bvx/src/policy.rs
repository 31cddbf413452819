// ai
//! 🔒 Policy Builder — bucket policies, written by hand so nobody has to write them by hand.
//!
//! Two documents, both pure functions, both JSON once serialised:
//! - `readonly_policy`: the whole internet may list and read this container. Nothing else.
//! - `access_token_policy`: do anything to this benchmark's resource, EXCEPT the things
//!   that would let you (or a leaked token) purge governance-retained objects.
//!
//! ⚠️ Statement order matters to humans reading the JSON, not to S3. We keep it stable anyway.

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::version::validate_benchmark_name;

const POLICY_LANGUAGE_VERSION: &str = "2012-10-17";

/// 🚫 What a benchmark token may never do, no matter how nicely it asks.
const RETENTION_GUARDED_ACTIONS: &[&str] = &[
    "s3:BypassGovernanceRetention",
    "s3:DeleteObjectTagging",
    "s3:DeleteObjectVersion",
    "s3:DeleteObjectVersionTagging",
    "s3:DeleteObjectRetention",
    "s3:DeleteBucket",
    "s3:ForceDeleteBucket",
    "s3:DeleteBucketPolicy",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// 👤 `{"AWS": "*"}` — everyone. Yes, everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "AWS")]
    pub aws: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    pub resource: String,
}

/// 📜 An S3 bucket policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_LANGUAGE_VERSION.to_string(),
            statement,
        }
    }

    /// 📦 The JSON the store's put-policy call wants.
    pub fn to_json(&self) -> String {
        // -- ✅ plain structs of strings and vecs; serde_json cannot fail on them
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn actions(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| (*a).to_string()).collect()
}

fn anyone() -> Option<Principal> {
    Some(Principal {
        aws: "*".to_string(),
    })
}

/// 🌍 Anonymous principals may locate, list and read the container and its objects.
pub fn readonly_policy(container: &str) -> StoreResult<PolicyDocument> {
    validate_container_name(container)?;
    Ok(PolicyDocument::new(vec![
        Statement {
            effect: Effect::Allow,
            principal: anyone(),
            action: actions(&["s3:GetBucketLocation", "s3:ListBucket", "s3:ListObjects"]),
            resource: format!("arn:aws:s3:::{container}"),
        },
        Statement {
            effect: Effect::Allow,
            principal: anyone(),
            action: actions(&["s3:GetObject"]),
            resource: format!("arn:aws:s3:::{container}/*"),
        },
    ]))
}

/// 🔑 Full control over one benchmark's resource, minus retention bypass and hard deletes.
pub fn access_token_policy(benchmark: &str) -> StoreResult<PolicyDocument> {
    validate_benchmark_name(benchmark)?;
    let resource = format!("arn:aws:s3:::{benchmark}");
    Ok(PolicyDocument::new(vec![
        Statement {
            effect: Effect::Allow,
            principal: None,
            action: actions(&["s3:*"]),
            resource: resource.clone(),
        },
        Statement {
            effect: Effect::Deny,
            principal: None,
            action: actions(RETENTION_GUARDED_ACTIONS),
            resource,
        },
    ]))
}

// -- 🪣 container names are benchmark names with dot-separated suffixes
fn validate_container_name(container: &str) -> StoreResult<()> {
    container
        .split('.')
        .try_for_each(validate_benchmark_name)
        .map_err(|_| crate::error::StoreError::InvalidName(container.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn the_one_where_the_whole_internet_can_read_but_not_write() {
        let the_policy = readonly_policy("bm.0.1").expect("💀 valid container rejected");
        let the_json: serde_json::Value = serde_json::from_str(&the_policy.to_json())
            .expect("💀 the policy JSON does not round-trip through serde_json");

        assert_eq!(the_json["Version"], "2012-10-17");
        assert_eq!(the_json["Statement"][0]["Effect"], "Allow");
        assert_eq!(the_json["Statement"][0]["Principal"]["AWS"], "*");
        assert_eq!(the_json["Statement"][0]["Resource"], "arn:aws:s3:::bm.0.1");
        assert_eq!(
            the_json["Statement"][0]["Action"],
            serde_json::json!(["s3:GetBucketLocation", "s3:ListBucket", "s3:ListObjects"])
        );
        assert_eq!(the_json["Statement"][1]["Action"], serde_json::json!(["s3:GetObject"]));
        assert_eq!(the_json["Statement"][1]["Resource"], "arn:aws:s3:::bm.0.1/*");
    }

    #[test]
    fn the_one_where_tokens_can_do_anything_except_the_scary_stuff() {
        let the_policy = access_token_policy("bm").expect("💀 valid benchmark rejected");

        assert_eq!(the_policy.statement.len(), 2);
        assert_eq!(the_policy.statement[0].effect, Effect::Allow);
        assert_eq!(the_policy.statement[0].action, vec!["s3:*".to_string()]);
        assert_eq!(the_policy.statement[1].effect, Effect::Deny);
        assert!(the_policy.statement[1].action.contains(&"s3:BypassGovernanceRetention".to_string()));
        assert!(the_policy.statement[1].action.contains(&"s3:ForceDeleteBucket".to_string()));
        assert!(the_policy.statement.iter().all(|s| s.principal.is_none()));
        assert!(!the_policy.to_json().contains("Principal"));
    }

    #[test]
    fn the_one_where_structurally_cursed_names_get_no_policy() {
        assert!(matches!(readonly_policy("bm..1"), Err(StoreError::InvalidName(_))));
        assert!(matches!(readonly_policy("BM.0.1"), Err(StoreError::InvalidName(_))));
        assert!(matches!(access_token_policy("bm.0.1"), Err(StoreError::InvalidName(_))));
    }
}
