//! Decides whether an admission request should be sealed.
//!
//! The matcher is a pure function of the request and the [`SealPolicy`]. It
//! never fails: anything it cannot interpret is simply not eligible, so the
//! webhook never blocks objects it does not understand.

use common::protocol::{AdmissionRequest, Operation};
use k8s_openapi::api::core::v1::Secret;

use crate::config::Config;
use crate::crypto::is_sealed_token;

/// Opt-in trigger and the annotations written onto sealed Secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealPolicy {
    pub trigger_annotation: String,
    pub trigger_value: String,
    pub sealed_annotation_prefix: String,
}

impl SealPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            trigger_annotation: cfg.trigger_annotation.clone(),
            trigger_value: cfg.trigger_value.clone(),
            sealed_annotation_prefix: cfg.sealed_annotation_prefix.clone(),
        }
    }

    /// Annotation recording the cipher suite of a sealed Secret.
    pub fn algorithm_annotation(&self) -> String {
        format!("{}/algorithm", self.sealed_annotation_prefix)
    }

    /// Annotation listing the key ids the data key was wrapped to.
    pub fn recipients_annotation(&self) -> String {
        format!("{}/recipients", self.sealed_annotation_prefix)
    }
}

impl Default for SealPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a request was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NotSecret,
    NotCreate,
    NoObject,
    /// The object did not decode as a Secret.
    TypeMismatch,
    NotOptedIn,
    AlreadySealed,
}

impl Ineligible {
    pub fn as_str(self) -> &'static str {
        match self {
            Ineligible::NotSecret => "not_secret",
            Ineligible::NotCreate => "not_create",
            Ineligible::NoObject => "no_object",
            Ineligible::TypeMismatch => "type_mismatch",
            Ineligible::NotOptedIn => "not_opted_in",
            Ineligible::AlreadySealed => "already_sealed",
        }
    }
}

#[derive(Debug)]
pub enum Decision {
    Eligible(Box<Secret>),
    NotEligible(Ineligible),
}

/// Evaluate `request` against `policy`.
pub fn evaluate(request: &AdmissionRequest, policy: &SealPolicy) -> Decision {
    if !(request.kind.group.is_empty() && request.kind.kind == "Secret") {
        return Decision::NotEligible(Ineligible::NotSecret);
    }
    if request.operation != Operation::Create {
        return Decision::NotEligible(Ineligible::NotCreate);
    }
    let Some(raw) = request.object.as_deref() else {
        return Decision::NotEligible(Ineligible::NoObject);
    };
    let Ok(secret) = serde_json::from_str::<Secret>(raw.get()) else {
        return Decision::NotEligible(Ineligible::TypeMismatch);
    };

    let annotations = secret.metadata.annotations.as_ref();
    let opted_in = annotations
        .and_then(|a| a.get(&policy.trigger_annotation))
        .is_some_and(|v| *v == policy.trigger_value);
    if !opted_in {
        return Decision::NotEligible(Ineligible::NotOptedIn);
    }

    let marked_sealed =
        annotations.is_some_and(|a| a.contains_key(&policy.algorithm_annotation()));
    if marked_sealed && holds_only_sealed_values(&secret) {
        return Decision::NotEligible(Ineligible::AlreadySealed);
    }

    Decision::Eligible(Box::new(secret))
}

/// True when nothing in `secret` could still be plaintext: no `stringData`
/// and every `data` value is a sealed token. The annotation alone is client
/// supplied and proves nothing.
fn holds_only_sealed_values(secret: &Secret) -> bool {
    secret.string_data.as_ref().map_or(true, |m| m.is_empty())
        && secret.data.iter().flatten().all(|(_, v)| {
            std::str::from_utf8(&v.0).is_ok_and(is_sealed_token)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request(kind: &str, operation: &str, object: Value) -> AdmissionRequest {
        serde_json::from_value(json!({
            "uid": "u-1",
            "kind": {"group": "", "version": "v1", "kind": kind},
            "resource": {"group": "", "version": "v1", "resource": "secrets"},
            "operation": operation,
            "namespace": "default",
            "name": "creds",
            "object": object
        }))
        .unwrap()
    }

    fn secret(annotations: Value) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "creds", "namespace": "default", "annotations": annotations},
            "data": {"password": "aHVudGVyMg=="}
        })
    }

    fn reason(d: Decision) -> Option<Ineligible> {
        match d {
            Decision::Eligible(_) => None,
            Decision::NotEligible(r) => Some(r),
        }
    }

    #[test]
    fn opted_in_secret_create_is_eligible() {
        let req = request("Secret", "CREATE", secret(json!({"auto-seal": "true"})));
        match evaluate(&req, &SealPolicy::default()) {
            Decision::Eligible(s) => assert_eq!(s.metadata.name.as_deref(), Some("creds")),
            other => panic!("expected eligible, got {other:?}"),
        }
    }

    #[test]
    fn trigger_value_is_case_sensitive() {
        for value in ["True", "TRUE", "yes", "1", " true", ""] {
            let req = request("Secret", "CREATE", secret(json!({"auto-seal": value})));
            assert_eq!(
                reason(evaluate(&req, &SealPolicy::default())),
                Some(Ineligible::NotOptedIn),
                "value {value:?} must not opt in"
            );
        }
    }

    #[test]
    fn missing_annotation_is_not_eligible() {
        let req = request("Secret", "CREATE", secret(json!({"other": "true"})));
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NotOptedIn));

        let bare = json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "x"}});
        let req = request("Secret", "CREATE", bare);
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NotOptedIn));
    }

    #[test]
    fn other_operations_are_not_eligible() {
        for op in ["UPDATE", "DELETE", "CONNECT"] {
            let req = request("Secret", op, secret(json!({"auto-seal": "true"})));
            assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NotCreate));
        }
    }

    #[test]
    fn other_kinds_are_not_eligible() {
        let req = request("ConfigMap", "CREATE", secret(json!({"auto-seal": "true"})));
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NotSecret));
    }

    #[test]
    fn secret_kind_in_another_group_is_not_eligible() {
        let mut req = request("Secret", "CREATE", secret(json!({"auto-seal": "true"})));
        req.kind.group = "bitnami.com".into();
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NotSecret));
    }

    #[test]
    fn undecodable_object_fails_open() {
        let req = request("Secret", "CREATE", json!({"metadata": "not-an-object"}));
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::TypeMismatch));

        let bad_data = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"annotations": {"auto-seal": "true"}},
            "data": {"k": 42}
        });
        let req = request("Secret", "CREATE", bad_data);
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::TypeMismatch));
    }

    #[test]
    fn missing_object_is_not_eligible() {
        let mut req = request("Secret", "CREATE", json!({}));
        req.object = None;
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::NoObject));
    }

    fn sealed_object() -> Value {
        use crate::crypto::{seal, SealContext};
        use crate::keys::{KeyRing, Recipient};
        use aes_gcm_siv::aead::OsRng;
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        use crypto_box::SecretKey;
        use std::collections::BTreeMap;

        let sk = SecretKey::generate(&mut OsRng);
        let ring = KeyRing::new(Recipient::from(sk.public_key()), vec![]);
        let ctx = SealContext {
            namespace: "default",
            name: "creds",
        };
        let fields = BTreeMap::from([("password".to_string(), b"hunter2".to_vec())]);
        let tokens = seal(&ctx, &fields, &ring, &mut OsRng).unwrap().field_tokens();

        let mut object = secret(json!({"auto-seal": "true", "auto-seal.io/algorithm": "x"}));
        object["data"] = json!({"password": STANDARD.encode(&tokens["password"])});
        object
    }

    #[test]
    fn already_sealed_secret_is_not_resealed() {
        let req = request("Secret", "CREATE", sealed_object());
        assert_eq!(reason(evaluate(&req, &SealPolicy::default())), Some(Ineligible::AlreadySealed));
    }

    #[test]
    fn sealed_annotation_over_plaintext_is_still_sealed() {
        let object = secret(json!({"auto-seal": "true", "auto-seal.io/algorithm": "bogus"}));
        let req = request("Secret", "CREATE", object);
        assert!(matches!(evaluate(&req, &SealPolicy::default()), Decision::Eligible(_)));
    }

    #[test]
    fn sealed_annotation_with_string_data_is_still_sealed() {
        let mut object = sealed_object();
        object["stringData"] = json!({"api-key": "sk-live-123"});
        let req = request("Secret", "CREATE", object);
        assert!(matches!(evaluate(&req, &SealPolicy::default()), Decision::Eligible(_)));
    }

    #[test]
    fn one_plaintext_value_among_tokens_is_still_sealed() {
        let mut object = sealed_object();
        object["data"]["extra"] = json!("cGxhaW4=");
        let req = request("Secret", "CREATE", object);
        assert!(matches!(evaluate(&req, &SealPolicy::default()), Decision::Eligible(_)));
    }

    #[test]
    fn custom_trigger_is_honoured() {
        let policy = SealPolicy {
            trigger_annotation: "example.com/seal".into(),
            trigger_value: "enabled".into(),
            ..SealPolicy::default()
        };
        let req = request("Secret", "CREATE", secret(json!({"example.com/seal": "enabled"})));
        assert!(matches!(evaluate(&req, &policy), Decision::Eligible(_)));

        let req = request("Secret", "CREATE", secret(json!({"auto-seal": "true"})));
        assert_eq!(reason(evaluate(&req, &policy)), Some(Ineligible::NotOptedIn));
    }

    #[test]
    fn annotation_names_use_prefix() {
        let policy = SealPolicy::default();
        assert_eq!(policy.algorithm_annotation(), "auto-seal.io/algorithm");
        assert_eq!(policy.recipients_annotation(), "auto-seal.io/recipients");
    }
}
