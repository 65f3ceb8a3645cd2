//! `pingone_sign_on_policy_action`: one priority-ordered step of a sign-on policy.
//!
//! An action is exactly one of eight variants, each configured by its own
//! block. Registration and social sign-on settings only apply to variants
//! that can start a registration (login, identifier-first, external IdP).
//!
//! Priorities are unique within a policy. Reordering issues one update per
//! action; a clash is rejected by the service and reported as-is.

use super::{environment_id, known, object_ref, parent_id, ref_id, string_set, to_list};
use crate::api::{Api, NotFound, require};
use crate::lookup::fetch_sign_on_policy;
use crate::validators::Cidr;
use declarative::validators::{
    ConflictsWith, ExactlyOneOf, IntAtLeast, LengthAtLeast, NotEmptyBlock, OneOf, UuidShape,
};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{
    ActionKind, DiscoveryCondition, DiscoveryRule, Enabled, ProfileAttribute, Registration,
    SignOnPolicyAction, UniqueUserAttribute,
};
use pingone::{Client, ObjectRef, paths};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

const VARIANT_BLOCKS: &[&str] = &[
    "login",
    "identifier_first",
    "identity_provider",
    "mfa",
    "agreement",
    "progressive_profiling",
    "pingid",
    "pingid_windows_login_passwordless",
];

const REGISTRATION_ATTRIBUTES: &[&str] = &[
    "registration_external_href",
    "registration_local_population_id",
    "registration_confirm_user_attributes",
    "social_provider_ids",
];

const LAST_SIGN_ON: &str = "${session.lastSignOn.withAuthenticator.pwd.at}";
const USER_POPULATION: &str = "${user.population.id}";
const REMOTE_IP: &str = "${flow.request.http.remoteIp}";
const IP_RISK: &str = "${ip.risk.level}";
const GEOVELOCITY: &str = "${ip.geovelocity.anomaly}";
const ANONYMOUS_NETWORK: &str = "${ip.anonymousNetwork.detected}";
const DISCOVERY_SUBJECT: &str = "${identifier}";

/// Default re-prompt interval for progressive profiling, 90 days
const DEFAULT_PROMPT_INTERVAL_SECONDS: i64 = 7_776_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAttributeEqualsModel {
    pub attribute_reference: AttrValue<String>,
    pub value: AttrValue<String>,
}

/// Clauses of the compound condition; the action applies when any holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsModel {
    pub last_sign_on_older_than_seconds: AttrValue<i64>,
    pub user_is_member_of_any_population_id: AttrValue<BTreeSet<String>>,
    pub user_attribute_equals: AttrValue<Vec<UserAttributeEqualsModel>>,
    pub ip_out_of_range_cidr: AttrValue<BTreeSet<String>>,
    pub ip_reputation_high_risk: AttrValue<bool>,
    pub geovelocity_anomaly_detected: AttrValue<bool>,
    pub anonymous_network_detected: AttrValue<bool>,
    pub anonymous_network_detected_allowed_cidr: AttrValue<BTreeSet<String>>,
}

impl ConditionsModel {
    /// Wire clauses, in a fixed order
    fn clauses(&self) -> Vec<Value> {
        let mut clauses = Vec::new();
        if let Some(seconds) = self.last_sign_on_older_than_seconds.known() {
            clauses.push(json!({"secondsSince": LAST_SIGN_ON, "greater": seconds}));
        }
        for population in self.user_is_member_of_any_population_id.known().into_iter().flatten() {
            clauses.push(json!({"value": USER_POPULATION, "equals": population}));
        }
        for equals in self.user_attribute_equals.known().into_iter().flatten() {
            clauses.push(json!({
                "value": equals.attribute_reference.known_or_default(),
                "equals": equals.value.known_or_default(),
            }));
        }
        if let Some(cidrs) = to_list(&self.ip_out_of_range_cidr) {
            clauses.push(json!({"ipRange": cidrs, "ipOutOfRange": REMOTE_IP}));
        }
        if self.ip_reputation_high_risk.known_or(false) {
            clauses.push(json!({"value": IP_RISK, "equals": "HIGH"}));
        }
        if self.geovelocity_anomaly_detected.known_or(false) {
            clauses.push(json!({"value": GEOVELOCITY, "equals": true}));
        }
        if self.anonymous_network_detected.known_or(false) {
            let mut clause = json!({"value": ANONYMOUS_NETWORK, "equals": true});
            if let (Some(allowed), Some(map)) = (
                to_list(&self.anonymous_network_detected_allowed_cidr),
                clause.as_object_mut(),
            ) {
                map.insert("allowedCidr".into(), json!(allowed));
            }
            clauses.push(clause);
        }
        clauses
    }

    fn to_document(&self) -> Option<Value> {
        let clauses = self.clauses();
        (!clauses.is_empty()).then(|| json!({ "or": clauses }))
    }

    /// Decode a condition document; flags the prior state held as `false`
    /// stay `false` rather than becoming null
    fn from_document(document: &Value, prior: Option<&Self>) -> Self {
        let clauses = match document.get("or").and_then(Value::as_array) {
            Some(clauses) => clauses.clone(),
            None => vec![document.clone()],
        };
        let mut last_sign_on = None;
        let mut populations = Vec::new();
        let mut attributes = Vec::new();
        let mut out_of_range = None;
        let mut allowed = None;
        let (mut high_risk, mut geovelocity, mut anonymous) = (false, false, false);

        for clause in &clauses {
            let value = clause.get("value").and_then(Value::as_str);
            if clause.get("secondsSince").and_then(Value::as_str) == Some(LAST_SIGN_ON) {
                last_sign_on = clause.get("greater").and_then(Value::as_i64);
            } else if clause.get("ipOutOfRange").is_some() {
                out_of_range = Some(strings(clause.get("ipRange")));
            } else {
                match value {
                    Some(USER_POPULATION) => {
                        if let Some(id) = clause.get("equals").and_then(Value::as_str) {
                            populations.push(id.to_string());
                        }
                    }
                    Some(IP_RISK) => high_risk = true,
                    Some(GEOVELOCITY) => geovelocity = true,
                    Some(ANONYMOUS_NETWORK) => {
                        anonymous = true;
                        allowed = Some(strings(clause.get("allowedCidr")));
                    }
                    Some(reference) => attributes.push(UserAttributeEqualsModel {
                        attribute_reference: AttrValue::Known(reference.to_string()),
                        value: AttrValue::from_option(
                            clause.get("equals").and_then(Value::as_str).map(str::to_string),
                        ),
                    }),
                    None => log::warn!("Ignoring unrecognised condition clause {clause}"),
                }
            }
        }

        Self {
            last_sign_on_older_than_seconds: last_sign_on.into(),
            user_is_member_of_any_population_id: string_set(Some(populations)),
            user_attribute_equals: (!attributes.is_empty()).then_some(attributes).into(),
            ip_out_of_range_cidr: string_set(out_of_range),
            ip_reputation_high_risk: flag(high_risk, prior.map(|c| &c.ip_reputation_high_risk)),
            geovelocity_anomaly_detected: flag(geovelocity, prior.map(|c| &c.geovelocity_anomaly_detected)),
            anonymous_network_detected: flag(anonymous, prior.map(|c| &c.anonymous_network_detected)),
            anonymous_network_detected_allowed_cidr: string_set(allowed),
        }
    }
}

fn flag(found: bool, prior: Option<&AttrValue<bool>>) -> AttrValue<bool> {
    match (found, prior) {
        (true, _) => AttrValue::Known(true),
        (false, Some(prior)) if prior.is_known() => AttrValue::Known(false),
        _ => AttrValue::Null,
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginModel {
    pub recovery_enabled: AttrValue<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryRuleModel {
    pub attribute_contains_text: AttrValue<String>,
    pub identity_provider_id: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierFirstModel {
    pub recovery_enabled: AttrValue<bool>,
    pub discovery_rule: AttrValue<Vec<DiscoveryRuleModel>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderActionModel {
    pub identity_provider_id: AttrValue<String>,
    pub acr_values: AttrValue<String>,
    pub pass_user_context: AttrValue<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfaModel {
    pub device_sign_on_policy_id: AttrValue<String>,
    pub no_device_mode: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementModel {
    pub agreement_id: AttrValue<String>,
    pub show_decline_option: AttrValue<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileAttributeModel {
    pub name: AttrValue<String>,
    pub required: AttrValue<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressiveProfilingModel {
    pub prevent_multiple_prompts_per_flow: AttrValue<bool>,
    pub prompt_interval_seconds: AttrValue<i64>,
    pub prompt_text: AttrValue<String>,
    pub attribute: AttrValue<Vec<ProfileAttributeModel>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingIdModel {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingIdWindowsModel {
    pub unique_user_attribute_name: AttrValue<String>,
    pub offline_mode_enabled: AttrValue<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOnPolicyActionModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub sign_on_policy_id: AttrValue<String>,
    pub priority: AttrValue<i64>,
    pub registration_external_href: AttrValue<String>,
    pub registration_local_population_id: AttrValue<String>,
    pub registration_confirm_user_attributes: AttrValue<bool>,
    pub social_provider_ids: AttrValue<BTreeSet<String>>,
    pub enforce_lockout_for_identity_providers: AttrValue<bool>,
    pub conditions: AttrValue<ConditionsModel>,
    pub login: AttrValue<LoginModel>,
    pub identifier_first: AttrValue<IdentifierFirstModel>,
    pub identity_provider: AttrValue<IdentityProviderActionModel>,
    pub mfa: AttrValue<MfaModel>,
    pub agreement: AttrValue<AgreementModel>,
    pub progressive_profiling: AttrValue<ProgressiveProfilingModel>,
    pub pingid: AttrValue<PingIdModel>,
    pub pingid_windows_login_passwordless: AttrValue<PingIdWindowsModel>,
}

impl SignOnPolicyActionModel {
    /// Action variant from the declared block
    fn kind(&self) -> Option<ActionKind> {
        if let Some(b) = self.login.known() {
            return Some(ActionKind::Login {
                recovery: Some(Enabled::new(b.recovery_enabled.known_or(false))),
            });
        }
        if let Some(b) = self.identifier_first.known() {
            let rules = b.discovery_rule.known().map(Vec::as_slice).unwrap_or_default();
            return Some(ActionKind::IdentifierFirst {
                recovery: Some(Enabled::new(b.recovery_enabled.known_or(false))),
                discovery_rules: rules
                    .iter()
                    .map(|rule| DiscoveryRule {
                        condition: DiscoveryCondition {
                            contains: rule.attribute_contains_text.known_or_default(),
                            value: DISCOVERY_SUBJECT.to_string(),
                        },
                        identity_provider: ObjectRef::new(rule.identity_provider_id.known_or_default()),
                    })
                    .collect(),
            });
        }
        if let Some(b) = self.identity_provider.known() {
            return Some(ActionKind::Idp {
                identity_provider: ObjectRef::new(b.identity_provider_id.known_or_default()),
                acr_values: b.acr_values.non_empty().map(str::to_string),
                pass_user_context: b.pass_user_context.known_or(false),
            });
        }
        if let Some(b) = self.mfa.known() {
            return Some(ActionKind::MultiFactorAuthentication {
                device_authentication_policy: ObjectRef::new(b.device_sign_on_policy_id.known_or_default()),
                no_device_mode: b.no_device_mode.non_empty().map(str::to_string),
            });
        }
        if let Some(b) = self.agreement.known() {
            return Some(ActionKind::Agreement {
                agreement: ObjectRef::new(b.agreement_id.known_or_default()),
                disable_decline_option: !b.show_decline_option.known_or(true),
            });
        }
        if let Some(b) = self.progressive_profiling.known() {
            let attributes = b.attribute.known().map(Vec::as_slice).unwrap_or_default();
            return Some(ActionKind::ProgressiveProfiling {
                prevent_multiple_prompts_per_flow: b.prevent_multiple_prompts_per_flow.known_or(true),
                prompt_interval_seconds: b
                    .prompt_interval_seconds
                    .known_or(DEFAULT_PROMPT_INTERVAL_SECONDS),
                prompt_text: b.prompt_text.known_or_default(),
                attributes: attributes
                    .iter()
                    .map(|a| ProfileAttribute {
                        name: a.name.known_or_default(),
                        required: a.required.known_or(false),
                    })
                    .collect(),
            });
        }
        if self.pingid.is_known() {
            return Some(ActionKind::PingId);
        }
        if let Some(b) = self.pingid_windows_login_passwordless.known() {
            return Some(ActionKind::PingIdWindowsLoginPasswordless {
                unique_user_attribute: UniqueUserAttribute {
                    name: b.unique_user_attribute_name.known_or_default(),
                },
                offline_mode: Enabled::new(b.offline_mode_enabled.known_or(false)),
            });
        }
        None
    }

    /// Replace the variant blocks with the one the API reports
    fn set_kind(&mut self, kind: ActionKind) {
        self.login = AttrValue::Null;
        self.identifier_first = AttrValue::Null;
        self.identity_provider = AttrValue::Null;
        self.mfa = AttrValue::Null;
        self.agreement = AttrValue::Null;
        self.progressive_profiling = AttrValue::Null;
        self.pingid = AttrValue::Null;
        self.pingid_windows_login_passwordless = AttrValue::Null;
        match kind {
            ActionKind::Login { recovery } => {
                self.login = AttrValue::Known(LoginModel {
                    recovery_enabled: AttrValue::Known(recovery.is_some_and(|r| r.enabled)),
                });
            }
            ActionKind::IdentifierFirst {
                recovery,
                discovery_rules,
            } => {
                let rules: Vec<DiscoveryRuleModel> = discovery_rules
                    .into_iter()
                    .map(|rule| DiscoveryRuleModel {
                        attribute_contains_text: AttrValue::Known(rule.condition.contains),
                        identity_provider_id: AttrValue::Known(rule.identity_provider.id),
                    })
                    .collect();
                self.identifier_first = AttrValue::Known(IdentifierFirstModel {
                    recovery_enabled: AttrValue::Known(recovery.is_some_and(|r| r.enabled)),
                    discovery_rule: (!rules.is_empty()).then_some(rules).into(),
                });
            }
            ActionKind::Idp {
                identity_provider,
                acr_values,
                pass_user_context,
            } => {
                self.identity_provider = AttrValue::Known(IdentityProviderActionModel {
                    identity_provider_id: AttrValue::Known(identity_provider.id),
                    acr_values: acr_values.into(),
                    pass_user_context: AttrValue::Known(pass_user_context),
                });
            }
            ActionKind::MultiFactorAuthentication {
                device_authentication_policy,
                no_device_mode,
            } => {
                self.mfa = AttrValue::Known(MfaModel {
                    device_sign_on_policy_id: AttrValue::Known(device_authentication_policy.id),
                    no_device_mode: no_device_mode.into(),
                });
            }
            ActionKind::Agreement {
                agreement,
                disable_decline_option,
            } => {
                self.agreement = AttrValue::Known(AgreementModel {
                    agreement_id: AttrValue::Known(agreement.id),
                    show_decline_option: AttrValue::Known(!disable_decline_option),
                });
            }
            ActionKind::ProgressiveProfiling {
                prevent_multiple_prompts_per_flow,
                prompt_interval_seconds,
                prompt_text,
                attributes,
            } => {
                let attributes: Vec<ProfileAttributeModel> = attributes
                    .into_iter()
                    .map(|a| ProfileAttributeModel {
                        name: AttrValue::Known(a.name),
                        required: AttrValue::Known(a.required),
                    })
                    .collect();
                self.progressive_profiling = AttrValue::Known(ProgressiveProfilingModel {
                    prevent_multiple_prompts_per_flow: AttrValue::Known(prevent_multiple_prompts_per_flow),
                    prompt_interval_seconds: AttrValue::Known(prompt_interval_seconds),
                    prompt_text: AttrValue::Known(prompt_text),
                    attribute: (!attributes.is_empty()).then_some(attributes).into(),
                });
            }
            ActionKind::PingId => self.pingid = AttrValue::Known(PingIdModel {}),
            ActionKind::PingIdWindowsLoginPasswordless {
                unique_user_attribute,
                offline_mode,
            } => {
                self.pingid_windows_login_passwordless = AttrValue::Known(PingIdWindowsModel {
                    unique_user_attribute_name: AttrValue::Known(unique_user_attribute.name),
                    offline_mode_enabled: AttrValue::Known(offline_mode.enabled),
                });
            }
            ActionKind::Unknown => {}
        }
    }

    /// Registration-related attributes that are set
    fn registration_attributes(&self) -> Vec<&'static str> {
        let set = [
            self.registration_external_href.non_empty().is_some(),
            self.registration_local_population_id.non_empty().is_some(),
            self.registration_confirm_user_attributes.is_known(),
            to_list(&self.social_provider_ids).is_some(),
        ];
        REGISTRATION_ATTRIBUTES
            .iter()
            .zip(set)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }
}

pub struct SignOnPolicyActionReconciler {
    client: Arc<Client>,
}

impl SignOnPolicyActionReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Apply-time checks the schema cannot express; every problem is reported
    fn check(plan: &SignOnPolicyActionModel, diags: &mut Diagnostics) -> Option<ActionKind> {
        let Some(kind) = plan.kind() else {
            diags.error(
                "Missing action settings",
                format!("One of the blocks {} must be declared.", VARIANT_BLOCKS.join(", ")),
            );
            return None;
        };
        let mut valid = true;
        if !kind.supports_registration() {
            for attribute in plan.registration_attributes() {
                diags.attribute_error(
                    attribute,
                    "Invalid attribute combination",
                    format!(
                        "Attribute \"{attribute}\" only applies to login, identifier_first and identity_provider actions, not {}.",
                        kind.type_name()
                    ),
                );
                valid = false;
            }
        }
        if let Some(conditions) = plan.conditions.known()
            && conditions.clauses().is_empty()
        {
            diags.attribute_error(
                "conditions",
                "Empty conditions",
                "The conditions block must enable at least one clause; remove it to make the action unconditional.",
            );
            valid = false;
        }
        valid.then_some(kind)
    }

    fn expand(plan: &SignOnPolicyActionModel, kind: ActionKind) -> SignOnPolicyAction {
        let registration = match (
            plan.registration_local_population_id.non_empty(),
            plan.registration_external_href.non_empty(),
        ) {
            (None, None) => None,
            (population, href) => Some(Registration {
                enabled: true,
                population: population.map(ObjectRef::new),
                external_href: href.map(str::to_string),
            }),
        };
        SignOnPolicyAction {
            id: None,
            priority: plan.priority.known_or_default(),
            kind,
            conditions: plan.conditions.known().and_then(ConditionsModel::to_document),
            registration,
            social_providers: to_list(&plan.social_provider_ids)
                .unwrap_or_default()
                .into_iter()
                .map(ObjectRef::new)
                .collect(),
            enforce_lockout_for_identity_providers: plan.enforce_lockout_for_identity_providers.known().copied(),
            confirm_identity_provider_attributes: plan.registration_confirm_user_attributes.known().copied(),
            sign_on_policy: object_ref(&plan.sign_on_policy_id),
        }
    }

    fn project(
        action: SignOnPolicyAction,
        mut model: SignOnPolicyActionModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyActionModel> {
        if action.kind == ActionKind::Unknown {
            diags.attribute_error(
                "id",
                "Unsupported sign-on policy action",
                format!(
                    "Action {} has a type this provider does not manage.",
                    action.id.as_deref().unwrap_or_default()
                ),
            );
            return None;
        }
        let registration = action.registration.filter(|r| r.enabled).unwrap_or_default();
        let prior_conditions = model.conditions.known().cloned();

        model.id = action.id.into();
        model.priority = AttrValue::Known(action.priority);
        model.registration_external_href = registration.external_href.into();
        model.registration_local_population_id = ref_id(registration.population.as_ref());
        model.registration_confirm_user_attributes = action.confirm_identity_provider_attributes.into();
        model.social_provider_ids = string_set(Some(action.social_providers.into_iter().map(|p| p.id).collect()));
        model.enforce_lockout_for_identity_providers = action.enforce_lockout_for_identity_providers.into();
        model.conditions = action
            .conditions
            .as_ref()
            .map(|doc| ConditionsModel::from_document(doc, prior_conditions.as_ref()))
            .into();
        if let Some(policy) = action.sign_on_policy {
            model.sign_on_policy_id = AttrValue::Known(policy.id);
        }
        model.set_kind(action.kind);
        Some(model)
    }
}

impl Reconciler for SignOnPolicyActionReconciler {
    type Model = SignOnPolicyActionModel;

    fn type_name(&self) -> &'static str {
        "pingone_sign_on_policy_action"
    }

    fn schema(&self) -> Schema {
        let user_attribute_equals = Schema::new("User attribute comparison.")
            .attribute(Attribute::string("attribute_reference").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("value").required());
        let conditions = Schema::new("The action applies when any declared clause holds.")
            .attribute(Attribute::int("last_sign_on_older_than_seconds").optional().validate(IntAtLeast(1)))
            .attribute(
                Attribute::string_set("user_is_member_of_any_population_id")
                    .optional()
                    .validate(UuidShape),
            )
            .attribute(Attribute::block_list("user_attribute_equals", user_attribute_equals).optional())
            .attribute(Attribute::string_set("ip_out_of_range_cidr").optional().validate(Cidr))
            .attribute(Attribute::bool("ip_reputation_high_risk").optional())
            .attribute(Attribute::bool("geovelocity_anomaly_detected").optional())
            .attribute(Attribute::bool("anonymous_network_detected").optional())
            .attribute(
                Attribute::string_set("anonymous_network_detected_allowed_cidr")
                    .optional()
                    .validate(Cidr),
            );

        let discovery_rule = Schema::new("Routes identifiers to an external identity provider.")
            .attribute(Attribute::string("attribute_contains_text").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("identity_provider_id").required().validate(UuidShape));
        let login = Schema::new("Username and password sign-on.")
            .attribute(Attribute::bool("recovery_enabled").optional_computed());
        let identifier_first = Schema::new("Identifier-first sign-on with IdP discovery.")
            .attribute(Attribute::bool("recovery_enabled").optional_computed())
            .attribute(Attribute::block_list("discovery_rule", discovery_rule).optional());
        let identity_provider = Schema::new("Sign-on through an external identity provider.")
            .attribute(Attribute::string("identity_provider_id").required().validate(UuidShape))
            .attribute(Attribute::string("acr_values").optional())
            .attribute(Attribute::bool("pass_user_context").optional_computed());
        let mfa = Schema::new("Multi-factor authentication.")
            .attribute(Attribute::string("device_sign_on_policy_id").required().validate(UuidShape))
            .attribute(
                Attribute::string("no_device_mode")
                    .optional()
                    .validate(OneOf(&["BYPASS", "BLOCK"])),
            );
        let agreement = Schema::new("Terms-of-use agreement.")
            .attribute(Attribute::string("agreement_id").required().validate(UuidShape))
            .attribute(Attribute::bool("show_decline_option").optional_computed());
        let profile_attribute = Schema::new("A profile attribute to collect.")
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::bool("required").required());
        let progressive_profiling = Schema::new("Collects missing profile data over time.")
            .attribute(Attribute::bool("prevent_multiple_prompts_per_flow").optional_computed())
            .attribute(Attribute::int("prompt_interval_seconds").optional_computed().validate(IntAtLeast(0)))
            .attribute(Attribute::string("prompt_text").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::block_list("attribute", profile_attribute).required());
        let pingid_windows = Schema::new("PingID passwordless Windows login.")
            .attribute(Attribute::string("unique_user_attribute_name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::bool("offline_mode_enabled").optional_computed());

        Schema::new("Manages one action of a sign-on policy.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("sign_on_policy_id", "The ID of the sign-on policy the action belongs to."))
            .attribute(
                Attribute::int("priority")
                    .required()
                    .validate(IntAtLeast(1))
                    .describe("Evaluation order within the policy; unique per policy."),
            )
            .attribute(
                Attribute::string("registration_external_href")
                    .optional()
                    .validate(ConflictsWith(&["registration_local_population_id"])),
            )
            .attribute(
                Attribute::string("registration_local_population_id")
                    .optional()
                    .validate(UuidShape)
                    .validate(ConflictsWith(&["registration_external_href"])),
            )
            .attribute(Attribute::bool("registration_confirm_user_attributes").optional())
            .attribute(Attribute::string_set("social_provider_ids").optional().validate(UuidShape))
            .attribute(Attribute::bool("enforce_lockout_for_identity_providers").optional())
            .attribute(Attribute::block("conditions", conditions).optional().validate(NotEmptyBlock))
            .attribute(Attribute::block("login", login).optional().validate(ExactlyOneOf(VARIANT_BLOCKS)))
            .attribute(Attribute::block("identifier_first", identifier_first).optional())
            .attribute(Attribute::block("identity_provider", identity_provider).optional())
            .attribute(Attribute::block("mfa", mfa).optional())
            .attribute(Attribute::block("agreement", agreement).optional())
            .attribute(Attribute::block("progressive_profiling", progressive_profiling).optional())
            .attribute(Attribute::block("pingid", Schema::new("PingID authentication.")).optional())
            .attribute(Attribute::block("pingid_windows_login_passwordless", pingid_windows).optional())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("sign_on_policy_id", "sign_on_policy_action_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: SignOnPolicyActionModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyActionModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let policy = known(&plan.sign_on_policy_id, "sign_on_policy_id", diags)?;
        let kind = Self::check(&plan, diags)?;
        fetch_sign_on_policy(&api, env, policy, false, diags)?;
        let body = Self::expand(&plan, kind);
        let created: SignOnPolicyAction = api
            .invoke("CreateSignOnPolicyAction", env, NotFound::Error, diags, |c| {
                c.create(&paths::sign_on_policy_actions(env, policy), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateSignOnPolicyAction", "action ID", diags)?;
        Self::project(created, plan, diags)
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: SignOnPolicyActionModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyActionModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let policy = known(&state.sign_on_policy_id, "sign_on_policy_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let action: SignOnPolicyAction = api
            .invoke("ReadOneSignOnPolicyAction", env, NotFound::Warn, diags, |c| {
                c.get(&paths::sign_on_policy_action(env, policy, id))
            })
            .found()?;
        Self::project(action, state, diags)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: SignOnPolicyActionModel,
        prior: SignOnPolicyActionModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyActionModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let policy = known(&plan.sign_on_policy_id, "sign_on_policy_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let kind = Self::check(&plan, diags)?;
        if let Some(previous) = prior.kind()
            && previous.type_name() != kind.type_name()
        {
            diags.error(
                "Sign-on policy action type cannot change",
                format!(
                    "Action {id} is a {} action; replace it to switch to {}.",
                    previous.type_name(),
                    kind.type_name()
                ),
            );
            return None;
        }

        let body = Self::expand(&plan, kind);
        let updated: SignOnPolicyAction = api
            .invoke(
                "UpdateSignOnPolicyAction",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::sign_on_policy_action(env, policy, id), &body),
            )
            .found()?;
        Self::project(updated, plan, diags)
    }

    fn delete(&self, ctx: &ApplyContext, state: SignOnPolicyActionModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(policy), Some(id)) = (
            state.environment_id.as_str(),
            state.sign_on_policy_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        api.delete(
            "DeleteSignOnPolicyAction",
            env,
            &paths::sign_on_policy_action(env, policy, id),
            diags,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use pingone::Method;

    fn login(fx: &Fixture, policy: &str, priority: i64) -> SignOnPolicyActionModel {
        SignOnPolicyActionModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            sign_on_policy_id: AttrValue::Known(policy.into()),
            priority: AttrValue::Known(priority),
            login: AttrValue::Known(LoginModel {
                recovery_enabled: AttrValue::Known(true),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_with_registration_round_trip() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Default_Login");
        let population = fx.population("Customers");
        let (ctx, mut diags) = fx.call();

        let mut plan = login(&fx, &policy, 1);
        plan.registration_local_population_id = AttrValue::Known(population.clone());
        plan.registration_confirm_user_attributes = AttrValue::Known(true);
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");

        let stored = fx
            .mock
            .get(&paths::sign_on_policy_action(&fx.env, &policy, created.id.as_str().unwrap()))
            .unwrap();
        assert_eq!(stored["type"], json!("LOGIN"));
        assert_eq!(stored["registration"]["population"]["id"], json!(population));
        assert_eq!(stored["recovery"]["enabled"], json!(true));

        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);
        assert_eq!(r.update(&ctx, created.clone(), created.clone(), &mut diags).unwrap(), created);
    }

    #[test]
    fn test_registration_targets_conflict() {
        let fx = Fixture::new();
        let r = erase(SignOnPolicyActionReconciler::new(fx.client.clone()));
        let policy = fx.sign_on_policy("Default_Login");
        let population = fx.population("Customers");
        let (ctx, mut diags) = fx.call();

        let config = json!({
            "environment_id": fx.env,
            "sign_on_policy_id": policy,
            "priority": 1,
            "registration_external_href": "https://register.example.com",
            "registration_local_population_id": population,
            "login": {},
        });
        fx.mock.clear_requests();
        assert!(r.create(&ctx, &config, &mut diags).is_none());
        assert_eq!(diags.error_count(), 2);
        assert_eq!(fx.mock.mutations(), 0);
    }

    #[test]
    fn test_registration_rejected_for_mfa() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Step_Up");
        let device_policy = fx.sign_on_policy("Devices");
        let (ctx, mut diags) = fx.call();

        let plan = SignOnPolicyActionModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            sign_on_policy_id: AttrValue::Known(policy),
            priority: AttrValue::Known(2),
            registration_external_href: AttrValue::Known("https://register.example.com".into()),
            social_provider_ids: AttrValue::Known([device_policy.clone()].into()),
            mfa: AttrValue::Known(MfaModel {
                device_sign_on_policy_id: AttrValue::Known(device_policy),
                ..Default::default()
            }),
            ..Default::default()
        };
        fx.mock.clear_requests();
        assert!(r.create(&ctx, plan, &mut diags).is_none());
        assert_eq!(diags.error_count(), 2);
        assert!(diags.mentions("MULTI_FACTOR_AUTHENTICATION"));
        assert!(fx.mock.requests().is_empty());
    }

    #[test]
    fn test_priority_clash_is_not_retried() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Default_Login");
        let (ctx, mut diags) = fx.call();

        r.create(&ctx, login(&fx, &policy, 1), &mut diags).unwrap();
        fx.mock.clear_requests();

        let mut second = login(&fx, &policy, 1);
        second.login = AttrValue::Null;
        second.pingid = AttrValue::Known(PingIdModel {});
        assert!(r.create(&ctx, second, &mut diags).is_none());
        assert_eq!(
            fx.mock.count(Method::Post, &paths::sign_on_policy_actions(&fx.env, &policy)),
            1
        );
        let error = diags.errors().next().unwrap();
        assert_eq!(error.attribute.as_deref(), Some("priority"));
    }

    #[test]
    fn test_reorder_updates_in_place() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Default_Login");
        let (ctx, mut diags) = fx.call();

        let first = r.create(&ctx, login(&fx, &policy, 1), &mut diags).unwrap();
        let mut moved = first.clone();
        moved.priority = AttrValue::Known(5);
        let updated = r.update(&ctx, moved, first.clone(), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.priority, AttrValue::Known(5));
    }

    #[test]
    fn test_conditions_round_trip() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Step_Up");
        let staff = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let mut plan = login(&fx, &policy, 1);
        plan.conditions = AttrValue::Known(ConditionsModel {
            last_sign_on_older_than_seconds: AttrValue::Known(86_400),
            user_is_member_of_any_population_id: AttrValue::Known([staff].into()),
            user_attribute_equals: AttrValue::Known(vec![UserAttributeEqualsModel {
                attribute_reference: AttrValue::Known("${user.lifecycle.status}".into()),
                value: AttrValue::Known("ACCOUNT_OK".into()),
            }]),
            ip_out_of_range_cidr: AttrValue::Known(["10.0.0.0/8".to_string()].into()),
            ip_reputation_high_risk: AttrValue::Known(false),
            anonymous_network_detected: AttrValue::Known(true),
            anonymous_network_detected_allowed_cidr: AttrValue::Known(["192.168.0.0/16".to_string()].into()),
            ..Default::default()
        });
        let created = r.create(&ctx, plan.clone(), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.conditions, plan.conditions);

        let stored = fx
            .mock
            .get(&paths::sign_on_policy_action(&fx.env, &policy, created.id.as_str().unwrap()))
            .unwrap();
        assert_eq!(stored["conditions"]["or"].as_array().map(Vec::len), Some(5));
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);
    }

    #[test]
    fn test_empty_conditions_rejected() {
        let fx = Fixture::new();
        let r = erase(SignOnPolicyActionReconciler::new(fx.client.clone()));
        let policy = fx.sign_on_policy("Step_Up");
        let (ctx, mut diags) = fx.call();

        let config = json!({
            "environment_id": fx.env,
            "sign_on_policy_id": policy,
            "priority": 1,
            "conditions": {},
            "pingid": {},
        });
        assert!(r.create(&ctx, &config, &mut diags).is_none());
        assert!(diags.errors().any(|d| d.attribute.as_deref() == Some("conditions")));
    }

    #[test]
    fn test_variant_block_required() {
        let fx = Fixture::new();
        let r = erase(SignOnPolicyActionReconciler::new(fx.client.clone()));
        let policy = fx.sign_on_policy("Step_Up");
        let (ctx, mut diags) = fx.call();

        let config = json!({"environment_id": fx.env, "sign_on_policy_id": policy, "priority": 1});
        assert!(r.create(&ctx, &config, &mut diags).is_none());
        assert!(diags.mentions("No attribute specified"));
    }

    #[test]
    fn test_identifier_first_and_import() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Discovery");
        let idp = fx.mock.insert(
            &paths::identity_providers(&fx.env),
            json!({"name": "Corp", "enabled": true, "type": "MICROSOFT", "clientId": "c"}),
        );
        let (ctx, mut diags) = fx.call();

        let plan = SignOnPolicyActionModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            sign_on_policy_id: AttrValue::Known(policy.clone()),
            priority: AttrValue::Known(1),
            social_provider_ids: AttrValue::Known([idp.clone()].into()),
            identifier_first: AttrValue::Known(IdentifierFirstModel {
                recovery_enabled: AttrValue::Known(false),
                discovery_rule: AttrValue::Known(vec![DiscoveryRuleModel {
                    attribute_contains_text: AttrValue::Known("@corp.example.com".into()),
                    identity_provider_id: AttrValue::Known(idp),
                }]),
            }),
            ..Default::default()
        };
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");

        let erased = erase(SignOnPolicyActionReconciler::new(fx.client.clone()));
        let id = created.id.as_str().unwrap();
        let imported = erased
            .import_state(&ctx, &format!("{}/{policy}/{id}", fx.env), &mut diags)
            .unwrap();
        assert_eq!(imported, serde_json::to_value(&created).unwrap());
    }

    #[test]
    fn test_type_change_is_rejected() {
        let fx = Fixture::new();
        let r = SignOnPolicyActionReconciler::new(fx.client.clone());
        let policy = fx.sign_on_policy("Default_Login");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, login(&fx, &policy, 1), &mut diags).unwrap();
        let mut pingid = created.clone();
        pingid.login = AttrValue::Null;
        pingid.pingid = AttrValue::Known(PingIdModel {});
        assert!(r.update(&ctx, pingid, created, &mut diags).is_none());
        assert!(diags.mentions("replace it to switch to PINGID"));
    }
}
