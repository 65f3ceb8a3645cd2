//! Typed API payloads.
//!
//! Field names follow the API's camelCase wire format. Server-assigned
//! fields are optional so the same type serves requests and responses.

mod application;
mod directory;
mod identity_provider;
mod resource;
mod sign_on_policy;

pub use application::{
    Application, ApplicationAttributeMapping, ApplicationKind, ApplicationResourceGrant,
    MappingType, PROTOCOL_EXTERNAL_LINK, PROTOCOL_OIDC, PROTOCOL_SAML, TYPE_ADMIN_CONSOLE,
    TYPE_PORTAL, TYPE_SELF_SERVICE,
};
pub use directory::{
    Group, PasswordHistory, PasswordLength, PasswordLockout, PasswordPolicy, Population, User,
    UserName, UserPopulation,
};
pub use identity_provider::{
    IdentityProvider, IdpRegistration, IdpVerification, OAuthClient, ProviderKind, SpSigning,
};
pub use resource::{
    PREDEFINED_OPENID_SCOPES, PreviousExpiry, PreviousSecret, RegenerateSecret, Resource,
    ResourceAttribute, ResourceAttributeType, ResourceScope, ResourceSecret, ResourceType,
    is_predefined_openid_scope,
};
pub use sign_on_policy::{
    ActionKind, DiscoveryCondition, DiscoveryRule, Enabled, ProfileAttribute, Registration,
    SignOnPolicy, SignOnPolicyAction, UniqueUserAttribute,
};
