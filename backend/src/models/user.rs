use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;

/// User role. Guests are never persisted with this role; it only appears on
/// the synthesized identity for unauthenticated callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Student,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(Role::Guest),
            "user" => Some(Role::User),
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Student => "student",
            Role::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

/// Subscription plan. Determines the usage ceiling for the rolling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Guest,
    Free,
    Student,
    Pro,
    Ultra,
}

impl Plan {
    /// Usage ceiling for the plan. Total mapping, no default arm.
    pub fn usage_limit(&self, quota: &QuotaConfig) -> u32 {
        match self {
            Plan::Guest => quota.guest_limit,
            Plan::Free => quota.free_limit,
            Plan::Student => quota.student_limit,
            Plan::Pro => quota.pro_limit,
            Plan::Ultra => quota.ultra_limit,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(Plan::Guest),
            "free" => Some(Plan::Free),
            "student" => Some(Plan::Student),
            "pro" => Some(Plan::Pro),
            "ultra" => Some(Plan::Ultra),
            _ => None,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Plan::Guest => "guest",
            Plan::Free => "free",
            Plan::Student => "student",
            Plan::Pro => "pro",
            Plan::Ultra => "ultra",
        };
        write!(f, "{}", s)
    }
}

/// Registered user record.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Bcrypt hash. Never leaves the persistence layer in responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Set on every password change; tokens issued before it are invalid.
    pub password_changed_at: Option<DateTime<Utc>>,
    pub role: Role,
    pub plan: Plan,
    pub usage_limit: u32,
    pub usage_count: u32,
    /// End of the current usage period.
    pub reset_usage_at: DateTime<Utc>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Transient identity for unauthenticated callers. Lives only as long as the
/// request (or whatever session the host carries it across); there is no
/// persistent guest ledger.
#[derive(Debug, Clone, Serialize)]
pub struct GuestIdentity {
    pub usage_count: u32,
    pub usage_limit: u32,
}

impl GuestIdentity {
    pub const ID: &'static str = "guest";

    pub fn new(usage_limit: u32) -> Self {
        Self {
            usage_count: 0,
            usage_limit,
        }
    }
}

/// Identity resolved for a request, attached to the request context for
/// downstream handlers.
#[derive(Debug, Clone)]
pub enum Identity {
    Registered(User),
    Guest(GuestIdentity),
}

impl Identity {
    pub fn id(&self) -> &str {
        match self {
            Identity::Registered(user) => &user.id,
            Identity::Guest(_) => GuestIdentity::ID,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::Registered(user) => user.role,
            Identity::Guest(_) => Role::Guest,
        }
    }

    pub fn usage_count(&self) -> u32 {
        match self {
            Identity::Registered(user) => user.usage_count,
            Identity::Guest(guest) => guest.usage_count,
        }
    }

    pub fn usage_limit(&self) -> u32 {
        match self {
            Identity::Registered(user) => user.usage_limit,
            Identity::Guest(guest) => guest.usage_limit,
        }
    }
}
