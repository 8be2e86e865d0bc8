//! Juju naming and format rules
//!
//! Predicates and small parsers for the identifiers users type into
//! configuration: user names, model UUIDs, charm channels, offer URLs and
//! JAAS group/role names.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

fn user_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.+-]*[a-zA-Z0-9](@[a-zA-Z0-9][a-zA-Z0-9.-]*[a-zA-Z0-9])?$")
            .expect("static regex")
    })
}

fn model_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+[a-z0-9-]*$").expect("static regex"))
}

fn application_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*$").expect("static regex"))
}

fn jaas_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{3,62}[a-zA-Z0-9]$").expect("static regex"))
}

/// Local (`alice`) or external (`alice@external`) user names.
pub fn is_valid_user_name(name: &str) -> bool {
    user_name_re().is_match(name)
}

pub fn is_valid_model_name(name: &str) -> bool {
    model_name_re().is_match(name)
}

pub fn is_valid_application_name(name: &str) -> bool {
    application_name_re().is_match(name)
}

pub fn is_valid_model_uuid(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok() && id.len() == 36
}

/// JAAS group and role names: 5 to 64 characters of letters, digits, `.`,
/// `_` and `-`, starting and ending with a letter or digit.
pub fn is_valid_group_name(name: &str) -> bool {
    jaas_name_re().is_match(name)
}

pub fn is_valid_role_name(name: &str) -> bool {
    jaas_name_re().is_match(name)
}

pub const CHANNEL_RISKS: &[&str] = &["stable", "candidate", "beta", "edge"];

/// A charm channel of the form `track/risk[/branch]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub track: String,
    pub risk: String,
    pub branch: Option<String>,
}

impl Channel {
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split('/').collect();
        let (track, risk, branch) = match parts.as_slice() {
            [track, risk] => (*track, *risk, None),
            [track, risk, branch] => (*track, *risk, Some(*branch)),
            _ => {
                return Err(format!(
                    "channel {s:?} must be of the form track/risk or track/risk/branch, e.g. latest/stable"
                ))
            }
        };
        if track.is_empty() {
            return Err(format!("channel {s:?} has an empty track"));
        }
        if !CHANNEL_RISKS.contains(&risk) {
            return Err(format!(
                "channel {s:?} has risk {risk:?}; expected one of {}",
                CHANNEL_RISKS.join(", ")
            ));
        }
        if branch == Some("") {
            return Err(format!("channel {s:?} has an empty branch"));
        }
        Ok(Self {
            track: track.to_string(),
            risk: risk.to_string(),
            branch: branch.map(str::to_string),
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.track, self.risk)?;
        if let Some(branch) = &self.branch {
            write!(f, "/{branch}")?;
        }
        Ok(())
    }
}

/// An offer URL `[user/]model.application[:endpoint]`. A controller prefix
/// (`controller:user/model.app`) is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferUrl {
    pub user: Option<String>,
    pub model: String,
    pub application: String,
    pub endpoint: Option<String>,
}

impl OfferUrl {
    pub fn parse(s: &str) -> Result<Self, String> {
        // A colon before the first slash is a controller (source) prefix.
        if let Some(colon) = s.find(':') {
            let slash = s.find('/');
            let dot = s.find('.');
            if slash.map_or(false, |sl| colon < sl) || dot.map_or(true, |d| colon < d) {
                return Err(format!("offer URL {s:?} must not include a controller prefix"));
            }
        }

        let (rest, endpoint) = match s.split_once(':') {
            Some((rest, ep)) if !ep.is_empty() => (rest, Some(ep.to_string())),
            Some(_) => return Err(format!("offer URL {s:?} has an empty endpoint")),
            None => (s, None),
        };
        let (user, model_app) = match rest.split_once('/') {
            Some((user, model_app)) => {
                if !is_valid_user_name(user) {
                    return Err(format!("offer URL {s:?} has an invalid user {user:?}"));
                }
                (Some(user.to_string()), model_app)
            }
            None => (None, rest),
        };
        let (model, application) = model_app
            .split_once('.')
            .ok_or_else(|| format!("offer URL {s:?} must be of the form [user/]model.application"))?;
        if !is_valid_model_name(model) {
            return Err(format!("offer URL {s:?} has an invalid model name {model:?}"));
        }
        if !is_valid_application_name(application) {
            return Err(format!("offer URL {s:?} has an invalid application name {application:?}"));
        }
        Ok(Self {
            user,
            model: model.to_string(),
            application: application.to_string(),
            endpoint,
        })
    }

    /// The URL without the endpoint suffix.
    pub fn without_endpoint(&self) -> String {
        match &self.user {
            Some(user) => format!("{}/{}.{}", user, self.model, self.application),
            None => format!("{}.{}", self.model, self.application),
        }
    }
}

impl fmt::Display for OfferUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.without_endpoint())?;
        if let Some(ep) = &self.endpoint {
            write!(f, ":{ep}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("alice", true)]
    #[test_case("bob.smith", true)]
    #[test_case("carol+ops", true)]
    #[test_case("dave@external", true)]
    #[test_case("a", false ; "too short")]
    #[test_case("-alice", false)]
    #[test_case("alice-", false)]
    #[test_case("alice@", false)]
    #[test_case("al ice", false)]
    fn test_user_names(name: &str, valid: bool) {
        assert_eq!(is_valid_user_name(name), valid);
    }

    #[test_case("latest/stable", true)]
    #[test_case("14/edge", true)]
    #[test_case("latest/candidate/hotfix", true)]
    #[test_case("stable", false ; "risk only")]
    #[test_case("latest/nightly", false ; "unknown risk")]
    #[test_case("/stable", false ; "empty track")]
    #[test_case("latest/stable/", false ; "empty branch")]
    #[test_case("a/b/c/d", false ; "too many parts")]
    fn test_channels(channel: &str, valid: bool) {
        assert_eq!(Channel::parse(channel).is_ok(), valid, "{channel}");
    }

    #[test]
    fn test_channel_round_trip() {
        let c = Channel::parse("3.1/beta/fix").unwrap();
        assert_eq!(c.branch.as_deref(), Some("fix"));
        assert_eq!(c.to_string(), "3.1/beta/fix");
    }

    #[test]
    fn test_offer_url_parts() {
        let url = OfferUrl::parse("admin/db.postgresql:database").unwrap();
        assert_eq!(url.user.as_deref(), Some("admin"));
        assert_eq!(url.model, "db");
        assert_eq!(url.application, "postgresql");
        assert_eq!(url.endpoint.as_deref(), Some("database"));
        assert_eq!(url.without_endpoint(), "admin/db.postgresql");
    }

    #[test_case("db.postgresql", true)]
    #[test_case("admin/db.postgresql", true)]
    #[test_case("admin/db.postgresql:db", true)]
    #[test_case("ctrl:admin/db.postgresql", false ; "controller prefix")]
    #[test_case("ctrl:db.postgresql", false ; "controller prefix without user")]
    #[test_case("admin/dbpostgresql", false ; "missing dot")]
    #[test_case("admin/db.", false ; "missing application")]
    #[test_case("admin/db.pg:", false ; "empty endpoint")]
    fn test_offer_urls(url: &str, valid: bool) {
        assert_eq!(OfferUrl::parse(url).is_ok(), valid, "{url}");
    }

    #[test]
    fn test_model_uuid() {
        assert!(is_valid_model_uuid("6a4d1d5c-2e2f-4d8c-8e36-3ef0f9c7a9a1"));
        assert!(!is_valid_model_uuid("not-a-uuid"));
        assert!(!is_valid_model_uuid("6a4d1d5c2e2f4d8c8e363ef0f9c7a9a1"));
    }

    #[test_case("devops", true)]
    #[test_case("team.alpha_1", true)]
    #[test_case("abc", false ; "too short")]
    #[test_case("_hidden", false ; "leading underscore")]
    #[test_case("trailing-", false)]
    fn test_group_names(name: &str, valid: bool) {
        assert_eq!(is_valid_group_name(name), valid);
        assert_eq!(is_valid_role_name(name), valid);
    }
}
