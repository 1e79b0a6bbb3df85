//! Authentication settings.

use serde::{Deserialize, Serialize};

use crate::connection::AuthMethod;
use crate::error::ConfigError;

/// Authentication block of the job file, tagged by `method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", deny_unknown_fields)]
pub enum AuthConfig {
    /// Pre-issued access token.
    Oauth {
        server_url: String,
        access_token: String,
    },
    /// SOAP login with username, password and security token.
    UserPassword {
        username: String,
        password: String,
        #[serde(default)]
        security_token: String,
        #[serde(default = "default_auth_end_point")]
        auth_end_point: String,
    },
}

fn default_auth_end_point() -> String {
    "https://login.salesforce.com/services/Soap/u/".to_string()
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: Vec<(&'static str, &str)> = match self {
            AuthConfig::Oauth {
                server_url,
                access_token,
            } => vec![
                ("server_url", server_url.as_str()),
                ("access_token", access_token.as_str()),
            ],
            AuthConfig::UserPassword {
                username,
                password,
                auth_end_point,
                ..
            } => vec![
                ("username", username.as_str()),
                ("password", password.as_str()),
                ("auth_end_point", auth_end_point.as_str()),
            ],
        };

        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ConfigError::MissingCredential { field }),
            None => Ok(()),
        }
    }

    /// Resolve to an [`AuthMethod`]; the SOAP login URL ends in the API version.
    pub fn auth_method(&self, api_version: &str) -> AuthMethod {
        match self {
            AuthConfig::Oauth {
                server_url,
                access_token,
            } => AuthMethod::Token {
                server_url: server_url.clone(),
                access_token: access_token.clone(),
            },
            AuthConfig::UserPassword {
                username,
                password,
                security_token,
                auth_end_point,
            } => AuthMethod::Credentials {
                username: username.clone(),
                password: password.clone(),
                security_token: security_token.clone(),
                login_url: format!("{auth_end_point}{api_version}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_password_defaults() {
        let auth: AuthConfig =
            serde_yaml::from_str("method: user_password\nusername: u\npassword: p\n").unwrap();
        assert_eq!(
            auth.auth_method("46.0"),
            AuthMethod::Credentials {
                username: "u".into(),
                password: "p".into(),
                security_token: String::new(),
                login_url: "https://login.salesforce.com/services/Soap/u/46.0".into(),
            }
        );
    }

    #[test]
    fn test_oauth() {
        let auth: AuthConfig = serde_yaml::from_str(
            "method: oauth\nserver_url: https://acme.my.example.com\naccess_token: t\n",
        )
        .unwrap();
        auth.validate().unwrap();
        assert!(matches!(auth.auth_method("46.0"), AuthMethod::Token { .. }));
    }

    #[test]
    fn test_empty_credential_rejected() {
        let auth = AuthConfig::Oauth {
            server_url: "https://acme.my.example.com".into(),
            access_token: " ".into(),
        };
        assert!(matches!(
            auth.validate(),
            Err(ConfigError::MissingCredential {
                field: "access_token"
            })
        ));
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_yaml::from_str::<AuthConfig>("method: saml\n").is_err());
    }
}
