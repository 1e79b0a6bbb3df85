//! Session factory.
//!
//! Two strategies produce a [`Session`]: a pre-issued OAuth access token, or a
//! SOAP `login` call with username, password and security token. Only
//! sessions created by a SOAP login are logged out on close.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use snafu::prelude::*;
use tracing::debug;
use url::Url;

use crate::error::{
    ConnectionError, InvalidUrlSnafu, LoginRequestSnafu, LoginXmlSnafu, LogoutSnafu,
    MalformedLoginSnafu,
};

/// Login response elements read by [`parse_login_response`].
const LOGIN_ELEMENTS: &[&str] = &["sessionId", "serverUrl", "faultcode", "faultstring"];

/// How a worker authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Use an already issued access token against `server_url`.
    Token {
        server_url: String,
        access_token: String,
    },
    /// Log in through the SOAP partner endpoint at `login_url`.
    Credentials {
        username: String,
        password: String,
        security_token: String,
        login_url: String,
    },
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    /// Scheme, host and port of the instance serving REST calls.
    pub instance_url: Url,
    /// SOAP endpoint to log out from, for sessions created by a login call.
    pub logout_url: Option<Url>,
}

impl AuthMethod {
    /// Produce a session, performing a login call when needed.
    pub async fn login(&self, client: &reqwest::Client) -> Result<Session, ConnectionError> {
        match self {
            AuthMethod::Token {
                server_url,
                access_token,
            } => Ok(Session {
                session_id: access_token.clone(),
                instance_url: instance_origin(server_url)?,
                logout_url: None,
            }),
            AuthMethod::Credentials {
                username,
                password,
                security_token,
                login_url,
            } => {
                let envelope = login_envelope(username, &format!("{password}{security_token}"));
                let body = client
                    .post(login_url)
                    .header("Content-Type", "text/xml; charset=UTF-8")
                    .header("SOAPAction", "login")
                    .body(envelope)
                    .send()
                    .await
                    .context(LoginRequestSnafu)?
                    .text()
                    .await
                    .context(LoginRequestSnafu)?;

                let session = parse_login_response(&body)?;
                debug!(instance = %session.instance_url, "Logged in");
                Ok(session)
            }
        }
    }
}

/// Invalidate a session created by a SOAP login. Token sessions are left alone.
pub async fn logout(client: &reqwest::Client, session: &Session) -> Result<(), ConnectionError> {
    let Some(url) = &session.logout_url else {
        return Ok(());
    };

    client
        .post(url.clone())
        .header("Content-Type", "text/xml; charset=UTF-8")
        .header("SOAPAction", "logout")
        .body(logout_envelope(&session.session_id))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .context(LogoutSnafu)?;

    Ok(())
}

/// Reduce a server URL to the instance origin used for REST calls.
pub fn instance_origin(server_url: &str) -> Result<Url, ConnectionError> {
    let parsed = Url::parse(server_url).context(InvalidUrlSnafu { url: server_url })?;
    let origin = parsed.origin().ascii_serialization();
    Url::parse(&origin).context(InvalidUrlSnafu { url: server_url })
}

fn parse_login_response(body: &str) -> Result<Session, ConnectionError> {
    let mut elements = read_elements(body)?;

    if let Some(code) = elements.remove("faultcode") {
        let message = elements.remove("faultstring").unwrap_or_default();
        // Codes arrive namespaced, e.g. `sf:INVALID_LOGIN`.
        let code = code.rsplit(':').next().unwrap_or_default().to_string();
        return Err(ConnectionError::LoginFault { code, message });
    }

    let session_id = elements.remove("sessionId").context(MalformedLoginSnafu {
        message: "missing sessionId",
    })?;
    let server_url = elements.remove("serverUrl").context(MalformedLoginSnafu {
        message: "missing serverUrl",
    })?;
    let logout_url = Url::parse(&server_url).context(InvalidUrlSnafu { url: &server_url })?;

    Ok(Session {
        session_id,
        instance_url: instance_origin(&server_url)?,
        logout_url: Some(logout_url),
    })
}

/// Text of the first occurrence of each element in [`LOGIN_ELEMENTS`].
fn read_elements(body: &str) -> Result<HashMap<&'static str, String>, ConnectionError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut current: Option<&'static str> = None;
    let mut found = HashMap::new();
    loop {
        match reader.read_event().context(LoginXmlSnafu)? {
            Event::Start(start) => {
                current = LOGIN_ELEMENTS
                    .iter()
                    .copied()
                    .find(|name| start.local_name().as_ref() == name.as_bytes());
            }
            Event::Text(text) => {
                if let Some(name) = current {
                    let value = text.unescape().context(LoginXmlSnafu)?;
                    found.entry(name).or_insert_with(|| value.into_owned());
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

fn login_envelope(username: &str, password: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<env:Body><n1:login xmlns:n1="urn:partner.soap.sforce.com">"#,
            "<n1:username>{}</n1:username><n1:password>{}</n1:password>",
            "</n1:login></env:Body></env:Envelope>"
        ),
        escape(username),
        escape(password)
    )
}

fn logout_envelope(session_id: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<env:Header><n1:SessionHeader xmlns:n1="urn:partner.soap.sforce.com">"#,
            "<n1:sessionId>{}</n1:sessionId></n1:SessionHeader></env:Header>",
            r#"<env:Body><n1:logout xmlns:n1="urn:partner.soap.sforce.com"/></env:Body>"#,
            "</env:Envelope>"
        ),
        escape(session_id)
    )
}
