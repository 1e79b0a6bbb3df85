//! Salesforce sObject Collections REST connection.

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json, json};
use snafu::prelude::*;
use tracing::{debug, warn};

use super::auth::{self, AuthMethod, Session};
use super::{
    ActionType, Connector, Fault, RecordResult, RemoteConnection, SaveResult, TRANSPORT_ERROR,
    UpsertResult, WriteOutcome,
};
use crate::error::{ConnectionError, HttpClientSnafu};
use crate::mapper::{RemoteObject, RemoteValue};

/// Fault code used when a 2xx response body cannot be read as results.
pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Creates one [`SalesforceConnection`] per worker.
pub struct SalesforceConnector {
    client: reqwest::Client,
    auth: AuthMethod,
    object: String,
    api_version: String,
}

impl SalesforceConnector {
    pub fn new(
        auth: AuthMethod,
        object: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self {
            client,
            auth,
            object: object.into(),
            api_version: api_version.into(),
        })
    }
}

#[async_trait]
impl Connector for SalesforceConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, ConnectionError> {
        let session = self.auth.login(&self.client).await?;
        Ok(Box::new(SalesforceConnection {
            client: self.client.clone(),
            session,
            object: self.object.clone(),
            api_version: self.api_version.clone(),
        }))
    }
}

/// An authenticated REST session bound to one target object.
pub struct SalesforceConnection {
    client: reqwest::Client,
    session: Session,
    object: String,
    api_version: String,
}

impl SalesforceConnection {
    fn collection_url(&self, action: &ActionType) -> String {
        let base = format!(
            "{}services/data/v{}/composite/sobjects",
            self.session.instance_url, self.api_version
        );
        match action {
            ActionType::Upsert { key } => format!("{base}/{}/{key}", self.object),
            ActionType::Insert | ActionType::Update => base,
        }
    }

    async fn send(&self, action: &ActionType, body: &Json) -> Result<reqwest::Response, reqwest::Error> {
        let url = self.collection_url(action);
        let request = match action {
            ActionType::Insert => self.client.post(url),
            ActionType::Update | ActionType::Upsert { .. } => self.client.patch(url),
        };
        request
            .bearer_auth(&self.session.session_id)
            .json(body)
            .send()
            .await
    }
}

#[async_trait]
impl RemoteConnection for SalesforceConnection {
    async fn write(&self, action: &ActionType, batch: &[RemoteObject]) -> WriteOutcome {
        let body = request_body(batch);

        let response = match self.send(action, &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, action = %action, "Write request failed");
                return WriteOutcome::Fault(Fault::new(TRANSPORT_ERROR, e.to_string()));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return WriteOutcome::Fault(Fault::new(TRANSPORT_ERROR, e.to_string())),
        };

        if !status.is_success() {
            return WriteOutcome::Fault(fault_from_error_body(status.as_u16(), &text));
        }

        debug!(records = batch.len(), action = %action, "Write accepted");
        match action {
            ActionType::Upsert { .. } => parse_results::<UpsertResult>(&text),
            ActionType::Insert | ActionType::Update => parse_results::<SaveResult>(&text),
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        auth::logout(&self.client, &self.session).await
    }
}

/// Build the collection request body for a batch.
pub fn request_body(batch: &[RemoteObject]) -> Json {
    let records: Vec<Json> = batch.iter().map(object_json).collect();
    json!({ "allOrNone": false, "records": records })
}

fn object_json(object: &RemoteObject) -> Json {
    let mut map = Map::new();
    map.insert(
        "attributes".to_string(),
        json!({ "type": object.object_type() }),
    );
    for (name, value) in object.fields() {
        match value_json(value) {
            Some(json) => {
                map.insert(name.clone(), json);
            }
            None => warn!(
                field = %name,
                object = %object.object_type(),
                "Non-finite number left out of request"
            ),
        }
    }
    for name in object.fields_to_null() {
        map.insert(name.clone(), Json::Null);
    }
    Json::Object(map)
}

/// JSON for a field value; `None` for NaN and infinities, which JSON cannot carry.
fn value_json(value: &RemoteValue) -> Option<Json> {
    let json = match value {
        RemoteValue::String(s) => Json::String(s.clone()),
        RemoteValue::Double(d) => Json::Number(serde_json::Number::from_f64(*d)?),
        RemoteValue::Boolean(b) => Json::Bool(*b),
        RemoteValue::DateTime(ts) => Json::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
    };
    Some(json)
}

fn parse_results<T>(text: &str) -> WriteOutcome
where
    T: DeserializeOwned + Into<RecordResult>,
{
    match serde_json::from_str::<Vec<T>>(text) {
        Ok(results) => WriteOutcome::Results(results.into_iter().map(Into::into).collect()),
        Err(e) => WriteOutcome::Fault(Fault::new(
            MALFORMED_RESPONSE,
            format!("Could not read write results: {e}"),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Turn a non-2xx response into a fault.
///
/// The API answers with a list of `{errorCode, message}`; the first entry
/// names the fault. Bodies of any other shape fall back to `HTTP_<status>`.
pub fn fault_from_error_body(status: u16, body: &str) -> Fault {
    let first = serde_json::from_str::<Vec<ErrorBody>>(body)
        .ok()
        .and_then(|errors| errors.into_iter().next())
        .or_else(|| serde_json::from_str::<ErrorBody>(body).ok());

    match first {
        Some(ErrorBody {
            error_code: Some(code),
            message,
        }) => Fault::new(code, message.unwrap_or_default()),
        _ => Fault::new(format!("HTTP_{status}"), body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use url::Url;

    use super::*;
    use crate::connection::FieldError;

    fn connection() -> SalesforceConnection {
        SalesforceConnection {
            client: reqwest::Client::new(),
            session: Session {
                session_id: "token".into(),
                instance_url: Url::parse("https://acme.my.example.com").unwrap(),
                logout_url: None,
            },
            object: "Account".into(),
            api_version: "46.0".into(),
        }
    }

    #[test]
    fn test_collection_urls() {
        let conn = connection();
        assert_eq!(
            conn.collection_url(&ActionType::Insert),
            "https://acme.my.example.com/services/data/v46.0/composite/sobjects"
        );
        assert_eq!(
            conn.collection_url(&ActionType::Update),
            conn.collection_url(&ActionType::Insert)
        );
        assert_eq!(
            conn.collection_url(&ActionType::Upsert {
                key: "External_Id__c".into()
            }),
            "https://acme.my.example.com/services/data/v46.0/composite/sobjects/Account/External_Id__c"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let mut object = RemoteObject::new("Account");
        object.set("Name", RemoteValue::String("Acme".into()));
        object.set("Employees", RemoteValue::Double(42.0));
        object.set("Active", RemoteValue::Boolean(false));
        object.set(
            "Opened",
            RemoteValue::DateTime(DateTime::from_timestamp_millis(1_500).unwrap()),
        );
        object.set_null("Fax");

        let body = request_body(&[object]);
        assert_eq!(
            body,
            json!({
                "allOrNone": false,
                "records": [{
                    "attributes": {"type": "Account"},
                    "Name": "Acme",
                    "Employees": 42.0,
                    "Active": false,
                    "Opened": "1970-01-01T00:00:01.500Z",
                    "Fax": null
                }]
            })
        );
    }

    #[test]
    fn test_request_body_leaves_out_non_finite_numbers() {
        let mut object = RemoteObject::new("Account");
        object.set("Name", RemoteValue::String("Acme".into()));
        object.set("Revenue", RemoteValue::Double(f64::NAN));
        object.set("Employees", RemoteValue::Double(f64::INFINITY));

        let body = request_body(&[object]);
        assert_eq!(
            body,
            json!({
                "allOrNone": false,
                "records": [{
                    "attributes": {"type": "Account"},
                    "Name": "Acme"
                }]
            })
        );
    }

    #[test]
    fn test_fault_from_error_list() {
        let fault = fault_from_error_body(
            401,
            r#"[{"message":"Session expired or invalid","errorCode":"INVALID_SESSION_ID"}]"#,
        );
        assert_eq!(fault, Fault::new("INVALID_SESSION_ID", "Session expired or invalid"));
    }

    #[test]
    fn test_fault_falls_back_to_status() {
        let fault = fault_from_error_body(503, "Service Unavailable\n");
        assert_eq!(fault, Fault::new("HTTP_503", "Service Unavailable"));
    }

    #[test]
    fn test_parse_results_by_shape() {
        let outcome = parse_results::<SaveResult>(
            r#"[{"id":"001","success":true,"errors":[]},{"success":false,"errors":[{"statusCode":"FIELD_INTEGRITY_EXCEPTION","message":"bad","fields":["Amount"]}]}]"#,
        );
        assert_eq!(
            outcome,
            WriteOutcome::Results(vec![
                RecordResult::ok(),
                RecordResult::failed(vec![FieldError::new(
                    "FIELD_INTEGRITY_EXCEPTION",
                    "bad",
                    vec!["Amount".into()]
                )]),
            ])
        );

        let WriteOutcome::Fault(fault) = parse_results::<UpsertResult>("<html>") else {
            panic!("expected a fault");
        };
        assert_eq!(fault.code, MALFORMED_RESPONSE);
    }
}
