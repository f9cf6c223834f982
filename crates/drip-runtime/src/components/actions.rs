use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use drip_core::component::{Action, StepContext};
use drip_core::error::{DripError, Result};
use drip_core::mail::Email;
use drip_core::Component;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Sends an email to the person in the execution context using a stored template")]
pub struct SendEmailAction {
    #[component(
        validate = "required,min=1",
        description = "ID of the email template to use. Must reference an existing template."
    )]
    #[serde(deserialize_with = "lenient_id")]
    pub template_id: i64,
}

/// Ids arrive as JSON numbers or, from older builder output, numeric
/// strings. Anything else binds as 0, which fails the `required` rule.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[async_trait]
impl Action for SendEmailAction {
    async fn execute(&self, ctx: &StepContext, data: &Value) -> Result<String> {
        let template = ctx
            .templates()
            .email_template(self.template_id)
            .await
            .map_err(|e| {
                DripError::Handler(format!(
                    "Failed to fetch template {}: {}",
                    self.template_id, e
                ))
            })?
            .ok_or_else(|| {
                DripError::Handler(format!("Failed to fetch template {}", self.template_id))
            })?;

        let recipient = data
            .get("email")
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| DripError::Handler("No recipient email in context".to_string()))?;

        let email = Email {
            to: recipient.to_string(),
            from: ctx.sender().to_string(),
            subject: template.subject,
            body: template.body,
        };
        ctx.mail()
            .send_email(&email)
            .await
            .map_err(|e| DripError::Handler(format!("Failed to send email: {}", e)))?;

        Ok(format!(
            "Email sent to {} (Template {})",
            recipient, self.template_id
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Sends an HTTP request")]
pub struct HttpRequestAction {
    #[component(
        validate = "required,oneof=GET POST PUT DELETE PATCH",
        description = "HTTP method to use for the request."
    )]
    pub method: String,
    #[component(validate = "required,url", description = "Target URL for the request.")]
    pub url: String,
    #[component(description = "Optional JSON string of request headers.")]
    pub headers: String,
    #[component(description = "Optional request body payload.")]
    pub body: String,
}

impl Default for HttpRequestAction {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            headers: String::new(),
            body: String::new(),
        }
    }
}

#[async_trait]
impl Action for HttpRequestAction {
    async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
        Ok(format!("Simulated {} to {}", self.method, self.url))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Pauses the workflow")]
pub struct DelayAction {
    #[component(
        validate = "required,min=1",
        description = "Number of minutes to delay execution."
    )]
    pub delay_minutes: i64,
}

#[async_trait]
impl Action for DelayAction {
    async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
        Ok(format!("Simulated delay of {} minutes", self.delay_minutes))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Updates a database record")]
pub struct UpdateDbAction {
    #[component(
        validate = "required,oneof=users sites events",
        description = "Database table to update."
    )]
    pub table: String,
    #[component(validate = "required", description = "ID of the record to update.")]
    pub record_id: String,
    #[component(validate = "required", description = "JSON string of data to update.")]
    pub data: String,
}

#[async_trait]
impl Action for UpdateDbAction {
    async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
        Ok(format!("Simulated update to {}:{}", self.table, self.record_id))
    }
}

/// Always fails. Used to exercise failure paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[component(description = "Fails the workflow")]
pub struct FailAction {}

#[async_trait]
impl Action for FailAction {
    async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
        Err(DripError::Handler(
            "workflow manually failed by FAIL action".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use drip_core::component::ComponentKind;
    use drip_core::mail::EmailTemplate;
    use drip_core::testing::{test_services, InMemoryStore, RecordingMailSender};
    use serde_json::json;

    fn context() -> (StepContext, Arc<InMemoryStore>, Arc<RecordingMailSender>) {
        let store = Arc::new(InMemoryStore::new());
        let mail = Arc::new(RecordingMailSender::new());
        let services = test_services(store.clone(), mail.clone());
        (StepContext::new(1, 1, "action-1", services), store, mail)
    }

    #[tokio::test]
    async fn test_send_email() {
        let (ctx, store, mail) = context();
        store.add_template(EmailTemplate {
            id: 3,
            subject: "Welcome".into(),
            body: "Hi there".into(),
        });

        let action = SendEmailAction { template_id: 3 };
        let output = action
            .execute(&ctx, &json!({"email": "jo@example.com"}))
            .await
            .unwrap();

        assert_eq!(output, "Email sent to jo@example.com (Template 3)");
        mail.assert_sent_to("jo@example.com");
        let sent = mail.sent();
        assert_eq!(sent[0].from, "notifications@helpnow.ai");
        assert_eq!(sent[0].subject, "Welcome");
    }

    #[tokio::test]
    async fn test_send_email_failures() {
        let (ctx, store, mail) = context();
        let action = SendEmailAction { template_id: 9 };

        let err = action.execute(&ctx, &json!({"email": "jo@example.com"})).await;
        assert_eq!(err.unwrap_err().to_string(), "Failed to fetch template 9");

        store.add_template(EmailTemplate {
            id: 9,
            subject: "s".into(),
            body: "b".into(),
        });
        let err = action.execute(&ctx, &json!({"person_id": 4})).await;
        assert_eq!(err.unwrap_err().to_string(), "No recipient email in context");

        mail.fail_with("relay down");
        let err = action.execute(&ctx, &json!({"email": "jo@example.com"})).await;
        assert!(err
            .unwrap_err()
            .to_string()
            .starts_with("Failed to send email:"));
    }

    #[tokio::test]
    async fn test_stub_actions() {
        let (ctx, _, _) = context();
        let data = json!({});

        let http = HttpRequestAction {
            method: "POST".into(),
            url: "https://hooks.example.com".into(),
            ..Default::default()
        };
        assert_eq!(
            http.execute(&ctx, &data).await.unwrap(),
            "Simulated POST to https://hooks.example.com"
        );

        let delay = DelayAction { delay_minutes: 15 };
        assert_eq!(
            delay.execute(&ctx, &data).await.unwrap(),
            "Simulated delay of 15 minutes"
        );

        let update = UpdateDbAction {
            table: "users".into(),
            record_id: "42".into(),
            data: "{}".into(),
        };
        assert_eq!(
            update.execute(&ctx, &data).await.unwrap(),
            "Simulated update to users:42"
        );

        let err = FailAction {}.execute(&ctx, &data).await.unwrap_err();
        assert_eq!(err.to_string(), "workflow manually failed by FAIL action");
    }

    #[test]
    fn test_template_id_accepts_numeric_strings() {
        for (raw, expected) in [
            (json!(3), 3),
            (json!("3"), 3),
            (json!(" 12 "), 12),
            (json!(4.0), 4),
        ] {
            let bound: SendEmailAction =
                serde_json::from_value(json!({"action": "Send Email", "template_id": raw}))
                    .unwrap();
            assert_eq!(bound.template_id, expected);
        }
    }

    #[test]
    fn test_unparseable_template_id_fails_validation() {
        let registry = crate::components::builtin_registry();
        let err = registry
            .validate(
                ComponentKind::Action,
                "Send Email",
                &json!({"action": "Send Email", "template_id": "welcome"}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("template_id is required"));

        assert!(registry
            .validate(
                ComponentKind::Action,
                "Send Email",
                &json!({"action": "Send Email", "template_id": "7"}),
            )
            .is_ok());
    }

    #[test]
    fn test_http_request_defaults_to_get() {
        let bound: HttpRequestAction =
            serde_json::from_value(json!({"url": "https://x.io", "action": "HTTP Request"}))
                .unwrap();
        assert_eq!(bound.method, "GET");
    }
}
