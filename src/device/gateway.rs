//! Synchronous JSON client for the device gateway.
//!
//! Thin glue only: every method maps one capability onto one HTTP call.
//! Transport policy (timeouts, retries) stays with the HTTP stack; this
//! client does not retry and treats every transport error as fatal.

use serde::Deserialize;
use serde_json::{Value, json};
use ureq::Agent;

use crate::{
    cli::ConnectionArgs,
    device::{ConnectionKind, InverterApi, Payload},
    prelude::*,
    setter::PowerLimits,
    window::TimeWindow,
};

pub struct Gateway {
    agent: Agent,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Deserialize)]
struct SetResponse {
    #[serde(rename = "resultCode")]
    result_code: i64,
}

impl Gateway {
    /// Open a session against the LAN gateway or the portal relay.
    pub fn connect(connection: &ConnectionArgs) -> Result<Self> {
        let base_url = match connection.kind() {
            ConnectionKind::Local => {
                let address = connection
                    .address
                    .as_deref()
                    .context("connection address is required for connection type `local`")?;
                format!("http://{address}/api/v1")
            }
            ConnectionKind::Web => {
                let serial_number = connection
                    .serial_number
                    .as_deref()
                    .context("connection serial number is required for connection type `web`")?;
                format!("{}/systems/{serial_number}", connection.portal_url().trim_end_matches('/'))
            }
        };

        let credentials = json!({
            "user": connection.user,
            "password": connection.password,
            "accessKey": connection.access_key,
        });
        let agent = Agent::new_with_defaults();
        let session: SessionResponse = agent
            .post(format!("{base_url}/session"))
            .send_json(&credentials)
            .context("failed to open the gateway session")?
            .body_mut()
            .read_json()
            .context("failed to read the session response")?;
        info!(kind = %connection.kind(), "connected");

        Ok(Self { agent, base_url, token: session.token })
    }

    fn read(&mut self, path: &str, query: &[(&str, String)]) -> Result<Option<Payload>> {
        trace!(path, "reading");
        let mut request = self.agent.get(format!("{}{path}", self.base_url)).header(
            "Authorization",
            format!("Bearer {}", self.token),
        );
        for (name, value) in query {
            request = request.query(*name, value);
        }
        let value: Value = request
            .call()
            .with_context(|| format!("`{path}` request failed"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("failed to read the `{path}` response"))?;
        into_payload(path, value)
    }

    fn set(&mut self, path: &str, body: &Value) -> Result<i64> {
        trace!(path, "setting");
        let response: SetResponse = self
            .agent
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .send_json(body)
            .with_context(|| format!("`{path}` request failed"))?
            .body_mut()
            .read_json()
            .with_context(|| format!("failed to read the `{path}` response"))?;
        Ok(response.result_code)
    }
}

/// `null` means the subsystem is not installed; anything but an object or
/// `null` is a protocol violation.
fn into_payload(path: &str, value: Value) -> Result<Option<Payload>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(payload) => Ok(Some(payload)),
        other => bail!("unexpected `{path}` response shape: {other}"),
    }
}

impl InverterApi for Gateway {
    fn poll(&mut self) -> Result<Option<Payload>> {
        self.read("/poll", &[])
    }

    fn get_system_info(&mut self) -> Result<Option<Payload>> {
        self.read("/system/info", &[])
    }

    fn get_system_status(&mut self) -> Result<Option<Payload>> {
        self.read("/system/status", &[])
    }

    fn get_power_settings(&mut self) -> Result<Option<Payload>> {
        self.read("/system/settings", &[])
    }

    fn get_powermeter_data(&mut self) -> Result<Option<Payload>> {
        self.read("/powermeter", &[])
    }

    fn get_battery_data(&mut self) -> Result<Option<Payload>> {
        self.read("/battery", &[])
    }

    fn get_inverter_data(&mut self) -> Result<Option<Payload>> {
        self.read("/inverter", &[])
    }

    fn get_wallbox_data(&mut self) -> Result<Option<Payload>> {
        self.read("/wallbox", &[])
    }

    fn get_history(&mut self, window: TimeWindow) -> Result<Option<Payload>> {
        self.read(
            "/history",
            &[
                ("start", window.start_timestamp.to_string()),
                ("span", window.duration_seconds.to_string()),
            ],
        )
    }

    fn set_power_limits(&mut self, limits: &PowerLimits) -> Result<i64> {
        self.set("/settings/power-limits", &serde_json::to_value(limits)?)
    }

    fn set_powersave(&mut self, enable: bool) -> Result<i64> {
        self.set("/settings/power-save", &json!({"enable": enable}))
    }

    fn set_weather_regulated_charge(&mut self, enable: bool) -> Result<i64> {
        self.set("/settings/weather-regulated-charge", &json!({"enable": enable}))
    }

    fn disconnect(&mut self) -> Result {
        self.agent
            .delete(format!("{}/session", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .call()
            .context("failed to close the gateway session")?;
        debug!("disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn local_args(server: &MockServer) -> ConnectionArgs {
        ConnectionArgs {
            address: Some(server.address().to_string()),
            user: Some("me".to_owned()),
            password: Some("secret".to_owned()),
            access_key: Some("gateway-key".to_owned()),
            ..ConnectionArgs::default()
        }
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/session"))
            .and(body_json(json!({
                "user": "me",
                "password": "secret",
                "accessKey": "gateway-key",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
            .mount(server)
            .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_read_sends_bearer_token() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/battery"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"soc": 78})))
            .expect(1)
            .mount(&server)
            .await;

        let mut gateway = Gateway::connect(&local_args(&server)).unwrap();
        let payload = gateway.get_battery_data().unwrap().unwrap();
        assert_eq!(payload["soc"], json!(78));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_null_body_maps_to_none() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/wallbox"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&server)
            .await;

        let mut gateway = Gateway::connect(&local_args(&server)).unwrap();
        assert!(gateway.get_wallbox_data().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_passes_the_window() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/history"))
            .and(query_param("start", "1715730300"))
            .and(query_param("span", "86400"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"consumption": 12.5})))
            .expect(1)
            .mount(&server)
            .await;

        let mut gateway = Gateway::connect(&local_args(&server)).unwrap();
        let window = TimeWindow { start_timestamp: 1_715_730_300, duration_seconds: 86_400 };
        let payload = gateway.get_history(window).unwrap().unwrap();
        assert_eq!(payload["consumption"], json!(12.5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_setter_posts_and_returns_the_result_code() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/settings/power-limits"))
            .and(body_json(json!({"enable": true, "max_charge": 3000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultCode": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let mut gateway = Gateway::connect(&local_args(&server)).unwrap();
        let limits = PowerLimits {
            enable: Some(true),
            max_charge: Some(3_000),
            ..PowerLimits::default()
        };
        assert_eq!(gateway.set_power_limits(&limits).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_closes_the_session() {
        let server = MockServer::start().await;
        mount_session(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/session"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut gateway = Gateway::connect(&local_args(&server)).unwrap();
        gateway.disconnect().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_web_connection_uses_the_portal_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/systems/H10-12345/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
            .expect(1)
            .mount(&server)
            .await;

        let args = ConnectionArgs {
            kind: Some(ConnectionKind::Web),
            user: Some("me".to_owned()),
            password: Some("secret".to_owned()),
            serial_number: Some("H10-12345".to_owned()),
            portal_url: Some(format!("http://{}/api/v1", server.address())),
            ..ConnectionArgs::default()
        };
        Gateway::connect(&args).unwrap();
    }
}
