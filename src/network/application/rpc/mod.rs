//! Encrypted request/response calls.
//!
//! An RPC call POSTs a flat parameter object and gets JSON back. The server
//! may wrap its answer in an [`Envelope`](crate::crypto::Envelope) sealed with
//! a passphrase derived from the current time, in which case the body is a
//! single-element JSON array holding the envelope string:
//!
//! ```text
//! request:  {"temp": 21.5, "_TOKEN_": "…", "_USERAGENT_": "sensor/1.0"}
//! response: ["eyJjaXBoZXJ0ZXh0Ijoi…"]   or   {"ok": true}
//! ```
//!
//! The session token is read from the `_TOKEN_` cookie of the target host when
//! the caller does not pass one, and written back to refresh its lifetime.
//!
//! Failures never surface as errors: the returned [`RpcResponse`] carries a
//! status of `0` when no connection could be made, and a `Null` body when
//! nothing parseable came back.

use crate::crypto::{Digest, Envelope, EnvelopeConfig};
use crate::network::application::http::HttpEngine;
use crate::network::Connect;
use crate::system::clock::{DEFAULT_SYNC_INTERVAL, DEFAULT_SYNC_RETRIES, wait_for_valid_time};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Request field carrying the session token.
pub const TOKEN_FIELD: &str = "_TOKEN_";
/// Request field carrying the caller's user agent.
pub const USER_AGENT_FIELD: &str = "_USERAGENT_";

/// Maps the current time in milliseconds to the passphrase the server uses
/// for that moment. Deployments supply their own.
pub trait SecretDerivation: Send + Sync {
    fn derive(&self, now_millis: u64) -> String;
}

impl<F> SecretDerivation for F
where
    F: Fn(u64) -> String + Send + Sync,
{
    fn derive(&self, now_millis: u64) -> String {
        self(now_millis)
    }
}

/// How the parameter object is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`; non-string values are written
    /// as their JSON text.
    Form,
}

impl BodyEncoding {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::Form => "application/x-www-form-urlencoded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcOptions {
    pub encoding: BodyEncoding,
    /// PBKDF2 digest used to open response envelopes.
    pub digest: Digest,
    /// Polls while waiting for the clock to synchronize.
    pub time_sync_retries: u32,
    pub time_sync_interval: Duration,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            encoding: BodyEncoding::Json,
            digest: Digest::Sha512,
            time_sync_retries: DEFAULT_SYNC_RETRIES,
            time_sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Outcome of an [`RpcClient::call`].
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// HTTP status; `0` if the connection failed, `-1` if no status line came
    /// back.
    pub status_code: i32,
    /// Decrypted or raw JSON result; `Null` if nothing could be parsed.
    pub json: Value,
}

impl RpcResponse {
    fn failed(status_code: i32) -> Self {
        Self { status_code, json: Value::Null }
    }
}

pub struct RpcClient<T: Connect> {
    engine: HttpEngine<T>,
    secret: Arc<dyn SecretDerivation>,
    options: RpcOptions,
}

impl<T: Connect> core::fmt::Debug for RpcClient<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RpcClient")
            .field("engine", &self.engine)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: Connect> RpcClient<T> {
    pub fn new(engine: HttpEngine<T>, secret: Arc<dyn SecretDerivation>) -> Self {
        Self::with_options(engine, secret, RpcOptions::default())
    }

    pub fn with_options(engine: HttpEngine<T>, secret: Arc<dyn SecretDerivation>, options: RpcOptions) -> Self {
        Self { engine, secret, options }
    }

    pub fn options(&self) -> &RpcOptions {
        &self.options
    }

    /// The engine calls are made with.
    pub fn engine(&self) -> &HttpEngine<T> {
        &self.engine
    }

    /// POSTs `params` to `url` and returns the (decrypted) JSON answer.
    ///
    /// `token` overrides the `_TOKEN_` cookie; empty `user_agent` and token
    /// values are left out of the request.
    pub fn call(
        &mut self,
        url: &str,
        params: &Map<String, Value>,
        user_agent: &str,
        token: Option<&str>,
    ) -> RpcResponse {
        if let Err(e) = self.engine.open(url) {
            log::error!("[rpc] cannot reach {url}: {e}");
            return RpcResponse::failed(0);
        }

        let jar = self.engine.cookies().clone();
        let clock = jar.clock().clone();
        wait_for_valid_time(
            clock.as_ref(),
            self.options.time_sync_retries,
            self.options.time_sync_interval,
        );
        let passphrase = self.secret.derive(clock.now_millis());

        let host = self.engine.url().map(|u| u.host.clone()).unwrap_or_default();
        let token = match token.filter(|t| !t.is_empty()) {
            Some(token) => Some(token.to_owned()),
            None => {
                let stored = jar.get_cookie(&host, TOKEN_FIELD);
                if let Some(stored) = &stored {
                    if let Err(e) = jar.set_cookie(&host, TOKEN_FIELD, stored, None) {
                        log::warn!("[rpc] could not refresh token cookie: {e}");
                    }
                }
                stored
            }
        };

        let mut fields = params.clone();
        if let Some(token) = token {
            fields.insert(TOKEN_FIELD.into(), Value::String(token));
        }
        if !user_agent.is_empty() {
            fields.insert(USER_AGENT_FIELD.into(), Value::String(user_agent.to_owned()));
            self.engine.set_header("User-Agent", user_agent);
        }

        let body = match encode_body(&fields, self.options.encoding) {
            Some(body) => body,
            None => {
                self.engine.close();
                return RpcResponse::failed(self.engine.status_code());
            }
        };
        let content_type = self.options.encoding.content_type();
        if let Err(e) = self.engine.post(&body, content_type) {
            log::warn!("[rpc] request to {url} failed: {e}");
        }
        self.engine.close();

        let envelope = Envelope::new(EnvelopeConfig {
            digest: self.options.digest,
            ..EnvelopeConfig::default()
        });
        RpcResponse {
            status_code: self.engine.status_code(),
            json: interpret_body(self.engine.response_body(), &envelope, &passphrase),
        }
    }
}

fn encode_body(fields: &Map<String, Value>, encoding: BodyEncoding) -> Option<Vec<u8>> {
    match encoding {
        BodyEncoding::Json => serde_json::to_vec(fields)
            .inspect_err(|e| log::error!("[rpc] cannot encode parameters: {e}"))
            .ok(),
        BodyEncoding::Form => {
            let pairs: Vec<String> = fields
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => urlencoding::encode(s).into_owned(),
                        other => urlencoding::encode(&other.to_string()).into_owned(),
                    };
                    format!("{}={value}", urlencoding::encode(key))
                })
                .collect();
            Some(pairs.join("&").into_bytes())
        }
    }
}

/// Unwraps an envelope reply, or returns the body's own JSON.
fn interpret_body(body: &[u8], envelope: &Envelope, passphrase: &str) -> Value {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            if !body.is_empty() {
                log::warn!("[rpc] response is not JSON: {e}");
            }
            return Value::Null;
        }
    };

    let sealed = match &value {
        Value::Array(items) if items.len() == 1 => items[0].as_str(),
        _ => None,
    };
    let Some(sealed) = sealed else {
        return value;
    };

    match envelope.decrypt(sealed, passphrase) {
        Ok(plain) => serde_json::from_str(&plain).unwrap_or_else(|e| {
            log::warn!("[rpc] decrypted payload is not JSON: {e}");
            Value::Null
        }),
        Err(e) => {
            log::warn!("[rpc] cannot open response envelope: {e}");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_encoding() {
        let mut fields = Map::new();
        fields.insert("name".into(), json!("a b&c"));
        fields.insert("n".into(), json!(3));
        fields.insert("flag".into(), json!(true));
        let body = String::from_utf8(encode_body(&fields, BodyEncoding::Form).unwrap()).unwrap();
        let mut parts: Vec<&str> = body.split('&').collect();
        parts.sort();
        assert_eq!(parts, ["flag=true", "n=3", "name=a%20b%26c"]);
    }

    #[test]
    fn test_json_encoding() {
        let mut fields = Map::new();
        fields.insert("k".into(), json!([1, 2]));
        let body = encode_body(&fields, BodyEncoding::Json).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"k": [1, 2]}));
    }

    #[test]
    fn test_interpret_plain_and_sealed() {
        let envelope = Envelope::default();
        assert_eq!(interpret_body(br#"{"a":1}"#, &envelope, "k"), json!({"a": 1}));
        assert_eq!(interpret_body(b"[1]", &envelope, "k"), json!([1]));
        assert_eq!(interpret_body(b"not json", &envelope, "k"), Value::Null);
        assert_eq!(interpret_body(b"", &envelope, "k"), Value::Null);

        let sealed = envelope.encrypt(r#"{"ok":true}"#, "k").unwrap();
        let body = serde_json::to_vec(&json!([sealed])).unwrap();
        assert_eq!(interpret_body(&body, &envelope, "k"), json!({"ok": true}));
        assert_eq!(interpret_body(&body, &envelope, "other"), Value::Null);
    }

    #[test]
    fn test_closure_as_secret() {
        let secret: Arc<dyn SecretDerivation> = Arc::new(|ms: u64| format!("key-{}", ms / 60_000));
        assert_eq!(secret.derive(120_000), "key-2");
    }
}
