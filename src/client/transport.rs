//! Scripted JSON-RPC transport for exercising the ethers-backed client
//! without a node. Responses are keyed by method; the last response queued
//! for a method keeps answering, and unscripted methods fail.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::providers::{JsonRpcClient, MockError, Provider};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, VecDeque<Value>>,
    requests: Vec<(String, Value)>,
}

/// Cloning shares the script, so a test keeps a handle after giving one to a `Provider`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> Provider<ScriptedTransport> {
        Provider::new(self.clone())
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.script
            .lock()
            .unwrap()
            .responses
            .entry(method.to_string())
            .or_default()
            .push_back(value);
    }

    /// Params of every request made for `method`, oldest first.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl JsonRpcClient for ScriptedTransport {
    type Error = MockError;

    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
    where
        T: Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let params = serde_json::to_value(params)?;
        let response = {
            let mut script = self.script.lock().unwrap();
            script.requests.push((method.to_string(), params));
            let queue = script.responses.get_mut(method).ok_or(MockError::EmptyResponses)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };
        let response = response.ok_or(MockError::EmptyResponses)?;
        Ok(serde_json::from_value(response)?)
    }
}
