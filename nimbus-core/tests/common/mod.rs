//! Scripted transport for integration testing.
//!
//! Responses are queued per URL fragment and handed out in order. A
//! response can be held back and released later from the test, which is
//! how out-of-order completion is simulated.

#![allow(dead_code)]

use async_trait::async_trait;
use nimbus_core::{Transport, TransportError, WeatherEvent};
use reqwest::Url;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};

type Reply = Result<Vec<u8>, TransportError>;

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Vec<(String, oneshot::Receiver<Reply>)>>,
    requests: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request whose URL contains `fragment` with `body`.
    pub fn respond(&self, fragment: &str, body: &str) {
        let tx = self.hold(fragment);
        let _ = tx.send(Ok(body.as_bytes().to_vec()));
    }

    /// Fail the next request whose URL contains `fragment`.
    pub fn fail(&self, fragment: &str) {
        let tx = self.hold(fragment);
        let _ = tx.send(Err(TransportError::Other("connection refused".into())));
    }

    /// Keep the next matching request pending until the sender is used.
    pub fn hold(&self, fragment: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push((fragment.to_string(), rx));
        tx
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(url.clone());

        let pending = {
            let mut script = self.script.lock().unwrap();
            script
                .iter()
                .position(|(fragment, _)| url.as_str().contains(fragment.as_str()))
                .map(|i| script.remove(i).1)
        };

        match pending {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(TransportError::Other("reply dropped".into()))),
            None => Err(TransportError::Other(format!("no scripted reply for {url}"))),
        }
    }
}

pub async fn next_event(rx: &mut UnboundedReceiver<WeatherEvent>) -> WeatherEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Let spawned requests run, then check nothing was published.
pub async fn assert_no_event(rx: &mut UnboundedReceiver<WeatherEvent>) {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(rx.try_recv().is_err(), "unexpected event published");
}

pub async fn wait_for_requests(transport: &ScriptedTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.requests().len() < count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("requests were never sent");
}

pub const SAN_FRANCISCO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <current_observation>
    <display_location>
      <full>San Francisco, CA</full>
      <latitude>37.77500916</latitude>
      <longitude>-122.41825867</longitude>
    </display_location>
    <observation_location>
      <full>SOMA, San Francisco, California</full>
      <latitude>37.773285</latitude>
      <longitude>-122.417725</longitude>
      <elevation>49 ft</elevation>
    </observation_location>
    <station_id>KCASANFR58</station_id>
    <observation_epoch>1355847200</observation_epoch>
    <temp_c>20</temp_c>
    <relative_humidity>65%</relative_humidity>
    <wind_degrees>90</wind_degrees>
    <wind_kph>36</wind_kph>
    <pressure_mb>1013</pressure_mb>
    <feelslike_c>19</feelslike_c>
    <visibility_km>N/A</visibility_km>
    <icon_url>http://icons.wxug.com/i/c/k/rain.gif</icon_url>
  </current_observation>
</response>"#;

pub fn conditions_with_temp_c(temp_c: f64) -> String {
    format!(
        "<response><current_observation>\
         <temp_c>{temp_c}</temp_c>\
         </current_observation></response>"
    )
}

pub const AUTOCOMPLETE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RESULTS>
  <name>Springfield</name>
  <name>Shelbyville</name>
  <name>Ogdenville</name>
</RESULTS>"#;
