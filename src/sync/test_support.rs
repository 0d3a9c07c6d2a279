//! Fakes shared by the reconciler and scheduler tests.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{RegistryError, ServiceError};
use crate::models::{Characteristic, RawTag, RegisteredDevice};
use crate::registry::{AccessoryRegistry, CachedRegistry};
use crate::service::{Credentials, TagService};
use crate::sync::identity::LocalId;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Register(LocalId),
    Update(LocalId, Characteristic),
    Unregister(Vec<LocalId>),
}

/// Wraps an in-memory registry and records every call made against it.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    pub inner: CachedRegistry,
    pub calls: Vec<Call>,
    /// Updates for this device fail, to exercise per-record isolation.
    pub fail_updates_for: Option<LocalId>,
}

impl RecordingRegistry {
    pub fn registrations(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Register(_)))
            .count()
    }

    pub fn updates_for(&self, id: &LocalId) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Update(target, _) if target == id))
            .count()
    }

    pub fn temperature_of(&self, id: &LocalId) -> Option<f64> {
        self.inner.device(id).and_then(|d| d.state.temperature)
    }
}

impl AccessoryRegistry for RecordingRegistry {
    fn device(&self, id: &LocalId) -> Option<&RegisteredDevice> {
        self.inner.device(id)
    }

    fn register(&mut self, device: RegisteredDevice) -> Result<(), RegistryError> {
        self.calls.push(Call::Register(device.id));
        self.inner.register(device)
    }

    fn update_characteristic(
        &mut self,
        id: &LocalId,
        value: Characteristic,
    ) -> Result<(), RegistryError> {
        if self.fail_updates_for == Some(*id) {
            return Err(RegistryError::UnknownDevice(*id));
        }
        self.calls.push(Call::Update(*id, value.clone()));
        self.inner.update_characteristic(id, value)
    }

    fn unregister(&mut self, ids: &[LocalId]) -> Result<usize, RegistryError> {
        self.calls.push(Call::Unregister(ids.to_vec()));
        self.inner.unregister(ids)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// A tag record as the tag manager would send it, without a humidity field.
pub fn tag(serial: &str, name: &str, temperature: f64, battery: f64) -> RawTag {
    RawTag(json!({
        "uuid": serial,
        "name": name,
        "slaveId": serial.len(),
        "tagType": 12,
        "temperature": temperature,
        "batteryRemaining": battery,
        "alive": true,
        "OutOfRange": false,
        "version1": 1
    }))
}

pub fn humidity_tag(serial: &str, name: &str, temperature: f64, cap: f64) -> RawTag {
    let mut raw = tag(serial, name, temperature, 0.9);
    raw.0["cap"] = json!(cap);
    raw.0["tagType"] = json!(13);
    raw
}

fn unavailable(endpoint: &'static str) -> ServiceError {
    ServiceError::Status {
        endpoint,
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Scriptable `TagService` that counts calls.
#[derive(Debug, Default)]
pub struct FakeService {
    pub fail_auth: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fail_beep: AtomicBool,
    pub snapshot: Mutex<Vec<RawTag>>,
    /// Each fetch sleeps this long before answering.
    pub fetch_delay: Mutex<Option<Duration>>,
    pub auth_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub beeps: Mutex<Vec<(i64, u32)>>,
}

impl FakeService {
    pub fn with_snapshot(snapshot: Vec<RawTag>) -> Self {
        FakeService {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagService for FakeService {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<(), ServiceError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(unavailable("Signin"));
        }
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Vec<RawTag>, ServiceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(unavailable("GetTagList2"));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn beep(&self, slave_id: i64, duration: u32) -> Result<(), ServiceError> {
        if self.fail_beep.load(Ordering::SeqCst) {
            return Err(unavailable("Beep"));
        }
        self.beeps.lock().unwrap().push((slave_id, duration));
        Ok(())
    }
}
