#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use sensortag::convert::{
    BATTERY_LEN, HUMIDITY_LEN, LUMINANCE_LEN, MOVEMENT_LEN, PRESSURE_LEN, TEMPERATURE_LEN,
};
use sensortag::{Error, Handle, Result, SensorFamily, Transport};
use uuid::Uuid;

pub const ADDRESS: &str = "B0:91:22:EA:79:04";
pub const OTHER_ADDRESS: &str = "24:71:89:CC:09:05";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    Disconnect,
    Discover(Uuid),
    Read(Handle),
    Write(Handle, Vec<u8>),
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub connected: bool,
    pub refuse_connect: bool,
    pub connect_delay: Option<Duration>,
    pub disconnect_delay: Option<Duration>,
    pub missing: HashSet<Uuid>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Queued payloads per data characteristic. The last one is repeated.
    pub payloads: HashMap<Uuid, VecDeque<Vec<u8>>>,
    handles: Vec<Uuid>,
}

/// Records every call and answers from canned payloads. Clones share state,
/// so a test keeps one clone after handing the other to a session.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn queue(&self, family: SensorFamily, payload: &[u8]) {
        self.state()
            .payloads
            .entry(family.descriptor().data_uuid)
            .or_default()
            .push_back(payload.to_vec());
    }

    /// The handle the mock hands out for `uuid`.
    pub fn handle_of(&self, uuid: Uuid) -> Handle {
        let mut state = self.state();
        handle_for(&mut state, uuid)
    }

    pub fn configuration_handle(&self, family: SensorFamily) -> Handle {
        let uuid = family
            .descriptor()
            .configuration_uuid
            .expect("family has a configuration characteristic");
        self.handle_of(uuid)
    }

    pub fn data_handle(&self, family: SensorFamily) -> Handle {
        self.handle_of(family.descriptor().data_uuid)
    }

    pub fn reads(&self) -> Vec<Handle> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Read(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(Handle, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(handle, data) => Some((handle, data)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| wanted(call)).count()
    }
}

fn handle_for(state: &mut MockState, uuid: Uuid) -> Handle {
    let index = match state.handles.iter().position(|known| *known == uuid) {
        Some(index) => index,
        None => {
            state.handles.push(uuid);
            state.handles.len() - 1
        }
    };
    Handle(0x20 + index as u16)
}

fn default_payload(uuid: Uuid) -> Vec<u8> {
    let family = SensorFamily::ALL
        .iter()
        .copied()
        .find(|family| family.descriptor().data_uuid == uuid);

    let len = match family {
        Some(SensorFamily::Temperature) => TEMPERATURE_LEN,
        Some(SensorFamily::Luminance) => LUMINANCE_LEN,
        Some(SensorFamily::Humidity) => HUMIDITY_LEN,
        Some(SensorFamily::Pressure) => PRESSURE_LEN,
        Some(SensorFamily::Movement) => MOVEMENT_LEN,
        Some(SensorFamily::Battery) => BATTERY_LEN,
        None => 1,
    };
    vec![0; len]
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, address: &str, _timeout: Duration) -> Result<bool> {
        let delay = {
            let mut state = self.state();
            state.calls.push(Call::Connect(address.to_string()));
            state.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.refuse_connect {
            return Ok(false);
        }
        state.connected = true;
        Ok(true)
    }

    async fn disconnect(&mut self) -> Result<()> {
        let delay = {
            let mut state = self.state();
            state.calls.push(Call::Disconnect);
            state.disconnect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state().connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn discover_handle(&mut self, uuid: Uuid) -> Result<Option<Handle>> {
        let mut state = self.state();
        state.calls.push(Call::Discover(uuid));

        if state.missing.contains(&uuid) {
            return Ok(None);
        }
        Ok(Some(handle_for(&mut state, uuid)))
    }

    async fn read_characteristic(&mut self, handle: Handle) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.calls.push(Call::Read(handle));

        if state.fail_reads {
            return Err(Error::TransportFailure("read timed out".into()));
        }

        let uuid = state.handles[usize::from(handle.0 - 0x20)];
        let payload = match state.payloads.get_mut(&uuid) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(payload.unwrap_or_else(|| default_payload(uuid)))
    }

    async fn write_characteristic(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Write(handle, data.to_vec()));

        if state.fail_writes {
            return Err(Error::TransportFailure("write timed out".into()));
        }
        Ok(())
    }
}
