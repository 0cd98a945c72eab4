//! Device session manager
//!
//! A single task owns the device inventory, the pending permission tokens and
//! the open/poll state of both sensor classes. Everything reaches it as a
//! [`SessionEvent`] on one channel, so state is never shared or locked.
//! Callers talk to it through a cloneable [`SessionHandle`].

mod events;
mod poll;
mod state;

pub(crate) use events::SessionEvent;

use std::collections::HashMap;
use std::sync::Arc;

use kiosk_core::api::SessionInfo;
use kiosk_core::{
    DeviceFilter, KioskError, LedColor, LightStatus, Notification, OpenParams, Result,
    SensorClass, SensorReading, SessionPhase, StaticConfig, UsbDevice, LIGHT_STATUS_LEN,
    POLL_BUFFER_LEN,
};
use kiosk_hardware::{adapter_ports, codes, UsbRegistry, VendorSdk};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::hotplug::HotplugWatcher;
use crate::permission::PermissionBroker;
use events::{PortCommand, Reply, Request};
use state::ClassSession;

const EVENT_QUEUE_LEN: usize = 256;
const NOTIFICATION_QUEUE_LEN: usize = 256;

/// Result code of a vendor call: 0 on success, the vendor code otherwise
fn result_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => codes::OK,
        Err(e) => kiosk_hardware::vendor_code_for(&e),
    }
}

/// The session manager task state
pub(crate) struct SessionManager {
    config: Arc<StaticConfig>,
    sdk: Box<dyn VendorSdk>,
    registry: Arc<dyn UsbRegistry>,
    broker: PermissionBroker,
    hotplug: Option<HotplugWatcher>,
    events_tx: mpsc::Sender<SessionEvent>,
    notifier: broadcast::Sender<Notification>,
    /// Registry devices matching each class's filters
    devices: HashMap<SensorClass, Vec<UsbDevice>>,
    /// Multi-port adapter devices in alias order
    adapter: Vec<UsbDevice>,
    sessions: HashMap<SensorClass, ClassSession>,
    /// Device each class is waiting on before its deferred open can run
    pending: HashMap<SensorClass, UsbDevice>,
}

impl SessionManager {
    /// Start the manager task
    ///
    /// Returns the handle used to talk to it and the task's join handle.
    pub fn spawn(
        config: Arc<StaticConfig>,
        sdk: Box<dyn VendorSdk>,
        registry: Arc<dyn UsbRegistry>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_LEN);
        let (notifier, _) = broadcast::channel(NOTIFICATION_QUEUE_LEN);

        let broker = PermissionBroker::new(
            config.permission.policy,
            std::time::Duration::from_millis(config.permission.response_delay_ms),
            events_tx.clone(),
        );

        let hotplug = if config.hotplug.enabled {
            Some(HotplugWatcher::start(
                registry.clone(),
                config.hotplug.scan_interval(),
                events_tx.clone(),
            ))
        } else {
            info!("Hotplug watcher disabled");
            None
        };

        if config.compat.light_skip_pending_token {
            warn!("compat.light_skip_pending_token is set: light sessions waiting for access will not resume after a grant");
        }

        let mut manager = Self {
            config,
            sdk,
            registry,
            broker,
            hotplug,
            events_tx: events_tx.clone(),
            notifier: notifier.clone(),
            devices: HashMap::new(),
            adapter: Vec::new(),
            sessions: SensorClass::ALL
                .into_iter()
                .map(|class| (class, ClassSession::new(class)))
                .collect(),
            pending: HashMap::new(),
        };
        manager.rescan();

        let task = tokio::spawn(manager.run(events_rx));
        let handle = SessionHandle {
            events: events_tx,
            notifier,
        };
        (handle, task)
    }

    async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) {
        info!("Session manager started");

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Request(request) => self.handle_request(request).await,
                SessionEvent::Attached(device) => self.on_device_attached(&device),
                SessionEvent::Detached(device) => self.on_device_detached(&device).await,
                SessionEvent::PermissionResult { device, granted } => {
                    self.on_permission_result(device, granted).await
                }
                SessionEvent::PollTick { class, generation } => {
                    if self.session_mut(class).take_tick(generation) {
                        self.poll_once(class).await;
                    } else {
                        debug!("Dropping stale {} tick (generation {})", class, generation);
                    }
                }
                SessionEvent::Shutdown(done) => {
                    self.shutdown().await;
                    let _ = done.send(());
                    break;
                }
            }
        }

        info!("Session manager stopped");
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::ListPorts { class, reply } => {
                let _ = reply.send(Ok(self.list_ports(class)));
            }
            Request::RefreshPorts { class, reply } => {
                let ports = self.list_ports(class);
                self.emit(Notification::PortsUpdated {
                    class,
                    ports: ports.clone(),
                });
                let _ = reply.send(Ok(ports));
            }
            Request::Start {
                class,
                port,
                params,
                reply,
            } => {
                let result = self.request_open(class, &port, params).await;
                let _ = reply.send(result);
            }
            Request::Stop { class, reply } => {
                self.close(class).await;
                let _ = reply.send(Ok(()));
            }
            Request::Sessions { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Request::DeviceCount { reply } => {
                let _ = reply.send(self.registry.devices().map(|d| d.len()));
            }
            Request::RequestPermission { port, reply } => {
                let _ = reply.send(self.request_permission(&port));
            }
            Request::DetectPorts { reply } => {
                let _ = reply.send(Ok(self.detect_ports()));
            }
            Request::ComList { reply } => {
                let _ = reply.send(Ok(self.sdk.com_list()));
            }
            Request::Port { port, command } => self.port_command(&port, command).await,
        }
    }

    fn session(&self, class: SensorClass) -> &ClassSession {
        &self.sessions[&class]
    }

    fn session_mut(&mut self, class: SensorClass) -> &mut ClassSession {
        self.sessions
            .entry(class)
            .or_insert_with(|| ClassSession::new(class))
    }

    fn snapshot(&self) -> Vec<SessionInfo> {
        SensorClass::ALL
            .iter()
            .map(|class| self.session(*class).snapshot())
            .collect()
    }

    fn emit(&self, notification: Notification) {
        debug!(event = notification.name(), "notify");
        // No subscribers is not an error
        let _ = self.notifier.send(notification);
    }

    fn emit_error(&self, class: SensorClass, err: &KioskError) {
        warn!("{} sensor error: {}", class, err);
        self.emit(Notification::error(class, err));
    }

    // --- Device inventory -------------------------------------------------

    /// Class a device belongs to; presence filters are checked first
    fn classify(&self, device: &UsbDevice) -> Option<SensorClass> {
        SensorClass::ALL.into_iter().find(|class| {
            DeviceFilter::any_match(
                &self.config.class(*class).filters,
                device.vendor_id,
                device.product_id,
            )
        })
    }

    /// Recompute both class lists and the adapter alias table from the registry
    fn rescan(&mut self) {
        let devices = match self.registry.devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!("Device scan failed: {}", e);
                return;
            }
        };

        let mut lists: HashMap<SensorClass, Vec<UsbDevice>> = SensorClass::ALL
            .into_iter()
            .map(|class| (class, Vec::new()))
            .collect();
        for device in &devices {
            if let Some(class) = self.classify(device) {
                lists.entry(class).or_default().push(device.clone());
            }
        }

        self.devices = lists;
        self.adapter = adapter_ports(&devices, &self.config.adapter);
        debug!(
            "Rescan: {} presence, {} light, {} adapter ports",
            self.devices[&SensorClass::Presence].len(),
            self.devices[&SensorClass::Light].len(),
            self.adapter.len()
        );
    }

    /// Re-detect the multi-port adapter. Returns the number of alias ports.
    fn detect_ports(&mut self) -> usize {
        match self.registry.devices() {
            Ok(devices) => {
                self.adapter = adapter_ports(&devices, &self.config.adapter);
                info!("Detected {} adapter ports", self.adapter.len());
            }
            Err(e) => error!("Adapter detection failed: {}", e),
        }
        self.adapter.len()
    }

    /// Names as shown to callers: live matching devices, then legacy aliases
    fn visible_ports(&self, class: SensorClass) -> Vec<String> {
        let cfg = self.config.class(class);
        let family = &self.config.adapter;

        let mut ports: Vec<String> = self
            .devices
            .get(&class)
            .into_iter()
            .flatten()
            .filter(|d| !(cfg.hide_adapter_devices && family.contains(d)))
            .filter(|d| cfg.list_vendor_id.map_or(true, |vid| d.vendor_id == vid))
            .map(|d| d.name.clone())
            .collect();

        ports.extend((0..self.adapter.len()).map(|i| family.alias(i)));
        ports
    }

    fn list_ports(&mut self, class: SensorClass) -> Vec<String> {
        self.rescan();
        self.visible_ports(class)
    }

    /// Device behind a port name: the class list first, then legacy aliases
    fn find_device(&self, class: SensorClass, port: &str) -> Option<UsbDevice> {
        self.devices
            .get(&class)
            .and_then(|list| list.iter().find(|d| d.name == port))
            .or_else(|| {
                self.config
                    .adapter
                    .alias_index(port)
                    .and_then(|i| self.adapter.get(i))
            })
            .cloned()
    }

    /// Device behind a port name in any class
    fn find_any_device(&self, port: &str) -> Option<UsbDevice> {
        SensorClass::ALL
            .into_iter()
            .find_map(|class| self.find_device(class, port))
    }

    /// Path handed to the SDK for a raw port name: aliases map to their adapter port
    fn resolve_path(&self, port: &str) -> String {
        self.config
            .adapter
            .alias_index(port)
            .and_then(|i| self.adapter.get(i))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| port.to_string())
    }

    // --- Session lifecycle ------------------------------------------------

    async fn request_open(
        &mut self,
        class: SensorClass,
        port: &str,
        params: OpenParams,
    ) -> Result<SessionPhase> {
        info!("Start {} on {} (level {})", class, port, params.level);

        if self.config.class(class).is_permission_exempt(port) {
            self.close(class).await;
            self.session_mut(class).bind(port, port, params);
            self.open(class).await?;
            return Ok(self.session(class).phase());
        }

        self.rescan();
        let Some(device) = self.find_device(class, port) else {
            let err = KioskError::DeviceNotFound(port.to_string());
            self.emit_error(class, &err);
            return Err(err);
        };

        self.close(class).await;
        self.session_mut(class).bind(port, &device.name, params);

        if self.registry.has_permission(&device) {
            self.open(class).await?;
            return Ok(self.session(class).phase());
        }

        if class == SensorClass::Light && self.config.compat.light_skip_pending_token {
            warn!(
                "Not recording a pending token for {}; a grant will not resume the open",
                device
            );
        } else {
            self.pending.insert(class, device.clone());
        }

        self.session_mut(class)
            .set_phase(SessionPhase::PermissionPending);
        self.broker.request(device);
        Ok(SessionPhase::PermissionPending)
    }

    /// Open the bound port and start polling
    async fn open(&mut self, class: SensorClass) -> Result<()> {
        let session = self.session(class);
        let (Some(port), Some(target)) = (
            session.port().map(str::to_string),
            session.target().map(str::to_string),
        ) else {
            return Ok(());
        };
        let params = session.params();
        let baud_rate = self.config.class(class).baud_rate;

        if let Err(e) = self.sdk.open_port(&target, baud_rate).await {
            self.emit_error(class, &e);
            self.session_mut(class).reset();
            return Err(e);
        }

        if class == SensorClass::Presence {
            if let Err(e) = self.sdk.set_threshold(&target, params.level).await {
                self.emit_error(class, &e);
            }
        }

        let delay = self.config.polling.initial_delay();
        let events = self.events_tx.clone();
        let session = self.session_mut(class);
        session.set_phase(SessionPhase::Open);
        session.arm_poll(delay, events);

        info!("{} sensor started on {}", class, port);
        self.emit(Notification::SensorStarted { class, port });
        Ok(())
    }

    async fn poll_once(&mut self, class: SensorClass) {
        let Some(target) = self.session(class).target().map(str::to_string) else {
            return;
        };

        let mut buf = [0u8; POLL_BUFFER_LEN];
        match self.sdk.read_status(&target, &mut buf).await {
            Ok(()) => match SensorReading::decode(&buf) {
                Some(reading) => {
                    debug!("{} {}: {} {}", class, target, reading.value, reading.status);
                    self.session_mut(class).set_phase(SessionPhase::Polling);
                    self.emit(Notification::SensorUpdate { class, reading });
                }
                None => warn!("Short status buffer from {}", target),
            },
            Err(e) => self.emit_error(class, &e),
        }

        let period = self.config.polling.period();
        let events = self.events_tx.clone();
        self.session_mut(class).arm_poll(period, events);
    }

    /// Tear down a session. A closed session only has its timer cancelled.
    async fn close(&mut self, class: SensorClass) {
        self.pending.remove(&class);

        let session = self.session_mut(class);
        session.cancel_poll();
        if session.phase() == SessionPhase::Closed {
            return;
        }
        let target = session.target().map(str::to_string);

        if let Some(target) = target {
            if self.sdk.is_open_port(&target) {
                if let Err(e) = self.sdk.close_port(&target).await {
                    warn!("Failed to close {}: {}", target, e);
                }
            }
        }

        self.session_mut(class).reset();
        info!("{} sensor stopped", class);
        self.emit(Notification::SensorStopped { class });
    }

    // --- Permission handshake ---------------------------------------------

    fn request_permission(&mut self, port: &str) -> Result<bool> {
        self.rescan();
        let device = self
            .find_any_device(port)
            .ok_or_else(|| KioskError::DeviceNotFound(port.to_string()))?;

        if self.registry.has_permission(&device) {
            debug!("Access to {} already held", device);
            return Ok(false);
        }

        self.broker.request(device);
        Ok(true)
    }

    /// Classes whose pending token names `device`, removing those tokens
    fn take_pending(&mut self, device: &UsbDevice) -> Vec<SensorClass> {
        let classes: Vec<SensorClass> = SensorClass::ALL
            .into_iter()
            .filter(|class| {
                self.pending
                    .get(class)
                    .is_some_and(|pending| pending.name == device.name)
            })
            .collect();
        for class in &classes {
            self.pending.remove(class);
        }
        classes
    }

    /// Only classes waiting on `device` are affected; other tokens stay in place.
    async fn on_permission_result(&mut self, device: UsbDevice, granted: bool) {
        let waiting = self.take_pending(&device);

        if !granted {
            warn!("Access to {} denied", device);
            for class in &waiting {
                if self.session(*class).phase() == SessionPhase::PermissionPending {
                    self.session_mut(*class).reset();
                }
            }
            self.emit(Notification::PermissionDenied {
                class: waiting.first().copied(),
                device: device.name.clone(),
            });
            return;
        }

        info!("Access to {} granted", device);
        self.registry.grant(&device);
        self.emit(Notification::PermissionGranted {
            device: device.name.clone(),
        });

        if self.config.adapter.contains(&device) {
            self.detect_ports();
        }

        for class in waiting {
            if self.session(class).phase() == SessionPhase::PermissionPending {
                debug!("Resuming {} open after grant for {}", class, device);
                // Failures were already reported as notifications
                let _ = self.open(class).await;
            }
        }
    }

    // --- Hotplug -----------------------------------------------------------

    fn on_device_attached(&mut self, device: &UsbDevice) {
        info!("Device attached: {}", device);
        self.rescan();
        for class in SensorClass::ALL {
            let ports = self.visible_ports(class);
            self.emit(Notification::PortsUpdated { class, ports });
        }
        self.emit(Notification::DeviceAttached);
    }

    async fn on_device_detached(&mut self, device: &UsbDevice) {
        info!("Device detached: {}", device);

        let class = SensorClass::ALL.into_iter().find(|class| {
            self.devices
                .get(class)
                .is_some_and(|list| list.iter().any(|d| d.name == device.name))
        });
        if let Some(class) = class {
            if let Some(list) = self.devices.get_mut(&class) {
                list.retain(|d| d.name != device.name);
            }
        }

        // An alias session is bound by alias name; match it through the adapter table
        let alias = self
            .adapter
            .iter()
            .position(|d| d.name == device.name)
            .map(|i| self.config.adapter.alias(i));
        self.adapter.retain(|d| d.name != device.name);

        for bound in SensorClass::ALL {
            let session = self.session(bound);
            let by_alias = alias.is_some() && session.port() == alias.as_deref();
            if session.is_bound_to(device) || by_alias {
                self.close(bound).await;
            }
        }

        self.pending.retain(|_, pending| pending.name != device.name);
        self.registry.revoke(device);

        // Aliases are listed for both classes, so losing one changes both lists
        let updated: Vec<SensorClass> = if alias.is_some() {
            SensorClass::ALL.to_vec()
        } else {
            class.into_iter().collect()
        };
        for changed in updated {
            let ports = self.visible_ports(changed);
            self.emit(Notification::PortsUpdated {
                class: changed,
                ports,
            });
        }
        self.emit(Notification::detached(class, device));
    }

    // --- Pass-through vendor calls ----------------------------------------

    async fn port_command(&mut self, port: &str, command: PortCommand) {
        let path = self.resolve_path(port);
        debug!("Port command {:?} on {} ({})", command, port, path);

        match command {
            PortCommand::IsOpen(reply) => {
                let _ = reply.send(Ok(self.sdk.is_open_port(&path)));
            }
            PortCommand::Open { baud_rate, reply } => {
                let code = result_code(self.sdk.open_port(&path, baud_rate).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::Close(reply) => {
                let code = match self.bound_class(&path) {
                    Some(class) => {
                        info!("Raw close of {} ends the {} session", path, class);
                        self.close(class).await;
                        codes::OK
                    }
                    None => result_code(self.sdk.close_port(&path).await),
                };
                let _ = reply.send(Ok(code));
            }
            PortCommand::SetColor { color, reply } => {
                let code = result_code(self.sdk.set_led_color(&path, &color).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::ShowColor { color, reply } => {
                let _ = reply.send(Ok(self.show_color(&path, &color).await));
            }
            PortCommand::Flash(reply) => {
                let code = result_code(self.sdk.set_flash(&path).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::Smooth(reply) => {
                let code = result_code(self.sdk.set_smooth(&path).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::Stop(reply) => {
                let code = result_code(self.sdk.set_stop(&path).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::Breathe { pattern, reply } => {
                let code = result_code(self.sdk.set_breathe(&path, pattern).await);
                let _ = reply.send(Ok(code));
            }
            PortCommand::RawStatus(reply) => {
                let _ = reply.send(self.light_status(&path).await);
            }
            PortCommand::ParsedStatus(reply) => {
                let result = self.light_status(&path).await.and_then(|buf| {
                    LightStatus::decode(&buf).ok_or_else(|| {
                        KioskError::Parse(format!("Short light status from {}", path))
                    })
                });
                let _ = reply.send(result);
            }
            PortCommand::Firmware(reply) => {
                let _ = reply.send(self.sdk.firmware_version(&path).await);
            }
        }
    }

    /// Class whose live session has `path` open
    fn bound_class(&self, path: &str) -> Option<SensorClass> {
        SensorClass::ALL.into_iter().find(|class| {
            let session = self.session(*class);
            matches!(session.phase(), SessionPhase::Open | SessionPhase::Polling)
                && session.target() == Some(path)
        })
    }

    async fn light_status(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; LIGHT_STATUS_LEN];
        self.sdk.read_status(path, &mut buf).await?;
        Ok(buf)
    }

    /// Open at the SDK default baud rate, set the colour, close.
    /// A port that was already open is used as is and left open.
    async fn show_color(&mut self, path: &str, color: &LedColor) -> i32 {
        let was_open = self.sdk.is_open_port(path);
        if !was_open {
            if let Err(e) = self.sdk.open_port(path, 0).await {
                warn!("show_color: open {} failed: {}", path, e);
                return kiosk_hardware::vendor_code_for(&e);
            }
        }

        let code = result_code(self.sdk.set_led_color(path, color).await);

        if !was_open {
            if let Err(e) = self.sdk.close_port(path).await {
                warn!("show_color: close {} failed: {}", path, e);
            }
        }
        code
    }

    // --- Shutdown ----------------------------------------------------------

    async fn shutdown(&mut self) {
        info!("Closing sensor sessions");
        for class in SensorClass::ALL {
            self.close(class).await;
        }
        self.pending.clear();
        // Stop producing events before the receiver goes away
        if self.hotplug.take().is_some() {
            debug!("Hotplug watcher released");
        }
    }
}

/// Cloneable client for the session manager task
#[derive(Clone)]
pub(crate) struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    notifier: broadcast::Sender<Notification>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(SessionEvent::Request(make(reply)))
            .await
            .map_err(|_| KioskError::SessionClosed)?;
        rx.await.map_err(|_| KioskError::SessionClosed)?
    }

    async fn port_request<T>(
        &self,
        port: &str,
        make: impl FnOnce(Reply<T>) -> PortCommand,
    ) -> Result<T> {
        let port = port.to_string();
        self.request(|reply| Request::Port {
            port,
            command: make(reply),
        })
        .await
    }

    /// Receive every notification emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub async fn list_ports(&self, class: SensorClass) -> Result<Vec<String>> {
        self.request(|reply| Request::ListPorts { class, reply })
            .await
    }

    /// Rescan and broadcast the port list for `class`
    pub async fn refresh_ports(&self, class: SensorClass) -> Result<Vec<String>> {
        self.request(|reply| Request::RefreshPorts { class, reply })
            .await
    }

    pub async fn start(
        &self,
        class: SensorClass,
        port: &str,
        params: OpenParams,
    ) -> Result<SessionPhase> {
        let port = port.to_string();
        self.request(|reply| Request::Start {
            class,
            port,
            params,
            reply,
        })
        .await
    }

    pub async fn stop(&self, class: SensorClass) -> Result<()> {
        self.request(|reply| Request::Stop { class, reply }).await
    }

    pub async fn sessions(&self) -> Result<Vec<SessionInfo>> {
        self.request(|reply| Request::Sessions { reply }).await
    }

    pub async fn device_count(&self) -> Result<usize> {
        self.request(|reply| Request::DeviceCount { reply }).await
    }

    pub async fn request_permission(&self, port: &str) -> Result<bool> {
        let port = port.to_string();
        self.request(|reply| Request::RequestPermission { port, reply })
            .await
    }

    pub async fn detect_ports(&self) -> Result<usize> {
        self.request(|reply| Request::DetectPorts { reply }).await
    }

    pub async fn com_list(&self) -> Result<Vec<String>> {
        self.request(|reply| Request::ComList { reply }).await
    }

    pub async fn is_open_port(&self, port: &str) -> Result<bool> {
        self.port_request(port, PortCommand::IsOpen).await
    }

    pub async fn open_port(&self, port: &str, baud_rate: u32) -> Result<i32> {
        self.port_request(port, |reply| PortCommand::Open { baud_rate, reply })
            .await
    }

    pub async fn close_port(&self, port: &str) -> Result<i32> {
        self.port_request(port, PortCommand::Close).await
    }

    pub async fn set_led_color(&self, port: &str, color: LedColor) -> Result<i32> {
        self.port_request(port, |reply| PortCommand::SetColor { color, reply })
            .await
    }

    pub async fn show_color(&self, port: &str, color: LedColor) -> Result<i32> {
        self.port_request(port, |reply| PortCommand::ShowColor { color, reply })
            .await
    }

    pub async fn set_flash(&self, port: &str) -> Result<i32> {
        self.port_request(port, PortCommand::Flash).await
    }

    pub async fn set_smooth(&self, port: &str) -> Result<i32> {
        self.port_request(port, PortCommand::Smooth).await
    }

    pub async fn set_stop(&self, port: &str) -> Result<i32> {
        self.port_request(port, PortCommand::Stop).await
    }

    pub async fn set_breathe(&self, port: &str, pattern: u32) -> Result<i32> {
        self.port_request(port, |reply| PortCommand::Breathe { pattern, reply })
            .await
    }

    pub async fn get_status(&self, port: &str) -> Result<Vec<u8>> {
        self.port_request(port, PortCommand::RawStatus).await
    }

    pub async fn parsed_status(&self, port: &str) -> Result<LightStatus> {
        self.port_request(port, PortCommand::ParsedStatus).await
    }

    pub async fn firmware_version(&self, port: &str) -> Result<String> {
        self.port_request(port, PortCommand::Firmware).await
    }

    /// Close both sessions and stop the manager task
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.events.send(SessionEvent::Shutdown(done)).await.is_ok() {
            let _ = rx.await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn inject(&self, event: SessionEvent) {
        let _ = self.events.send(event).await;
    }
}
