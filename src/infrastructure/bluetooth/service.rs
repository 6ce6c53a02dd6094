//! Bluetooth Service Module
//!
//! Single owner of the connection session, the packet codec and the
//! transport. GUI commands and transport events are consumed one at a time in
//! arrival order; the results go back to the GUI as [`AppEvent`]s and
//! waveform samples go straight into the shared [`WaveformBuffer`].

use crate::domain::models::{
    AppEvent, BluetoothCommand, ConnectionStatus, DeviceCommand, MessageSeverity, StatusMessage,
    TelemetryEvent,
};
use crate::domain::waveform::WaveformBuffer;
use crate::infrastructure::bluetooth::protocol::{PacketCodec, ProtocolConfig};
use crate::infrastructure::bluetooth::session::{Session, SessionTrigger};
use crate::infrastructure::bluetooth::transport::{
    EventSink, SessionEvent, Transport, TransportEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

pub struct BluetoothService {
    codec: PacketCodec,
    waveform: Arc<WaveformBuffer>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    transport: Box<dyn Transport>,
    session: Option<Session>,
    next_session_id: u64,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl BluetoothService {
    pub fn new(
        protocol: ProtocolConfig,
        transport: Box<dyn Transport>,
        waveform: Arc<WaveformBuffer>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        Self {
            codec: PacketCodec::new(protocol),
            waveform,
            event_sender,
            transport,
            session: None,
            next_session_id: 1,
            session_tx,
            session_rx,
        }
    }

    /// Pump commands and transport events until the GUI drops its sender
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<BluetoothCommand>) {
        info!("Bluetooth service started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.session_rx.recv() => self.handle_session_event(event),
            }
        }
        self.transport.close();
        info!("Bluetooth service stopped");
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, |s| s.state().into())
    }

    pub fn handle_command(&mut self, command: BluetoothCommand) {
        match command {
            BluetoothCommand::Connect => self.connect(),
            BluetoothCommand::Disconnect => {
                info!("Disconnect requested");
                self.teardown();
                self.emit_status(ConnectionStatus::Disconnected);
            }
            BluetoothCommand::Send(command) => self.send(command),
            BluetoothCommand::ClearWaveform => self.waveform.clear(),
        }
    }

    fn connect(&mut self) {
        self.teardown();

        let id = self.next_session_id;
        self.next_session_id += 1;
        let mut session = Session::new(id);
        if let Err(e) = session.apply(SessionTrigger::Connect) {
            error!("{}", e);
            return;
        }

        info!(session = id, "Connecting");
        match self
            .transport
            .open(EventSink::new(id, self.session_tx.clone()))
        {
            Ok(()) => {
                self.session = Some(session);
                self.emit_status(ConnectionStatus::Connecting);
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                self.emit_message(format!("Connection failed: {}", e), MessageSeverity::Error);
                self.emit_status(ConnectionStatus::Disconnected);
            }
        }
    }

    fn send(&mut self, command: DeviceCommand) {
        if !self.session.as_ref().is_some_and(Session::can_send) {
            warn!("Dropping {:?}: device not ready", command);
            self.emit_message("Device not ready", MessageSeverity::Warning);
            return;
        }

        let packet = self.codec.encode(&command);
        match self.transport.write(&packet) {
            Ok(()) => debug!("Queued {:?}: {:02X?}", command, packet),
            Err(e) => {
                error!("Failed to send {:?}: {}", command, e);
                self.emit_message(format!("Send failed: {}", e), MessageSeverity::Error);
            }
        }
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        let Some(session) = self.session.as_mut().filter(|s| s.id() == event.session_id) else {
            trace!(session = event.session_id, "Ignoring event from stale session");
            return;
        };

        match event.event {
            TransportEvent::Connected { device_name } => {
                match session.apply(SessionTrigger::LinkUp) {
                    Ok(state) => {
                        info!("Connected to {}", device_name);
                        self.emit_status(state.into());
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            TransportEvent::ServicesReady => match session.apply(SessionTrigger::ServicesResolved) {
                Ok(state) => {
                    self.emit_status(state.into());
                    self.emit_message("Ready!", MessageSeverity::Success);
                }
                Err(e) => warn!("{}", e),
            },
            TransportEvent::Notification(bytes) => {
                if !session.accepts_notifications() {
                    trace!("Notification before link up: {:02X?}", bytes);
                    return;
                }
                match self.codec.decode(&bytes) {
                    Some(TelemetryEvent::Health(sample)) => {
                        let _ = self.event_sender.send(AppEvent::Health(sample));
                    }
                    Some(TelemetryEvent::Waveform { magnitude }) => {
                        self.waveform.append(magnitude as f32);
                    }
                    None => {}
                }
            }
            TransportEvent::WriteFailed(reason) => {
                self.emit_message(format!("Send failed: {}", reason), MessageSeverity::Error);
            }
            TransportEvent::Disconnected { reason } => {
                info!("Link lost: {}", reason);
                self.teardown();
                self.emit_status(ConnectionStatus::Disconnected);
                self.emit_message(
                    format!("Disconnected: {}", reason),
                    MessageSeverity::Warning,
                );
            }
            TransportEvent::Failed(reason) => {
                error!("Connection failed: {}", reason);
                self.teardown();
                self.emit_message(
                    format!("Connection failed: {}", reason),
                    MessageSeverity::Error,
                );
                self.emit_status(ConnectionStatus::Error);
            }
        }
    }

    /// Close the link and forget the session; the waveform belongs to it
    fn teardown(&mut self) {
        self.transport.close();
        if let Some(mut session) = self.session.take() {
            let _ = session.apply(SessionTrigger::LinkLost);
            debug!(session = session.id(), "Session closed");
        }
        self.waveform.clear();
    }

    fn emit_status(&self, status: ConnectionStatus) {
        let _ = self.event_sender.send(AppEvent::ConnectionStatus(status));
    }

    fn emit_message(&self, message: impl Into<String>, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::HealthSample;
    use crate::infrastructure::bluetooth::protocol;
    use crate::infrastructure::bluetooth::simulator::{SimulatedPeripheral, SimulatorConfig};
    use crate::infrastructure::bluetooth::transport::TransportError;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorded {
        sinks: Vec<EventSink>,
        written: Vec<Vec<u8>>,
        closed: usize,
        fail_open: bool,
    }

    #[derive(Clone, Default)]
    struct RecordingTransport(Arc<Mutex<Recorded>>);

    impl Transport for RecordingTransport {
        fn open(&mut self, sink: EventSink) -> Result<(), TransportError> {
            let mut recorded = self.0.lock().unwrap();
            if recorded.fail_open {
                return Err(TransportError::NoAdapter);
            }
            recorded.sinks.push(sink);
            Ok(())
        }

        fn write(&mut self, packet: &[u8]) -> Result<(), TransportError> {
            self.0.lock().unwrap().written.push(packet.to_vec());
            Ok(())
        }

        fn close(&mut self) {
            self.0.lock().unwrap().closed += 1;
        }
    }

    struct Harness {
        service: BluetoothService,
        transport: RecordingTransport,
        waveform: Arc<WaveformBuffer>,
        events: mpsc::UnboundedReceiver<AppEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let transport = RecordingTransport::default();
            let waveform = Arc::new(WaveformBuffer::new());
            let (tx, events) = mpsc::unbounded_channel();
            let service = BluetoothService::new(
                ProtocolConfig::tagged(),
                Box::new(transport.clone()),
                waveform.clone(),
                tx,
            );
            Self {
                service,
                transport,
                waveform,
                events,
            }
        }

        fn session_id(&self) -> u64 {
            self.transport.0.lock().unwrap().sinks.last().unwrap().session_id()
        }

        fn deliver(&mut self, event: TransportEvent) {
            let session_id = self.session_id();
            self.service
                .handle_session_event(SessionEvent { session_id, event });
        }

        fn connect_ready(&mut self) {
            self.service.handle_command(BluetoothCommand::Connect);
            self.deliver(TransportEvent::Connected {
                device_name: "Massage_Pro_X1".to_string(),
            });
            self.deliver(TransportEvent::ServicesReady);
        }

        fn drain(&mut self) -> Vec<AppEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn statuses(&mut self) -> Vec<ConnectionStatus> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    AppEvent::ConnectionStatus(s) => Some(s),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_connect_reports_each_state() {
        let mut h = Harness::new();
        h.connect_ready();
        assert_eq!(
            h.statuses(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Ready
            ]
        );
        assert_eq!(h.service.status(), ConnectionStatus::Ready);
    }

    #[test]
    fn test_commands_dropped_until_ready() {
        let mut h = Harness::new();
        h.service
            .handle_command(BluetoothCommand::Send(DeviceCommand::Rotate));
        h.service.handle_command(BluetoothCommand::Connect);
        h.deliver(TransportEvent::Connected {
            device_name: "x".to_string(),
        });
        h.service
            .handle_command(BluetoothCommand::Send(DeviceCommand::ToggleHeat));
        assert!(h.transport.0.lock().unwrap().written.is_empty());

        let warnings = h
            .drain()
            .into_iter()
            .filter(|e| {
                matches!(e, AppEvent::LogMessage(m) if m.severity == MessageSeverity::Warning)
            })
            .count();
        assert_eq!(warnings, 2);

        h.deliver(TransportEvent::ServicesReady);
        h.service
            .handle_command(BluetoothCommand::Send(DeviceCommand::SetLevel(9)));
        assert_eq!(h.transport.0.lock().unwrap().written, vec![vec![0x04, 5]]);
    }

    #[test]
    fn test_notifications_reach_buffer_and_gui() {
        let mut h = Harness::new();
        h.connect_ready();
        h.drain();

        h.deliver(TransportEvent::Notification(
            protocol::waveform_packet(66051).to_vec(),
        ));
        h.deliver(TransportEvent::Notification(vec![0xF1, 80, 96]));
        h.deliver(TransportEvent::Notification(vec![0xF1, 80]));
        h.deliver(TransportEvent::Notification(vec![]));

        assert_eq!(h.waveform.snapshot(), vec![66051.0]);
        let health: Vec<HealthSample> = h
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                AppEvent::Health(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(health, vec![HealthSample::new(80, 96)]);
    }

    #[test]
    fn test_notifications_ignored_before_link_up() {
        let mut h = Harness::new();
        h.service.handle_command(BluetoothCommand::Connect);
        h.deliver(TransportEvent::Notification(
            protocol::waveform_packet(10).to_vec(),
        ));
        assert!(h.waveform.is_empty());
    }

    #[test]
    fn test_stale_session_events_are_ignored() {
        let mut h = Harness::new();
        h.service.handle_command(BluetoothCommand::Connect);
        let stale = h.session_id();
        h.service.handle_command(BluetoothCommand::Connect);
        assert_ne!(stale, h.session_id());
        h.drain();

        h.service.handle_session_event(SessionEvent {
            session_id: stale,
            event: TransportEvent::Connected {
                device_name: "old".to_string(),
            },
        });
        assert!(h.statuses().is_empty());
        assert_eq!(h.service.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_disconnect_clears_waveform() {
        let mut h = Harness::new();
        h.connect_ready();
        for v in 0..10 {
            h.deliver(TransportEvent::Notification(
                protocol::waveform_packet(v).to_vec(),
            ));
        }
        assert_eq!(h.waveform.len(), 10);

        h.service.handle_command(BluetoothCommand::Disconnect);
        assert!(h.waveform.is_empty());
        assert_eq!(h.service.status(), ConnectionStatus::Disconnected);
        assert!(h.transport.0.lock().unwrap().closed >= 1);
    }

    #[test]
    fn test_link_loss_tears_down_session() {
        let mut h = Harness::new();
        h.connect_ready();
        h.deliver(TransportEvent::Notification(
            protocol::waveform_packet(5).to_vec(),
        ));
        h.drain();

        h.deliver(TransportEvent::Disconnected {
            reason: "peer".to_string(),
        });
        assert!(h.waveform.is_empty());
        assert_eq!(h.statuses(), vec![ConnectionStatus::Disconnected]);

        // Late events from the lost link do nothing
        h.deliver(TransportEvent::Notification(
            protocol::waveform_packet(5).to_vec(),
        ));
        assert!(h.waveform.is_empty());
    }

    #[test]
    fn test_failed_open_reports_error() {
        let mut h = Harness::new();
        h.transport.0.lock().unwrap().fail_open = true;
        h.service.handle_command(BluetoothCommand::Connect);

        let events = h.drain();
        assert!(events.iter().any(
            |e| matches!(e, AppEvent::LogMessage(m) if m.severity == MessageSeverity::Error)
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::ConnectionStatus(ConnectionStatus::Disconnected))));
        assert_eq!(h.service.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_run_with_simulated_device() {
        let transport = SimulatedPeripheral::new(SimulatorConfig {
            connect_delay: Duration::from_millis(1),
            sample_interval: Duration::from_millis(1),
            health_interval: Duration::from_millis(5),
            ..SimulatorConfig::default()
        });
        let waveform = Arc::new(WaveformBuffer::new());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let service = BluetoothService::new(
            ProtocolConfig::tagged(),
            Box::new(transport),
            waveform.clone(),
            event_tx,
        );
        let task = tokio::spawn(service.run(command_rx));

        command_tx.send(BluetoothCommand::Connect).unwrap();
        let health = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match event_rx.recv().await {
                    Some(AppEvent::Health(sample)) => break sample,
                    Some(_) => continue,
                    None => panic!("service stopped"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(health.spo2, 97);
        assert!(!waveform.is_empty());

        command_tx.send(BluetoothCommand::Disconnect).unwrap();
        drop(command_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(waveform.is_empty());
    }
}
