use crate::domain::assistant::{Recommendation, SessionTimer, UserProfile};
use crate::domain::models::{
    AppEvent, BluetoothCommand, ConnectionStatus, DeviceCommand, HealthSample, MessageSeverity,
    StatusMessage, Tab,
};
use crate::domain::settings::{Settings, SettingsService};
use crate::domain::waveform::WaveformBuffer;
use crate::infrastructure::bluetooth::simulator::SimulatedPeripheral;
use crate::infrastructure::bluetooth::transport::Transport;
use crate::infrastructure::bluetooth::{self, BluetoothService};
use crate::infrastructure::logging::{self, LoggingGuard};
use eframe::egui;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Auto-reconnect policy. `enabled` is the persisted preference; a manual
/// disconnect or a hard failure only pauses retries until the next connect.
pub(crate) struct Reconnect {
    pub(crate) enabled: bool,
    suppressed: bool,
    pub(crate) timer: Option<Instant>,
}

impl Reconnect {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            suppressed: false,
            timer: None,
        }
    }

    pub(crate) fn user_connected(&mut self) {
        self.suppressed = false;
        self.timer = None;
    }

    /// Manual disconnect or a hard error
    pub(crate) fn pause(&mut self) {
        self.suppressed = true;
        self.timer = None;
    }

    pub(crate) fn ready(&mut self) {
        self.timer = None;
    }

    /// Schedules a retry after the link drops; returns whether one was scheduled
    pub(crate) fn link_lost(&mut self, now: Instant) -> bool {
        if self.enabled && !self.suppressed {
            self.timer = Some(now + RECONNECT_DELAY);
            true
        } else {
            false
        }
    }

    pub(crate) fn due(&self, now: Instant) -> bool {
        self.enabled && self.timer.is_some_and(|at| now >= at)
    }
}

pub struct MassageApp {
    // Services
    pub(crate) settings: Arc<Mutex<SettingsService>>,
    pub(crate) waveform: Arc<WaveformBuffer>,

    // Bluetooth
    pub(crate) bluetooth_tx: mpsc::UnboundedSender<BluetoothCommand>,
    pub(crate) event_rx: mpsc::UnboundedReceiver<AppEvent>,

    // State
    pub(crate) connection_status: ConnectionStatus,
    pub(crate) status_message: Option<StatusMessage>,
    pub(crate) health: Option<HealthSample>,

    // Controls
    pub(crate) level: i32,
    pub(crate) level_max: u8,

    // Assistant
    pub(crate) profile: UserProfile,
    pub(crate) recommendation: Option<Recommendation>,
    pub(crate) active_plan: Option<(Recommendation, SessionTimer)>,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) is_dark_mode: bool,

    // Reconnection
    pub(crate) reconnect: Reconnect,

    // Logging guard
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl MassageApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        crate::presentation::theme::configure(&cc.egui_ctx, false);

        let settings_service = SettingsService::new().unwrap_or_else(|e| {
            eprintln!("Failed to load settings, using defaults: {}", e);
            SettingsService::in_memory(Settings::default())
        });

        let logging_guard = logging::init_logger(&settings_service.get().log_settings)
            .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
            .ok();

        info!("Starting Massage Companion");

        let snapshot = settings_service.get().clone();
        let waveform = Arc::new(WaveformBuffer::with_amplification(
            snapshot.waveform.amplification,
        ));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (bt_cmd_tx, bt_cmd_rx) = mpsc::unbounded_channel();

        spawn_bluetooth_worker(&snapshot, waveform.clone(), event_tx, bt_cmd_rx);

        Self {
            settings: Arc::new(Mutex::new(settings_service)),
            waveform,
            bluetooth_tx: bt_cmd_tx,
            event_rx,
            connection_status: ConnectionStatus::Disconnected,
            status_message: None,
            health: None,
            level: 0,
            level_max: snapshot.protocol.level_max,
            profile: UserProfile::default(),
            recommendation: None,
            active_plan: None,
            selected_tab: Tab::Control,
            is_dark_mode: false,
            reconnect: Reconnect::new(snapshot.auto_reconnect),
            _logging_guard: logging_guard,
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.connection_status.is_ready()
    }

    pub(crate) fn connect(&mut self) {
        self.reconnect.user_connected();
        self.connection_status = ConnectionStatus::Connecting;
        let _ = self.bluetooth_tx.send(BluetoothCommand::Connect);
    }

    pub(crate) fn disconnect(&mut self) {
        self.reconnect.pause();
        self.active_plan = None;
        let _ = self.bluetooth_tx.send(BluetoothCommand::Disconnect);
    }

    pub(crate) fn send(&self, command: DeviceCommand) {
        let _ = self.bluetooth_tx.send(BluetoothCommand::Send(command));
    }

    pub(crate) fn clear_waveform(&self) {
        let _ = self.bluetooth_tx.send(BluetoothCommand::ClearWaveform);
    }

    /// Start an assistant plan on the device and begin the countdown
    pub(crate) fn apply_plan(&mut self, plan: Recommendation) {
        self.send(plan.to_command());
        self.level = plan.level as i32;
        self.status_message = Some(StatusMessage::new(
            format!("Started {} ({} min)", plan.mode, plan.duration_minutes),
            MessageSeverity::Info,
        ));
        let timer = SessionTimer::start(plan.duration());
        self.active_plan = Some((plan, timer));
    }

    pub(crate) fn stop_plan(&mut self) {
        if self.active_plan.take().is_some() {
            self.send(DeviceCommand::AssistantStop);
        }
    }

    pub(crate) fn save_settings(&mut self) {
        let result = match self.settings.lock() {
            Ok(mut settings) => {
                settings.get_mut().auto_reconnect = self.reconnect.enabled;
                settings.get_mut().waveform.amplification = self.waveform.amplification();
                settings.save()
            }
            Err(_) => Err(anyhow::anyhow!("Lock error")),
        };
        self.status_message = Some(match result {
            Ok(()) => StatusMessage::new("Settings saved", MessageSeverity::Success),
            Err(e) => {
                error!("Failed to save settings: {}", e);
                StatusMessage::new(format!("Failed to save settings: {}", e), MessageSeverity::Error)
            }
        });
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Health(sample) => self.health = Some(sample),
            AppEvent::ConnectionStatus(status) => {
                self.connection_status = status;
                match status {
                    ConnectionStatus::Ready => self.reconnect.ready(),
                    ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                        self.health = None;
                        self.active_plan = None;
                        if self.reconnect.link_lost(Instant::now()) {

                            // Keep an error visible rather than hiding it behind the retry notice
                            let should_update_msg = self
                                .status_message
                                .as_ref()
                                .map_or(true, |m| m.severity != MessageSeverity::Error);
                            if should_update_msg {
                                self.status_message = Some(StatusMessage::new(
                                    "Disconnected. Reconnecting in 2s...",
                                    MessageSeverity::Warning,
                                ));
                            }
                        }
                    }
                    ConnectionStatus::Connecting | ConnectionStatus::Connected => {}
                }
            }
            AppEvent::LogMessage(msg) => {
                // A hard failure stops the retry loop until the user reconnects
                if msg.severity == MessageSeverity::Error {
                    self.reconnect.pause();
                }
                self.status_message = Some(msg);
            }
        }
    }

    fn tick_assistant(&mut self) {
        let finished = self
            .active_plan
            .as_ref()
            .is_some_and(|(_, timer)| timer.is_finished());
        if finished {
            self.stop_plan();
            self.status_message = Some(StatusMessage::new(
                "Assistant session complete",
                MessageSeverity::Success,
            ));
        }
    }
}

/// Run the Bluetooth service on its own thread with a current-thread runtime
fn spawn_bluetooth_worker(
    settings: &Settings,
    waveform: Arc<WaveformBuffer>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    commands: mpsc::UnboundedReceiver<BluetoothCommand>,
) {
    let settings = settings.clone();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create tokio runtime for Bluetooth: {}", e);
                let _ = event_tx.send(AppEvent::LogMessage(StatusMessage::new(
                    format!("Bluetooth unavailable: {}", e),
                    MessageSeverity::Error,
                )));
                return;
            }
        };

        rt.block_on(async move {
            let transport: Box<dyn Transport> = match bluetooth::create_transport(&settings) {
                Ok(transport) => transport,
                Err(e) => {
                    warn!("{:?} transport unavailable: {}", settings.device.transport, e);
                    let _ = event_tx.send(AppEvent::LogMessage(StatusMessage::new(
                        format!("{}; using the simulated device", e),
                        MessageSeverity::Warning,
                    )));
                    Box::new(SimulatedPeripheral::new(bluetooth::simulator_config(&settings)))
                }
            };

            BluetoothService::new(settings.protocol, transport, waveform, event_tx)
                .run(commands)
                .await;
        });
    });
}

impl eframe::App for MassageApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.reconnect.due(Instant::now()) {
            self.connect();
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
        }
        self.tick_assistant();

        // The waveform streams at 100 Hz
        ctx.request_repaint();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Control, "Control");
                ui.selectable_value(&mut self.selected_tab, Tab::Health, "Health");
                ui.selectable_value(&mut self.selected_tab, Tab::Assistant, "Assistant");
                ui.selectable_value(&mut self.selected_tab, Tab::Settings, "Settings");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        crate::presentation::theme::configure(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(820.0);
                    ui.add_space(16.0);

                    use crate::presentation::tabs;
                    match self.selected_tab {
                        Tab::Control => tabs::control::render(self, ui),
                        Tab::Health => tabs::health::render(self, ui),
                        Tab::Assistant => tabs::assistant::render(self, ui),
                        Tab::Settings => tabs::settings::render(self, ui),
                    }

                    ui.add_space(40.0);
                });
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_disconnect_keeps_preference() {
        let now = Instant::now();
        let mut reconnect = Reconnect::new(true);

        reconnect.pause();
        assert!(reconnect.enabled);
        assert!(!reconnect.link_lost(now));
        assert!(reconnect.timer.is_none());
    }

    #[test]
    fn test_connect_resumes_retries() {
        let now = Instant::now();
        let mut reconnect = Reconnect::new(true);
        reconnect.pause();
        reconnect.user_connected();

        assert!(reconnect.link_lost(now));
        assert!(!reconnect.due(now));
        assert!(reconnect.due(now + RECONNECT_DELAY));

        reconnect.ready();
        assert!(!reconnect.due(now + RECONNECT_DELAY));
    }

    #[test]
    fn test_disabled_never_schedules() {
        let mut reconnect = Reconnect::new(false);
        assert!(!reconnect.link_lost(Instant::now()));
        assert!(reconnect.timer.is_none());
    }
}
