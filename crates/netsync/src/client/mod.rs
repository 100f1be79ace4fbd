mod command;
mod config;
mod link;
mod workers;

pub use command::{
    CredentialProvider, Credentials, InputSource, Intent, SLOT_ATTACK, SLOT_SUPPORT_A,
    SLOT_SUPPORT_B,
};
pub use config::{ClientConfig, DEFAULT_KEEPALIVE_INTERVAL};

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use glam::Vec2;
use log::{debug, info, warn};
use uuid::Uuid;

use self::command::normalize_map_id;
use self::link::Link;
use crate::clock;
use crate::error::NetError;
use crate::net::{ConnectionState, LinkQuality, NetworkEndpoint, NetworkStats, Payload};
use crate::prediction::PredictionReconciler;
use crate::snapshot::{EntityRegistry, RenderWindow, Snapshot, interpolation, render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: Uuid,
    pub seed: i32,
    pub map_id: String,
}

/// Session events, delivered in arrival order by [`NetworkClient::poll`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Hello {
        session_id: Uuid,
        tick_rate: u32,
    },
    ConnectOk {
        character_id: Uuid,
        season_id: Uuid,
        player_name: String,
    },
    InstanceStart(InstanceInfo),
    Snapshot(Arc<Snapshot>),
    /// Non-fatal; the session stays up.
    ServerError {
        code: String,
        message: String,
    },
    NetStats(LinkQuality),
    Disconnected {
        reason: String,
    },
}

type SnapshotObserver = Box<dyn FnMut(&Snapshot) + Send>;

struct Connection {
    link: Arc<Link>,
    events: Receiver<ClientEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl Connection {
    fn join_workers(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Client side of one game session.
///
/// Network loops run on background threads; everything here is driven from
/// the application tick. Call [`NetworkClient::poll`] once per tick to apply
/// snapshots to the prediction and collect session events.
pub struct NetworkClient {
    config: ClientConfig,
    connection: Option<Connection>,
    prediction: PredictionReconciler,
    registry: EntityRegistry,
    observers: Vec<SnapshotObserver>,
    command_sequence: u32,
    player_id: Option<Uuid>,
    instance: Option<InstanceInfo>,
    link_quality: Option<LinkQuality>,
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl NetworkClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            prediction: PredictionReconciler::new(config.move_speed, config.max_pending_inputs),
            registry: EntityRegistry::new(config.position_smoothing),
            config,
            connection: None,
            observers: Vec::new(),
            command_sequence: 0,
            player_id: None,
            instance: None,
            link_quality: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn link(&self) -> Option<&Arc<Link>> {
        self.connection.as_ref().map(|connection| &connection.link)
    }

    fn next_command_sequence(&mut self) -> u32 {
        self.command_sequence = self.command_sequence.wrapping_add(1);
        self.command_sequence
    }

    /// Opens the socket, starts the network loops and sends `connect` and
    /// `start`. The session becomes active once the server has answered
    /// with `connect_ok` and `instance_start`.
    pub fn connect_session<A: ToSocketAddrs>(
        &mut self,
        credentials: &Credentials,
        map_id: &str,
        endpoint: A,
    ) -> Result<(), NetError> {
        if self.state() != ConnectionState::Disconnected {
            return Err(NetError::AlreadyConnected);
        }
        self.teardown();

        let endpoint = NetworkEndpoint::connect(endpoint, self.config.recv_timeout)
            .inspect_err(|e| warn!("Failed to open session socket: {}", e))?;
        let remote = endpoint.remote_addr();

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let link = Arc::new(Link::new(endpoint, self.config.clone(), events_tx));
        link.channel.session().begin_connect();

        let workers = workers::spawn_all(&link);
        self.connection = Some(Connection {
            link: Arc::clone(&link),
            events: events_rx,
            workers,
        });

        info!(
            "Connecting to {} as character {}",
            remote, credentials.character_id
        );

        let connect = Payload::Connect {
            token: credentials.token.clone(),
            character_id: credentials.character_id,
            season_id: credentials.season_id,
        };
        let connect_seq = self.next_command_sequence();
        let start = Payload::Start {
            map_id: normalize_map_id(map_id),
        };
        let start_seq = self.next_command_sequence();

        let sent = link
            .send_reliable(connect, connect_seq)
            .and_then(|_| link.send_reliable(start, start_seq));
        if let Err(e) = sent {
            link.fail(format!("handshake send failed: {}", e));
            self.teardown();
            return Err(e);
        }

        Ok(())
    }

    pub fn connect_with<A: ToSocketAddrs>(
        &mut self,
        provider: &dyn CredentialProvider,
        map_id: &str,
        endpoint: A,
    ) -> Result<(), NetError> {
        let credentials = provider.credentials().ok_or(NetError::NoCredentials)?;
        self.connect_session(&credentials, map_id, endpoint)
    }

    fn active_link(&self) -> Result<Arc<Link>, NetError> {
        match self.link() {
            Some(link) if link.state() == ConnectionState::Active => Ok(Arc::clone(link)),
            _ => Err(NetError::NotActive(self.state())),
        }
    }

    /// Sends one gameplay intent. Movement is predicted locally before it
    /// goes out.
    pub fn send_command(&mut self, intent: Intent) -> Result<(), NetError> {
        let link = self.active_link()?;
        let seq = self.next_command_sequence();

        if let Intent::Move { direction, elapsed } = &intent {
            self.prediction.apply_input(seq, *direction, *elapsed);
        }

        let payload = intent.to_payload();
        let kind = payload.kind();
        link.send(payload, seq).inspect_err(|e| {
            link.fail(format!("sending {} failed: {}", kind, e));
        })
    }

    /// Forwards every queued intent. Nothing is pulled from `source` while
    /// the session is not active.
    pub fn drain_input(&mut self, source: &mut dyn InputSource) -> Result<usize, NetError> {
        self.active_link()?;

        let mut sent = 0;
        while let Some(intent) = source.next_intent() {
            self.send_command(intent)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Registers a callback run from [`NetworkClient::poll`] for each new
    /// snapshot, after prediction has been reconciled against it.
    pub fn on_snapshot<F>(&mut self, observer: F)
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Drains the session event queue in arrival order.
    pub fn poll(&mut self) -> Vec<ClientEvent> {
        let Some(connection) = self.connection.as_mut() else {
            return Vec::new();
        };

        let events: Vec<ClientEvent> = connection.events.try_iter().collect();
        if connection.link.cancel.is_cancelled() {
            connection.join_workers();
        }

        for event in &events {
            match event {
                ClientEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot),
                ClientEvent::InstanceStart(info) => self.instance = Some(info.clone()),
                ClientEvent::NetStats(quality) => self.link_quality = Some(*quality),
                ClientEvent::Disconnected { reason } => {
                    debug!("Session closed: {}", reason);
                }
                _ => {}
            }
        }

        events
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.player_id = Some(snapshot.player_id);
        if let Some(player) = snapshot.player() {
            self.prediction
                .reconcile(player.position, snapshot.ack_seq, snapshot.server_time_ms);
        }
        for observer in &mut self.observers {
            observer(snapshot);
        }
    }

    pub fn try_get_render_window(&self, interpolation_delay_ms: f64) -> Option<RenderWindow> {
        let link = self.link()?;
        let buffer = link.snapshots.lock();
        render::resolve(
            &buffer,
            clock::now_ms(),
            interpolation_delay_ms,
            link.rtt_estimate_ms(),
            self.config.min_max_behind_ms,
        )
    }

    /// `(previous, newest)` once two snapshots have arrived.
    pub fn try_get_last_two_snapshots(&self) -> Option<(Arc<Snapshot>, Arc<Snapshot>)> {
        self.link()?.snapshots.lock().last_two()
    }

    /// Samples the render window into the entity registry. The local player
    /// is placed at its predicted position.
    pub fn update_render(&mut self, interpolation_delay_ms: f64, dt: f32) -> &EntityRegistry {
        if let Some(window) = self.try_get_render_window(interpolation_delay_ms) {
            let history = self.try_get_last_two_snapshots();
            let sampled = interpolation::sample(
                &window,
                history
                    .as_ref()
                    .map(|(previous, latest)| (&**previous, &**latest)),
                self.config.max_extrapolation_ms,
            );
            self.registry.apply(sampled, dt);

            if let Some(position) = self.prediction.predicted_position() {
                self.registry.pin(&window.to.player_id, position);
            }
        }
        &self.registry
    }

    /// [`NetworkClient::update_render`] at the configured interpolation delay.
    pub fn render_frame(&mut self, dt: f32) -> &EntityRegistry {
        let delay = self.config.interpolation_delay_ms;
        self.update_render(delay, dt)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn predicted_position(&self) -> Option<Vec2> {
        self.prediction.predicted_position()
    }

    pub fn pending_inputs(&self) -> usize {
        self.prediction.pending_count()
    }

    pub fn state(&self) -> ConnectionState {
        self.link()
            .map_or(ConnectionState::Disconnected, |link| link.state())
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.link()?.channel.session().session_id()
    }

    pub fn player_id(&self) -> Option<Uuid> {
        self.player_id
    }

    pub fn instance(&self) -> Option<&InstanceInfo> {
        self.instance.as_ref()
    }

    /// Last link report pushed by the server.
    pub fn link_quality(&self) -> Option<LinkQuality> {
        self.link_quality
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link().map(|link| link.endpoint.local_addr())
    }

    pub fn stats(&self) -> NetworkStats {
        self.link().map(|link| link.stats()).unwrap_or_default()
    }

    /// Closes the session, stops the network loops and releases the socket.
    pub fn disconnect(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        let link = &connection.link;

        if link.state() != ConnectionState::Disconnected {
            let _ = link.send_unreliable(Payload::Disconnect { reason: None }, 0);
            info!("Disconnecting from {}", link.endpoint.remote_addr());
        }
        link.channel.session().mark_disconnected();
        link.cancel.cancel();

        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.link.cancel.cancel();
            connection.join_workers();
            connection.link.channel.pending().clear();
        }
        self.prediction.reset();
        self.registry.clear();
        self.command_sequence = 0;
        self.player_id = None;
        self.instance = None;
        self.link_quality = None;
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
