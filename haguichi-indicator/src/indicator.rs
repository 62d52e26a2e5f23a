//! Indicator orchestration
//!
//! Wires the remote session, the presenter, the animation timer and the
//! surface together. Everything that can change the indicator (remote
//! signals, query answers, clicks, animation ticks, config reloads) is
//! funnelled through one channel and handled one event at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::animator::{Animator, TickSink};
use crate::config::IndicatorConfig;
use crate::labels::Labels;
use crate::presenter::{AnimationChange, MenuEntry, Presenter};
use crate::remote::{EventSink, Remote, RemoteEvent, RemoteMethod, Subscription};
use crate::surface::{ActionSink, Surface, UserAction};

/// Anything the indicator reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorEvent {
    Remote(RemoteEvent),
    User(UserAction),
    /// Animation tick carrying the generation of the timer that fired
    Tick(u64),
    ConfigReloaded(IndicatorConfig),
}

/// Receives reloaded indicator settings. Returns `false` once the receiving
/// side is gone.
pub type ConfigSink = Arc<dyn Fn(IndicatorConfig) -> bool + Send + Sync>;

/// The single queue feeding an [`Indicator`]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<IndicatorEvent>,
    rx: mpsc::UnboundedReceiver<IndicatorEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn event_sink(&self) -> EventSink {
        let tx = self.tx.clone();
        Arc::new(move |event| tx.send(IndicatorEvent::Remote(event)).is_ok())
    }

    pub fn action_sink(&self) -> ActionSink {
        let tx = self.tx.clone();
        Arc::new(move |action| tx.send(IndicatorEvent::User(action)).is_ok())
    }

    pub fn tick_sink(&self) -> TickSink {
        let tx = self.tx.clone();
        Arc::new(move |generation| tx.send(IndicatorEvent::Tick(generation)).is_ok())
    }

    pub fn config_sink(&self) -> ConfigSink {
        let tx = self.tx.clone();
        Arc::new(move |config| tx.send(IndicatorEvent::ConfigReloaded(config)).is_ok())
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A running indicator instance
pub struct Indicator<R: Remote, S: Surface> {
    presenter: Presenter,
    remote: Arc<R>,
    surface: S,
    subscriptions: Vec<Subscription>,
    animator: Animator,
    scroll_actions: bool,
    queue: EventQueue,
}

impl<R: Remote, S: Surface> Indicator<R, S> {
    pub fn new(queue: EventQueue, remote: R, surface: S, config: &IndicatorConfig) -> Self {
        let mut presenter = Presenter::new(Labels::new(config.mnemonics));
        presenter.set_icon_theme_path(config.icon_theme_path());

        let animator = Animator::new(config.animation_interval(), queue.tick_sink());

        Self {
            presenter,
            remote: Arc::new(remote),
            surface,
            subscriptions: Vec::new(),
            animator,
            scroll_actions: config.scroll_actions,
            queue,
        }
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Subscribe to the session, ask for its current state and draw the
    /// first view.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.subscriptions = self.remote.subscribe(self.queue.event_sink()).await?;

        // An absent session is queried once its name owner shows up
        let present = self.remote.has_owner().await;
        tracing::info!("Haguichi session present: {}", present);
        let change = self.presenter.on_presence_changed(present);
        self.apply_animation(change);
        if present {
            self.query_state();
        }

        self.render().await;
        Ok(())
    }

    /// Process events until `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.queue.rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
    }

    /// Stop the animation, drop every subscription and remove the surface
    pub async fn teardown(&mut self) {
        self.animator.stop();

        for subscription in self.subscriptions.drain(..) {
            subscription.release();
        }

        if let Err(e) = self.surface.destroy().await {
            tracing::warn!("Failed to remove indicator: {}", e);
        }
        tracing::info!("Indicator torn down");
    }

    async fn handle_event(&mut self, event: IndicatorEvent) {
        tracing::trace!("Handling {:?}", event);
        match event {
            IndicatorEvent::Remote(event) => self.on_remote_event(event).await,
            IndicatorEvent::User(action) => self.on_user_action(action),
            IndicatorEvent::Tick(generation) => self.on_tick(generation).await,
            IndicatorEvent::ConfigReloaded(config) => self.on_config_reloaded(config).await,
        }
    }

    async fn on_remote_event(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::ModeChanged(mode) => {
                tracing::debug!("Mode changed to {}", mode.as_str());
                let change = self.presenter.on_mode_changed(mode);
                self.apply_animation(change);
            }
            RemoteEvent::ModalityChanged(modal) => self.presenter.on_modality_changed(modal),
            RemoteEvent::VisibilityChanged(visible) => self.presenter.on_visibility_changed(visible),
            RemoteEvent::Quitted => {
                tracing::info!("Haguichi quit");
                let change = self.presenter.on_presence_changed(false);
                self.apply_animation(change);
            }
            RemoteEvent::PresenceChanged(present) => {
                let was_present = self.presenter.is_present();
                let change = self.presenter.on_presence_changed(present);
                self.apply_animation(change);
                if present && !was_present {
                    tracing::info!("Haguichi session appeared");
                    self.query_state();
                } else if !present && was_present {
                    tracing::info!("Haguichi session vanished");
                }
            }
        }
        self.render().await;
    }

    fn apply_animation(&mut self, change: AnimationChange) {
        match change {
            AnimationChange::Start => {
                self.animator.start();
            }
            AnimationChange::Stop => self.animator.stop(),
            AnimationChange::Keep => {}
        }
    }

    fn on_user_action(&mut self, action: UserAction) {
        let view = self.presenter.view();

        let method = match action {
            UserAction::Activate(entry) => {
                if !view.is_actionable(entry) {
                    tracing::debug!("Ignoring activation of {:?}", entry);
                    return;
                }
                self.method_for(entry)
            }
            UserAction::ActivateIcon => {
                if !view.is_actionable(MenuEntry::Show) {
                    return;
                }
                self.method_for(MenuEntry::Show)
            }
            UserAction::ScrollUp | UserAction::ScrollDown => {
                if !self.scroll_actions || !view.visible || self.presenter.is_modal() {
                    return;
                }
                if action == UserAction::ScrollUp {
                    Some(RemoteMethod::Show)
                } else {
                    Some(RemoteMethod::Hide)
                }
            }
        };

        if let Some(method) = method {
            self.remote.call(method);
        }
    }

    fn method_for(&self, entry: MenuEntry) -> Option<RemoteMethod> {
        match entry {
            MenuEntry::Show if self.presenter.is_app_visible() => Some(RemoteMethod::Hide),
            MenuEntry::Show => Some(RemoteMethod::Show),
            MenuEntry::Connecting => None,
            MenuEntry::Connect => Some(RemoteMethod::StartHamachi),
            MenuEntry::Disconnect => Some(RemoteMethod::StopHamachi),
            MenuEntry::Join => Some(RemoteMethod::JoinNetwork),
            MenuEntry::Create => Some(RemoteMethod::CreateNetwork),
            MenuEntry::Information => Some(RemoteMethod::Information),
            MenuEntry::Quit => Some(RemoteMethod::QuitApp),
        }
    }

    async fn on_tick(&mut self, generation: u64) {
        // Queued before the timer got cancelled
        if !self.animator.is_current(generation) {
            tracing::trace!(generation, "Dropping stale animation tick");
            return;
        }

        if self.presenter.on_tick() {
            self.render().await;
        } else {
            self.animator.stop();
        }
    }

    async fn on_config_reloaded(&mut self, config: IndicatorConfig) {
        self.presenter.set_labels(Labels::new(config.mnemonics));
        self.presenter.set_icon_theme_path(config.icon_theme_path());
        self.animator.set_interval(config.animation_interval());
        self.scroll_actions = config.scroll_actions;

        tracing::info!("Applied new indicator settings");
        self.render().await;
    }

    /// Ask the session for mode, modality and window visibility. Answers
    /// come back through the event queue like any signal would.
    fn query_state(&self) {
        let remote = self.remote.clone();
        let sink = self.queue.event_sink();

        tokio::spawn(async move {
            if let Some(mode) = remote.get_mode().await {
                sink(RemoteEvent::ModeChanged(mode));
            }
            if let Some(modal) = remote.get_modality().await {
                sink(RemoteEvent::ModalityChanged(modal));
            }
            if let Some(visible) = remote.get_visibility().await {
                sink(RemoteEvent::VisibilityChanged(visible));
            }
        });
    }

    async fn render(&mut self) {
        let view = self.presenter.view();
        if let Err(e) = self.surface.apply_view(&view).await {
            tracing::warn!("Failed to update indicator: {}", e);
        }
    }
}
