use clap::Parser;
use client::game::{ClientGameState, GameEvent};
use client::input::{look_direction, InputAction, InputManager, Key};
use client::network::{ClientEvent, NetworkClient};
use client::weapon::{FireOutcome, WeaponState};
use log::{debug, info, warn};
use shared::hitscan::EYE_HEIGHT;
use shared::math::Vec3;
use shared::protocol::ClientMessage;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Yaw speed of the bot in radians per second.
const BOT_TURN_RATE: f32 = 0.8;

/// Seconds between two status lines.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// How far in the past remote actors are rendered, in milliseconds
    #[arg(short = 'd', long, default_value = "100")]
    render_delay: u64,

    /// Frames per second of the local loop
    #[arg(short = 'f', long, default_value = "60")]
    fps: u32,

    /// Chat message to send once joined
    #[arg(short = 'c', long)]
    chat: Option<String>,

    /// Walk in circles and shoot
    #[arg(short = 'b', long)]
    bot: bool,

    /// Exit after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

/// Local player driven by the frame loop.
struct Player {
    network: NetworkClient,
    game: ClientGameState,
    input: InputManager,
    weapon: WeaponState,
    bot: bool,
    yaw: f32,
    respawn_requested: bool,
    last_frame: Instant,
}

impl Player {
    fn on_event(&mut self, event: ClientEvent, greeting: &mut Option<String>) {
        match event {
            ClientEvent::Connected => self.input.invalidate(),
            ClientEvent::Message(message) => {
                if let Some(event) = self.game.apply_message(&message) {
                    self.on_game_event(event, greeting);
                }
                self.input.set_dead(self.game.is_local_dead());
            }
            ClientEvent::Disconnected => warn!("Disconnected from server"),
            ClientEvent::Reconnecting { attempt, delay } => {
                info!("Reconnect attempt {} in {:?}", attempt, delay)
            }
            ClientEvent::GaveUp => {}
        }
    }

    fn on_game_event(&mut self, event: GameEvent, greeting: &mut Option<String>) {
        let local = self.game.local_id().map(str::to_string);
        let is_local = |id: &str| local.as_deref() == Some(id);

        match event {
            GameEvent::Joined { id } => {
                info!("Joined as {}", id);
                if let Some(message) = greeting.take() {
                    self.send_chat(message);
                }
            }
            GameEvent::Hit {
                target,
                damage,
                shooter,
            } => {
                if is_local(&target) {
                    info!("Hit by {} for {}", shooter, damage);
                } else if is_local(&shooter) {
                    info!("Hit {} for {}", target, damage);
                }
            }
            GameEvent::Died { target, killer } => {
                info!("{} was killed by {}", target, killer);
            }
            GameEvent::Respawned { id, position } => {
                if is_local(&id) {
                    info!("Respawned at {:?}", position);
                    self.weapon.reset();
                    self.respawn_requested = false;
                }
            }
            GameEvent::Chat { from, message } => info!("[chat] {}: {}", from, message),
            GameEvent::Left { id } => debug!("{} left", id),
        }
    }

    fn send_chat(&self, message: String) {
        if let Some(id) = self.game.local_id() {
            self.network.send(ClientMessage::Chat {
                player_id: id.to_string(),
                message,
            });
        }
    }

    fn frame(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.weapon.update(now);

        if self.bot {
            self.drive_bot(dt, now);
        }

        self.flush_input();

        let rendered = self.game.render_states_at(now);
        log::trace!("Rendered {} actors", rendered.len());
    }

    /// Sends the intent if it changed since the last send.
    fn flush_input(&mut self) {
        let Some(id) = self.game.local_id().map(str::to_string) else {
            return;
        };
        if let Some(intent) = self.input.take_changed() {
            self.network.send(ClientMessage::Input {
                player_id: id,
                input: intent,
            });
        }
    }

    fn drive_bot(&mut self, dt: f32, now: Instant) {
        let Some(id) = self.game.local_id().map(str::to_string) else {
            return;
        };

        if self.input.is_dead() {
            if !self.respawn_requested
                && self.input.key_down(Key::Jump) == Some(InputAction::RespawnRequest)
            {
                self.respawn_requested = true;
                self.network
                    .send(ClientMessage::RespawnRequest { player_id: id });
            }
            return;
        }

        self.yaw = (self.yaw + BOT_TURN_RATE * dt) % std::f32::consts::TAU;
        self.input.set_rotation(self.yaw);
        self.input.key_down(Key::Forward);
        self.input.key_down(Key::Primary);
        let equipped = self.input.current().equipped_item_id;
        self.weapon.equip(equipped);
        // The server fires whatever it has equipped, so the switch goes out first.
        self.flush_input();

        let Some(actor) = self.game.local_actor() else {
            return;
        };
        let origin = actor.position + Vec3::new(0.0, EYE_HEIGHT, 0.0);

        if self.weapon.try_fire(now) == FireOutcome::Fired {
            self.network.send(ClientMessage::Shoot {
                player_id: id,
                position: origin,
                direction: look_direction(self.yaw, 0.0),
                equip_id: equipped,
            });
        }
    }

    fn log_status(&self) {
        match self.game.local_actor() {
            Some(actor) => info!(
                "Tick {}: {} actors, health {}, ammo {}{}",
                self.game.last_tick(),
                self.game.actor_count(),
                actor.health,
                self.weapon.ammo(),
                if self.weapon.is_reloading() {
                    " (reloading)"
                } else {
                    ""
                }
            ),
            None => info!("Waiting for the server"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err("fps must be at least 1".into());
    }

    info!("Connecting to: {}", args.server);
    if args.bot {
        info!("Bot mode: walking in circles and shooting");
    } else {
        info!("Type a line to chat");
    }

    let (network, mut events) = NetworkClient::spawn(&args.server);
    let mut player = Player {
        network,
        game: ClientGameState::new(Duration::from_millis(args.render_delay)),
        input: InputManager::new(),
        weapon: WeaponState::new(),
        bot: args.bot,
        yaw: 0.0,
        respawn_requested: false,
        last_frame: Instant::now(),
    };
    let mut greeting = args.chat;

    let mut frames = tokio::time::interval(Duration::from_secs(1) / args.fps);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let stop_at = args
        .duration
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let stop = async move {
        match stop_at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::GaveUp) | None => {
                    warn!("Connection to {} lost for good", args.server);
                    break;
                }
                Some(event) => player.on_event(event, &mut greeting),
            },

            _ = frames.tick() => player.frame(Instant::now()),

            _ = status.tick() => player.log_status(),

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if !line.trim().is_empty() => player.send_chat(line),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => stdin_open = false,
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            },

            _ = &mut stop => {
                info!("Run time elapsed");
                break;
            },
        }
    }

    Ok(())
}
