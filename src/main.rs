//! Pileup headless driver
//!
//! Populates a scripted street scene, runs the world step for a fixed number
//! of frames and prints the final stats as JSON.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use clap::Parser;
    use glam::Vec2;
    use pileup::sim::{GestureAxis, SimEvent, SpawnRequest, World, step};
    use pileup::Tuning;

    /// Headless street-incident run
    #[derive(Parser, Debug)]
    #[command(name = "pileup")]
    #[command(about = "Run a scripted pileup scene and print world stats as JSON")]
    struct Args {
        /// Random seed for deterministic runs
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Frames to simulate
        #[arg(long, default_value_t = 1800)]
        frames: u32,

        /// Tuning JSON file (missing fields keep their defaults)
        #[arg(long)]
        tuning: Option<PathBuf>,

        /// Log stats every N frames (0 disables)
        #[arg(long, default_value_t = 300)]
        stats_every: u32,
    }

    const LANES: [f32; 4] = [130.0, 220.0, 320.0, 410.0];
    const SPAWN_EVERY: u32 = 40;
    const BRAKE_FRAME: u32 = 600;
    const CHAIN_FRAME: u32 = 1100;

    /// Pedestrian piles along the crossings
    fn populate(world: &mut World) {
        let w = world.tuning.world.width;
        for (i, &y) in LANES.iter().enumerate() {
            let x = w * (0.2 + 0.2 * i as f32);
            world.spawn_from_gesture(SpawnRequest {
                pos: Vec2::new(x, y),
                axis: GestureAxis::Vertical,
                dir: 1.0,
                speed: 0.0,
                brush: 1 + i as u32,
            });
        }
    }

    /// Alternating traffic, one vehicle every few frames
    fn spawn_traffic(world: &mut World, n: u32) {
        let lane = (n as usize) % LANES.len();
        let dir = if lane % 2 == 0 { 1.0 } else { -1.0 };
        let x = if dir > 0.0 { -20.0 } else { world.tuning.world.width + 20.0 };
        world.spawn_from_gesture(SpawnRequest {
            pos: Vec2::new(x, LANES[lane]),
            axis: GestureAxis::Horizontal,
            dir,
            speed: 5.0 + (n % 5) as f32 * 2.5,
            brush: 1,
        });
    }

    /// Fast drag across a lane that stops dead
    fn hard_brake(world: &mut World, t0_ms: f64) {
        let y = LANES[2];
        let mut x = world.tuning.world.width * 0.3;
        let mut t = t0_ms;
        for _ in 0..6 {
            world.drag_sample(Vec2::new(x, y), t);
            x += 36.0;
            t += 16.0;
        }
        if world.drag_sample(Vec2::new(x - 35.0, y), t) {
            log::info!("Hard brake at ({:.0}, {:.0})", x - 35.0, y);
        }
        world.end_drag();
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let args = Args::parse();

        let tuning = match &args.tuning {
            Some(path) => Tuning::load(path)?,
            None => Tuning::default(),
        };

        let mut world = World::with_tuning(args.seed, tuning);
        populate(&mut world);

        let mut impacts = 0u32;
        for frame in 0..args.frames {
            if frame % SPAWN_EVERY == 0 {
                spawn_traffic(&mut world, frame / SPAWN_EVERY);
            }
            if frame == BRAKE_FRAME {
                let now = world.clock.now_ms();
                hard_brake(&mut world, now);
            }
            if frame == CHAIN_FRAME {
                let center = Vec2::new(world.tuning.world.width * 0.5, LANES[1]);
                world.trigger_chain_crash(center);
            }

            step(&mut world);

            for event in world.drain_events() {
                match event {
                    SimEvent::Impact { pos, severity, .. } => {
                        impacts += 1;
                        log::debug!("Impact at ({:.0}, {:.0}) severity {:.2}", pos.x, pos.y, severity);
                    }
                    SimEvent::ChainGeneration { generation, crashed } => {
                        log::info!("Chain generation {} crashed {}", generation, crashed);
                    }
                    other => log::trace!("{:?}", other),
                }
            }

            if args.stats_every > 0 && (frame + 1) % args.stats_every == 0 {
                let s = world.stats();
                log::info!(
                    "frame {}: {} driving, {} wrecked, {} squished, {} ambulances, {} tow trucks",
                    s.frame,
                    s.vehicles_driving,
                    s.vehicles_wrecked,
                    s.totals.squished,
                    s.ambulances_active,
                    s.tow_trucks_active
                );
            }
        }

        log::info!("Run finished: {} impacts over {} frames", impacts, args.frames);
        println!("{}", serde_json::to_string_pretty(&world.stats())?);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Pileup (native) starting...");

    if let Err(e) = native::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The simulation is driven by the host page on the web; nothing to run here
}
