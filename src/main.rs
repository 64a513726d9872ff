#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::env;
    use std::sync::Arc;

    use anyhow::{anyhow, bail, Context, Result};
    use glam::Vec2;
    use pollster::block_on;

    use crystal_2d::host::{run_frames, InstantClock, PacedScheduler};
    use crystal_2d::resource::FsFetcher;
    use crystal_2d::{
        DemoScene, GameLoop, HeadlessSurface, InputState, KeyCode, LoopConfig, Resources,
    };

    const USAGE: &str =
        "Usage: crystal-2d <asset-root> [--scene <path>] [--frames <n>] [--tps <hz>] [--fps <hz>] [--hold <key>]...";

    pub fn run() -> Result<()> {
        let options = CliOptions::parse(env::args().skip(1))?;

        let scheduler = PacedScheduler::from_rate(options.fps);
        let pacer = scheduler.pacer();
        let input = Arc::new(InputState::new());
        for key in &options.held_keys {
            input.set_key_down(*key);
        }
        let mut game = GameLoop::new(
            LoopConfig::new().with_update_rate(options.tps),
            Resources::new(FsFetcher::new(&options.asset_root)),
            input,
            InstantClock::new(),
            scheduler,
        );

        let surface = HeadlessSurface::new(Vec2::new(800.0, 600.0));
        block_on(game.start(DemoScene::new(&options.scene, surface)))
            .with_context(|| format!("failed to start scene {}", options.scene))?;

        if let Some(scene) = game.scene() {
            println!("Loaded scene with {} objects", scene.objects().len());
            for object in scene.objects() {
                println!(" - {} ({:?})", object.name, object.kind);
            }
        }

        let frames = run_frames(&mut game, &pacer, options.frames)?;
        println!(
            "Ran {frames} frame(s) and {} update(s) at {} Hz",
            game.ticks(),
            options.tps
        );
        if let Some(scene) = game.scene() {
            print_final_state(scene);
        }

        game.shutdown()?;
        Ok(())
    }

    fn print_final_state(scene: &DemoScene<HeadlessSurface>) {
        println!("Final object states:");
        for object in scene.objects() {
            println!(
                " - {} pos=({:.2}, {:.2}) size=({:.2}, {:.2})",
                object.name, object.position.x, object.position.y, object.size.x, object.size.y
            );
        }
    }

    #[derive(Debug)]
    struct CliOptions {
        asset_root: String,
        scene: String,
        frames: u64,
        tps: f64,
        fps: f64,
        held_keys: Vec<KeyCode>,
    }

    impl CliOptions {
        fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
            let Some(asset_root) = args.next() else {
                bail!("{USAGE}");
            };
            let mut options = Self {
                asset_root,
                scene: "scene.xml".to_string(),
                frames: 120,
                tps: 60.0,
                fps: 60.0,
                held_keys: Vec::new(),
            };

            while let Some(arg) = args.next() {
                let mut value = || {
                    args.next()
                        .ok_or_else(|| anyhow!("{arg} expects a value\n{USAGE}"))
                };
                match arg.as_str() {
                    "--scene" => options.scene = value()?,
                    "--frames" => {
                        options.frames = value()?
                            .parse()
                            .context("--frames expects a whole number")?
                    }
                    "--tps" => options.tps = parse_rate(&value()?, "--tps")?,
                    "--fps" => options.fps = parse_rate(&value()?, "--fps")?,
                    "--hold" => {
                        let name = value()?;
                        let key = KeyCode::from_name(&name)
                            .ok_or_else(|| anyhow!("unknown key name: {name}"))?;
                        options.held_keys.push(key);
                    }
                    other => bail!("Unknown argument: {other}\n{USAGE}"),
                }
            }
            Ok(options)
        }
    }

    fn parse_rate(value: &str, flag: &str) -> Result<f64> {
        let rate: f64 = value
            .parse()
            .with_context(|| format!("{flag} expects a number"))?;
        if !rate.is_finite() || rate <= 0.0 {
            bail!("{flag} must be positive, got {value}");
        }
        Ok(rate)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = native::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
