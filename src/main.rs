use std::path::PathBuf;

#[derive(Debug)]
struct CliArgs {
    playlist: PathBuf,
    no_audio: bool,
    gesture_gate: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            playlist: PathBuf::from("assets/playlist.json"),
            no_audio: false,
            gesture_gate: false,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    if let Err(err) = tunewidget::config::log_dir()
        .and_then(|dir| tunewidget::logging::init_logging(&dir))
    {
        eprintln!("logging disabled: {err:#}");
    }

    tunewidget::app::run(tunewidget::app::AppOptions {
        playlist: args.playlist,
        no_audio: args.no_audio,
        gesture_gate: args.gesture_gate,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--playlist" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--playlist requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--playlist cannot be empty");
                }
                out.playlist = PathBuf::from(value.trim());
            }
            "--no-audio" => out.no_audio = true,
            "--gesture-gate" => out.gesture_gate = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Music Widget");
    println!("  --playlist <path>  Track list JSON (default assets/playlist.json)");
    println!("  --no-audio         Run with a silent transport");
    println!("  --gesture-gate     Ignore media-key next/previous until first play");
}
