use anyhow::{Context, Result, bail};
use assert_no_alloc::assert_no_alloc;
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use voxchain::audio::buffer::AudioBuffer;
use voxchain::audio::engine::Engine;
use voxchain::order::DspOrder;
use voxchain::params::ParamStore;
use voxchain::settings::Settings;
use voxchain::state::PluginState;

#[cfg(debug_assertions)]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "voxchain-render")]
#[command(version)]
#[command(about = "Renders a WAV file through a reorderable chain of vocal effects.")]
struct Args {
    /// Input WAV file
    input: PathBuf,
    /// Output WAV file
    output: PathBuf,
    #[arg(
        long,
        help = "Stage order, e.g. general-filter,phase,chorus,over-drive,ladder-filter"
    )]
    order: Option<DspOrder>,
    #[arg(
        long = "set",
        value_name = "NAME=VALUE",
        value_parser = parse_assignment,
        help = "Set a parameter by display name, may be repeated"
    )]
    assignments: Vec<(String, f32)>,
    #[arg(long, help = "Load parameters and order from a saved state file")]
    state: Option<PathBuf>,
    #[arg(long, help = "Write the final parameters and order to a state file")]
    save_state: Option<PathBuf>,
    #[arg(long, env = "VOXCHAIN_SETTINGS", help = "Settings file to use")]
    settings: Option<PathBuf>,
    #[arg(long, env = "VOXCHAIN_BLOCK_SIZE", default_value_t = 512)]
    block_size: usize,
    #[arg(long, help = "Override the parameter update interval in samples")]
    sub_block_size: Option<usize>,
    #[arg(long, help = "Write 32-bit float samples instead of 16-bit PCM")]
    float: bool,
    #[arg(long, help = "List every parameter and exit")]
    list_params: bool,
}

fn parse_assignment(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid value in '{s}': {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn read_wav(path: &Path) -> Result<(WavSpec, Vec<f32>)> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open input '{}'", path.display()))?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok((spec, samples))
}

fn write_wav(path: &Path, spec: WavSpec, samples: &[f32], float: bool) -> Result<()> {
    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: if float { 32 } else { 16 },
        sample_format: if float {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };
    let mut writer = WavWriter::create(path, out_spec)
        .with_context(|| format!("failed to create output '{}'", path.display()))?;
    for &sample in samples {
        if float {
            writer.write_sample(sample)?;
        } else {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
    }
    writer.finalize().context("failed to finalize output")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    info!("voxchain-render v{}", env!("CARGO_PKG_VERSION"));
    debug!("Args: {args:?}");

    if args.list_params {
        for def in ParamStore::layout() {
            println!("{:<28} {:?}", def.name, def.kind);
        }
        return Ok(());
    }

    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(sub_block_size) = args.sub_block_size {
        settings.engine.sub_block_size = sub_block_size;
    }
    info!("Settings:\n{settings}");

    let (spec, samples) = read_wav(&args.input)?;
    let channels = usize::from(spec.channels);
    if channels == 0 {
        bail!("input has no channels");
    }
    if channels > 2 {
        warn!("Input has {channels} channels, only the first two are processed");
    }

    let params = Arc::new(ParamStore::new());
    let (mut engine, mut handle) = Engine::new(Arc::clone(&params), &settings.engine);
    let mut restore = handle.take_restore_consumer();

    if let Some(path) = &args.state {
        let state = PluginState::load_from_file(path)?;
        handle.apply_state(&state);
        if let Some(order) = restore.as_mut().and_then(|r| r.try_pop()) {
            info!("Restored stage order: {order}");
        }
    }
    for (name, value) in &args.assignments {
        let stored = params.set_by_name(name, *value)?;
        info!("{name} = {stored}");
    }
    if let Some(order) = args.order {
        handle.push_order(order);
    }

    let sample_rate = settings.sample_rate.unwrap_or(spec.sample_rate) as f32;
    if sample_rate != spec.sample_rate as f32 {
        warn!(
            "Processing at {sample_rate} Hz while the file is {} Hz",
            spec.sample_rate
        );
    }
    let block_size = args.block_size.max(1);
    engine.prepare(sample_rate, block_size);
    info!("Rendering with order {}", handle.last_pushed_order());

    let mut output = Vec::with_capacity(samples.len());
    let mut buffer = AudioBuffer::new(channels, block_size);
    for frames in samples.chunks(block_size * channels) {
        let num_frames = frames.len() / channels;
        if num_frames != buffer.num_samples() {
            buffer = AudioBuffer::new(channels, num_frames);
        }
        for (i, frame) in frames.chunks_exact(channels).enumerate() {
            for (ch, &sample) in frame.iter().enumerate() {
                buffer.channel_mut(ch)[i] = sample;
            }
        }

        assert_no_alloc(|| engine.process_block(&mut buffer, channels));

        for i in 0..num_frames {
            for ch in 0..channels {
                output.push(buffer.channel(ch)[i]);
            }
        }
    }
    debug!("Active order after render: {}", handle.active_order());

    write_wav(&args.output, spec, &output, args.float)?;
    info!("Wrote {}", args.output.display());

    if let Some(path) = &args.save_state {
        PluginState::capture(&params, handle.last_pushed_order()).save_to_file(path)?;
        info!("Saved state to {}", path.display());
    }

    Ok(())
}
