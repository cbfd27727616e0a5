use std::{env, error, fs, path::PathBuf, process};

use emu::bus::FlatMemory;
use emu::cpu::arm7tdmi::Arm7tdmi;
use emu::cpu::psr::CpuState;
use emu::cpu::registers::REG_SP;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_STEPS: u64 = 1_000_000;
/// Room left after the image for the stack and data.
const RAM_AFTER_IMAGE: usize = 0x0004_0000;

const USAGE: &str =
    "usage: armature <image> [--base ADDR] [--entry ADDR] [--steps N] [--thumb] [--log-dir DIR]";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunConfig {
    image: PathBuf,
    base: u32,
    entry: Option<u32>,
    steps: u64,
    thumb: bool,
    log_dir: Option<PathBuf>,
}

impl RunConfig {
    fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut args = args.into_iter();
        let mut image = None;
        let mut base = 0;
        let mut entry = None;
        let mut steps = DEFAULT_STEPS;
        let mut thumb = false;
        let mut log_dir = None;

        while let Some(arg) = args.next() {
            let mut value = |name: &str| args.next().ok_or_else(|| format!("{name} needs a value"));

            match arg.as_str() {
                "--base" => base = parse_number(&value("--base")?)?,
                "--entry" => entry = Some(parse_number(&value("--entry")?)?),
                "--steps" => steps = parse_number(&value("--steps")?)?,
                "--thumb" => thumb = true,
                "--log-dir" => log_dir = Some(PathBuf::from(value("--log-dir")?)),
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                path if image.is_none() => image = Some(PathBuf::from(path)),
                extra => return Err(format!("unexpected argument {extra}")),
            }
        }

        Ok(Self {
            image: image.ok_or_else(|| "missing image path".to_owned())?,
            base,
            entry,
            steps,
            thumb,
            log_dir,
        })
    }

    const fn state(&self) -> CpuState {
        if self.thumb {
            CpuState::Thumb
        } else {
            CpuState::Arm
        }
    }
}

/// `0x` prefixed hex or plain decimal.
fn parse_number<T>(text: &str) -> Result<T, String>
where
    T: TryFrom<u64>,
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse::<u64>(),
    };

    parsed
        .ok()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| format!("invalid number {text}"))
}

/// Installs the subscriber. The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "armature.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn load_core(
    config: &RunConfig,
    image: &[u8],
) -> Result<Arm7tdmi<FlatMemory>, Box<dyn error::Error>> {
    let mut memory = FlatMemory::new(config.base, image.len() + RAM_AFTER_IMAGE);
    memory.load(config.base, image)?;
    let stack_top = (memory.end() as u32) & !0b111;

    let mut cpu = Arm7tdmi::new(memory);
    cpu.reset_to(config.entry.unwrap_or(config.base), config.state());
    cpu.set_reg(REG_SP, stack_top);

    Ok(cpu)
}

fn run(config: &RunConfig) -> Result<(), Box<dyn error::Error>> {
    let image = fs::read(&config.image)?;
    tracing::info!("loaded {} ({} bytes)", config.image.display(), image.len());

    let mut cpu = load_core(config, &image)?;
    tracing::info!(
        "starting at 0x{:08X} in {:?} state",
        cpu.next_instruction_address(),
        config.state()
    );

    for step in 0..config.steps {
        if let Err(e) = cpu.step() {
            tracing::error!("stopped after {step} steps: {e}");
            println!("{}", cpu.register_dump());
            return Err(e.into());
        }
    }

    tracing::info!("executed {} steps", config.steps);
    println!("{}", cpu.register_dump());

    Ok(())
}

fn main() {
    println!("armature v0.1.0");

    let config = match RunConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            process::exit(2);
        }
    };

    let _guard = init_tracing(config.log_dir.as_ref());

    if let Err(e) = run(&config) {
        eprintln!("{e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn check_run_config_defaults() {
        let config = RunConfig::from_args(args(&["boot.bin"])).unwrap();

        assert_eq!(
            config,
            RunConfig {
                image: PathBuf::from("boot.bin"),
                base: 0,
                entry: None,
                steps: DEFAULT_STEPS,
                thumb: false,
                log_dir: None,
            }
        );
        assert_eq!(config.state(), CpuState::Arm);
    }

    #[test]
    fn check_run_config_options() {
        let config = RunConfig::from_args(args(&[
            "--base",
            "0x0800_0000",
            "code.bin",
            "--entry",
            "0x080000C0",
            "--steps",
            "500",
            "--thumb",
            "--log-dir",
            "/tmp/logs",
        ]))
        .unwrap();

        assert_eq!(config.base, 0x0800_0000);
        assert_eq!(config.entry, Some(0x0800_00C0));
        assert_eq!(config.steps, 500);
        assert_eq!(config.state(), CpuState::Thumb);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn check_run_config_errors() {
        assert_eq!(
            RunConfig::from_args(args(&[])),
            Err("missing image path".to_owned())
        );
        assert_eq!(
            RunConfig::from_args(args(&["a.bin", "--steps"])),
            Err("--steps needs a value".to_owned())
        );
        assert_eq!(
            RunConfig::from_args(args(&["a.bin", "--base", "0x1_0000_0000"])),
            Err("invalid number 0x1_0000_0000".to_owned())
        );
        assert_eq!(
            RunConfig::from_args(args(&["a.bin", "--fast"])),
            Err("unknown option --fast".to_owned())
        );
    }

    #[test]
    fn check_decode_without_core() {
        use emu::cpu::arm::mode::ArmModeOpcode;
        use emu::cpu::thumb::mode::ThumbModeOpcode;

        let arm = ArmModeOpcode::from(0xEF06_0000);
        assert_eq!(arm.instruction.to_string(), "SWI 0x060000");

        let thumb = ThumbModeOpcode::from(0xB5F0);
        assert_eq!(thumb.instruction.to_string(), "PUSH {R4, R5, R6, R7, LR}");
    }

    #[test]
    fn check_image_runs_from_base() {
        // MOV R0, #5 ; ADD R0, R0, #1
        let image: Vec<u8> = [0xE3A0_0005_u32, 0xE280_0001]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let config = RunConfig {
            image: PathBuf::new(),
            base: 0x100,
            entry: None,
            steps: 2,
            thumb: false,
            log_dir: None,
        };

        let mut cpu = load_core(&config, &image).unwrap();
        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.get_reg(0), 6);
        assert_eq!(cpu.next_instruction_address(), 0x108);
        assert_eq!(cpu.get_reg(REG_SP) % 8, 0);
    }
}
