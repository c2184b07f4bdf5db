//! Command-line interface definitions and dispatch

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use otpnv::{
    Bl2Config, FieldId, LayoutConfig, Medium, RegionLayout, RotpkRepresentation,
    SignatureAlgorithm,
};

use crate::image::{CopyState, Image};

/// Inspect and exercise OTP / NV counter flash images
#[derive(Parser, Debug)]
#[command(name = "otpnv", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub layout: LayoutArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Layout selection, mirroring `LayoutConfig`
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Leave out the provisioning (OTP) fields
    #[arg(long)]
    pub no_otp: bool,

    /// Leave out the generic flash NV counters
    #[arg(long)]
    pub no_nv_counters: bool,

    /// Include the BL1 ROTPK and counter
    #[arg(long)]
    pub bl1: bool,

    /// Include BL2 ROTPK slots and counters for this signature scheme
    #[arg(long, value_enum)]
    pub bl2: Option<Algorithm>,

    /// Store full BL2 public keys instead of key hashes
    #[arg(long, requires = "bl2")]
    pub builtin_key: bool,

    /// Number of non-secure image counters (0-3)
    #[arg(long, default_value_t = 0)]
    pub ns_counters: u8,

    /// Flash medium the image emulates
    #[arg(long, value_enum, default_value_t = MediumArg::Nor)]
    pub medium: MediumArg,
}

/// BL2 signature scheme
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Ec256,
    Ec384,
    Rsa,
}

/// Flash medium
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumArg {
    /// Erase-before-write NOR flash
    Nor,
    /// Byte-rewritable memory
    Rewritable,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved offset table
    Layout,

    /// Initialize an image, creating it if needed
    Init {
        /// Image file
        image: PathBuf,
    },

    /// Show which copies of the region are committed
    Status {
        /// Image file
        image: PathBuf,
    },

    /// Read bytes from a field name or byte offset
    Read {
        /// Image file
        image: PathBuf,
        /// Field name (e.g. `huk`) or offset (e.g. `0x24`)
        target: Target,
        /// Number of bytes (default: whole field)
        #[arg(short, long)]
        len: Option<usize>,
    },

    /// Atomically write hex bytes to a field name or byte offset
    Write {
        /// Image file
        image: PathBuf,
        /// Field name (e.g. `huk`) or offset (e.g. `0x24`)
        target: Target,
        /// Data as hex (e.g. `deadbeef`)
        data: String,
    },

    /// Monotonic counter operations
    Counter {
        #[command(subcommand)]
        action: CounterAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CounterAction {
    /// Print a counter value
    Get {
        /// Image file
        image: PathBuf,
        /// Counter field (e.g. `bl2_nv_counter_0`)
        field: FieldId,
    },

    /// Advance a counter
    Set {
        /// Image file
        image: PathBuf,
        /// Counter field (e.g. `bl2_nv_counter_0`)
        field: FieldId,
        /// New value; must not be lower than the stored one
        value: u32,
    },
}

/// Where a read or write starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Field(FieldId),
    Offset(u32),
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(Target::Offset)
                .with_context(|| format!("Invalid offset '{}'", s));
        }
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            return s
                .parse()
                .map(Target::Offset)
                .with_context(|| format!("Invalid offset '{}'", s));
        }
        s.parse()
            .map(Target::Field)
            .map_err(|_| anyhow!("Unknown field '{}'", s))
    }
}

impl LayoutArgs {
    /// Build the layout configuration these flags describe.
    pub fn config(&self) -> LayoutConfig {
        let mut config = LayoutConfig::new().with_ns_nv_counters(self.ns_counters);
        if self.no_otp {
            config = config.without_otp();
        }
        if self.no_nv_counters {
            config = config.without_nv_counters();
        }
        if self.bl1 {
            config = config.with_bl1();
        }
        if let Some(algorithm) = self.bl2 {
            let algorithm = match algorithm {
                Algorithm::Ec256 => SignatureAlgorithm::Ec256,
                Algorithm::Ec384 => SignatureAlgorithm::Ec384,
                Algorithm::Rsa => SignatureAlgorithm::Rsa,
            };
            let representation = if self.builtin_key {
                RotpkRepresentation::BuiltinKey
            } else {
                RotpkRepresentation::Hash
            };
            config = config.with_bl2(Bl2Config::new(algorithm, representation));
        }
        config
    }

    /// Resolve the layout.
    pub fn resolve(&self) -> Result<RegionLayout> {
        RegionLayout::resolve(&self.config()).context("Invalid layout options")
    }

    pub fn medium(&self) -> Medium {
        match self.medium {
            MediumArg::Nor => Medium::EraseBeforeWrite,
            MediumArg::Rewritable => Medium::Rewritable,
        }
    }
}

/// Parse a hex string, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if !digits.is_ascii() {
        bail!("Hex data contains non-ASCII characters");
    }
    if digits.len() % 2 != 0 {
        bail!("Hex data has an odd number of digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

/// Lowercase hex, grouped in 16-byte lines.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| line.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn run(cli: Cli) -> Result<()> {
    let layout = cli.layout.resolve()?;
    let medium = cli.layout.medium();

    match cli.command {
        Command::Layout => {
            println!("{:>6}  {:>4}  {:<26}  counter", "offset", "size", "field");
            for entry in layout.entries() {
                let counter = match entry.id.counter_encoding() {
                    Some(encoding) => format!("{:?}", encoding),
                    None => String::new(),
                };
                println!(
                    "{:>#6x}  {:>4}  {:<26}  {}",
                    entry.offset, entry.size, entry.id, counter
                );
            }
            println!();
            println!("region size:      {} bytes", layout.size());
            println!("element size max: {} bytes", layout.element_size_max());
            println!("image size:       {} bytes", Image::area(&layout).footprint());
        }

        Command::Init { image } => {
            let mut img = Image::open_or_blank(&image, layout, medium)?;
            let generation = img.region()?.generation()?;
            img.save()?;
            println!("{}: committed, generation {}", image.display(), generation);
        }

        Command::Status { image } => {
            let img = Image::open(&image, layout, medium)?;
            match img.copies() {
                (CopyState::Committed(generation), _) => {
                    println!("committed, generation {}", generation);
                }
                (CopyState::Invalid, CopyState::Committed(generation)) => {
                    println!(
                        "interrupted write, generation {} recoverable from staging",
                        generation
                    );
                }
                (CopyState::Invalid, CopyState::Invalid) => println!("not initialized"),
            }
        }

        Command::Read { image, target, len } => {
            // Reads never write back, even if init had to recover.
            let mut img = Image::open(&image, layout, medium)?;
            let mut region = img.region()?;
            let (offset, len) = match target {
                Target::Field(id) => {
                    let entry = region.field(id)?;
                    (entry.offset, len.unwrap_or(entry.size as usize))
                }
                Target::Offset(offset) => (offset, len.unwrap_or(4)),
            };
            let mut buf = vec![0u8; len];
            region.read(offset, &mut buf)?;
            println!("{}", to_hex(&buf));
        }

        Command::Write {
            image,
            target,
            data,
        } => {
            let bytes = parse_hex(&data)?;
            let mut img = Image::open(&image, layout, medium)?;
            let generation = {
                let mut region = img.region()?;
                match target {
                    Target::Field(id) => region.write_field(id, &bytes)?,
                    Target::Offset(offset) => region.write(offset, &bytes)?,
                }
                region.generation()?
            };
            img.save()?;
            println!("wrote {} bytes, generation {}", bytes.len(), generation);
        }

        Command::Counter { action } => match action {
            CounterAction::Get { image, field } => {
                let mut img = Image::open(&image, layout, medium)?;
                println!("{}", img.region()?.read_counter(field)?);
            }
            CounterAction::Set {
                image,
                field,
                value,
            } => {
                let mut img = Image::open(&image, layout, medium)?;
                img.region()?.set_counter(field, value)?;
                img.save()?;
                println!("{} = {}", field, value);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("otpnv").chain(args.iter().copied()))
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("0x24".parse::<Target>().unwrap(), Target::Offset(0x24));
        assert_eq!("36".parse::<Target>().unwrap(), Target::Offset(36));
        assert_eq!(
            "BL2_NV_COUNTER_2".parse::<Target>().unwrap(),
            Target::Field(FieldId::Bl2NvCounter(2))
        );
        assert!("nope".parse::<Target>().is_err());
        assert!("0xzz".parse::<Target>().is_err());
    }

    #[test]
    fn test_hex() {
        assert_eq!(parse_hex("de ad BE EF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex("0x0102").unwrap(), vec![1, 2]);
        assert!(parse_hex("abc").is_err());
        assert_eq!(to_hex(&[0x01, 0xab]), "01 ab");
        assert_eq!(to_hex(&[0u8; 17]).lines().count(), 2);
    }

    #[test]
    fn test_layout_flags() {
        let args = cli(&["--bl2", "ec256", "--ns-counters", "3", "layout"]);
        let layout = args.layout.resolve().unwrap();
        assert_eq!(layout, RegionLayout::resolve_or_panic(&LayoutConfig::tfm_default()));

        let args = cli(&["--no-otp", "layout"]);
        assert_eq!(args.layout.resolve().unwrap().size(), 20);

        let args = cli(&["--bl2", "rsa", "--builtin-key", "layout"]);
        assert!(args.layout.resolve().is_err());
    }

    #[test]
    fn test_commands_against_image() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("otp.bin");
        let path = path.to_str().context("non-utf8 temp path")?;

        run(cli(&["--bl2", "ec256", "init", path]))?;
        run(cli(&["--bl2", "ec256", "write", path, "huk", "00112233"]))?;
        run(cli(&["--bl2", "ec256", "counter", "set", path, "bl2_nv_counter_1", "6"]))?;
        assert!(run(cli(&["--bl2", "ec256", "counter", "set", path, "bl2_nv_counter_1", "2"])).is_err());
        assert!(run(cli(&["--bl2", "ec256", "write", path, "0x0", "00000000"])).is_err());
        run(cli(&["--bl2", "ec256", "read", path, "huk", "--len", "4"]))?;
        run(cli(&["--bl2", "ec256", "status", path]))?;

        let layout = RegionLayout::resolve_or_panic(
            &LayoutConfig::new().with_bl2(Bl2Config::new(
                SignatureAlgorithm::Ec256,
                RotpkRepresentation::Hash,
            )),
        );
        let mut image = Image::open(std::path::Path::new(path), layout, Medium::EraseBeforeWrite)?;
        assert_eq!(image.copies().0, CopyState::Committed(2));
        let mut region = image.region()?;
        assert_eq!(region.read_counter(FieldId::Bl2NvCounter(1))?, 6);
        let mut huk = [0u8; 4];
        region.read_field(FieldId::Huk, &mut huk)?;
        assert_eq!(huk, [0x00, 0x11, 0x22, 0x33]);
        Ok(())
    }
}
