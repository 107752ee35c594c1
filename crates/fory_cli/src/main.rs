mod args;

use args::{CliArgs, Command, NameKind, VarintWidth};
use clap::Parser;
use fory::{
    hash::murmurhash3_x64_128_seeded,
    meta_string::{MetaStringFactory, FIELD_NAME_FACTORY, NAMESPACE_FACTORY, TYPE_NAME_FACTORY},
    varint, Fory, ForyConfig, ForyError, RefMode, Result,
};
use tokio::{fs::File, io::BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    match std::env::var("RUST_LOG") {
        Ok(filters) => pretty_env_logger::formatted_timed_builder()
            .parse_filters(&filters)
            .init(),
        Err(_) => pretty_env_logger::formatted_timed_builder()
            .filter_level(log::LevelFilter::Info)
            .init(),
    }

    let args = CliArgs::parse();

    match args.command {
        Command::MetaString { value, kind } => meta_string(&value, kind),
        Command::Hash { value, seed } => {
            let (h1, h2) = murmurhash3_x64_128_seeded(value.as_bytes(), seed);
            println!("{}", format_hash(h1, h2));
            Ok(())
        }
        Command::Varint {
            value,
            width,
            signed,
        } => {
            println!("{}", hex(&encode_varint(value, width, signed)?));
            Ok(())
        }
        Command::Inspect {
            file,
            compatible,
            no_xlang,
            no_ref_flag,
        } => {
            let config = ForyConfig::default()
                .compatible(compatible)
                .xlang(!no_xlang)
                .ref_mode(match no_ref_flag {
                    true => RefMode::None,
                    false => RefMode::NullOnly,
                });

            log::info!("inspecting {:?}", file);
            let mut source = BufReader::new(File::open(&file).await?);
            let layout = Fory::new(config).inspect_from(&mut source).await?;

            println!("header:      {:?}", layout.header);
            if let Some(language) = layout.header.source_language() {
                println!("language:    {:?}", language);
            }
            if let Some(offset) = layout.meta_offset {
                println!("meta offset: {}", offset);
            }
            println!("ref flag:    {:?}", layout.ref_flag);
            println!("type id:     {:?}", layout.type_id);
            println!("body:        {} byte(s)", layout.body_len);
            for (index, meta) in layout.metas.iter().enumerate() {
                println!("meta #{}:     {} ({} field(s))", index, meta.display_name(), meta.fields.len());
                for field in &meta.fields {
                    println!("    {}: {:?}", field.name, field.field_type);
                }
            }
            Ok(())
        }
    }
}

fn meta_string(value: &str, kind: NameKind) -> Result<()> {
    let factory: &MetaStringFactory = match kind {
        NameKind::Field => &FIELD_NAME_FACTORY,
        NameKind::Type => &TYPE_NAME_FACTORY,
        NameKind::Namespace => &NAMESPACE_FACTORY,
    };

    let (encoder, _) = factory.select(value);
    let encoded = factory.encode(value)?;
    let decoded = factory.decode(encoded.encoding, &encoded.bytes)?;
    if decoded != value {
        log::warn!("{:?} decodes back to {:?}", value, decoded);
    }

    println!("encoder:  {}", encoder.name());
    println!("flag:     {}", encoded.encoding.flag());
    println!("bytes:    {}", hex(&encoded.bytes));
    println!("decoded:  {}", decoded);
    Ok(())
}

fn encode_varint(value: i64, width: VarintWidth, signed: bool) -> Result<Vec<u8>> {
    let out_of_range = |bits| ForyError::Range {
        value: value as u64,
        bits,
    };

    match (width, signed) {
        (VarintWidth::W32, true) => {
            let value = i32::try_from(value).map_err(|_| out_of_range(32))?;
            Ok(varint::encode_varuint32(varint::zigzag32(value)))
        }
        (VarintWidth::W32, false) => {
            let value = u32::try_from(value).map_err(|_| out_of_range(32))?;
            Ok(varint::encode_varuint32(value))
        }
        (VarintWidth::W36, true) => varint::encode_varuint36(varint::zigzag64(value)),
        (VarintWidth::W36, false) => {
            let value = u64::try_from(value).map_err(|_| out_of_range(36))?;
            varint::encode_varuint36(value)
        }
        (VarintWidth::W64, true) => Ok(varint::encode_varint64(value)),
        (VarintWidth::W64, false) => {
            let value = u64::try_from(value).map_err(|_| out_of_range(64))?;
            Ok(varint::encode_varuint64(value))
        }
    }
}

fn format_hash(h1: u64, h2: u64) -> String {
    format!("{:016x} {:016x}", h1, h2)
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_varint() {
        assert_eq!(encode_varint(300, VarintWidth::W32, false).unwrap(), [0xac, 0x02]);
        assert_eq!(encode_varint(-1, VarintWidth::W32, true).unwrap(), [0x01]);
        assert_eq!(encode_varint(-1, VarintWidth::W64, true).unwrap(), [0x01]);
        assert!(encode_varint(-1, VarintWidth::W64, false).is_err());
        assert!(encode_varint(1 << 40, VarintWidth::W36, false).is_err());
        assert!(encode_varint(1 << 33, VarintWidth::W32, false).is_err());
    }

    #[test]
    fn test_format_hash() {
        assert_eq!(format_hash(1, 0xab), "0000000000000001 00000000000000ab");
        assert_eq!(format_hash(u64::MAX, 0).split(' ').count(), 2);
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00 ab 10");
        assert_eq!(hex(&[]), "");
    }
}
