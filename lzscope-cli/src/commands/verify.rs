//! Verify command implementation.

use lzscope_lzma2::{Container, MatchFinderKind, Mode, ParameterSet, compress, decompress};

/// Options for the verify command.
pub struct VerifyOptions {
    pub params: ParameterSet,
    pub container: Container,
    pub all_finders: bool,
}

/// Compress and decode `data`, returning the compressed size.
fn round_trip(data: &[u8], params: ParameterSet, container: Container) -> Result<usize, String> {
    let packed = compress(data, params, container).map_err(|e| e.to_string())?;
    let unpacked = decompress(&packed, params.dict_size).map_err(|e| e.to_string())?;
    if unpacked != data {
        let first = unpacked
            .iter()
            .zip(data)
            .position(|(a, b)| a != b)
            .unwrap_or(unpacked.len().min(data.len()));
        return Err(format!(
            "output differs at byte {} ({} bytes decoded, {} expected)",
            first,
            unpacked.len(),
            data.len()
        ));
    }
    Ok(packed.len())
}

pub fn cmd_verify(data: &[u8], options: &VerifyOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut cases = vec![(
        format!("{} {}", options.params.match_finder, options.params.mode),
        options.params,
    )];
    if options.all_finders {
        for kind in MatchFinderKind::ALL {
            for mode in [Mode::Fast, Mode::Normal] {
                cases.push((
                    format!("{} {}", kind, mode),
                    options.params.match_finder(kind).mode(mode),
                ));
            }
        }
    }

    println!("Verifying {} bytes ({} container)", data.len(), options.container.name());
    let mut failures = 0;
    for (name, params) in cases {
        match round_trip(data, params, options.container) {
            Ok(size) => println!("  {:<12} OK     {} bytes", name, size),
            Err(e) => {
                println!("  {:<12} FAILED {}", name, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} round trip(s) failed", failures).into());
    }
    println!("All round trips passed.");
    Ok(())
}
